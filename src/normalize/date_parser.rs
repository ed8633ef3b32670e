use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::spec::DateGranularity;
use super::utils::clean_str;

/// `D/M/Y`, separators `/`, `-` or `.`, optional `H:M[:S[.frac]]`.
static DAY_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([0-9]{1,2})([/.\-])([0-9]{1,2})([/.\-])([0-9]{4}|[0-9]{2})(?:[ T]+([0-9]{1,2}):([0-9]{2})(?::([0-9]{2})(?:[.,]([0-9]{1,9}))?)?)?$",
    )
    .expect("day-first pattern")
});

/// `Y-M-D`, optional `[ T]H:M[:S[.frac]]` and a trailing `Z`.
static ISO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([0-9]{4})-([0-9]{1,2})-([0-9]{1,2})(?:[ T]([0-9]{1,2}):([0-9]{2})(?::([0-9]{2})(?:\.([0-9]{1,9}))?)?)?Z?$",
    )
    .expect("iso pattern")
});

/// `H:MM` or `H:MM:SS`, no date.
static CLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]{1,2}):([0-9]{2})(?::([0-9]{2})(?:[.,][0-9]{1,9})?)?$").expect("clock pattern")
});

/// A parsed timestamp and whether the text carried a time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedDate {
    pub value: NaiveDateTime,
    pub has_time: bool,
}

/// Fast parse of day-first (`"05/03/2021 23:47"`) or ISO (`"2021-03-05T23:47:00"`)
/// text into a validated calendar date-time.
pub fn parse_datetime(raw: &str) -> Option<ParsedDate> {
    let s = clean_str(raw);

    if let Some(c) = DAY_FIRST.captures(s) {
        // both date separators must agree
        if c[2] != c[4] {
            return None;
        }
        let day: u32 = c[1].parse().ok()?;
        let month: u32 = c[3].parse().ok()?;
        let year = expand_year(&c[5])?;
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        let (time, has_time) = time_of(&c, 6)?;
        return Some(ParsedDate {
            value: date.and_time(time),
            has_time,
        });
    }

    if let Some(c) = ISO.captures(s) {
        let year: i32 = c[1].parse().ok()?;
        let month: u32 = c[2].parse().ok()?;
        let day: u32 = c[3].parse().ok()?;
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        let (time, has_time) = time_of(&c, 4)?;
        return Some(ParsedDate {
            value: date.and_time(time),
            has_time,
        });
    }

    None
}

/// Day-first date cut down to `granularity`.
pub fn parse_date(raw: &str, granularity: DateGranularity) -> Option<NaiveDateTime> {
    parse_datetime(raw).map(|p| truncate(p.value, granularity))
}

/// Hour `0..=23` from `HH:MM[:SS]` or from a date-time that carries a time.
pub fn parse_hour(raw: &str) -> Option<i64> {
    let s = clean_str(raw);
    if let Some(c) = CLOCK.captures(s) {
        let hour: u32 = c[1].parse().ok()?;
        let minute: u32 = c[2].parse().ok()?;
        let second: u32 = c.get(3).map_or(Some(0), |m| m.as_str().parse().ok())?;
        if hour > 23 || minute > 59 || second > 59 {
            return None;
        }
        return Some(i64::from(hour));
    }
    match parse_datetime(s) {
        Some(p) if p.has_time => Some(i64::from(p.value.hour())),
        _ => None,
    }
}

/// Drop everything finer than `granularity`.
pub fn truncate(dt: NaiveDateTime, granularity: DateGranularity) -> NaiveDateTime {
    let t = dt.time();
    let time = match granularity {
        DateGranularity::Millisecond => {
            let nanos = t.nanosecond() / 1_000_000 * 1_000_000;
            NaiveTime::from_hms_nano_opt(t.hour(), t.minute(), t.second(), nanos)
        }
        DateGranularity::Second => NaiveTime::from_hms_opt(t.hour(), t.minute(), t.second()),
        DateGranularity::Minute => NaiveTime::from_hms_opt(t.hour(), t.minute(), 0),
        DateGranularity::Day => Some(NaiveTime::default()),
    };
    dt.date().and_time(time.unwrap_or(NaiveTime::default()))
}

/// Two-digit years below 70 are 20xx, the rest 19xx.
fn expand_year(s: &str) -> Option<i32> {
    let y: i32 = s.parse().ok()?;
    Some(match s.len() {
        2 if y < 70 => 2000 + y,
        2 => 1900 + y,
        _ => y,
    })
}

/// Read `hour, minute[, second[, fraction]]` groups starting at `first`.
fn time_of(c: &Captures<'_>, first: usize) -> Option<(NaiveTime, bool)> {
    let Some(hour) = c.get(first) else {
        return Some((NaiveTime::default(), false));
    };
    let hour: u32 = hour.as_str().parse().ok()?;
    let minute: u32 = c[first + 1].parse().ok()?;
    let second: u32 = c.get(first + 2).map_or(Some(0), |m| m.as_str().parse().ok())?;
    let nanos = c.get(first + 3).map_or(Some(0), |m| fraction_nanos(m.as_str()))?;
    if second > 59 {
        return None;
    }
    NaiveTime::from_hms_nano_opt(hour, minute, second, nanos).map(|t| (t, true))
}

/// `"5"` → 500ms, `"123456"` → 123.456ms.
fn fraction_nanos(digits: &str) -> Option<u32> {
    let padded = format!("{:0<9}", digits);
    padded.get(..9)?.parse().ok()
}
