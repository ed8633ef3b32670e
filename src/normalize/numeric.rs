use once_cell::sync::Lazy;
use regex::Regex;

use super::spec::NumericLocale;
use super::utils::clean_str;

static NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-+]?(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)").expect("number pattern"));

static INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-+]?[0-9]+$").expect("integer pattern"));

/// Locale decimal → f64.
///
/// Thousands separators are removed, the decimal separator becomes `.`, and
/// the first numeric run is parsed, so `"12,5 km"` gives `12.5`.
pub fn parse_locale_float(raw: &str, locale: NumericLocale) -> Option<f64> {
    let cleaned = clean_str(raw);
    let mut canon = String::with_capacity(cleaned.len());
    for c in cleaned.chars() {
        if Some(c) == locale.thousands {
            continue;
        }
        canon.push(if c == locale.decimal { '.' } else { c });
    }
    let m = NUMBER.find(&canon)?;
    m.as_str().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Whole number with optional sign; anything else in the cell is a failure.
pub fn parse_integer(raw: &str) -> Option<i64> {
    let s: String = clean_str(raw).chars().filter(|c| !c.is_whitespace()).collect();
    if !INTEGER.is_match(&s) {
        return None;
    }
    s.parse().ok()
}
