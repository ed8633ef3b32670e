use csv::ReaderBuilder;
use tracing::{debug, trace};

use crate::error::LoadError;

/// Semicolon first: the source data is semicolon-separated with comma decimals.
pub const DEFAULT_CANDIDATES: [char; 3] = [';', ',', '\t'];

/// Records sampled after the first non-empty one.
const SAMPLE_RECORDS: usize = 50;

/// Share of sampled records that must match the first record's field count.
const CONSISTENCY: f64 = 0.9;

/// Pick the first candidate that splits the leading record into more than one
/// field, consistently across the sample.
pub fn detect_delimiter(text: &str, candidates: &[char]) -> Result<u8, LoadError> {
    for &cand in candidates {
        let Some(delim) = ascii_delimiter(cand) else {
            trace!(?cand, "skipping non-ascii delimiter candidate");
            continue;
        };
        let counts = field_counts(text, delim);
        if is_consistent(&counts) {
            debug!(delimiter = ?cand, fields = counts[0].len, sampled = counts.len(), "delimiter chosen");
            return Ok(delim);
        }
        trace!(delimiter = ?cand, ?counts, "delimiter rejected");
    }

    Err(LoadError::Delimiter {
        tried: describe(candidates),
    })
}

pub(crate) fn ascii_delimiter(c: char) -> Option<u8> {
    if c.is_ascii() && c != '"' && c != '\n' && c != '\r' {
        Some(c as u8)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy)]
struct Shape {
    len: usize,
    /// Fields up to the last non-empty one.
    filled: usize,
}

impl Shape {
    fn of(record: &csv::StringRecord) -> Self {
        let filled = (0..record.len())
            .rev()
            .find(|&i| !record[i].trim().is_empty())
            .map_or(0, |p| p + 1);
        Self {
            len: record.len(),
            filled,
        }
    }

    /// Same width, or wider only by trailing empty fields.
    fn matches(&self, first: &Shape) -> bool {
        self.len == first.len || (self.len > first.len && self.filled <= first.len)
    }
}

/// Quote-aware shapes of the first non-blank record and the sample after it.
fn field_counts(text: &str, delim: u8) -> Vec<Shape> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delim)
        .from_reader(text.as_bytes());

    let mut counts = Vec::with_capacity(SAMPLE_RECORDS + 1);
    for result in rdr.records() {
        // a split that breaks the parser is not a usable split
        let Ok(record) = result else { break };
        if super::is_blank(&record) {
            continue;
        }
        counts.push(Shape::of(&record));
        if counts.len() > SAMPLE_RECORDS {
            break;
        }
    }
    counts
}

fn is_consistent(counts: &[Shape]) -> bool {
    let Some((first, rest)) = counts.split_first() else {
        return false;
    };
    if first.len < 2 {
        return false;
    }
    if rest.is_empty() {
        return true;
    }
    let matching = rest.iter().filter(|s| s.matches(first)).count();
    matching as f64 / rest.len() as f64 >= CONSISTENCY
}

fn describe(candidates: &[char]) -> String {
    candidates
        .iter()
        .map(|c| match c {
            '\t' => "tab".to_string(),
            c => format!("`{}`", c),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semicolon_preferred_when_both_split_consistently() {
        let text = "a;b,c;d\n1;2,3;4\n5;6,7;8\n";
        assert_eq!(detect_delimiter(text, &DEFAULT_CANDIDATES).unwrap(), b';');
    }

    #[test]
    fn comma_file_is_detected() {
        let text = "km,trecho,sentido\n\"12,5\",BR-116,Norte\n3,BR-101,Sul\n";
        assert_eq!(detect_delimiter(text, &DEFAULT_CANDIDATES).unwrap(), b',');
    }

    #[test]
    fn tab_file_is_detected() {
        let text = "km\ttrecho\n12,5\tBR-116\n";
        assert_eq!(detect_delimiter(text, &DEFAULT_CANDIDATES).unwrap(), b'\t');
    }

    #[test]
    fn decimal_commas_do_not_fool_the_comma_candidate() {
        // semicolon-separated, comma decimals in one column only
        let text = "km;trecho\n12,5;BR-116\n7;BR-101\n";
        assert_eq!(detect_delimiter(text, &DEFAULT_CANDIDATES).unwrap(), b';');
    }

    #[test]
    fn leading_blank_lines_are_skipped() {
        let text = "\n\n   \na,b\n1,2\n";
        assert_eq!(detect_delimiter(text, &DEFAULT_CANDIDATES).unwrap(), b',');
    }

    #[test]
    fn single_column_is_rejected() {
        let err = detect_delimiter("horario\n10:00\n11:30\n", &DEFAULT_CANDIDATES).unwrap_err();
        assert!(matches!(err, LoadError::Delimiter { .. }));
        assert!(err.to_string().contains("tab"));
    }

    #[test]
    fn trailing_delimiters_still_count_as_consistent() {
        let text = "a;b;\n1;2;\n3;4;;\n";
        assert_eq!(detect_delimiter(text, &DEFAULT_CANDIDATES).unwrap(), b';');
    }

    #[test]
    fn inconsistent_counts_are_rejected() {
        let text = "a,b,c\n1\n2\n3,4,5\n";
        let err = detect_delimiter(text, &[',']).unwrap_err();
        assert!(matches!(err, LoadError::Delimiter { .. }));
    }
}
