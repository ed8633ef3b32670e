use serde::Serialize;
use std::collections::BTreeMap;

/// Failures kept per column for display.
pub const MAX_SAMPLES: usize = 3;

/// One failed cell, as it appeared in the upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureSample {
    pub row: usize,
    pub raw: Option<String>,
}

/// Outcome tally for one column.
///
/// `rows_attempted == rows_succeeded + rows_defaulted + rows_dropped`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnReport {
    pub rows_attempted: usize,
    pub rows_succeeded: usize,
    pub rows_defaulted: usize,
    /// Rows this column's failure marked for removal.
    pub rows_dropped: usize,
    pub samples: Vec<FailureSample>,
}

impl ColumnReport {
    pub fn failures(&self) -> usize {
        self.rows_defaulted + self.rows_dropped
    }

    pub(crate) fn record_failure(&mut self, row: usize, raw: Option<&str>) {
        if self.samples.len() < MAX_SAMPLES {
            self.samples.push(FailureSample {
                row,
                raw: raw.map(str::to_string),
            });
        }
    }
}

/// Diagnostics produced next to the clean table. Never fed back into the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoercionReport {
    pub rows_in: usize,
    pub rows_out: usize,
    pub columns: BTreeMap<String, ColumnReport>,
    /// Optional declared columns with no match in the header.
    pub missing_columns: Vec<String>,
}

impl CoercionReport {
    pub fn column(&self, name: &str) -> Option<&ColumnReport> {
        self.columns.get(name)
    }

    pub fn rows_removed(&self) -> usize {
        self.rows_in - self.rows_out
    }

    /// Human-readable lines such as `"2 rows dropped due to invalid `data`"`.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for (name, col) in &self.columns {
            if col.rows_dropped > 0 {
                lines.push(format!(
                    "{} {} dropped due to invalid `{}`",
                    col.rows_dropped,
                    plural(col.rows_dropped),
                    name
                ));
            }
            if col.rows_defaulted > 0 {
                lines.push(format!(
                    "{} {} defaulted for invalid `{}`",
                    col.rows_defaulted,
                    plural(col.rows_defaulted),
                    name
                ));
            }
        }
        for name in &self.missing_columns {
            lines.push(format!("optional column `{}` not present in upload", name));
        }
        lines
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        "row"
    } else {
        "rows"
    }
}
