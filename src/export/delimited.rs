use anyhow::{Context, Result};
use csv::WriterBuilder;
use std::{fs, io::Write, path::Path};
use tracing::info;

use crate::load::{LoadHints, TextEncoding};
use crate::normalize::utils::clean_str;
use crate::normalize::{
    CleanTable, ColumnDef, ColumnSpec, DateGranularity, NumericLocale, SemanticType, Value,
};

/// Delimited-text export settings.
#[derive(Debug, Clone, Copy)]
pub struct ExportOptions {
    pub delimiter: u8,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

/// Serialize `table` (or the rows in `selection`) with canonical values:
/// `.` decimals, ISO dates, empty cells for null.
pub fn to_csv(table: &CleanTable, selection: Option<&[usize]>, options: ExportOptions) -> Result<Vec<u8>> {
    let mut wtr = WriterBuilder::new()
        .delimiter(options.delimiter)
        .from_writer(Vec::new());

    wtr.write_record(table.column_names())
        .context("writing header")?;

    let mut written = 0usize;
    let mut write_row = |i: usize| -> Result<()> {
        let row = table
            .row(i)
            .with_context(|| format!("row {} out of range", i))?;
        wtr.write_record(row.values().iter().map(export_text))
            .with_context(|| format!("writing row {}", i))?;
        written += 1;
        Ok(())
    };
    match selection {
        Some(rows) => rows.iter().try_for_each(|&i| write_row(i))?,
        None => (0..table.len()).try_for_each(&mut write_row)?,
    }

    let bytes = wtr.into_inner().context("flushing csv writer")?;
    info!(rows = written, bytes = bytes.len(), "exported csv");
    Ok(bytes)
}

/// Canonical text of one cell. Text that cell cleaning would alter on re-import
/// (a value wrapped in quotes) gets one extra pair of quotes to survive it.
fn export_text(v: &Value) -> String {
    match v {
        Value::Str(s) if clean_str(s) != s.as_str() => format!("\"{}\"", s),
        other => other.canonical_text(),
    }
}

/// Write the export to `path` through a temp file renamed into place.
pub fn write_csv<P: AsRef<Path>>(
    table: &CleanTable,
    selection: Option<&[usize]>,
    options: ExportOptions,
    path: P,
) -> Result<()> {
    let path = path.as_ref();
    let bytes = to_csv(table, selection, options)?;

    let tmp_path = path.with_extension("csv.tmp");
    let mut tmp = fs::File::create(&tmp_path)
        .with_context(|| format!("creating {}", tmp_path.display()))?;
    tmp.write_all(&bytes)
        .with_context(|| format!("writing {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("renaming {} -> {}", tmp_path.display(), path.display()))?;
    Ok(())
}

/// The column declaration that reads an export of `table` back into the same values.
///
/// Names are already canonical, numbers are `.`-decimal, hours were written
/// as plain integers, and nulls must survive as nulls.
pub fn export_spec(table: &CleanTable) -> ColumnSpec {
    let columns = table
        .columns()
        .iter()
        .map(|c| {
            let ty = match c.ty {
                SemanticType::HourOfDay => SemanticType::Integer,
                other => other,
            };
            ColumnDef::new(c.name.clone(), ty).default_null()
        })
        .collect();
    ColumnSpec::new(columns)
        .with_locale(NumericLocale::canonical())
        .with_granularity(DateGranularity::Millisecond)
}

/// Load hints that read an export written with `options` back, whatever the
/// number of columns.
pub fn export_hints(options: ExportOptions) -> LoadHints {
    LoadHints::default()
        .with_encoding(TextEncoding::Utf8)
        .with_delimiter(options.delimiter as char)
}
