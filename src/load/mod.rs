// src/load/mod.rs
pub mod delimiter;
pub mod encoding;
pub mod raw_table;

use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, instrument};

use crate::error::{LoadError, SchemaError};
use crate::normalize::ColumnSpec;
pub use encoding::TextEncoding;
pub use raw_table::RawTable;

/// Whether the first record names the columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderMode {
    #[default]
    Present,
    /// No header row; these names are assigned to the columns in order.
    Absent(Vec<String>),
}

impl HeaderMode {
    /// Headerless input whose columns follow the declared canonical order.
    pub fn from_spec(spec: &ColumnSpec) -> Self {
        HeaderMode::Absent(spec.canonical_names())
    }
}

/// Caller knowledge about the upload. Anything left `None` is detected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadHints {
    pub encoding: Option<TextEncoding>,
    pub delimiter: Option<char>,
    /// Written as `present` or `{ absent: [names] }`.
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub header: HeaderMode,
    /// Tried in order when `encoding` is unset.
    pub encoding_candidates: Vec<TextEncoding>,
    /// Tried in order when `delimiter` is unset.
    pub delimiter_candidates: Vec<char>,
}

impl Default for LoadHints {
    fn default() -> Self {
        Self {
            encoding: None,
            delimiter: None,
            header: HeaderMode::Present,
            encoding_candidates: encoding::default_candidates(),
            delimiter_candidates: delimiter::DEFAULT_CANDIDATES.to_vec(),
        }
    }
}

impl LoadHints {
    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn with_header(mut self, header: HeaderMode) -> Self {
        self.header = header;
        self
    }
}

/// Decode `bytes`, settle on a delimiter and split into an all-string table.
///
/// - Encoding: the hint alone if given, else BOM then the candidate chain.
/// - Delimiter: the hint as-is if given, else the first consistent candidate.
/// - Header: taken from the first record, or assigned from `HeaderMode::Absent`.
///
/// Fails without a partial result; see [`LoadError`].
#[instrument(level = "info", skip_all, fields(bytes = bytes.len()))]
pub fn load(bytes: &[u8], hints: &LoadHints) -> Result<RawTable, LoadError> {
    // 1) decode
    let decoded = match hints.encoding {
        Some(hint) => encoding::decode_with_hint(bytes, hint)?,
        None => encoding::detect_encoding(bytes, &hints.encoding_candidates)?,
    };
    let text = decoded.text.as_str();
    if text.trim().is_empty() {
        return Err(LoadError::EmptyInput);
    }

    // 2) delimiter
    let delim = match hints.delimiter {
        Some(c) => delimiter::ascii_delimiter(c).ok_or_else(|| LoadError::Delimiter {
            tried: format!("`{}` (not a single-byte delimiter)", c),
        })?,
        None => delimiter::detect_delimiter(text, &hints.delimiter_candidates)?,
    };

    // 3) split into records in file order
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delim)
        .from_reader(text.as_bytes());

    let mut records = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| LoadError::Malformed {
            record: idx,
            message: e.to_string(),
        })?;
        if is_blank(&record) {
            continue;
        }
        // keep the position in the file for error messages
        records.push((idx, record));
    }

    // 4) header
    let mut records = records.into_iter();
    let headers: Vec<String> = match &hints.header {
        HeaderMode::Present => match records.next() {
            Some((_, first)) => disambiguate(first.iter().map(str::to_string).collect()),
            None => return Err(LoadError::EmptyInput),
        },
        HeaderMode::Absent(names) => {
            let Some((_, first)) = records.as_slice().first() else {
                return Err(LoadError::EmptyInput);
            };
            let found = first.len();
            if found != names.len() {
                return Err(SchemaError::ColumnCount {
                    expected: names.len(),
                    found,
                }
                .into());
            }
            names.clone()
        }
    };

    // 5) data rows, squared to the header width
    let width = headers.len();
    let mut rows = Vec::new();
    for (idx, record) in records {
        if record.len() > width && record.iter().skip(width).any(|f| !f.trim().is_empty()) {
            return Err(LoadError::Malformed {
                record: idx,
                message: format!("expected {} fields, found {}", width, record.len()),
            });
        }
        let row: Vec<Option<String>> = (0..width)
            .map(|c| {
                record
                    .get(c)
                    .filter(|f| !f.is_empty())
                    .map(str::to_string)
            })
            .collect();
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(LoadError::EmptyInput);
    }

    info!(
        encoding = %decoded.encoding,
        delimiter = ?(delim as char),
        columns = width,
        rows = rows.len(),
        "loaded raw table"
    );
    Ok(RawTable::new(headers, rows).with_source(decoded.encoding, delim, decoded.had_bom))
}

/// A record with nothing but whitespace in a single field.
pub(crate) fn is_blank(record: &StringRecord) -> bool {
    record.len() <= 1 && record.iter().all(|f| f.trim().is_empty())
}

/// Repeated names become `name`, `name.1`, `name.2`, ...
fn disambiguate(headers: Vec<String>) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::with_capacity(headers.len());
    let mut out = Vec::with_capacity(headers.len());
    for h in headers {
        let mut name = h.clone();
        let mut n = 1;
        while used.contains(&name) {
            name = format!("{}.{}", h, n);
            n += 1;
        }
        if name != h {
            debug!(original = %h, renamed = %name, "duplicate header renamed");
        }
        used.insert(name.clone());
        out.push(name);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{ColumnDef, SemanticType};
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,accident_ingest::load=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    #[test]
    fn loads_semicolon_latin1_export() {
        init_test_logging();
        let bytes = b"data;horario;km;trecho;sentido\n\
05/03/2021;23:47;12,5;BR-116/SP;Norte\n\
06/03/2021;07:10;3,2;S\xE3o Paulo;Sul\n";

        let t = load(bytes, &LoadHints::default()).unwrap();
        assert_eq!(t.encoding(), TextEncoding::Windows1252);
        assert_eq!(t.delimiter(), b';');
        assert_eq!(t.headers(), ["data", "horario", "km", "trecho", "sentido"]);
        assert_eq!(t.len(), 2);
        assert_eq!(t.get(0, "km"), Some("12,5"));
        assert_eq!(t.get(1, "trecho"), Some("São Paulo"));
    }

    #[test]
    fn crlf_quotes_and_empty_cells() {
        let bytes = b"a,b,c\r\n\"x, y\",,3\r\n1,2\r\n";
        let t = load(bytes, &LoadHints::default().with_delimiter(',')).unwrap();
        assert_eq!(t.delimiter(), b',');
        assert_eq!(
            t.rows(),
            [
                vec![Some("x, y".to_string()), None, Some("3".to_string())],
                vec![Some("1".to_string()), Some("2".to_string()), None],
            ]
        );
    }

    #[test]
    fn trailing_empty_fields_are_tolerated() {
        let t = load(b"a;b;\n1;2;\n3;4;;\n", &LoadHints::default()).unwrap();
        assert_eq!(t.headers(), ["a", "b", ""]);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn overlong_record_is_malformed() {
        let hints = LoadHints::default().with_delimiter(',');
        let err = load(b"a,b\n1,2\n3,4,5\n", &hints).unwrap_err();
        assert_eq!(
            err,
            LoadError::Malformed {
                record: 2,
                message: "expected 2 fields, found 3".into()
            }
        );
    }

    #[test]
    fn malformed_record_number_counts_skipped_blank_lines() {
        let hints = LoadHints::default().with_delimiter(',');
        let err = load(b"a,b\n  \n1,2\n3,4,5\n", &hints).unwrap_err();
        assert!(matches!(err, LoadError::Malformed { record: 3, .. }), "{:?}", err);
    }

    #[test]
    fn duplicate_headers_are_disambiguated() {
        let t = load(b"km;km;km\n1;2;3\n", &LoadHints::default()).unwrap();
        assert_eq!(t.headers(), ["km", "km.1", "km.2"]);
        assert_eq!(t.get(0, "km.2"), Some("3"));
    }

    #[test]
    fn header_only_is_empty_input() {
        let err = load(b"a;b;c\n", &LoadHints::default()).unwrap_err();
        assert_eq!(err, LoadError::EmptyInput);
        let err = load(b"", &LoadHints::default()).unwrap_err();
        assert_eq!(err, LoadError::EmptyInput);
        let err = load(b"\n \n", &LoadHints::default()).unwrap_err();
        assert_eq!(err, LoadError::EmptyInput);
    }

    #[test]
    fn headerless_input_takes_names_from_spec() {
        let spec = ColumnSpec::new(vec![
            ColumnDef::new("horario", SemanticType::HourOfDay),
            ColumnDef::new("sentido", SemanticType::Categorical),
        ]);
        let hints = LoadHints::default().with_header(HeaderMode::from_spec(&spec));
        let t = load(b"10:00;Norte\n11:30;Sul\n", &hints).unwrap();
        assert_eq!(t.headers(), ["horario", "sentido"]);
        assert_eq!(t.len(), 2);
        assert_eq!(t.get(1, "sentido"), Some("Sul"));
    }

    #[test]
    fn headerless_column_count_mismatch_is_schema_error() {
        let hints = LoadHints::default().with_header(HeaderMode::Absent(vec!["a".into()]));
        let err = load(b"1;2\n3;4\n", &hints).unwrap_err();
        assert_eq!(
            err,
            LoadError::Schema(SchemaError::ColumnCount {
                expected: 1,
                found: 2
            })
        );
    }

    #[test]
    fn explicit_hints_win() {
        let hints = LoadHints::default()
            .with_encoding(TextEncoding::Latin1)
            .with_delimiter('|');
        let t = load(b"a|b\n\xE9|2\n", &hints).unwrap();
        assert_eq!(t.encoding(), TextEncoding::Latin1);
        assert_eq!(t.get(0, "a"), Some("é"));

        let err = load(b"a;b\n\xE9;2\n", &LoadHints::default().with_encoding(TextEncoding::Utf8))
            .unwrap_err();
        assert!(matches!(err, LoadError::Decode { .. }));
    }

    #[test]
    fn single_column_upload_needs_a_hint() {
        let err = load(b"horario\n10:00\n", &LoadHints::default()).unwrap_err();
        assert!(matches!(err, LoadError::Delimiter { .. }));

        let t = load(b"horario\n10:00\n", &LoadHints::default().with_delimiter(',')).unwrap();
        assert_eq!(t.headers(), ["horario"]);
    }

    #[test]
    fn hints_deserialize_from_yaml() {
        let hints: LoadHints = serde_yaml::from_str(
            "encoding: latin1\ndelimiter: ';'\nheader:\n  absent: [a, b]\n",
        )
        .unwrap();
        assert_eq!(hints.encoding, Some(TextEncoding::Latin1));
        assert_eq!(hints.delimiter, Some(';'));
        assert_eq!(hints.header, HeaderMode::Absent(vec!["a".into(), "b".into()]));
        assert_eq!(hints.delimiter_candidates, vec![';', ',', '\t']);
    }
}
