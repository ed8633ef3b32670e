use super::encoding::TextEncoding;

/// Untyped table exactly as the upload spelled it.
///
/// Every row has one cell per header; `None` marks an empty or missing cell.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
    encoding: TextEncoding,
    delimiter: u8,
    had_bom: bool,
}

impl RawTable {
    /// Build a table, padding short rows with `None` and dropping cells past
    /// the header width.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut r| {
                r.resize(width, None);
                r
            })
            .collect();
        Self {
            headers,
            rows,
            encoding: TextEncoding::Utf8,
            delimiter: b',',
            had_bom: false,
        }
    }

    pub(crate) fn with_source(mut self, encoding: TextEncoding, delimiter: u8, had_bom: bool) -> Self {
        self.encoding = encoding;
        self.delimiter = delimiter;
        self.had_bom = had_bom;
        self
    }

    /// Column names as the file claims them, disambiguated only when duplicated.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell at `row` under the header `name`.
    pub fn get(&self, row: usize, name: &str) -> Option<&str> {
        let col = self.column_index(name)?;
        self.rows.get(row)?.get(col)?.as_deref()
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    pub fn had_bom(&self) -> bool {
        self.had_bom
    }
}
