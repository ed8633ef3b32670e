use serde::Serialize;

use super::spec::SemanticType;
use super::value::Value;

/// Name and declared type of one clean column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMeta {
    pub name: String,
    pub ty: SemanticType,
}

/// Typed, validated rows keyed by canonical column names.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanTable {
    columns: Vec<ColumnMeta>,
    rows: Vec<Vec<Value>>,
    /// Index of each kept row in the raw table.
    source_rows: Vec<usize>,
}

impl CleanTable {
    pub(crate) fn new(columns: Vec<ColumnMeta>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            source_rows: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, source_row: usize, values: Vec<Value>) {
        debug_assert_eq!(values.len(), self.columns.len());
        self.rows.push(values);
        self.source_rows.push(source_row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_type(&self, name: &str) -> Option<SemanticType> {
        self.column_index(name).map(|i| self.columns[i].ty)
    }

    pub fn row(&self, index: usize) -> Option<RowView<'_>> {
        (index < self.rows.len()).then_some(RowView { table: self, index })
    }

    pub fn rows(&self) -> impl Iterator<Item = RowView<'_>> {
        (0..self.rows.len()).map(move |index| RowView { table: self, index })
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let col = self.column_index(column)?;
        self.rows.get(row)?.get(col)
    }

    /// Every value of one column, in row order.
    pub fn column_values(&self, column: &str) -> Option<impl Iterator<Item = &Value>> {
        let col = self.column_index(column)?;
        Some(self.rows.iter().map(move |r| &r[col]))
    }

    pub(crate) fn raw_values(&self, row: usize) -> &[Value] {
        &self.rows[row]
    }
}

/// Read-only handle on one clean row.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    table: &'a CleanTable,
    index: usize,
}

impl<'a> RowView<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Position of this row in the raw upload.
    pub fn source_row(&self) -> usize {
        self.table.source_rows[self.index]
    }

    pub fn get(&self, column: &str) -> Option<&'a Value> {
        let col = self.table.column_index(column)?;
        self.table.rows[self.index].get(col)
    }

    pub fn values(&self) -> &'a [Value] {
        &self.table.rows[self.index]
    }
}
