//! Read-only helpers the display layer builds its sidebar and charts on.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

use crate::normalize::{CleanTable, Value};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueryError {
    #[error("no column `{0}` in the table")]
    UnknownColumn(String),
}

/// One sidebar selection. Null cells never match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    /// Inclusive bounds; an open side is `None`.
    Range {
        column: String,
        min: Option<Value>,
        max: Option<Value>,
    },
    /// Value must equal one of `values`.
    OneOf { column: String, values: Vec<Value> },
}

impl Filter {
    pub fn range(column: impl Into<String>, min: Option<Value>, max: Option<Value>) -> Self {
        Filter::Range {
            column: column.into(),
            min,
            max,
        }
    }

    pub fn one_of<V: Into<Value>>(column: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Filter::OneOf {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn column(&self) -> &str {
        match self {
            Filter::Range { column, .. } | Filter::OneOf { column, .. } => column,
        }
    }

    fn matches(&self, v: &Value) -> bool {
        if v.is_null() {
            return false;
        }
        match self {
            Filter::Range { min, max, .. } => {
                let above = min
                    .as_ref()
                    .map_or(true, |m| matches!(v.compare(m), Some(Ordering::Greater | Ordering::Equal)));
                let below = max
                    .as_ref()
                    .map_or(true, |m| matches!(v.compare(m), Some(Ordering::Less | Ordering::Equal)));
                above && below
            }
            Filter::OneOf { values, .. } => values
                .iter()
                .any(|x| x == v || v.compare(x) == Some(Ordering::Equal)),
        }
    }
}

/// Indices of the rows passing every filter, in table order.
pub fn apply(table: &CleanTable, filters: &[Filter]) -> Result<Vec<usize>, QueryError> {
    let cols = filters
        .iter()
        .map(|f| {
            table
                .column_index(f.column())
                .ok_or_else(|| QueryError::UnknownColumn(f.column().to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(table
        .rows()
        .filter(|row| {
            filters
                .iter()
                .zip(&cols)
                .all(|(f, &c)| f.matches(&row.values()[c]))
        })
        .map(|row| row.index())
        .collect())
}

/// Smallest and largest non-null value of a column, e.g. hour-slider bounds.
pub fn min_max(table: &CleanTable, column: &str) -> Result<Option<(Value, Value)>, QueryError> {
    let values = table
        .column_values(column)
        .ok_or_else(|| QueryError::UnknownColumn(column.to_string()))?;
    let mut bounds: Option<(&Value, &Value)> = None;
    for v in values.filter(|v| !v.is_null()) {
        bounds = Some(match bounds {
            None => (v, v),
            Some((lo, hi)) => (
                if v.sort_cmp(lo) == Ordering::Less { v } else { lo },
                if v.sort_cmp(hi) == Ordering::Greater { v } else { hi },
            ),
        });
    }
    Ok(bounds.map(|(lo, hi)| (lo.clone(), hi.clone())))
}

/// Sorted distinct non-null values of a column, e.g. multiselect options.
pub fn distinct(table: &CleanTable, column: &str) -> Result<Vec<Value>, QueryError> {
    let values = table
        .column_values(column)
        .ok_or_else(|| QueryError::UnknownColumn(column.to_string()))?;
    let mut out: Vec<Value> = values.filter(|v| !v.is_null()).cloned().collect();
    out.sort_by(|a, b| a.sort_cmp(b));
    out.dedup();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::RawTable;
    use crate::normalize::{normalize, ColumnDef, ColumnSpec, SemanticType};

    fn table() -> CleanTable {
        let raw = RawTable::new(
            vec!["horario".into(), "sentido".into(), "km".into()],
            vec![
                vec![Some("06:10".into()), Some("Norte".into()), Some("10,5".into())],
                vec![Some("23:47".into()), Some("Sul".into()), Some("3".into())],
                vec![Some("12:00".into()), Some("Norte".into()), None],
                vec![Some("18:30".into()), None, Some("250".into())],
            ],
        );
        let spec = ColumnSpec::new(vec![
            ColumnDef::new("horario", SemanticType::HourOfDay).required(),
            ColumnDef::new("sentido", SemanticType::Categorical),
            ColumnDef::new("km", SemanticType::FloatLocale),
        ]);
        normalize(&raw, &spec).unwrap().0
    }

    #[test]
    fn hour_range_and_direction() {
        let t = table();
        let rows = apply(
            &t,
            &[
                Filter::range("horario", Some(Value::Int(6)), Some(Value::Int(20))),
                Filter::one_of("sentido", ["Norte"]),
            ],
        )
        .unwrap();
        assert_eq!(rows, vec![0, 2]);
    }

    #[test]
    fn nulls_never_match_and_ints_compare_with_floats() {
        let t = table();
        let rows = apply(&t, &[Filter::range("km", Some(Value::Int(3)), None)]).unwrap();
        assert_eq!(rows, vec![0, 1, 3]);
        let rows = apply(&t, &[Filter::one_of("km", [3i64])]).unwrap();
        assert_eq!(rows, vec![1]);
    }

    #[test]
    fn no_filters_keeps_everything() {
        let t = table();
        assert_eq!(apply(&t, &[]).unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn slider_bounds_and_options() {
        let t = table();
        assert_eq!(
            min_max(&t, "horario").unwrap(),
            Some((Value::Int(6), Value::Int(23)))
        );
        assert_eq!(
            distinct(&t, "sentido").unwrap(),
            vec![Value::Str("Norte".into()), Value::Str("Sul".into())]
        );
    }

    #[test]
    fn unknown_column_is_an_error() {
        let t = table();
        assert_eq!(
            apply(&t, &[Filter::one_of("uf", ["SP"])]),
            Err(QueryError::UnknownColumn("uf".into()))
        );
        assert!(distinct(&t, "uf").is_err());
    }
}
