use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::date_parser;
use super::value::Value;
use crate::error::SchemaError;

/// What a declared column holds once coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    String,
    Integer,
    /// Decimal number in the column's [`NumericLocale`].
    FloatLocale,
    /// Day-first calendar date, optionally with a time of day.
    Date,
    /// Hour `0..=23` pulled out of a date-time or `HH:MM`.
    HourOfDay,
    Categorical,
}

/// What to do with a cell that fails coercion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Remove the whole row once every column has been evaluated.
    DropRow,
    /// Keep the row with this value in place of the cell.
    Default(Value),
}

/// Separators of a locale-formatted decimal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumericLocale {
    pub decimal: char,
    #[serde(default)]
    pub thousands: Option<char>,
}

impl Default for NumericLocale {
    /// Comma decimals, no thousands grouping.
    fn default() -> Self {
        Self {
            decimal: ',',
            thousands: None,
        }
    }
}

impl NumericLocale {
    /// `1.234,5`
    pub fn comma_decimal_dot_thousands() -> Self {
        Self {
            decimal: ',',
            thousands: Some('.'),
        }
    }

    /// `1234.5`, what exports are written in.
    pub fn canonical() -> Self {
        Self {
            decimal: '.',
            thousands: None,
        }
    }
}

/// Precision kept on parsed dates so that equal dates compare equal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateGranularity {
    #[default]
    Millisecond,
    Second,
    Minute,
    Day,
}

/// One declared column: canonical name, accepted raw names and coercion rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(rename = "type")]
    pub ty: SemanticType,
    #[serde(default)]
    pub required: bool,
    /// Unset means drop-row for required columns and a null default otherwise.
    /// Written as `drop_row` or `{ default: <value> }`.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "serde_yaml::with::singleton_map"
    )]
    pub on_failure: Option<FailurePolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<NumericLocale>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granularity: Option<DateGranularity>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, ty: SemanticType) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            ty,
            required: false,
            on_failure: None,
            locale: None,
            granularity: None,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn drop_row(mut self) -> Self {
        self.on_failure = Some(FailurePolicy::DropRow);
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.on_failure = Some(FailurePolicy::Default(value.into()));
        self
    }

    pub fn default_null(mut self) -> Self {
        self.on_failure = Some(FailurePolicy::Default(Value::Null));
        self
    }

    pub fn with_locale(mut self, locale: NumericLocale) -> Self {
        self.locale = Some(locale);
        self
    }

    pub fn with_granularity(mut self, granularity: DateGranularity) -> Self {
        self.granularity = Some(granularity);
        self
    }

    /// Canonical name followed by aliases, in the order they are tried.
    pub fn candidate_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// The failure policy after applying the required/optional default and
    /// checking (and converting) the default value against the column type.
    pub fn effective_policy(&self, granularity: DateGranularity) -> Result<FailurePolicy, SchemaError> {
        let policy = match &self.on_failure {
            Some(p) => p.clone(),
            None if self.required => FailurePolicy::DropRow,
            None => FailurePolicy::Default(Value::Null),
        };
        let FailurePolicy::Default(value) = policy else {
            return Ok(FailurePolicy::DropRow);
        };

        let invalid = |reason: &str| SchemaError::InvalidDefault {
            column: self.name.clone(),
            reason: reason.to_string(),
        };
        let value = match (self.ty, value) {
            (_, Value::Null) => Value::Null,
            (SemanticType::String | SemanticType::Categorical, v @ Value::Str(_)) => v,
            (SemanticType::Integer, v @ Value::Int(_)) => v,
            (SemanticType::HourOfDay, Value::Int(h)) if (0..=23).contains(&h) => Value::Int(h),
            (SemanticType::HourOfDay, Value::Int(_)) => return Err(invalid("hour outside 0..=23")),
            (SemanticType::FloatLocale, v @ Value::Float(_)) => v,
            (SemanticType::FloatLocale, Value::Int(i)) => Value::Float(i as f64),
            (SemanticType::Date, Value::Date(d)) => {
                Value::Date(date_parser::truncate(d, granularity))
            }
            (SemanticType::Date, Value::Str(s)) => date_parser::parse_date(&s, granularity)
                .map(Value::Date)
                .ok_or_else(|| invalid("not a date"))?,
            (ty, v) => {
                return Err(invalid(&format!("{:?} value `{}` for a {:?} column", kind(&v), v, ty)))
            }
        };
        Ok(FailurePolicy::Default(value))
    }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Int(_) => "integer",
        Value::Float(_) => "float",
        Value::Str(_) => "string",
        Value::Date(_) => "date",
    }
}

/// The declared schema for one dashboard variant, plus locale parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub columns: Vec<ColumnDef>,
    /// Used by float columns without their own `locale`.
    #[serde(default)]
    pub locale: NumericLocale,
    /// Used by date columns without their own `granularity`.
    #[serde(default)]
    pub granularity: DateGranularity,
}

impl ColumnSpec {
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        Self {
            columns,
            locale: NumericLocale::default(),
            granularity: DateGranularity::default(),
        }
    }

    pub fn with_locale(mut self, locale: NumericLocale) -> Self {
        self.locale = locale;
        self
    }

    pub fn with_granularity(mut self, granularity: DateGranularity) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn canonical_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn locale_for(&self, col: &ColumnDef) -> NumericLocale {
        col.locale.unwrap_or(self.locale)
    }

    pub fn granularity_for(&self, col: &ColumnDef) -> DateGranularity {
        col.granularity.unwrap_or(self.granularity)
    }

    /// Unique canonical names, sane locales, defaults that fit their columns.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut seen = HashSet::with_capacity(self.columns.len());
        for col in &self.columns {
            if !seen.insert(col.name.as_str()) {
                return Err(SchemaError::DuplicateCanonical(col.name.clone()));
            }
            let locale = self.locale_for(col);
            if col.ty == SemanticType::FloatLocale && locale.thousands == Some(locale.decimal) {
                return Err(SchemaError::InvalidLocale {
                    column: col.name.clone(),
                    reason: format!("`{}` used as both decimal and thousands separator", locale.decimal),
                });
            }
            col.effective_policy(self.granularity_for(col))?;
        }
        Ok(())
    }
}
