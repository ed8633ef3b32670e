use super::spec::{DateGranularity, NumericLocale, SemanticType};
use super::utils::{clean_str, collapse_whitespace};
use super::value::Value;
use super::{date_parser, numeric};

/// Per-column coercion parameters, resolved once before the row loop.
#[derive(Debug, Clone, Copy)]
pub struct Coercer {
    pub ty: SemanticType,
    pub locale: NumericLocale,
    pub granularity: DateGranularity,
}

impl Coercer {
    /// Convert one raw cell into its final type.
    ///
    /// `Some(Value::Null)` for an empty cell, `None` when the text is present
    /// but does not parse.
    pub fn coerce(&self, raw: Option<&str>) -> Option<Value> {
        let Some(raw) = raw else {
            return Some(Value::Null);
        };
        let cleaned = clean_str(raw);
        if cleaned.is_empty() {
            return Some(Value::Null);
        }

        match self.ty {
            SemanticType::String => Some(Value::Str(cleaned.to_string())),
            SemanticType::Categorical => Some(Value::Str(collapse_whitespace(cleaned))),
            SemanticType::Integer => numeric::parse_integer(cleaned).map(Value::Int),
            SemanticType::FloatLocale => {
                numeric::parse_locale_float(cleaned, self.locale).map(Value::Float)
            }
            SemanticType::Date => {
                date_parser::parse_date(cleaned, self.granularity).map(Value::Date)
            }
            SemanticType::HourOfDay => date_parser::parse_hour(cleaned).map(Value::Int),
        }
    }
}
