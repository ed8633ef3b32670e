// src/presets.rs
//! Column declarations for the two dashboard uploads seen in practice.

use crate::normalize::{ColumnDef, ColumnSpec, NumericLocale, SemanticType};

/// Names accepted by [`by_name`].
pub const NAMES: [&str; 2] = ["hourly_occurrences", "highway_accidents"];

pub const VEHICLE_COUNTS: [&str; 10] = [
    "automovel",
    "bicicleta",
    "caminhao",
    "moto",
    "onibus",
    "outros",
    "tracao_animal",
    "transporte_de_cargas_especiais",
    "trator_maquinas",
    "utilitarios",
];

pub const SEVERITY_COUNTS: [&str; 5] = [
    "ilesos",
    "levemente_feridos",
    "moderadamente_feridos",
    "gravemente_feridos",
    "mortos",
];

/// Occurrence log keyed by time of day: `{horario, trecho, tipo_acidente,
/// tipo_ocorrencia, sentido}`.
pub fn hourly_occurrences() -> ColumnSpec {
    ColumnSpec::new(vec![
        ColumnDef::new("horario", SemanticType::HourOfDay)
            .alias("hora")
            .alias("hora_acidente")
            .required()
            .drop_row(),
        ColumnDef::new("trecho", SemanticType::Categorical),
        ColumnDef::new("tipo_acidente", SemanticType::Categorical).alias("tipo_de_acidente"),
        ColumnDef::new("tipo_ocorrencia", SemanticType::Categorical).alias("tipo_de_ocorrencia"),
        ColumnDef::new("sentido", SemanticType::Categorical),
    ])
}

/// Highway accident sheet with per-vehicle and per-severity counts.
///
/// `km` uses comma decimals with dot grouping (`1.234,5`); counts that fail
/// to parse are taken as zero.
pub fn highway_accidents() -> ColumnSpec {
    let mut columns = vec![
        ColumnDef::new("data", SemanticType::Date).alias("data_inversa"),
        ColumnDef::new("horario", SemanticType::HourOfDay).alias("hora"),
        ColumnDef::new("km", SemanticType::FloatLocale)
            .required()
            .drop_row()
            .with_locale(NumericLocale::comma_decimal_dot_thousands()),
        ColumnDef::new("trecho", SemanticType::Categorical),
        ColumnDef::new("sentido", SemanticType::Categorical),
        ColumnDef::new("tipo_de_acidente", SemanticType::Categorical).alias("tipo_acidente"),
    ];
    columns.extend(
        VEHICLE_COUNTS
            .iter()
            .chain(SEVERITY_COUNTS.iter())
            .map(|name| ColumnDef::new(*name, SemanticType::Integer).default_value(0i64)),
    );
    ColumnSpec::new(columns)
}

/// Look a preset up by name (`-` and `_` are interchangeable).
pub fn by_name(name: &str) -> Option<ColumnSpec> {
    match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
        "hourly_occurrences" | "hourly" => Some(hourly_occurrences()),
        "highway_accidents" | "highway" => Some(highway_accidents()),
        _ => None,
    }
}
