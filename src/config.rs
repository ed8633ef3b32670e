// src/config.rs

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::load::LoadHints;
use crate::normalize::ColumnSpec;

/// A saved upload recipe: how to read the file and what columns to expect.
///
/// ```yaml
/// load:
///   delimiter: ";"
///   encoding: latin1
/// schema:
///   locale: { decimal: ",", thousands: "." }
///   columns:
///     - { name: horario, type: hour_of_day, aliases: [hora], required: true }
///     - { name: sentido, type: categorical }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default)]
    pub load: LoadHints,
    pub schema: ColumnSpec,
}

impl IngestConfig {
    pub fn new(schema: ColumnSpec) -> Self {
        Self {
            load: LoadHints::default(),
            schema,
        }
    }

    /// Read a `.yaml`/`.yml` or `.json` config, chosen by extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let config = match ext.as_deref() {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&text),
            Some("json") => Self::from_json_str(&text),
            other => bail!(
                "unsupported config extension {:?} for {} (expected yaml, yml or json)",
                other.unwrap_or(""),
                path.display()
            ),
        }
        .with_context(|| format!("parsing config {}", path.display()))?;

        config
            .schema
            .validate()
            .with_context(|| format!("invalid schema in {}", path.display()))?;
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("deserializing yaml config")
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("deserializing json config")
    }
}
