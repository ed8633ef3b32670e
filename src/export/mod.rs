// src/export/mod.rs
//! Writing a clean table back out: canonical delimited text or Parquet.

pub mod columnar;
pub mod delimited;

pub use columnar::{arrow_schema, to_record_batch, write_parquet};
pub use delimited::{export_hints, export_spec, to_csv, write_csv, ExportOptions};
