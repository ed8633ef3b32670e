// src/lib.rs
pub mod config;
pub mod error;
pub mod export;
pub mod load;
pub mod normalize;
pub mod pipeline;
pub mod presets;
pub mod query;

pub use config::IngestConfig;
pub use error::{IngestError, LoadError, SchemaError};
pub use load::{load, HeaderMode, LoadHints, RawTable, TextEncoding};
pub use normalize::{
    normalize, CleanTable, CoercionReport, ColumnDef, ColumnSpec, FailurePolicy, SemanticType,
    Value,
};
pub use pipeline::{run, Ingested, PipelineCache};
