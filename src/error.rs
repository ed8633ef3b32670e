use thiserror::Error;

/// Terminal failures of the loader. The upload is abandoned on any of these.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LoadError {
    #[error("could not decode input as any of: {}", tried.join(", "))]
    Decode { tried: Vec<String> },

    #[error("no delimiter among {tried} gives a consistent multi-field split")]
    Delimiter { tried: String },

    #[error("input has no data rows after the header")]
    EmptyInput,

    #[error("malformed CSV at record {record}: {message}")]
    Malformed { record: usize, message: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Terminal failures caused by the column declaration not fitting the data.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchemaError {
    #[error("required column `{column}` not found (tried: {})", tried.join(", "))]
    MissingColumn { column: String, tried: Vec<String> },

    #[error("header declared absent: expected {expected} columns, found {found}")]
    ColumnCount { expected: usize, found: usize },

    #[error("canonical column `{0}` is declared more than once")]
    DuplicateCanonical(String),

    #[error("default for column `{column}` does not fit its type: {reason}")]
    InvalidDefault { column: String, reason: String },

    #[error("numeric locale for column `{column}` is unusable: {reason}")]
    InvalidLocale { column: String, reason: String },
}

/// Either stage of the pipeline failing.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IngestError {
    #[error("loading failed: {0}")]
    Load(#[from] LoadError),

    #[error("normalization failed: {0}")]
    Schema(#[from] SchemaError),
}

impl IngestError {
    /// Name of the pipeline step that failed, for user-facing messages.
    pub fn step(&self) -> &'static str {
        match self {
            IngestError::Load(LoadError::Decode { .. }) => "decoding",
            IngestError::Load(LoadError::Delimiter { .. }) => "delimiter detection",
            IngestError::Load(LoadError::EmptyInput) => "reading rows",
            IngestError::Load(LoadError::Malformed { .. }) => "parsing",
            IngestError::Load(LoadError::Schema(_)) => "header assignment",
            IngestError::Schema(_) => "column resolution",
        }
    }
}
