use thiserror::Error;

/// Plan-time failures. Raised before any connection is opened.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Column '{0}' not found")]
    UnknownColumn(String),
    #[error("Column '{0}' declared more than once")]
    DuplicateColumn(String),
    #[error("Relation {keyspace}.{table} has no declared primary key")]
    MissingPrimaryKey { keyspace: String, table: String },
    #[error("UPDATE has no non-key column to set")]
    NothingToUpdate,
    #[error("Relation has no usable columns")]
    NoColumns,
    #[error("Expression cannot be rendered as CQL: {0}")]
    UnsupportedExpression(String),
}

/// Value conversion failures between relational values and wire values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },
    #[error("Value out of range: {0}")]
    OutOfRange(String),
    #[error("Invalid decimal: {0}")]
    InvalidDecimal(String),
    #[error("Malformed value: {0}")]
    Malformed(String),
}

impl CodecError {
    pub(crate) fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

/// Errors reported by the wire session. Messages are the remote's, verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Prepare error: {0}")]
    Prepare(String),
    #[error("Execution error: {0}")]
    Execution(String),
}

impl WireError {
    /// The remote's message without the category prefix
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Connection(m) | Self::Prepare(m) | Self::Execution(m) => m,
        }
    }
}

/// Errors surfaced by the scan and modify executors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Invalid executor state: {0}")]
    InvalidState(&'static str),
    #[error("Row image missing: {0}")]
    MissingRowImage(&'static str),
    #[error("Local filter failed: {0}")]
    LocalFilter(String),
}

/// Option validation failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OptionError {
    #[error("invalid option \"{name}\" for {context}; valid options: {valid}")]
    UnknownOption {
        name: String,
        context: String,
        valid: String,
    },
    #[error("invalid value for option \"{name}\": \"{value}\" ({reason})")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },
    #[error("required option \"{0}\" is missing")]
    MissingOption(String),
}

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error(transparent)]
    Executor(#[from] ExecutorError),
    #[error(transparent)]
    Option(#[from] OptionError),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("JSON Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
