//! Error types for ABI construction, block parsing, and row transforms

use thiserror::Error;

/// Fatal configuration error raised while parsing or validating a semantic
/// ABI or while building a transform pipeline. Nothing is processed once
/// construction fails; these are defects in the interface document and must
/// not be retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbiError {
    /// Malformed or semantically invalid ABI document
    #[error("invalid ABI: {0}")]
    Invalid(String),

    /// Chain name in metadata that is not a known chain
    #[error("unknown chain '{0}'")]
    UnknownChain(String),

    /// Strict schema append hit an existing column name
    #[error("column '{0}' already exists in schema")]
    DuplicateColumn(String),

    /// Two schemas declare the same column name with different types
    #[error("column '{name}' has conflicting types: {existing} and {incoming}")]
    ColumnTypeConflict {
        name: String,
        existing: String,
        incoming: String,
    },

    /// Parameter type that cannot be mapped to a dataset column
    #[error("unsupported primitive type '{kind}' for parameter '{name}'")]
    UnsupportedType { kind: String, name: String },
}

/// Recoverable failure while decoding or transforming a single item. Caught
/// at the stage boundary and recorded in the row's `transform_error` column;
/// the rest of the transaction and block continue unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    /// Binary decode of log or trace data failed
    #[error("decode failed: {0}")]
    Decode(String),

    /// Any other per-item transform failure (path navigation, explode
    /// length mismatch, cardinality violation, value conversion)
    #[error("{0}")]
    Transform(String),
}

impl TransformError {
    pub fn transform(message: impl Into<String>) -> Self {
        TransformError::Transform(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        TransformError::Decode(message.into())
    }
}

/// Error raised while parsing raw block, receipt, or trace documents.
#[derive(Debug, Error)]
pub enum BlockError {
    #[error("invalid block json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Invalid(String),
}

impl BlockError {
    pub fn invalid(message: impl Into<String>) -> Self {
        BlockError::Invalid(message.into())
    }
}
