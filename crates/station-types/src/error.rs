//! Error types for the cta-stations-types crate.

use thiserror::Error;

/// A JSON value that does not conform to a [`RecordSchema`](crate::RecordSchema).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaViolation {
    #[error("expected a JSON object for record '{record}'")]
    NotAnObject { record: String },

    #[error("missing field '{field}' in record '{record}'")]
    MissingField { record: String, field: String },

    #[error("unknown field '{field}' in record '{record}'")]
    UnknownField { record: String, field: String },

    #[error("field '{field}' expected {expected}, got {actual}")]
    WrongType {
        field: String,
        expected: String,
        actual: String,
    },
}

/// An input record that could not be turned into a typed value.
#[derive(Error, Debug)]
pub enum RecordParseError {
    #[error("record has no payload")]
    EmptyPayload,

    #[error("truncated frame: {0} bytes")]
    TruncatedFrame(usize),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("schema violation: {0}")]
    Schema(#[from] SchemaViolation),
}

/// Result type alias for record decoding.
pub type Result<T> = std::result::Result<T, RecordParseError>;
