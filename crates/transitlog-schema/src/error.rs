//! Schema error types.

use crate::SchemaId;

#[derive(thiserror::Error, Debug)]
pub enum SchemaError {
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("schema parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("value does not match schema {schema} at {path}: {reason}")]
    Mismatch {
        schema: String,
        path: String,
        reason: String,
    },

    #[error("schema not found: {0}")]
    NotFound(SchemaId),

    #[error("subject not found: {0}")]
    SubjectNotFound(String),

    #[error("payload too short: {0} bytes")]
    Truncated(usize),

    #[error("unknown magic byte: {0:#04x}")]
    UnknownMagicByte(u8),

    #[error("internal error: {0}")]
    Internal(String),
}
