// ⚠️ Errors - contract violations raised by the property store

use thiserror::Error;

use crate::values::ValueKind;

/// Contract violations raised by the property store
///
/// Lookups never produce these: absence is reported with `Option`.
#[derive(Debug, Error)]
pub enum PropertyStoreError {
    #[error("Property type '{name}' already exists in schema '{schema}'")]
    DuplicateName { schema: String, name: String },

    #[error("Schema '{name}' already exists in namespace '{namespace}'")]
    DuplicateSchema { name: String, namespace: String },

    #[error("Unknown property type: {0}")]
    UnknownType(String),

    #[error("Value kind mismatch: expected {expected}, got {actual}")]
    ValueKindMismatch { expected: ValueKind, actual: ValueKind },

    #[error("Invalid {kind} value '{value}': {reason}")]
    InvalidValue {
        kind: ValueKind,
        value: String,
        reason: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type PropertyStoreResult<T> = Result<T, PropertyStoreError>;
