//! # Engine Error Taxonomy
//!
//! The stable error surface every component-local error is translated into
//! at the executor boundary. `Forbidden` and `NotFound` carry no detail on
//! purpose: existence must never leak through error text.

use thiserror::Error;

use crate::schema::SchemaError;
use crate::store::StoreError;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// The engine's error taxonomy
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Field-level rejection, recoverable by client correction
    #[error("validation failed on field '{field}': {reason}")]
    ValidationFailed { field: String, reason: String },

    /// Rule denial; never distinguishes denied from absent
    #[error("forbidden")]
    Forbidden,

    /// Record or collection absent (or rule-hidden)
    #[error("not found")]
    NotFound,

    /// Uniqueness or concurrent-schema-version race; client should retry
    #[error("conflict: {0}")]
    Conflict(String),

    /// Admin schema operation would require a migration
    #[error("incompatible schema change: {0}")]
    IncompatibleSchemaChange(String),

    /// Malformed request input (filter, sort, cursor, definition)
    #[error("invalid request: {0}")]
    BadRequest(String),

    /// Storage or transport fault; detail is logged, not exposed
    #[error("internal error")]
    Internal(String),
}

impl From<SchemaError> for EngineError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::ValidationFailed { field, reason } => {
                EngineError::ValidationFailed { field, reason }
            }
            SchemaError::CollectionNotFound(_) => EngineError::NotFound,
            SchemaError::DuplicateName(name) => {
                EngineError::Conflict(format!("collection '{}' already exists", name))
            }
            SchemaError::IncompatibleChange(detail) => {
                EngineError::IncompatibleSchemaChange(detail)
            }
            SchemaError::StillReferenced {
                collection,
                referrer,
                field,
            } => EngineError::Conflict(format!(
                "collection '{}' is referenced by '{}.{}'",
                collection, referrer, field
            )),
            SchemaError::InvalidName(_)
            | SchemaError::InvalidField { .. }
            | SchemaError::InvalidRule { .. } => EngineError::BadRequest(err.to_string()),
            SchemaError::Persist(detail) => EngineError::Internal(detail),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::CollectionNotFound(_) | StoreError::RecordNotFound { .. } => {
                EngineError::NotFound
            }
            StoreError::UniqueConflict { field } => {
                EngineError::Conflict(format!("value for unique field '{}' already exists", field))
            }
            StoreError::DuplicateId(_) | StoreError::SchemaVersionConflict { .. } => {
                EngineError::Conflict(err.to_string())
            }
            StoreError::InvalidCursor => EngineError::BadRequest("invalid cursor".to_string()),
            StoreError::Journal(detail) => EngineError::Internal(detail),
        }
    }
}
