//! # Record Store Errors

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Record store errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// Collection has no data shard
    #[error("collection '{0}' not found")]
    CollectionNotFound(String),

    /// Record does not exist
    #[error("record '{id}' not found in '{collection}'")]
    RecordNotFound { collection: String, id: String },

    /// Unique constraint violated (business conflict, surfaced to caller)
    #[error("value for unique field '{field}' already exists")]
    UniqueConflict { field: String },

    /// Freshly generated id collided (pure storage race, caller may retry)
    #[error("record id '{0}' already exists")]
    DuplicateId(String),

    /// Write validated against a schema version that has since moved
    #[error("schema version changed (validated {expected}, current {actual})")]
    SchemaVersionConflict { expected: u64, actual: u64 },

    /// Cursor could not be decoded
    #[error("invalid list cursor")]
    InvalidCursor,

    /// Journal I/O failure
    #[error("journal failure: {0}")]
    Journal(String),
}
