//! # Schema Errors

use thiserror::Error;

use crate::rules::RuleError;

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Schema registry errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    /// Collection name already taken
    #[error("collection '{0}' already exists")]
    DuplicateName(String),

    /// Collection does not exist
    #[error("collection '{0}' not found")]
    CollectionNotFound(String),

    /// Collection name fails identifier syntax
    #[error("invalid collection name '{0}'")]
    InvalidName(String),

    /// Field definition rejected
    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    /// Access rule failed to parse
    #[error("invalid {op} rule: {source}")]
    InvalidRule {
        op: &'static str,
        #[source]
        source: RuleError,
    },

    /// Candidate record violates the schema
    #[error("validation failed on field '{field}': {reason}")]
    ValidationFailed { field: String, reason: String },

    /// Alteration would require a migration
    #[error("incompatible schema change: {0}")]
    IncompatibleChange(String),

    /// Collection cannot be dropped while relation fields target it
    #[error("collection '{collection}' is referenced by '{referrer}.{field}'")]
    StillReferenced {
        collection: String,
        referrer: String,
        field: String,
    },

    /// Catalog could not be persisted or loaded
    #[error("catalog persistence failed: {0}")]
    Persist(String),
}

impl SchemaError {
    /// Shorthand for field rejections.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for validation failures.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ValidationFailed {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
