//! # CLI Errors

use thiserror::Error;

use crate::schema::SchemaError;
use crate::store::StoreError;

/// Result type for CLI commands
pub type CliResult<T> = Result<T, CliError>;

/// Top-level command errors
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration file problems
    #[error("config error: {0}")]
    Config(#[from] std::io::Error),

    /// Catalog load/compile failures at startup
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Journal replay failures at startup
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Server runtime failure
    #[error("server error: {0}")]
    Server(String),
}
