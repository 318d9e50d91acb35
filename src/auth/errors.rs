//! # Identity Errors

use thiserror::Error;

/// Result type for identity operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Identity boundary errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuthError {
    /// Token failed signature or claim validation
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// No token secret configured; tokens cannot be verified
    #[error("token verification is not configured")]
    NotConfigured,
}
