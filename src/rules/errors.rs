//! # Rule Engine Errors
//!
//! Parse-time errors only. Evaluation is total and never fails.

use thiserror::Error;

/// Result type for rule operations
pub type RuleResult<T> = Result<T, RuleError>;

/// Rule parsing errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleError {
    /// Unexpected character in the input
    #[error("unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),

    /// String literal missing its closing quote
    #[error("unterminated string literal starting at position {0}")]
    UnterminatedString(usize),

    /// Malformed number literal
    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),

    /// Token sequence does not form a valid expression
    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),

    /// Expression ended before it was complete
    #[error("unexpected end of expression")]
    UnexpectedEnd,

    /// Reference is missing its final segment (e.g. bare `@request.auth`)
    #[error("incomplete reference '{0}'")]
    IncompleteReference(String),

    /// Unknown `@`-prefixed reference root
    #[error("unknown reference '{0}'")]
    UnknownReference(String),
}
