//! # Event Bus Errors

use thiserror::Error;

/// Result type for bus operations
pub type BusResult<T> = Result<T, BusError>;

/// Event bus errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BusError {
    /// Subscription names a collection that does not exist
    #[error("collection '{0}' not found")]
    CollectionNotFound(String),

    /// Subscription id is unknown (already unsubscribed or never existed)
    #[error("subscription '{0}' not found")]
    SubscriptionNotFound(String),
}
