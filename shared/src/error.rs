use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure classes for stock checks, reservations and releases.
///
/// Business-rule failures travel inside a reply payload, so the type is
/// serializable and carries only owned strings and integers.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StockError {
    #[error("validation failed: {message}")]
    Validation { message: String },

    #[error("product not found: {product_id}")]
    NotFound { product_id: String },

    #[error("insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i32,
        requested: i32,
    },

    #[error("invalid reservation for product {product_id}: already holds {held}, requested {requested}")]
    InvalidReservation {
        product_id: String,
        held: i32,
        requested: i32,
    },

    #[error("invalid release for product {product_id}: {message}")]
    InvalidRelease { product_id: String, message: String },

    #[error("transaction conflict on product {product_id}")]
    TransactionConflict { product_id: String },

    #[error("inventory service unavailable: {message}")]
    PeerUnavailable { message: String },

    #[error("inventory service did not respond within {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("storage failure: {message}")]
    Storage { message: String },
}

impl StockError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn peer_unavailable(message: impl Into<String>) -> Self {
        Self::PeerUnavailable {
            message: message.into(),
        }
    }

    /// Serialization conflicts are expected under contention and may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransactionConflict { .. })
    }

    /// True for failures of the transport rather than of the stock rules.
    pub fn is_peer_failure(&self) -> bool {
        matches!(self, Self::PeerUnavailable { .. } | Self::Timeout { .. })
    }
}
