//! # SDK Error Types
//!
//! Typed error handling for the Sline checkout engine.
//! All fallible operations return `Result<T, SlineError>`.
//!
//! Errors carry owned strings rather than source errors so a single fetch
//! outcome can be handed to every caller that was coalesced into it.

use thiserror::Error;

/// Core error type for all SDK operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlineError {
    /// Invalid or missing configuration (fatal at initialization)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An operation was attempted before `initialize`
    #[error("SDK is not initialized")]
    NotInitialized,

    /// Zero or negative quantity for a line item
    #[error("Invalid quantity {quantity} for line item {reference}")]
    InvalidQuantity { reference: String, quantity: i64 },

    /// Duration not offered by the last pricing response
    #[error("Unknown duration {duration}, available: {available:?}")]
    UnknownDuration { duration: u32, available: Vec<u32> },

    /// Plans request failed (non-2xx, transport failure or bad body)
    #[error("Pricing fetch failed (status {status:?}): {body}")]
    PricingFetch { status: Option<u16>, body: String },

    /// Session creation did not return 201
    #[error("Checkout session creation failed (status {status:?}): {body}")]
    CheckoutSession { status: Option<u16>, body: String },

    /// Cart has no line items
    #[error("Cart is empty")]
    EmptyCart,

    /// A checkout session request is already in flight
    #[error("A checkout session request is already in progress")]
    CheckoutInProgress,

    /// Payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A scheduled refresh was dropped before it ran (re-initialization)
    #[error("Price refresh was cancelled")]
    RefreshCancelled,

    /// Cart changes schedule a refresh, which needs a Tokio runtime
    #[error("No Tokio runtime available: {0}")]
    RuntimeUnavailable(String),
}

impl SlineError {
    /// Returns true for caller-input errors that are rejected synchronously
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SlineError::InvalidQuantity { .. }
                | SlineError::UnknownDuration { .. }
                | SlineError::EmptyCart
        )
    }

    /// Returns true if the engine keeps working after this error.
    ///
    /// A failed plans request leaves the last good prices in place.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            SlineError::Configuration(_) | SlineError::NotInitialized
        )
    }

    /// Raw response body for network errors
    pub fn response_body(&self) -> Option<&str> {
        match self {
            SlineError::PricingFetch { body, .. } | SlineError::CheckoutSession { body, .. } => {
                Some(body)
            }
            _ => None,
        }
    }
}

impl From<serde_json::Error> for SlineError {
    fn from(err: serde_json::Error) -> Self {
        SlineError::Serialization(err.to_string())
    }
}

/// Result type alias for SDK operations
pub type SlineResult<T> = Result<T, SlineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors() {
        assert!(SlineError::EmptyCart.is_validation());
        assert!(SlineError::InvalidQuantity {
            reference: "sku-1".into(),
            quantity: 0
        }
        .is_validation());
        assert!(!SlineError::PricingFetch {
            status: Some(500),
            body: "boom".into()
        }
        .is_validation());
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(SlineError::PricingFetch {
            status: None,
            body: "timeout".into()
        }
        .is_recoverable());
        assert!(!SlineError::Configuration("missing token".into()).is_recoverable());
    }

    #[test]
    fn test_response_body() {
        let err = SlineError::CheckoutSession {
            status: Some(500),
            body: r#"{"error":"internal"}"#.into(),
        };
        assert_eq!(err.response_body(), Some(r#"{"error":"internal"}"#));
        assert_eq!(SlineError::EmptyCart.response_body(), None);
    }
}
