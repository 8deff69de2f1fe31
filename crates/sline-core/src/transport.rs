//! # Transport Trait
//!
//! The SDK does not own an HTTP client. It talks to the Sline API through the
//! `Transport` trait, which sends a JSON body and hands back the status code
//! and raw response body. Retries, timeouts and connection pooling belong to
//! the implementation.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │            Transport (trait)             │
//! │  ├── post_json()                         │
//! │  └── name()                              │
//! └──────────────────────────────────────────┘
//!                     ▲
//!          ┌──────────┴──────────┐
//!  ┌───────┴───────┐     ┌───────┴───────┐
//!  │ HttpTransport │     │ test doubles  │
//!  │  (reqwest)    │     │               │
//!  └───────────────┘     └───────────────┘
//! ```

use crate::error::{SlineError, SlineResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Status and raw body of an API response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// True for any 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> SlineResult<T> {
        serde_json::from_str(&self.body).map_err(SlineError::from)
    }
}

/// The request never produced a response (DNS, TLS, timeout...)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Transport failure: {0}")]
pub struct TransportError(pub String);

/// Sends requests to the Sline API
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `body` as JSON to `url` with the given `Authorization` header value
    async fn post_json(
        &self,
        url: &str,
        auth_header: &str,
        body: &Value,
    ) -> Result<ApiResponse, TransportError>;

    /// Transport name (for logging)
    fn name(&self) -> &'static str;
}

/// Type alias for a shared transport (dynamic dispatch)
pub type BoxedTransport = Arc<dyn Transport>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_range() {
        assert!(ApiResponse::new(200, "{}").is_success());
        assert!(ApiResponse::new(201, "{}").is_success());
        assert!(!ApiResponse::new(302, "").is_success());
        assert!(!ApiResponse::new(500, "oops").is_success());
    }

    #[test]
    fn test_json_decoding() {
        let resp = ApiResponse::new(200, r#"{"id":"sess_1"}"#);
        let value: Value = resp.json().unwrap();
        assert_eq!(value, json!({ "id": "sess_1" }));

        let resp = ApiResponse::new(200, "<html>");
        let err = resp.json::<Value>().unwrap_err();
        assert!(matches!(err, SlineError::Serialization(_)));
    }
}
