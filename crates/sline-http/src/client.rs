//! # HTTP Transport
//!
//! reqwest implementation of the `Transport` trait used against the live
//! Sline API.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde_json::Value;
use sline_core::{ApiResponse, Transport, TransportError};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// reqwest-backed transport
///
/// Connections are pooled by the underlying client; clone the `Arc` holding
/// the transport rather than building a new one per request.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport with the default timeout
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a transport with a custom request timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sline-sdk-rs/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Wrap an existing client (custom proxies, TLS roots...)
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, auth_header, body), fields(url = %url))]
    async fn post_json(
        &self,
        url: &str,
        auth_header: &str,
        body: &Value,
    ) -> Result<ApiResponse, TransportError> {
        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, auth_header)
            .header(ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        if status.is_success() {
            debug!("Sline API response: status={}", status);
        } else {
            warn!("Sline API error: status={}, body={}", status, text);
        }

        Ok(ApiResponse::new(status.as_u16(), text))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
