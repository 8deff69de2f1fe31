//! Test doubles for the engine tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use sline_core::{
    ApiResponse, Environment, EventHandler, PricesReady, SlineConfig, SlineError, Transport,
    TransportError,
};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub auth_header: String,
    pub body: Value,
}

struct Scripted {
    delay: Duration,
    result: Result<ApiResponse, TransportError>,
}

/// Transport that records requests and replays scripted responses in order
#[derive(Default)]
pub struct MockTransport {
    requests: Mutex<Vec<RecordedRequest>>,
    responses: Mutex<VecDeque<Scripted>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, status: u16, body: Value) {
        self.respond_after(Duration::ZERO, status, body);
    }

    pub fn respond_after(&self, delay: Duration, status: u16, body: Value) {
        self.responses.lock().unwrap().push_back(Scripted {
            delay,
            result: Ok(ApiResponse::new(status, body.to_string())),
        });
    }

    pub fn respond_raw(&self, status: u16, body: &str) {
        self.responses.lock().unwrap().push_back(Scripted {
            delay: Duration::ZERO,
            result: Ok(ApiResponse::new(status, body)),
        });
    }

    pub fn fail(&self, message: &str) {
        self.responses.lock().unwrap().push_back(Scripted {
            delay: Duration::ZERO,
            result: Err(TransportError(message.to_string())),
        });
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn post_json(
        &self,
        url: &str,
        auth_header: &str,
        body: &Value,
    ) -> Result<ApiResponse, TransportError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            url: url.to_string(),
            auth_header: auth_header.to_string(),
            body: body.clone(),
        });

        let scripted = self.responses.lock().unwrap().pop_front();
        match scripted {
            Some(scripted) => {
                if !scripted.delay.is_zero() {
                    tokio::time::sleep(scripted.delay).await;
                }
                scripted.result
            }
            None => Ok(ApiResponse::new(404, "no scripted response")),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Observer that records event names in order
#[derive(Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<String>>,
}

impl RecordingHandler {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl EventHandler for RecordingHandler {
    fn on_prices_ready(&self, event: &PricesReady) {
        self.push(format!("prices_ready:{}", event.sequence));
    }

    fn on_pricing_failed(&self, sequence: u64, _error: &SlineError) {
        self.push(format!("pricing_failed:{}", sequence));
    }

    fn on_refresh_requested(&self) {
        self.push("refresh".to_string());
    }

    fn on_checkout_pending(&self, in_flight: bool) {
        self.push(format!("checkout_pending:{}", in_flight));
    }

    fn on_checkout_url_ready(&self, _session_id: &str, url: &str) {
        self.push(format!("checkout_url:{}", url));
    }
}

pub fn test_config() -> SlineConfig {
    SlineConfig::new("rt_test", Environment::Staging)
        .with_button_id("sline-checkout")
        .with_api_url("https://api.test/v1")
        .with_checkout_url("https://checkout.test/checkout")
}

/// Plans body with the same durations for every reference.
///
/// Each instalment is `total / duration` with `total = 120_000`.
pub fn plans_body(references: &[&str], durations: &[u32]) -> Value {
    let line_items: Vec<Value> = references
        .iter()
        .map(|reference| {
            let plans: Vec<Value> = durations
                .iter()
                .map(|d| {
                    let amount = 120_000 / i64::from(*d);
                    json!({ "duration": d, "first_instalment": amount, "other_instalment": amount })
                })
                .collect();
            json!({ "reference": reference, "plans": plans })
        })
        .collect();
    json!({ "line_items": line_items })
}
