//! # Checkout Sessions
//!
//! Payload assembly for `POST /sessions` and the session returned by it.
//!
//! The payload is a pure function of the cart, the customer, both addresses,
//! the selected duration and the caller's free-form options:
//!
//! ```json
//! {
//!   "line_items_attributes": [...],
//!   "billing_address_attributes": {...},
//!   "shipping_address_attributes": {...},
//!   "session_customer_attributes": {...},
//!   "selected_duration": 12,
//!   "...": "caller options, merged last"
//! }
//! ```
//!
//! Options are merged after the fixed fields, so an option whose key collides
//! with a fixed field replaces it.

use crate::error::{SlineError, SlineResult};
use crate::line_item::LineItem;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Fixed payload keys
pub const LINE_ITEMS_KEY: &str = "line_items_attributes";
pub const BILLING_ADDRESS_KEY: &str = "billing_address_attributes";
pub const SHIPPING_ADDRESS_KEY: &str = "shipping_address_attributes";
pub const CUSTOMER_KEY: &str = "session_customer_attributes";
pub const SELECTED_DURATION_KEY: &str = "selected_duration";

/// Shopper details used to prefill the hosted checkout
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Anything else the merchant wants to forward
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Customer {
    pub fn with_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Self::default()
        }
    }

    /// Builder: set first and last name
    pub fn with_name(mut self, first: impl Into<String>, last: impl Into<String>) -> Self {
        self.first_name = Some(first.into());
        self.last_name = Some(last.into());
        self
    }

    /// Builder: set phone number
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }
}

/// Billing or shipping address
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Address {
    pub fn new(
        street: impl Into<String>,
        city: impl Into<String>,
        zip_code: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            street: Some(street.into()),
            city: Some(city.into()),
            zip_code: Some(zip_code.into()),
            country: Some(country.into()),
            extra: Map::new(),
        }
    }
}

/// Everything a session request is built from
#[derive(Debug, Clone, Default)]
pub struct SessionRequest<'a> {
    pub line_items: &'a [LineItem],
    pub billing_address: Option<&'a Address>,
    pub shipping_address: Option<&'a Address>,
    pub customer: Option<&'a Customer>,
    pub selected_duration: Option<u32>,
    pub options: Option<&'a Map<String, Value>>,
}

impl SessionRequest<'_> {
    /// Build the JSON payload.
    ///
    /// Fails with `EmptyCart` when there are no line items.
    pub fn to_payload(&self) -> SlineResult<Value> {
        if self.line_items.is_empty() {
            return Err(SlineError::EmptyCart);
        }

        let mut payload = Map::new();
        payload.insert(
            LINE_ITEMS_KEY.to_string(),
            serde_json::to_value(self.line_items)?,
        );
        if let Some(address) = self.billing_address {
            payload.insert(
                BILLING_ADDRESS_KEY.to_string(),
                serde_json::to_value(address)?,
            );
        }
        if let Some(address) = self.shipping_address {
            payload.insert(
                SHIPPING_ADDRESS_KEY.to_string(),
                serde_json::to_value(address)?,
            );
        }
        if let Some(customer) = self.customer {
            payload.insert(CUSTOMER_KEY.to_string(), serde_json::to_value(customer)?);
        }
        if let Some(duration) = self.selected_duration {
            payload.insert(SELECTED_DURATION_KEY.to_string(), Value::from(duration));
        }

        if let Some(options) = self.options {
            for (key, value) in options {
                if payload.contains_key(key) {
                    warn!(key = %key, "checkout option overrides a session field");
                }
                payload.insert(key.clone(), value.clone());
            }
        }

        Ok(Value::Object(payload))
    }
}

/// Body returned by `POST /sessions` on 201
#[derive(Debug, Clone, Deserialize)]
pub struct SessionResponse {
    pub id: String,
    /// Confirmation fields (tax-inclusive totals etc.), kept verbatim
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

/// A created checkout session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Session id issued by the API
    pub session_id: String,

    /// Hosted checkout URL to send the shopper to
    pub checkout_url: String,

    /// Duration the session was created with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_duration: Option<u32>,

    /// Raw confirmation fields from the API
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,

    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl CheckoutSession {
    pub fn new(
        session_id: impl Into<String>,
        checkout_url: impl Into<String>,
        selected_duration: Option<u32>,
        details: Map<String, Value>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            checkout_url: checkout_url.into(),
            selected_duration,
            details,
            created_at: Utc::now(),
        }
    }
}
