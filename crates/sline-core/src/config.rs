//! # SDK Configuration
//!
//! Validated session parameters for one retailer context: API token,
//! environment (staging or production), tax rate and the checkout anchor the
//! presentation layer renders into.
//!
//! Configuration can come from a JSON object, a TOML file or environment
//! variables. Validation happens in [`SlineConfig::validate`], which the
//! engine calls on every `initialize`.

use crate::error::{SlineError, SlineResult};
use crate::pricing::Currency;
use serde::{Deserialize, Serialize};
use std::env;

/// Tax rate applied when the configuration does not specify one
pub const DEFAULT_TAX_RATE: f64 = 20.0;

/// Target environment, selects the API and hosted checkout hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Staging,
    Production,
}

impl Environment {
    /// Base URL of the cart API
    pub fn api_url(&self) -> &'static str {
        match self {
            Environment::Staging => "https://api.staging.sline.io/v1",
            Environment::Production => "https://api.sline.io/v1",
        }
    }

    /// Base URL of the hosted checkout page
    pub fn checkout_url(&self) -> &'static str {
        match self {
            Environment::Staging => "https://checkout.staging.sline.io/checkout",
            Environment::Production => "https://checkout.sline.io/checkout",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = SlineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "staging" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(SlineError::Configuration(format!(
                "unknown environment '{}', expected staging or production",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the presentation layer mounts the checkout control
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAnchor {
    Id(String),
    Selector(String),
}

/// Checks that a checkout anchor exists in the host page.
///
/// The SDK never touches the page itself; the embedding layer answers this
/// question during `initialize`.
pub trait AnchorResolver: Send + Sync {
    fn anchor_exists(&self, anchor: &ButtonAnchor) -> bool;
}

/// Resolver for hosts without a page to inspect (CLI, tests)
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeAnchorsExist;

impl AnchorResolver for AssumeAnchorsExist {
    fn anchor_exists(&self, _anchor: &ButtonAnchor) -> bool {
        true
    }
}

/// SDK configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlineConfig {
    /// Retailer API token, sent as bearer credentials
    #[serde(default, alias = "retailerToken", alias = "api_token")]
    pub retailer_token: String,

    /// Target environment
    #[serde(default)]
    pub environment: Environment,

    /// Tax rate in percent applied when quotes are ingested
    #[serde(default = "default_tax_rate", alias = "taxRate")]
    pub tax_rate: f64,

    /// Id of the checkout control
    #[serde(default, alias = "buttonId")]
    pub button_id: Option<String>,

    /// Selector of the checkout control
    #[serde(default, alias = "buttonSelector")]
    pub button_selector: Option<String>,

    /// Currency used when the pricing response does not name one
    #[serde(default)]
    pub currency: Currency,

    /// Override of the environment's API URL (mock servers)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Override of the environment's hosted checkout URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkout_url: Option<String>,
}

fn default_tax_rate() -> f64 {
    DEFAULT_TAX_RATE
}

impl SlineConfig {
    /// Create config with explicit values
    pub fn new(retailer_token: impl Into<String>, environment: Environment) -> Self {
        Self {
            retailer_token: retailer_token.into(),
            environment,
            tax_rate: DEFAULT_TAX_RATE,
            button_id: None,
            button_selector: None,
            currency: Currency::default(),
            api_url: None,
            checkout_url: None,
        }
    }

    /// Parse a configuration object.
    ///
    /// Anything other than a JSON object is rejected before field decoding.
    pub fn from_value(value: serde_json::Value) -> SlineResult<Self> {
        if !value.is_object() {
            return Err(SlineError::Configuration(
                "configuration must be an object".to_string(),
            ));
        }
        serde_json::from_value(value)
            .map_err(|e| SlineError::Configuration(format!("invalid configuration: {}", e)))
    }

    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> SlineResult<Self> {
        toml::from_str(toml_str)
            .map_err(|e| SlineError::Configuration(format!("invalid configuration: {}", e)))
    }

    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `SLINE_RETAILER_TOKEN`
    /// - `SLINE_BUTTON_ID` or `SLINE_BUTTON_SELECTOR`
    ///
    /// Optional: `SLINE_ENVIRONMENT`, `SLINE_TAX_RATE`, `SLINE_CURRENCY`,
    /// `SLINE_API_URL`, `SLINE_CHECKOUT_URL`.
    pub fn from_env() -> SlineResult<Self> {
        dotenvy::dotenv().ok();

        let retailer_token = env::var("SLINE_RETAILER_TOKEN").map_err(|_| {
            SlineError::Configuration("SLINE_RETAILER_TOKEN not set".to_string())
        })?;

        let environment = match env::var("SLINE_ENVIRONMENT") {
            Ok(value) => value.parse()?,
            Err(_) => Environment::default(),
        };

        let tax_rate = match env::var("SLINE_TAX_RATE") {
            Ok(value) => value.trim().parse().map_err(|_| {
                SlineError::Configuration(format!("SLINE_TAX_RATE is not a number: {}", value))
            })?,
            Err(_) => DEFAULT_TAX_RATE,
        };

        let currency = env::var("SLINE_CURRENCY")
            .map(|code| Currency::from_code(&code))
            .unwrap_or_default();

        Ok(Self {
            retailer_token,
            environment,
            tax_rate,
            button_id: env::var("SLINE_BUTTON_ID").ok(),
            button_selector: env::var("SLINE_BUTTON_SELECTOR").ok(),
            currency,
            api_url: env::var("SLINE_API_URL").ok(),
            checkout_url: env::var("SLINE_CHECKOUT_URL").ok(),
        })
    }

    /// Builder: set the checkout control id
    pub fn with_button_id(mut self, id: impl Into<String>) -> Self {
        self.button_id = Some(id.into());
        self
    }

    /// Builder: set the checkout control selector
    pub fn with_button_selector(mut self, selector: impl Into<String>) -> Self {
        self.button_selector = Some(selector.into());
        self
    }

    /// Builder: set the tax rate
    pub fn with_tax_rate(mut self, tax_rate: f64) -> Self {
        self.tax_rate = tax_rate;
        self
    }

    /// Builder: set the fallback currency
    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    /// Builder: set custom API base URL (for testing)
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    /// Builder: set custom hosted checkout base URL (for testing)
    pub fn with_checkout_url(mut self, url: impl Into<String>) -> Self {
        self.checkout_url = Some(url.into());
        self
    }

    /// The checkout anchor, preferring the id when both are set.
    ///
    /// Empty strings count as absent.
    pub fn button_anchor(&self) -> Option<ButtonAnchor> {
        let non_empty = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
        };

        non_empty(&self.button_id)
            .map(ButtonAnchor::Id)
            .or_else(|| non_empty(&self.button_selector).map(ButtonAnchor::Selector))
    }

    /// Validate the configuration against the host page
    pub fn validate(&self, resolver: &dyn AnchorResolver) -> SlineResult<()> {
        if self.retailer_token.trim().is_empty() {
            return Err(SlineError::Configuration(
                "retailer token is missing".to_string(),
            ));
        }

        validate_tax_rate(self.tax_rate)?;

        let anchor = self.button_anchor().ok_or_else(|| {
            SlineError::Configuration(
                "either a button id or a button selector must be supplied".to_string(),
            )
        })?;

        if !resolver.anchor_exists(&anchor) {
            return Err(SlineError::Configuration(format!(
                "checkout anchor {:?} does not exist",
                anchor
            )));
        }

        Ok(())
    }

    /// Effective API base URL, without trailing slash
    pub fn api_url(&self) -> &str {
        self.api_url
            .as_deref()
            .unwrap_or_else(|| self.environment.api_url())
            .trim_end_matches('/')
    }

    /// Effective hosted checkout base URL, without trailing slash
    pub fn checkout_url(&self) -> &str {
        self.checkout_url
            .as_deref()
            .unwrap_or_else(|| self.environment.checkout_url())
            .trim_end_matches('/')
    }

    /// URL of the plans endpoint
    pub fn plans_endpoint(&self) -> String {
        format!("{}/plans", self.api_url())
    }

    /// URL of the sessions endpoint
    pub fn sessions_endpoint(&self) -> String {
        format!("{}/sessions", self.api_url())
    }

    /// Hosted checkout URL for a created session
    pub fn redirect_url(&self, session_id: &str) -> String {
        format!(
            "{}/{}?retailerApiKey={}",
            self.checkout_url(),
            session_id,
            self.retailer_token
        )
    }

    /// Get authorization header value
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.retailer_token)
    }
}

/// Tax rates must be finite and non-negative
pub fn validate_tax_rate(tax_rate: f64) -> SlineResult<()> {
    if !tax_rate.is_finite() || tax_rate < 0.0 {
        return Err(SlineError::Configuration(format!(
            "tax rate must be a non-negative number, got {}",
            tax_rate
        )));
    }
    Ok(())
}
