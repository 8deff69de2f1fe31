//! # sline-core
//!
//! Core types for the Sline checkout SDK.
//!
//! This crate provides:
//! - `SlineConfig` for validated retailer configuration
//! - `LineItemStore` for the local cart
//! - `PricingCache` and `PriceQuote` for instalment pricing
//! - `DurationSelector` for the chosen instalment count
//! - `SessionRequest` for checkout session payloads
//! - `Transport` trait for the HTTP collaborator
//! - `EventHandler` and `Subscribers` for presentation notifications
//! - `SlineError` for typed error handling
//!
//! The asynchronous engine that ties these together lives in `sline-sdk`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sline_core::{LineItem, LineItemStore, SessionRequest};
//!
//! let mut cart = LineItemStore::new();
//! cart.upsert(LineItem::new("sofa-3p", 1), 2)?;
//!
//! let payload = SessionRequest {
//!     line_items: cart.items(),
//!     selected_duration: Some(12),
//!     ..Default::default()
//! }
//! .to_payload()?;
//! ```

pub mod config;
pub mod duration;
pub mod error;
pub mod event;
pub mod line_item;
pub mod pricing;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use config::{
    AnchorResolver, AssumeAnchorsExist, ButtonAnchor, Environment, SlineConfig,
    DEFAULT_TAX_RATE,
};
pub use duration::DurationSelector;
pub use error::{SlineError, SlineResult};
pub use event::{
    dispatch_event, EventHandler, LoggingEventHandler, OnCheckoutUrlReady, OnPricesReady,
    PricesReady, SlineEvent, SubscriptionId, Subscribers,
};
pub use line_item::{LineItem, LineItemStore};
pub use pricing::{
    Currency, DurationQuotes, InstalmentSummary, PlansRequest, PlansResponse, PriceQuote,
    PricingCache,
};
pub use session::{Address, CheckoutSession, Customer, SessionRequest, SessionResponse};
pub use transport::{ApiResponse, BoxedTransport, Transport, TransportError};
