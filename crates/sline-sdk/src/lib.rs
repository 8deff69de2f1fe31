//! # sline-sdk
//!
//! Client-side checkout engine for Sline instalment payments.
//!
//! The engine keeps a cart of line items, re-prices it through the Sline
//! plans API after a short quiet period, tracks the instalment count the
//! shopper picked and creates hosted checkout sessions.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sline_core::{Environment, LineItem, SlineConfig};
//! use sline_http::HttpTransport;
//! use sline_sdk::Sline;
//!
//! let sline = Sline::new(Arc::new(HttpTransport::new()?));
//! sline.initialize(
//!     SlineConfig::new("rt_live_...", Environment::Production).with_button_id("sline-checkout"),
//! )?;
//!
//! sline.on_prices_ready(|ready| println!("durations: {:?}", ready.durations));
//!
//! sline.add_line_item(LineItem::new("sofa-3p", 1), 2)?.await?;
//! let session = sline.build_session().await?;
//! println!("redirect to {}", session.checkout_url);
//! ```

pub mod checkout;
pub mod debounce;
pub mod fetcher;
pub mod sdk;

#[cfg(test)]
mod testing;

// Re-exports
pub use debounce::{Debouncer, PRICE_REFRESH_DELAY};
pub use fetcher::{PriceRefresh, RefreshHandle};
pub use sdk::Sline;
