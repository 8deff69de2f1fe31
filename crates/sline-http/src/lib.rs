//! # sline-http
//!
//! HTTP transport for the Sline checkout SDK.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sline_http::HttpTransport;
//! use sline_sdk::Sline;
//!
//! let transport = Arc::new(HttpTransport::new()?);
//! let sline = Sline::new(transport);
//! sline.initialize(config)?;
//! ```

pub mod client;

// Re-exports
pub use client::{HttpTransport, DEFAULT_TIMEOUT};
