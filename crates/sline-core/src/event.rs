//! # Notifications
//!
//! Observer interface between the engine and the presentation layer. The
//! engine publishes a [`SlineEvent`] whenever prices land, a fetch fails, the
//! display should refresh, a checkout starts or ends, or a checkout URL is
//! ready. Observers implement [`EventHandler`] and override only the hooks
//! they care about.

use crate::error::SlineError;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// Payload of a successful, applied pricing fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricesReady {
    /// Sequence number of the fetch that produced these prices
    pub sequence: u64,
    /// References priced by the fetch
    pub references: Vec<String>,
    /// Available durations, ascending
    pub durations: Vec<u32>,
    /// Selected duration after the fetch was applied
    pub selected: Option<u32>,
}

/// Something the presentation layer may want to react to
#[derive(Debug, Clone, PartialEq)]
pub enum SlineEvent {
    PricesReady(PricesReady),
    PricingFailed { sequence: u64, error: SlineError },
    RefreshRequested,
    CheckoutPending { in_flight: bool },
    CheckoutUrlReady { session_id: String, url: String },
}

/// Event handler trait
///
/// Implement this trait to observe the engine.
#[allow(unused_variables)]
pub trait EventHandler: Send + Sync {
    /// Called when a pricing fetch has been applied to the cache
    fn on_prices_ready(&self, event: &PricesReady) {
        debug!(
            "Prices ready: sequence={}, durations={:?}",
            event.sequence, event.durations
        );
    }

    /// Called when a pricing fetch fails; cached prices are unchanged
    fn on_pricing_failed(&self, sequence: u64, error: &SlineError) {
        warn!("Pricing fetch {} failed: {}", sequence, error);
    }

    /// Called when displayed prices or durations should be re-rendered
    fn on_refresh_requested(&self) {}

    /// Called when a checkout request starts (`true`) and ends (`false`)
    fn on_checkout_pending(&self, in_flight: bool) {}

    /// Called when a checkout session has been created
    fn on_checkout_url_ready(&self, session_id: &str, url: &str) {
        info!("Checkout URL ready: session={}", session_id);
    }
}

/// Default handler (just logs events)
pub struct LoggingEventHandler;

impl EventHandler for LoggingEventHandler {}

/// Dispatch an event to the appropriate handler method
pub fn dispatch_event(handler: &dyn EventHandler, event: &SlineEvent) {
    match event {
        SlineEvent::PricesReady(ready) => handler.on_prices_ready(ready),
        SlineEvent::PricingFailed { sequence, error } => {
            handler.on_pricing_failed(*sequence, error)
        }
        SlineEvent::RefreshRequested => handler.on_refresh_requested(),
        SlineEvent::CheckoutPending { in_flight } => handler.on_checkout_pending(*in_flight),
        SlineEvent::CheckoutUrlReady { session_id, url } => {
            handler.on_checkout_url_ready(session_id, url)
        }
    }
}

/// Closure observer for `PricesReady`
pub struct OnPricesReady<F>(pub F);

impl<F> EventHandler for OnPricesReady<F>
where
    F: Fn(&PricesReady) + Send + Sync,
{
    fn on_prices_ready(&self, event: &PricesReady) {
        (self.0)(event)
    }

    fn on_pricing_failed(&self, _sequence: u64, _error: &SlineError) {}

    fn on_checkout_url_ready(&self, _session_id: &str, _url: &str) {}
}

/// Closure observer for `CheckoutUrlReady`
pub struct OnCheckoutUrlReady<F>(pub F);

impl<F> EventHandler for OnCheckoutUrlReady<F>
where
    F: Fn(&str) + Send + Sync,
{
    fn on_prices_ready(&self, _event: &PricesReady) {}

    fn on_pricing_failed(&self, _sequence: u64, _error: &SlineError) {}

    fn on_checkout_url_ready(&self, _session_id: &str, url: &str) {
        (self.0)(url)
    }
}

/// Handle returned by [`Subscribers::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Registered observers
#[derive(Default)]
pub struct Subscribers {
    handlers: RwLock<Vec<(SubscriptionId, Arc<dyn EventHandler>)>>,
    next_id: AtomicU64,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer
    pub fn subscribe(&self, handler: Arc<dyn EventHandler>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, handler));
        id
    }

    /// Remove an observer; returns false if it was not registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }

    /// Deliver an event to every observer.
    ///
    /// The registry lock is released before handlers run, so a handler may
    /// subscribe or call back into the engine.
    pub fn publish(&self, event: &SlineEvent) {
        let handlers: Vec<Arc<dyn EventHandler>> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();

        for handler in handlers {
            dispatch_event(handler.as_ref(), event);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
