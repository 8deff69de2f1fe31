//! # Sline Engine
//!
//! One `Sline` instance owns a retailer context: configuration, cart, price
//! cache, duration selection, customer details and the last checkout URL.
//! Instances are cheap to clone (shared state) and independent of each other.
//!
//! ```text
//! add/update line item ──► LineItemStore ──► debounced plans fetch (200 ms)
//!                                                   │
//!                        PricingCache + DurationSelector ◄──┘
//!                                                   │
//!                              PricesReady ──► RefreshRequested ──► observers
//!
//! build_session ──► POST /sessions ──► redirect URL ──► CheckoutUrlReady
//! ```
//!
//! State sits behind a single mutex that is never held across an `.await`
//! nor while observers run.

use crate::debounce::{Debouncer, PRICE_REFRESH_DELAY};
use crate::fetcher::{ensure_runtime, PriceRefresh, RefreshKey};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sline_core::line_item::checked_quantity;
use sline_core::{
    config::validate_tax_rate, Address, AnchorResolver, AssumeAnchorsExist, BoxedTransport,
    Customer, DurationQuotes, DurationSelector, EventHandler, InstalmentSummary, LineItem,
    LineItemStore, OnCheckoutUrlReady, OnPricesReady, PriceQuote, PricesReady, PricingCache,
    SlineConfig, SlineError, SlineEvent, SlineResult, Subscribers, SubscriptionId,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, MutexGuard, PoisonError};
use tracing::{debug, info, instrument};

/// Everything one retailer context owns
#[derive(Debug, Default)]
pub(crate) struct EngineState {
    pub(crate) config: Option<SlineConfig>,
    pub(crate) line_items: LineItemStore,
    pub(crate) pricing: PricingCache,
    pub(crate) durations: DurationSelector,
    pub(crate) customer: Option<Customer>,
    pub(crate) billing_address: Option<Address>,
    pub(crate) shipping_address: Option<Address>,
    pub(crate) options: Map<String, Value>,
    pub(crate) checkout_url: Option<String>,
    pub(crate) checkout_in_flight: bool,
    /// Bumped by every `initialize`; work started under an older epoch must
    /// not write into the current context
    pub(crate) epoch: u64,
}

impl EngineState {
    pub(crate) fn config(&self) -> SlineResult<&SlineConfig> {
        self.config.as_ref().ok_or(SlineError::NotInitialized)
    }

    /// Selected duration, if offered by the last applied fetch
    pub(crate) fn selected_duration(&self) -> Option<u32> {
        self.durations.selected(self.pricing.durations())
    }
}

pub(crate) struct Inner {
    pub(crate) transport: BoxedTransport,
    anchors: Arc<dyn AnchorResolver>,
    pub(crate) subscribers: Subscribers,
    state: std::sync::Mutex<EngineState>,
    pub(crate) debouncer: Debouncer<RefreshKey, SlineResult<PriceRefresh>>,
    sequence: AtomicU64,
}

/// Checkout SDK instance
#[derive(Clone)]
pub struct Sline {
    pub(crate) inner: Arc<Inner>,
}

impl Sline {
    /// Create an uninitialized instance
    pub fn new(transport: BoxedTransport) -> Self {
        Self::with_anchor_resolver(transport, Arc::new(AssumeAnchorsExist))
    }

    /// Create an instance that checks checkout anchors with `anchors`
    pub fn with_anchor_resolver(
        transport: BoxedTransport,
        anchors: Arc<dyn AnchorResolver>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                anchors,
                subscribers: Subscribers::new(),
                state: std::sync::Mutex::new(EngineState::default()),
                debouncer: Debouncer::new(PRICE_REFRESH_DELAY),
                sequence: AtomicU64::new(0),
            }),
        }
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, EngineState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate the next fetch sequence number (first is 1)
    pub(crate) fn next_sequence(&self) -> u64 {
        self.inner.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn publish(&self, event: SlineEvent) {
        self.inner.subscribers.publish(&event);
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Validate `config` and start a fresh retailer context.
    ///
    /// Re-initializing replaces all prior state. Pending refreshes are
    /// cancelled and responses to requests issued before this call are
    /// ignored.
    #[instrument(skip(self, config), fields(environment = %config.environment))]
    pub fn initialize(&self, config: SlineConfig) -> SlineResult<()> {
        config.validate(self.inner.anchors.as_ref())?;

        let cancelled = self.inner.debouncer.cancel_all();
        if cancelled > 0 {
            debug!("Cancelled {} pending price refresh(es)", cancelled);
        }

        let mut state = self.state();
        let issued = self.inner.sequence.load(Ordering::SeqCst);
        let mut fresh = EngineState {
            config: Some(config),
            epoch: state.epoch + 1,
            ..EngineState::default()
        };
        fresh.pricing.discard_through(issued);
        *state = fresh;

        info!("Sline initialized");
        Ok(())
    }

    /// Initialize from a configuration object
    pub fn initialize_from_value(&self, config: Value) -> SlineResult<()> {
        self.initialize(SlineConfig::from_value(config)?)
    }

    pub fn is_initialized(&self) -> bool {
        self.state().config.is_some()
    }

    /// Current configuration
    pub fn config(&self) -> Option<SlineConfig> {
        self.state().config.clone()
    }

    /// Change the tax rate applied to prices ingested from now on.
    ///
    /// Cached quotes keep the rate they were ingested with.
    pub fn set_tax_rate(&self, tax_rate: f64) -> SlineResult<()> {
        validate_tax_rate(tax_rate)?;
        let mut state = self.state();
        let config = state.config.as_mut().ok_or(SlineError::NotInitialized)?;
        config.tax_rate = tax_rate;
        Ok(())
    }

    // =========================================================================
    // Line items
    // =========================================================================

    /// Add a line item, or replace the quantity of an existing reference.
    ///
    /// Schedules a debounced price refresh; the returned handle resolves with
    /// the outcome of the fetch this call was coalesced into.
    ///
    /// Nothing is stored when an error is returned.
    pub fn add_line_item(
        &self,
        item: LineItem,
        quantity: i64,
    ) -> SlineResult<crate::RefreshHandle> {
        {
            let mut state = self.state();
            state.config()?;
            checked_quantity(&item.reference, quantity)?;
            ensure_runtime()?;
            state.line_items.upsert(item, quantity)?;
        }
        self.schedule_refresh()
    }

    /// Same as [`Sline::add_line_item`]: quantities are overwritten, never summed
    pub fn update_line_item(
        &self,
        item: LineItem,
        quantity: i64,
    ) -> SlineResult<crate::RefreshHandle> {
        self.add_line_item(item, quantity)
    }

    /// Empty the cart.
    ///
    /// Cached prices and the selected duration are left as they are, and no
    /// refresh is scheduled.
    pub fn reset_line_items(&self) {
        self.state().line_items.reset();
    }

    /// Snapshot of the cart
    pub fn line_items(&self) -> Vec<LineItem> {
        self.state().line_items.items().to_vec()
    }

    // =========================================================================
    // Customer, addresses, options
    // =========================================================================

    pub fn add_customer(&self, customer: Customer) {
        self.state().customer = Some(customer);
    }

    pub fn reset_customer(&self) {
        self.state().customer = None;
    }

    pub fn add_shipping_address(&self, address: Address) {
        self.state().shipping_address = Some(address);
    }

    pub fn add_billing_address(&self, address: Address) {
        self.state().billing_address = Some(address);
    }

    /// Replace the free-form options merged into the session payload.
    ///
    /// Keys colliding with session fields (`selected_duration`,
    /// `line_items_attributes`...) override them.
    pub fn set_options(&self, options: Map<String, Value>) {
        self.state().options = options;
    }

    // =========================================================================
    // Durations and prices
    // =========================================================================

    /// Choose the instalment count.
    ///
    /// Only durations returned by the last applied fetch are accepted. No
    /// request is sent: every duration was priced by that fetch.
    pub fn set_selected_duration(&self, duration: u32) -> SlineResult<()> {
        {
            let mut state = self.state();
            state.config()?;
            let state = &mut *state;
            state
                .durations
                .set_selected(duration, state.pricing.durations())?;
        }
        debug!(duration, "Selected duration changed");
        self.publish(SlineEvent::RefreshRequested);
        Ok(())
    }

    /// Selected duration, if it is currently valid
    pub fn selected_duration(&self) -> Option<u32> {
        self.state().selected_duration()
    }

    /// Durations offered by the last applied fetch, ascending
    pub fn available_durations(&self) -> Vec<u32> {
        self.state().pricing.durations().to_vec()
    }

    /// All cached quotes for a reference
    pub fn quotes(&self, reference: &str) -> Option<DurationQuotes> {
        self.state().pricing.quotes_for(reference).cloned()
    }

    /// Cached quote for a reference at the selected duration
    pub fn quote(&self, reference: &str) -> Option<PriceQuote> {
        let state = self.state();
        let duration = state.selected_duration()?;
        state.pricing.quote(reference, duration).cloned()
    }

    /// Display values for a reference at the selected duration
    pub fn instalment_summary(&self, reference: &str) -> Option<InstalmentSummary> {
        self.quote(reference)
            .map(|quote| InstalmentSummary::from_quote(reference, &quote))
    }

    /// When prices were last applied
    pub fn prices_updated_at(&self) -> Option<DateTime<Utc>> {
        self.state().pricing.updated_at()
    }

    /// URL of the last created checkout session
    pub fn checkout_url(&self) -> Option<String> {
        self.state().checkout_url.clone()
    }

    /// Whether a checkout session request is in flight
    pub fn is_checkout_pending(&self) -> bool {
        self.state().checkout_in_flight
    }

    // =========================================================================
    // Observers
    // =========================================================================

    /// Register an observer
    pub fn subscribe(&self, handler: Arc<dyn EventHandler>) -> SubscriptionId {
        self.inner.subscribers.subscribe(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.subscribers.unsubscribe(id)
    }

    /// Run `f` every time prices are applied
    pub fn on_prices_ready<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(&PricesReady) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(OnPricesReady(f)))
    }

    /// Run `f` with the redirect URL every time a session is created
    pub fn on_checkout_url_ready<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(OnCheckoutUrlReady(f)))
    }
}

impl std::fmt::Debug for Sline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sline")
            .field("transport", &self.inner.transport.name())
            .field("initialized", &self.is_initialized())
            .field("subscribers", &self.inner.subscribers.len())
            .finish()
    }
}
