//! # Price Fetching
//!
//! Debounced `POST /plans` requests and their ordered application to the
//! price cache.
//!
//! Every request is tagged with a sequence number allocated under the state
//! lock. A response is applied only if no newer one has been applied, so the
//! cache always reflects the latest issued request that completed.

use crate::sdk::Sline;
use serde::Serialize;
use sline_core::line_item::checked_quantity;
use sline_core::{
    DurationQuotes, LineItem, PlansRequest, PlansResponse, PricesReady, SlineError, SlineEvent,
    SlineResult,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, instrument, warn};

/// Fail early when called outside a Tokio runtime
pub(crate) fn ensure_runtime() -> SlineResult<()> {
    Handle::try_current()
        .map(|_| ())
        .map_err(|e| SlineError::RuntimeUnavailable(e.to_string()))
}

/// Debounce key; the whole cart shares one quiet period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum RefreshKey {
    Cart,
}

/// Outcome of one plans fetch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceRefresh {
    /// Sequence number of the request
    pub sequence: u64,
    /// False when a newer response had already been applied
    pub applied: bool,
    /// References priced by the response
    pub references: Vec<String>,
    /// Available durations in the cache after this response
    pub durations: Vec<u32>,
    /// Selected duration after this response
    pub selected: Option<u32>,
}

/// Resolves once the debounced fetch a cart change was coalesced into has
/// completed.
///
/// Dropping the handle does not cancel the fetch.
#[derive(Debug)]
pub struct RefreshHandle {
    receiver: oneshot::Receiver<SlineResult<PriceRefresh>>,
}

impl Future for RefreshHandle {
    type Output = SlineResult<PriceRefresh>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|outcome| outcome.unwrap_or(Err(SlineError::RefreshCancelled)))
    }
}

impl Sline {
    /// Schedule a debounced refresh of the whole cart.
    ///
    /// Cart changes call this already; it is public for callers that want to
    /// re-price without touching the cart.
    pub fn refresh_prices(&self) -> SlineResult<RefreshHandle> {
        self.state().config()?;
        self.schedule_refresh()
    }

    pub(crate) fn schedule_refresh(&self) -> SlineResult<RefreshHandle> {
        let weak = Arc::downgrade(&self.inner);
        let receiver = self
            .inner
            .debouncer
            .schedule(RefreshKey::Cart, move || async move {
                match weak.upgrade() {
                    Some(inner) => Sline { inner }.refresh_cart().await,
                    None => Err(SlineError::RefreshCancelled),
                }
            })
            .map_err(|e| SlineError::RuntimeUnavailable(e.to_string()))?;

        Ok(RefreshHandle { receiver })
    }

    /// Fetch prices for the cart as it is when the quiet period ends
    async fn refresh_cart(&self) -> SlineResult<PriceRefresh> {
        let items = self.state().line_items.items().to_vec();
        if items.is_empty() {
            debug!("Cart emptied before refresh fired, nothing to price");
            return Err(SlineError::EmptyCart);
        }
        self.fetch_and_apply(&items).await
    }

    /// Price a single reference right away.
    ///
    /// Not debounced, and the cart is left untouched. The response goes
    /// through the same cache rules as a cart refresh. Returns the cached
    /// quotes for `reference` afterwards, empty if the API priced nothing
    /// for it.
    #[instrument(skip(self))]
    pub async fn get_price_for_reference(
        &self,
        reference: &str,
        quantity: i64,
    ) -> SlineResult<DurationQuotes> {
        let quantity = checked_quantity(reference, quantity)?;
        self.state().config()?;

        self.fetch_and_apply(&[LineItem::new(reference, quantity)])
            .await?;

        Ok(self
            .state()
            .pricing
            .quotes_for(reference)
            .cloned()
            .unwrap_or_default())
    }

    /// Best-effort variant of [`Sline::get_price_for_reference`]
    pub async fn warm_up_prices(&self, reference: &str, quantity: i64) {
        if let Err(e) = self.get_price_for_reference(reference, quantity).await {
            warn!(reference, "Price warm-up failed: {}", e);
        }
    }

    #[instrument(skip(self, items), fields(items = items.len()))]
    pub(crate) async fn fetch_and_apply(&self, items: &[LineItem]) -> SlineResult<PriceRefresh> {
        let (sequence, response) = self.fetch_plans(items).await?;
        Ok(self.apply_plans(sequence, &response))
    }

    async fn fetch_plans(&self, items: &[LineItem]) -> SlineResult<(u64, PlansResponse)> {
        let (config, sequence) = {
            let state = self.state();
            let config = state.config()?.clone();
            (config, self.next_sequence())
        };

        let body = serde_json::to_value(PlansRequest { line_items: items })?;
        debug!(sequence, "Requesting plans");

        let result = match self
            .inner
            .transport
            .post_json(&config.plans_endpoint(), &config.auth_header(), &body)
            .await
        {
            Ok(response) if response.is_success() => {
                response
                    .json::<PlansResponse>()
                    .map_err(|_| SlineError::PricingFetch {
                        status: Some(response.status),
                        body: response.body.clone(),
                    })
            }
            Ok(response) => Err(SlineError::PricingFetch {
                status: Some(response.status),
                body: response.body,
            }),
            Err(e) => Err(SlineError::PricingFetch {
                status: None,
                body: e.to_string(),
            }),
        };

        match result {
            Ok(response) => Ok((sequence, response)),
            Err(error) => {
                warn!(sequence, "Plans request failed: {}", error);
                let superseded = sequence <= self.state().pricing.last_applied();
                if !superseded {
                    self.publish(SlineEvent::PricingFailed {
                        sequence,
                        error: error.clone(),
                    });
                }
                Err(error)
            }
        }
    }

    fn apply_plans(&self, sequence: u64, response: &PlansResponse) -> PriceRefresh {
        let refresh = {
            let mut guard = self.state();
            let state = &mut *guard;

            let applied = match state.config.as_ref() {
                Some(config) => {
                    state
                        .pricing
                        .apply(sequence, response, config.tax_rate, config.currency)
                }
                None => false,
            };
            if applied {
                state.durations.on_durations(state.pricing.durations());
            }

            PriceRefresh {
                sequence,
                applied,
                references: response.references(),
                durations: state.pricing.durations().to_vec(),
                selected: state.selected_duration(),
            }
        };

        if refresh.applied {
            debug!(
                sequence,
                durations = ?refresh.durations,
                selected = ?refresh.selected,
                "Prices applied"
            );
            self.publish(SlineEvent::PricesReady(PricesReady {
                sequence,
                references: refresh.references.clone(),
                durations: refresh.durations.clone(),
                selected: refresh.selected,
            }));
            self.publish(SlineEvent::RefreshRequested);
        } else {
            debug!(sequence, "Discarding stale plans response");
        }

        refresh
    }
}
