//! # Pricing
//!
//! Instalment quotes returned by the plans endpoint and the per-reference
//! cache they are stored in.
//!
//! ```text
//! reference ──► duration ──► PriceQuote
//!  "sku-1"        3          { first: 3400, other: 3300, ... }
//!                 6          { first: 1700, other: 1650, ... }
//!                12          { first:  850, other:  825, ... }
//! ```
//!
//! Tax-inclusive amounts are computed once, when a response is ingested.
//! Changing the tax rate afterwards does not touch cached quotes.

use crate::line_item::LineItem;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Currencies the hosted checkout settles in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    #[default]
    EUR,
    USD,
}

impl Currency {
    /// Map an ISO code to a currency; anything but USD settles in euros
    pub fn from_code(code: &str) -> Self {
        if code.trim().eq_ignore_ascii_case("usd") {
            Currency::USD
        } else {
            Currency::EUR
        }
    }

    /// Returns the ISO 4217 currency code
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::EUR => "eur",
            Currency::USD => "usd",
        }
    }

    /// Display symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::USD => "$",
            Currency::EUR => "€",
        }
    }

    /// Format an amount in minor units, e.g. `4950` -> `49.50`
    pub fn format_minor(&self, amount: i64) -> String {
        let sign = if amount < 0 { "-" } else { "" };
        let abs = amount.unsigned_abs();
        format!("{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str().to_uppercase())
    }
}

/// Apply a percentage tax rate to an amount in minor units
pub fn with_tax(amount: i64, tax_rate: f64) -> i64 {
    (amount as f64 * (1.0 + tax_rate / 100.0)).round() as i64
}

/// Pricing for one reference at one duration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Number of instalments
    pub duration: u32,
    pub first_instalment: i64,
    pub first_instalment_with_tax: i64,
    pub other_instalment: i64,
    pub other_instalment_with_tax: i64,
    /// Tax rate the `_with_tax` fields were computed with
    pub tax_rate: f64,
    pub currency: Currency,
}

impl PriceQuote {
    /// Build a quote, deriving the tax-inclusive amounts
    pub fn new(
        duration: u32,
        first_instalment: i64,
        other_instalment: i64,
        tax_rate: f64,
        currency: Currency,
    ) -> Self {
        Self {
            duration,
            first_instalment,
            first_instalment_with_tax: with_tax(first_instalment, tax_rate),
            other_instalment,
            other_instalment_with_tax: with_tax(other_instalment, tax_rate),
            tax_rate,
            currency,
        }
    }

    /// Total due over the whole plan, tax included
    pub fn total_with_tax(&self) -> i64 {
        self.first_instalment_with_tax
            + self.other_instalment_with_tax * i64::from(self.duration.saturating_sub(1))
    }
}

// =============================================================================
// Plans API Types
// =============================================================================

/// Body of `POST /plans`
#[derive(Debug, Clone, Serialize)]
pub struct PlansRequest<'a> {
    pub line_items: &'a [LineItem],
}

/// Body returned by `POST /plans`
#[derive(Debug, Clone, Deserialize)]
pub struct PlansResponse {
    #[serde(default)]
    pub line_items: Vec<LineItemPlans>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineItemPlans {
    pub reference: String,
    #[serde(default)]
    pub plans: Vec<Plan>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Plan {
    pub duration: u32,
    pub first_instalment: i64,
    pub other_instalment: i64,
    #[serde(default)]
    pub currency: Option<String>,
}

impl PlansResponse {
    /// Durations offered for the first line item, ascending.
    ///
    /// Only the first line item is consulted; items with a different set of
    /// durations are not reconciled.
    pub fn available_durations(&self) -> Vec<u32> {
        let mut durations: Vec<u32> = self
            .line_items
            .first()
            .map(|item| item.plans.iter().map(|p| p.duration).collect())
            .unwrap_or_default();
        durations.sort_unstable();
        durations.dedup();
        durations
    }

    /// References present in the response, in response order
    pub fn references(&self) -> Vec<String> {
        self.line_items.iter().map(|i| i.reference.clone()).collect()
    }
}

// =============================================================================
// Cache
// =============================================================================

/// Quotes keyed by duration
pub type DurationQuotes = BTreeMap<u32, PriceQuote>;

/// Per-reference price cache
#[derive(Debug, Clone, Default)]
pub struct PricingCache {
    quotes: HashMap<String, DurationQuotes>,
    durations: Vec<u32>,
    last_applied: u64,
    updated_at: Option<DateTime<Utc>>,
}

impl PricingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest a plans response tagged with its fetch sequence number.
    ///
    /// Returns false (and changes nothing) when a response with the same or a
    /// newer sequence has already been applied. Every reference in the
    /// response has its entry rebuilt from scratch; references absent from the
    /// response keep their previous quotes.
    pub fn apply(
        &mut self,
        sequence: u64,
        response: &PlansResponse,
        tax_rate: f64,
        fallback_currency: Currency,
    ) -> bool {
        if sequence <= self.last_applied {
            return false;
        }

        for item in &response.line_items {
            let entry: DurationQuotes = item
                .plans
                .iter()
                .map(|plan| {
                    let currency = plan
                        .currency
                        .as_deref()
                        .map(Currency::from_code)
                        .unwrap_or(fallback_currency);
                    (
                        plan.duration,
                        PriceQuote::new(
                            plan.duration,
                            plan.first_instalment,
                            plan.other_instalment,
                            tax_rate,
                            currency,
                        ),
                    )
                })
                .collect();
            self.quotes.insert(item.reference.clone(), entry);
        }

        self.durations = response.available_durations();
        self.last_applied = sequence;
        self.updated_at = Some(Utc::now());
        true
    }

    /// Treat every sequence up to `sequence` as already applied.
    ///
    /// Used on re-initialization so responses issued under the previous
    /// configuration are ignored.
    pub fn discard_through(&mut self, sequence: u64) {
        self.last_applied = self.last_applied.max(sequence);
    }

    /// All quotes for a reference
    pub fn quotes_for(&self, reference: &str) -> Option<&DurationQuotes> {
        self.quotes.get(reference)
    }

    /// Quote for a reference at one duration
    pub fn quote(&self, reference: &str, duration: u32) -> Option<&PriceQuote> {
        self.quotes.get(reference).and_then(|q| q.get(&duration))
    }

    /// Durations from the last applied response, ascending
    pub fn durations(&self) -> &[u32] {
        &self.durations
    }

    /// Sequence number of the last applied response (0 if none)
    pub fn last_applied(&self) -> u64 {
        self.last_applied
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

/// Derived display values for one reference at the selected duration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstalmentSummary {
    pub reference: String,
    pub duration: u32,
    pub first_instalment_with_tax: i64,
    pub instalment_with_tax: i64,
    pub currency: Currency,
}

impl InstalmentSummary {
    pub fn from_quote(reference: impl Into<String>, quote: &PriceQuote) -> Self {
        Self {
            reference: reference.into(),
            duration: quote.duration,
            first_instalment_with_tax: quote.first_instalment_with_tax,
            instalment_with_tax: quote.other_instalment_with_tax,
            currency: quote.currency,
        }
    }

    /// Button text, e.g. `"Pay in 12x 49.50€/mois"`
    pub fn label(&self, prefix: &str) -> String {
        format!(
            "{}{}{}/mois",
            prefix,
            self.currency.format_minor(self.instalment_with_tax),
            self.currency.symbol()
        )
    }
}
