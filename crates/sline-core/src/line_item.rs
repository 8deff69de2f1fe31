//! # Line Items
//!
//! The local cart: an ordered list of line items keyed by reference.

use crate::error::{SlineError, SlineResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A cart entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Unique key of the item (SKU or merchant reference)
    pub reference: String,

    /// Quantity, always at least 1 once stored
    pub quantity: u32,

    /// Item-specific fields passed through to the API untouched
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl LineItem {
    /// Create a line item with no extra attributes
    pub fn new(reference: impl Into<String>, quantity: u32) -> Self {
        Self {
            reference: reference.into(),
            quantity,
            attributes: Map::new(),
        }
    }

    /// Builder: add an opaque attribute (name, price, image...)
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Convert a caller quantity into a stored one.
///
/// Zero and negative quantities are rejected rather than stored.
pub fn checked_quantity(reference: &str, quantity: i64) -> SlineResult<u32> {
    if quantity <= 0 {
        return Err(SlineError::InvalidQuantity {
            reference: reference.to_string(),
            quantity,
        });
    }
    u32::try_from(quantity).map_err(|_| SlineError::InvalidQuantity {
        reference: reference.to_string(),
        quantity,
    })
}

/// Ordered mapping of reference to line item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItemStore {
    items: Vec<LineItem>,
}

impl LineItemStore {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Insert or replace a line item.
    ///
    /// An existing reference keeps its position; its quantity and attributes
    /// are overwritten (never accumulated).
    pub fn upsert(&mut self, item: LineItem, quantity: i64) -> SlineResult<()> {
        let quantity = checked_quantity(&item.reference, quantity)?;
        let item = LineItem { quantity, ..item };

        match self.items.iter_mut().find(|i| i.reference == item.reference) {
            Some(existing) => *existing = item,
            None => self.items.push(item),
        }
        Ok(())
    }

    /// Remove every line item
    pub fn reset(&mut self) {
        self.items.clear();
    }

    /// Find a line item by reference
    pub fn get(&self, reference: &str) -> Option<&LineItem> {
        self.items.iter().find(|i| i.reference == reference)
    }

    /// All line items in insertion order
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of all quantities
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_last_quantity_wins() {
        let mut store = LineItemStore::new();
        store.upsert(LineItem::new("sku-1", 1), 3).unwrap();
        store.upsert(LineItem::new("sku-1", 1), 1).unwrap();
        store.upsert(LineItem::new("sku-1", 1), 7).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("sku-1").unwrap().quantity, 7);
    }

    #[test]
    fn test_update_preserves_order() {
        let mut store = LineItemStore::new();
        store.upsert(LineItem::new("a", 1), 1).unwrap();
        store.upsert(LineItem::new("b", 1), 1).unwrap();
        store.upsert(LineItem::new("c", 1), 1).unwrap();
        store.upsert(LineItem::new("a", 1), 4).unwrap();

        let refs: Vec<_> = store.items().iter().map(|i| i.reference.as_str()).collect();
        assert_eq!(refs, vec!["a", "b", "c"]);
        assert_eq!(store.total_quantity(), 6);
    }

    #[test]
    fn test_rejects_non_positive_quantity() {
        let mut store = LineItemStore::new();
        let err = store.upsert(LineItem::new("sku-1", 1), 0).unwrap_err();
        assert_eq!(
            err,
            SlineError::InvalidQuantity {
                reference: "sku-1".into(),
                quantity: 0
            }
        );
        assert!(store.upsert(LineItem::new("sku-1", 1), -2).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_rejects_overflowing_quantity() {
        assert!(checked_quantity("sku-1", i64::from(u32::MAX) + 1).is_err());
        assert_eq!(checked_quantity("sku-1", 12).unwrap(), 12);
    }

    #[test]
    fn test_reset() {
        let mut store = LineItemStore::new();
        store.upsert(LineItem::new("sku-1", 1), 2).unwrap();
        store.reset();
        assert!(store.is_empty());
    }

    #[test]
    fn test_attributes_are_flattened() {
        let item = LineItem::new("sku-9", 2).with_attribute("name", "Sofa");
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value, json!({ "reference": "sku-9", "quantity": 2, "name": "Sofa" }));
    }
}
