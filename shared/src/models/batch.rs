//! Batch stock models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Metric;
use crate::units::QuantityDisplay;

/// Identifies one batch of one item held by one shop
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BatchKey {
    pub shop_id: Uuid,
    pub item_name: String,
    pub batch_number: String,
}

impl BatchKey {
    pub fn new(shop_id: Uuid, item_name: impl Into<String>, batch_number: impl Into<String>) -> Self {
        Self {
            shop_id,
            item_name: item_name.into(),
            batch_number: batch_number.into(),
        }
    }
}

impl std::fmt::Display for BatchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}#{}", self.shop_id, self.item_name, self.batch_number)
    }
}

/// Quantity of one batch held by a shop, in canonical units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStock {
    pub shop_id: Uuid,
    pub item_name: String,
    pub batch_number: String,
    pub quantity: i64,
    pub metric: Metric,
    pub unit_cost: Option<Decimal>,
    /// Incremented on every mutation of the row
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl BatchStock {
    pub fn key(&self) -> BatchKey {
        BatchKey::new(self.shop_id, self.item_name.clone(), self.batch_number.clone())
    }
}

/// Current availability of an item at a shop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDetails {
    pub item_name: String,
    pub metric: Metric,
    /// Batch a transfer form should default to, if any
    #[serde(rename = "BatchNumber")]
    pub batch_number: Option<String>,
    /// Available quantity of that batch
    pub quantity: i64,
    pub display: QuantityDisplay,
    /// Every batch of the item at the shop, so the batch can be chosen explicitly
    pub batches: Vec<BatchStock>,
}

/// Query of `GET /shop-itemdetailsv2`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDetailsQuery {
    pub item_name: String,
    /// Defaults to the session shop
    pub shop_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DisplayStrategy;
    use crate::units::to_display;

    #[test]
    fn test_item_details_uses_legacy_batch_field_name() {
        let details = ItemDetails {
            item_name: "Flour".to_string(),
            metric: Metric::Weight,
            batch_number: Some("B-7".to_string()),
            quantity: 60,
            display: to_display(&DisplayStrategy::Weight, 60),
            batches: Vec::new(),
        };

        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["BatchNumber"], "B-7");
        assert_eq!(json["metric"], "weight");
        assert_eq!(json["quantity"], 60);
    }
}
