//! Stock movement records and the movement ledger view

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::{Metric, TransferDirection, TransferRequest};
use crate::types::{DateRange, UnknownVariant};
use crate::units::QuantityEntry;
use crate::validation::{batch_number_field, reason_field};

/// Delivery of a batch into a shop's stock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub item_name: String,
    pub batch_number: String,
    pub quantity: i64,
    pub metric: Metric,
    pub unit_cost: Option<Decimal>,
    pub recorded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Breakage or spoilage written off a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpoilageRecord {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub item_name: String,
    pub batch_number: String,
    pub quantity: i64,
    pub reason: String,
    pub recorded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Which way a return moves stock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnKind {
    /// Goods sent back to the supplier, debits the batch
    ToSupplier,
    /// Goods brought back by a customer, credits the batch
    FromCustomer,
}

impl ReturnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnKind::ToSupplier => "to_supplier",
            ReturnKind::FromCustomer => "from_customer",
        }
    }
}

impl FromStr for ReturnKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "to_supplier" => Ok(ReturnKind::ToSupplier),
            "from_customer" => Ok(ReturnKind::FromCustomer),
            _ => Err(UnknownVariant::new("return kind", s)),
        }
    }
}

/// Supplier or customer return adjustment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnRecord {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub item_name: String,
    pub batch_number: String,
    pub quantity: i64,
    pub kind: ReturnKind,
    pub counterparty: Option<String>,
    pub note: Option<String>,
    pub recorded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A sale depleting a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub item_name: String,
    pub batch_number: String,
    pub quantity: i64,
    pub unit_price: Option<Decimal>,
    pub recorded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A resolved shop-to-shop transfer seen from one shop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopTransferMovement {
    pub direction: TransferDirection,
    pub counterpart_shop_id: Uuid,
    #[serde(flatten)]
    pub transfer: TransferRequest,
}

/// One independently sourced section of the movement ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementCategory<T> {
    pub items: Vec<T>,
    /// Set when this section could not be loaded; `items` is then empty
    pub error: Option<String>,
}

impl<T> MovementCategory<T> {
    pub fn loaded(items: Vec<T>) -> Self {
        Self { items, error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            items: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Stock movement history of a shop over a date range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMovements {
    pub shop_id: Uuid,
    pub transfers: MovementCategory<Distribution>,
    pub spoilt_items: MovementCategory<SpoilageRecord>,
    pub returns: MovementCategory<ReturnRecord>,
    pub shop_transfers: MovementCategory<ShopTransferMovement>,
}

/// Fields common to every ledger adjustment form
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BatchEntry {
    #[validate(length(min = 1, max = 200, message = "Item name is required"))]
    pub item_name: String,
    #[validate(
        length(min = 1, max = 100, message = "Batch number is required"),
        custom = "batch_number_field"
    )]
    pub batch_number: String,
    pub quantity: QuantityEntry,
}

/// Input for recording a delivery into the session shop
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecordDistributionInput {
    #[serde(flatten)]
    #[validate]
    pub entry: BatchEntry,
    /// Needed when the batch does not exist yet and the item is not registered
    pub metric: Option<Metric>,
    pub unit_cost: Option<Decimal>,
}

/// Input for recording a sale
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecordSaleInput {
    #[serde(flatten)]
    #[validate]
    pub entry: BatchEntry,
    pub unit_price: Option<Decimal>,
}

/// Input for recording spoilage or breakage
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecordSpoilageInput {
    #[serde(flatten)]
    #[validate]
    pub entry: BatchEntry,
    #[validate(
        length(min = 1, max = 500, message = "A reason is required"),
        custom = "reason_field"
    )]
    pub reason: String,
}

/// Input for recording a return
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecordReturnInput {
    #[serde(flatten)]
    #[validate]
    pub entry: BatchEntry,
    pub kind: ReturnKind,
    pub counterparty: Option<String>,
    pub note: Option<String>,
}

/// Query of `GET /stock-movement`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockMovementQuery {
    /// Defaults to the session shop
    pub shop_id: Option<Uuid>,
    pub from_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl StockMovementQuery {
    pub fn range(&self) -> Result<DateRange, &'static str> {
        DateRange::new(self.from_date, self.end_date)
    }
}
