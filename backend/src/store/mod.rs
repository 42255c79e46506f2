//! Storage behind the batch ledger and the transfer workflow
//!
//! The traits here are the seams between services and persistence. Every
//! mutating method is atomic on its own: a transfer creation debits the
//! source batch and inserts the pending request together, a resolution
//! flips the status and settles the quantity together.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::{
    BatchKey, BatchStock, DateRange, Distribution, Item, Metric, NewTransfer, Resolution,
    ReturnRecord, SaleRecord, SpoilageRecord, TransferRequest, TransferStatus, Transition,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Authoritative quantity per `(shop, item, batch)`
#[async_trait]
pub trait BatchLedger: Send + Sync {
    /// Available quantity of one batch, or of all batches when `batch_number` is `None`
    async fn get_available(
        &self,
        shop_id: Uuid,
        item_name: &str,
        batch_number: Option<&str>,
    ) -> AppResult<i64>;

    async fn list_batches(&self, shop_id: Uuid, item_name: &str) -> AppResult<Vec<BatchStock>>;

    /// Debit `amount`, failing with `InsufficientStock` rather than going negative
    async fn reserve_and_debit(&self, key: &BatchKey, amount: i64) -> AppResult<BatchStock>;

    /// Credit `amount`, creating the batch row with `metric` if it does not exist
    async fn credit(&self, key: &BatchKey, amount: i64, metric: Metric) -> AppResult<BatchStock>;

    /// Connectivity check for the health endpoint
    async fn ping(&self) -> AppResult<()>;
}

/// Item reference data
#[async_trait]
pub trait ItemCatalog: Send + Sync {
    async fn get_item(&self, name: &str) -> AppResult<Option<Item>>;
    async fn upsert_item(&self, item: Item) -> AppResult<Item>;
}

/// Result of persisting a new transfer
#[derive(Debug, Clone)]
pub struct CreateOutcome {
    pub transfer: TransferRequest,
    /// False when the request key had been seen and the original transfer was returned
    pub created: bool,
}

/// Result of accepting or declining
#[derive(Debug, Clone)]
pub struct ResolveOutcome {
    pub transfer: TransferRequest,
    pub transition: Transition,
}

/// Audit record written when an origin shop acknowledges a decline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferAcknowledgment {
    pub transfer_id: Uuid,
    pub shop_id: Uuid,
    pub acknowledged_by: Option<Uuid>,
    pub acknowledged_at: DateTime<Utc>,
}

/// Selection of transfers; unset fields do not filter
#[derive(Debug, Clone, Default)]
pub struct TransferFilter {
    pub status: Option<TransferStatus>,
    pub from_shop_id: Option<Uuid>,
    pub to_shop_id: Option<Uuid>,
    /// Either side of the transfer
    pub involving_shop_id: Option<Uuid>,
    pub acknowledged: Option<bool>,
    pub resolved_within: Option<DateRange>,
}

impl TransferFilter {
    pub fn matches(&self, transfer: &TransferRequest) -> bool {
        self.status.map_or(true, |s| transfer.status == s)
            && self.from_shop_id.map_or(true, |id| transfer.from_shop_id == id)
            && self.to_shop_id.map_or(true, |id| transfer.to_shop_id == id)
            && self.involving_shop_id.map_or(true, |id| {
                transfer.from_shop_id == id || transfer.to_shop_id == id
            })
            && self
                .acknowledged
                .map_or(true, |ack| transfer.acknowledged_at.is_some() == ack)
            && self.resolved_within.map_or(true, |range| {
                transfer.resolved_at.map_or(false, |at| range.contains(at))
            })
    }
}

/// Transfer requests and their acknowledgments
#[async_trait]
pub trait TransferStore: Send + Sync {
    /// Debit the source batch and persist the request as pending, atomically.
    ///
    /// A request key that was already used returns the original transfer
    /// without touching the ledger.
    async fn create_transfer(&self, new: NewTransfer) -> AppResult<CreateOutcome>;

    async fn get_transfer(&self, id: Uuid) -> AppResult<Option<TransferRequest>>;

    async fn find_by_request_key(&self, request_key: Uuid) -> AppResult<Option<TransferRequest>>;

    /// Apply a resolution and settle the reserved quantity, atomically.
    ///
    /// Exactly one concurrent caller sees `Transition::Applied`.
    async fn resolve_transfer(
        &self,
        id: Uuid,
        resolution: &Resolution,
        resolved_by: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> AppResult<ResolveOutcome>;

    /// Mark a decline as acknowledged and write the audit record once
    async fn acknowledge_decline(
        &self,
        id: Uuid,
        acknowledged_by: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> AppResult<(TransferRequest, Transition)>;

    async fn list_acknowledgments(&self, transfer_id: Uuid) -> AppResult<Vec<TransferAcknowledgment>>;

    /// Matching transfers, oldest first
    async fn list_transfers(&self, filter: &TransferFilter) -> AppResult<Vec<TransferRequest>>;
}

/// Ledger adjustments outside the transfer workflow and their history
#[async_trait]
pub trait MovementStore: Send + Sync {
    /// Credit the batch and record the delivery
    async fn record_distribution(&self, record: Distribution) -> AppResult<Distribution>;

    /// Debit the batch and record the sale
    async fn record_sale(&self, record: SaleRecord) -> AppResult<SaleRecord>;

    /// Debit the batch and record the write-off
    async fn record_spoilage(&self, record: SpoilageRecord) -> AppResult<SpoilageRecord>;

    /// Debit (to supplier) or credit (from customer) the batch and record the return
    async fn record_return(&self, record: ReturnRecord, metric: Metric) -> AppResult<ReturnRecord>;

    /// Deliveries into the shop, most recent first
    async fn list_distributions(&self, shop_id: Uuid, range: &DateRange) -> AppResult<Vec<Distribution>>;

    /// Write-offs at the shop, most recent first
    async fn list_spoilage(&self, shop_id: Uuid, range: &DateRange) -> AppResult<Vec<SpoilageRecord>>;

    /// Returns at the shop, most recent first
    async fn list_returns(&self, shop_id: Uuid, range: &DateRange) -> AppResult<Vec<ReturnRecord>>;
}

/// Handles to every store, shared by the services
#[derive(Clone)]
pub struct Stores {
    pub ledger: Arc<dyn BatchLedger>,
    pub items: Arc<dyn ItemCatalog>,
    pub transfers: Arc<dyn TransferStore>,
    pub movements: Arc<dyn MovementStore>,
}

impl Stores {
    /// Use one backend for every concern
    pub fn from_backend<S>(store: Arc<S>) -> Self
    where
        S: BatchLedger + ItemCatalog + TransferStore + MovementStore + 'static,
    {
        Self {
            ledger: store.clone(),
            items: store.clone(),
            transfers: store.clone(),
            movements: store,
        }
    }

    pub fn in_memory() -> Self {
        Self::from_backend(Arc::new(MemoryStore::new()))
    }
}

pub(crate) fn ensure_positive(amount: i64) -> AppResult<()> {
    shared::validate_quantity(amount).map_err(|msg| AppError::validation("quantity", msg))
}
