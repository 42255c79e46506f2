//! In-process store
//!
//! Every operation runs under one async mutex, which makes each ledger
//! mutation serializable. Used for tests and single-node demos.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{
    BatchKey, BatchStock, DateRange, Distribution, Item, Metric, NewTransfer, Resolution,
    ReturnKind, ReturnRecord, SaleRecord, SpoilageRecord, TransferRequest, Transition,
};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    ensure_positive, BatchLedger, CreateOutcome, ItemCatalog, MovementStore, ResolveOutcome,
    TransferAcknowledgment, TransferFilter, TransferStore,
};
use crate::error::{AppError, AppResult};

#[derive(Default)]
struct State {
    items: HashMap<String, Item>,
    batches: BTreeMap<BatchKey, BatchStock>,
    transfers: HashMap<Uuid, TransferRequest>,
    request_keys: HashMap<Uuid, Uuid>,
    acknowledgments: Vec<TransferAcknowledgment>,
    distributions: Vec<Distribution>,
    sales: Vec<SaleRecord>,
    spoilage: Vec<SpoilageRecord>,
    returns: Vec<ReturnRecord>,
}

impl State {
    fn debit(&mut self, key: &BatchKey, amount: i64) -> AppResult<BatchStock> {
        ensure_positive(amount)?;
        match self.batches.get_mut(key) {
            Some(batch) if batch.quantity >= amount => {
                batch.quantity -= amount;
                batch.version += 1;
                batch.updated_at = Utc::now();
                Ok(batch.clone())
            }
            other => Err(AppError::InsufficientStock {
                batch: key.to_string(),
                requested: amount,
                available: other.map_or(0, |b| b.quantity),
            }),
        }
    }

    fn credit(&mut self, key: &BatchKey, amount: i64, metric: Metric) -> AppResult<BatchStock> {
        ensure_positive(amount)?;
        let batch = self.batches.entry(key.clone()).or_insert_with(|| BatchStock {
            shop_id: key.shop_id,
            item_name: key.item_name.clone(),
            batch_number: key.batch_number.clone(),
            quantity: 0,
            metric,
            unit_cost: None,
            version: 0,
            updated_at: Utc::now(),
        });
        batch.quantity = batch
            .quantity
            .checked_add(amount)
            .ok_or_else(|| AppError::validation("quantity", "Batch quantity overflow"))?;
        batch.version += 1;
        batch.updated_at = Utc::now();
        Ok(batch.clone())
    }

    fn transfer(&self, id: Uuid) -> AppResult<TransferRequest> {
        self.transfers
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Transfer".to_string()))
    }
}

/// Store keeping everything in memory
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop a batch row, as a stock cleanup outside this service would
    pub async fn remove_batch(&self, key: &BatchKey) -> Option<BatchStock> {
        self.state.lock().await.batches.remove(key)
    }

    /// Total canonical quantity across every batch of an item, all shops included
    pub async fn total_quantity(&self, item_name: &str) -> i64 {
        self.state
            .lock()
            .await
            .batches
            .values()
            .filter(|b| b.item_name == item_name)
            .map(|b| b.quantity)
            .sum()
    }
}

fn newest_first<T>(records: &[T], keep: impl Fn(&T) -> bool, at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T>
where
    T: Clone,
{
    let mut out: Vec<T> = records.iter().filter(|r| keep(r)).cloned().collect();
    out.sort_by_key(|r| std::cmp::Reverse(at(r)));
    out
}

#[async_trait]
impl BatchLedger for MemoryStore {
    async fn get_available(
        &self,
        shop_id: Uuid,
        item_name: &str,
        batch_number: Option<&str>,
    ) -> AppResult<i64> {
        let state = self.state.lock().await;
        Ok(state
            .batches
            .values()
            .filter(|b| b.shop_id == shop_id && b.item_name == item_name)
            .filter(|b| batch_number.map_or(true, |n| b.batch_number == n))
            .map(|b| b.quantity)
            .sum())
    }

    async fn list_batches(&self, shop_id: Uuid, item_name: &str) -> AppResult<Vec<BatchStock>> {
        let state = self.state.lock().await;
        Ok(state
            .batches
            .values()
            .filter(|b| b.shop_id == shop_id && b.item_name == item_name)
            .cloned()
            .collect())
    }

    async fn reserve_and_debit(&self, key: &BatchKey, amount: i64) -> AppResult<BatchStock> {
        self.state.lock().await.debit(key, amount)
    }

    async fn credit(&self, key: &BatchKey, amount: i64, metric: Metric) -> AppResult<BatchStock> {
        self.state.lock().await.credit(key, amount, metric)
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

#[async_trait]
impl ItemCatalog for MemoryStore {
    async fn get_item(&self, name: &str) -> AppResult<Option<Item>> {
        Ok(self.state.lock().await.items.get(name).cloned())
    }

    async fn upsert_item(&self, item: Item) -> AppResult<Item> {
        self.state
            .lock()
            .await
            .items
            .insert(item.name.clone(), item.clone());
        Ok(item)
    }
}

#[async_trait]
impl TransferStore for MemoryStore {
    async fn create_transfer(&self, new: NewTransfer) -> AppResult<CreateOutcome> {
        let mut state = self.state.lock().await;

        if let Some(key) = new.request_key {
            if let Some(existing) = state.request_keys.get(&key).and_then(|id| state.transfers.get(id)) {
                return Ok(CreateOutcome {
                    transfer: existing.clone(),
                    created: false,
                });
            }
        }

        state.debit(&new.source_key(), new.quantity)?;

        let transfer = TransferRequest::pending(&new, Uuid::new_v4(), Utc::now());
        if let Some(key) = new.request_key {
            state.request_keys.insert(key, transfer.id);
        }
        state.transfers.insert(transfer.id, transfer.clone());

        Ok(CreateOutcome {
            transfer,
            created: true,
        })
    }

    async fn get_transfer(&self, id: Uuid) -> AppResult<Option<TransferRequest>> {
        Ok(self.state.lock().await.transfers.get(&id).cloned())
    }

    async fn find_by_request_key(&self, request_key: Uuid) -> AppResult<Option<TransferRequest>> {
        let state = self.state.lock().await;
        Ok(state
            .request_keys
            .get(&request_key)
            .and_then(|id| state.transfers.get(id))
            .cloned())
    }

    async fn resolve_transfer(
        &self,
        id: Uuid,
        resolution: &Resolution,
        resolved_by: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> AppResult<ResolveOutcome> {
        let mut state = self.state.lock().await;
        let mut transfer = state.transfer(id)?;

        let transition = transfer.apply(resolution, resolved_by, at)?;
        if transition.applied() {
            if let Some(key) = transfer.settlement_key() {
                state.credit(&key, transfer.quantity, transfer.metric)?;
            }
            state.transfers.insert(id, transfer.clone());
        }

        Ok(ResolveOutcome {
            transfer,
            transition,
        })
    }

    async fn acknowledge_decline(
        &self,
        id: Uuid,
        acknowledged_by: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> AppResult<(TransferRequest, Transition)> {
        let mut state = self.state.lock().await;
        let mut transfer = state.transfer(id)?;

        let transition = transfer.acknowledge(at)?;
        if transition.applied() {
            state.acknowledgments.push(TransferAcknowledgment {
                transfer_id: id,
                shop_id: transfer.from_shop_id,
                acknowledged_by,
                acknowledged_at: at,
            });
            state.transfers.insert(id, transfer.clone());
        }

        Ok((transfer, transition))
    }

    async fn list_acknowledgments(&self, transfer_id: Uuid) -> AppResult<Vec<TransferAcknowledgment>> {
        let state = self.state.lock().await;
        Ok(state
            .acknowledgments
            .iter()
            .filter(|a| a.transfer_id == transfer_id)
            .cloned()
            .collect())
    }

    async fn list_transfers(&self, filter: &TransferFilter) -> AppResult<Vec<TransferRequest>> {
        let state = self.state.lock().await;
        let mut transfers: Vec<TransferRequest> = state
            .transfers
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        transfers.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(transfers)
    }
}

#[async_trait]
impl MovementStore for MemoryStore {
    async fn record_distribution(&self, record: Distribution) -> AppResult<Distribution> {
        let mut state = self.state.lock().await;
        let key = BatchKey::new(record.shop_id, record.item_name.clone(), record.batch_number.clone());
        state.credit(&key, record.quantity, record.metric)?;
        if let Some(cost) = record.unit_cost {
            if let Some(batch) = state.batches.get_mut(&key) {
                batch.unit_cost = Some(cost);
            }
        }
        state.distributions.push(record.clone());
        Ok(record)
    }

    async fn record_sale(&self, record: SaleRecord) -> AppResult<SaleRecord> {
        let mut state = self.state.lock().await;
        let key = BatchKey::new(record.shop_id, record.item_name.clone(), record.batch_number.clone());
        state.debit(&key, record.quantity)?;
        state.sales.push(record.clone());
        Ok(record)
    }

    async fn record_spoilage(&self, record: SpoilageRecord) -> AppResult<SpoilageRecord> {
        let mut state = self.state.lock().await;
        let key = BatchKey::new(record.shop_id, record.item_name.clone(), record.batch_number.clone());
        state.debit(&key, record.quantity)?;
        state.spoilage.push(record.clone());
        Ok(record)
    }

    async fn record_return(&self, record: ReturnRecord, metric: Metric) -> AppResult<ReturnRecord> {
        let mut state = self.state.lock().await;
        let key = BatchKey::new(record.shop_id, record.item_name.clone(), record.batch_number.clone());
        match record.kind {
            ReturnKind::ToSupplier => state.debit(&key, record.quantity)?,
            ReturnKind::FromCustomer => state.credit(&key, record.quantity, metric)?,
        };
        state.returns.push(record.clone());
        Ok(record)
    }

    async fn list_distributions(&self, shop_id: Uuid, range: &DateRange) -> AppResult<Vec<Distribution>> {
        let state = self.state.lock().await;
        Ok(newest_first(
            &state.distributions,
            |r| r.shop_id == shop_id && range.contains(r.created_at),
            |r| r.created_at,
        ))
    }

    async fn list_spoilage(&self, shop_id: Uuid, range: &DateRange) -> AppResult<Vec<SpoilageRecord>> {
        let state = self.state.lock().await;
        Ok(newest_first(
            &state.spoilage,
            |r| r.shop_id == shop_id && range.contains(r.created_at),
            |r| r.created_at,
        ))
    }

    async fn list_returns(&self, shop_id: Uuid, range: &DateRange) -> AppResult<Vec<ReturnRecord>> {
        let state = self.state.lock().await;
        Ok(newest_first(
            &state.returns,
            |r| r.shop_id == shop_id && range.contains(r.created_at),
            |r| r.created_at,
        ))
    }
}
