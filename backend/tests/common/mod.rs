//! Shared fixtures for the integration tests

#![allow(dead_code)]

use shared::{BatchKey, CreateTransferInput, Metric, ShopSession};
use shop_stock_backend::{
    config::Config,
    services::{LedgerService, MovementService, NotificationService, TransferService},
    store::{BatchLedger, MemoryStore, Stores},
    AppState,
};
use std::sync::Arc;
use uuid::Uuid;

/// In-memory application with direct access to the backing store
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub state: AppState,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(Stores::from_backend(store.clone()), Config::in_memory());
        Self { store, state }
    }

    pub fn transfers(&self) -> TransferService {
        TransferService::new(
            self.state.stores.clone(),
            self.state.events.clone(),
            &self.state.config.transfers,
        )
    }

    pub fn notifications(&self) -> NotificationService {
        NotificationService::new(self.state.stores.clone(), self.state.events.clone())
    }

    pub fn ledger(&self) -> LedgerService {
        LedgerService::new(self.state.stores.clone())
    }

    pub fn movements(&self) -> MovementService {
        MovementService::new(self.state.stores.clone())
    }

    /// Put `quantity` canonical units into a batch
    pub async fn stock(&self, shop_id: Uuid, item: &str, batch: &str, quantity: i64, metric: Metric) {
        self.store
            .credit(&BatchKey::new(shop_id, item, batch), quantity, metric)
            .await
            .unwrap();
    }

    pub async fn available(&self, shop_id: Uuid, item: &str, batch: &str) -> i64 {
        self.store
            .get_available(shop_id, item, Some(batch))
            .await
            .unwrap()
    }
}

pub fn clerk(shop_id: Uuid) -> ShopSession {
    ShopSession::new(shop_id, Uuid::new_v4(), "test-token")
}

pub fn transfer_input(to_shop_id: Uuid, item: &str, batch: &str, quantity: i64) -> CreateTransferInput {
    CreateTransferInput {
        to_shop_id,
        item_name: item.to_string(),
        batch_number: Some(batch.to_string()),
        quantity,
        request_key: None,
    }
}
