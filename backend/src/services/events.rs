//! In-process transfer event bus
//!
//! Every applied transition of a transfer is published here. The SSE
//! endpoint and in-process notification coordinators subscribe to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::TransferRequest;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferEventKind {
    Created,
    Accepted,
    Declined,
    Acknowledged,
}

/// Something happened to a transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferEvent {
    pub kind: TransferEventKind,
    pub transfer_id: Uuid,
    pub from_shop_id: Uuid,
    pub to_shop_id: Uuid,
    pub at: DateTime<Utc>,
}

impl TransferEvent {
    pub fn new(kind: TransferEventKind, transfer: &TransferRequest) -> Self {
        Self {
            kind,
            transfer_id: transfer.id,
            from_shop_id: transfer.from_shop_id,
            to_shop_id: transfer.to_shop_id,
            at: Utc::now(),
        }
    }

    pub fn involves(&self, shop_id: Uuid) -> bool {
        self.from_shop_id == shop_id || self.to_shop_id == shop_id
    }
}

#[derive(Clone)]
pub struct TransferEventBus {
    sender: broadcast::Sender<TransferEvent>,
}

impl TransferEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: TransferEvent) {
        let kind = event.kind;
        let transfer_id = event.transfer_id;
        match self.sender.send(event) {
            Ok(receivers) => {
                tracing::debug!(?kind, %transfer_id, receivers, "Published transfer event");
            }
            // No subscriber connected
            Err(_) => tracing::trace!(?kind, %transfer_id, "Transfer event dropped"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransferEvent> {
        self.sender.subscribe()
    }
}
