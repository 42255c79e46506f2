//! Client-side transfer notification queues
//!
//! A shop sees two queues: transfers waiting for it to accept or decline,
//! and its own transfers that another shop declined. Each queue shows one
//! notification at a time, oldest first. Dismissing hides a notification
//! until its reopen delay has passed; only accepting/declining (arrivals)
//! or acknowledging (declines) removes it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{DisplayStrategy, TransferRequest};
use crate::units::{self, QuantityDisplay};

/// Which queue a notification belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Pending transfer addressed to this shop
    Arrival,
    /// Transfer sent by this shop and declined by the destination
    Decline,
}

/// A transfer surfaced to shop staff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferNotification {
    pub kind: NotificationKind,
    pub transfer: TransferRequest,
    /// Rendered with the item's current display strategy
    pub display: QuantityDisplay,
}

impl TransferNotification {
    pub fn new(kind: NotificationKind, transfer: TransferRequest, strategy: &DisplayStrategy) -> Self {
        let display = units::to_display(strategy, transfer.quantity);
        Self {
            kind,
            transfer,
            display,
        }
    }

    pub fn id(&self) -> Uuid {
        self.transfer.id
    }

    /// When the notification was raised: transfer creation for arrivals,
    /// the decline itself for declines
    pub fn created_at(&self) -> DateTime<Utc> {
        match self.kind {
            NotificationKind::Arrival => self.transfer.created_at,
            NotificationKind::Decline => self.transfer.notified_at(),
        }
    }
}

/// Both queues' currently presented notification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresentedNotifications {
    pub arrival: Option<TransferNotification>,
    pub decline: Option<TransferNotification>,
}

/// Pending arrivals and unacknowledged declines of one shop, as served by the API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShopNotifications {
    pub arrivals: Vec<TransferNotification>,
    pub declines: Vec<TransferNotification>,
}

#[derive(Debug, Clone)]
struct QueueEntry {
    notification: TransferNotification,
    hidden_until: Option<DateTime<Utc>>,
}

impl QueueEntry {
    fn visible_at(&self, now: DateTime<Utc>) -> bool {
        self.hidden_until.map_or(true, |until| now >= until)
    }
}

/// FIFO queue presenting one notification at a time
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    kind: NotificationKind,
    reopen_after: Duration,
    entries: Vec<QueueEntry>,
}

impl NotificationQueue {
    pub fn new(kind: NotificationKind, reopen_after: Duration) -> Self {
        Self {
            kind,
            reopen_after,
            entries: Vec::new(),
        }
    }

    pub fn kind(&self) -> NotificationKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.entries.iter().any(|e| e.notification.id() == id)
    }

    /// Replace the queue with the server's current list.
    ///
    /// Notifications of another kind are ignored. Dismissals survive for
    /// notifications that are still listed.
    pub fn sync(&mut self, latest: Vec<TransferNotification>) {
        let mut entries: Vec<QueueEntry> = latest
            .into_iter()
            .filter(|n| n.kind == self.kind)
            .map(|notification| {
                let hidden_until = self
                    .entries
                    .iter()
                    .find(|e| e.notification.id() == notification.id())
                    .and_then(|e| e.hidden_until);
                QueueEntry {
                    notification,
                    hidden_until,
                }
            })
            .collect();

        entries.sort_by(|a, b| {
            a.notification
                .created_at()
                .cmp(&b.notification.created_at())
                .then_with(|| a.notification.id().cmp(&b.notification.id()))
        });
        entries.dedup_by_key(|e| e.notification.id());
        self.entries = entries;
    }

    /// The notification to show now: the oldest one not currently dismissed
    pub fn current(&self, now: DateTime<Utc>) -> Option<&TransferNotification> {
        self.entries
            .iter()
            .find(|e| e.visible_at(now))
            .map(|e| &e.notification)
    }

    /// Hide a notification until the reopen delay passes. Returns false if it is not queued.
    pub fn dismiss(&mut self, id: Uuid, now: DateTime<Utc>) -> bool {
        match self.entries.iter_mut().find(|e| e.notification.id() == id) {
            Some(entry) => {
                entry.hidden_until = Some(now + self.reopen_after);
                true
            }
            None => false,
        }
    }

    /// Drop a notification for good
    pub fn remove(&mut self, id: Uuid) -> Option<TransferNotification> {
        let index = self.entries.iter().position(|e| e.notification.id() == id)?;
        Some(self.entries.remove(index).notification)
    }

    /// Earliest moment a dismissed notification becomes visible again
    pub fn next_reopen(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.entries
            .iter()
            .filter_map(|e| e.hidden_until)
            .filter(|until| *until > now)
            .min()
    }
}
