//! Transfer notifications for shop staff
//!
//! Notifications are derived from transfer state and never stored: a pending
//! transfer is an arrival notice at its destination, an unacknowledged
//! decline is a notice at its origin. Acknowledging a decline is the only
//! write, and it happens at most once per transfer.

use chrono::Utc;
use shared::{
    ConfirmOutcome, DisplayStrategy, NotificationKind, ShopNotifications, ShopSession,
    TransferNotification, TransferRequest, TransferStatus,
};
use std::collections::HashMap;
use uuid::Uuid;

use super::events::{TransferEvent, TransferEventBus, TransferEventKind};
use crate::error::{AppError, AppResult};
use crate::store::{Stores, TransferFilter};

/// Notification service
#[derive(Clone)]
pub struct NotificationService {
    stores: Stores,
    events: TransferEventBus,
}

impl NotificationService {
    pub fn new(stores: Stores, events: TransferEventBus) -> Self {
        Self { stores, events }
    }

    /// Pending transfers addressed to the shop, oldest first
    pub async fn list_pending_arrivals(&self, shop_id: Uuid) -> AppResult<Vec<TransferRequest>> {
        let filter = TransferFilter {
            status: Some(TransferStatus::Pending),
            to_shop_id: Some(shop_id),
            ..Default::default()
        };
        self.stores.transfers.list_transfers(&filter).await
    }

    /// Transfers sent by the shop, declined, and not yet acknowledged, in decline order
    pub async fn list_unacknowledged_declines(
        &self,
        shop_id: Uuid,
    ) -> AppResult<Vec<TransferRequest>> {
        let filter = TransferFilter {
            status: Some(TransferStatus::Declined),
            from_shop_id: Some(shop_id),
            acknowledged: Some(false),
            ..Default::default()
        };
        let mut declines = self.stores.transfers.list_transfers(&filter).await?;
        declines.sort_by(|a, b| {
            a.notified_at()
                .cmp(&b.notified_at())
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(declines)
    }

    /// Both queues of the session shop, quantities rendered with each item's current strategy
    pub async fn shop_notifications(&self, session: &ShopSession) -> AppResult<ShopNotifications> {
        let (arrivals, declines) = tokio::try_join!(
            self.list_pending_arrivals(session.shop_id),
            self.list_unacknowledged_declines(session.shop_id),
        )?;

        let mut strategies = HashMap::new();
        Ok(ShopNotifications {
            arrivals: self
                .render(NotificationKind::Arrival, arrivals, &mut strategies)
                .await?,
            declines: self
                .render(NotificationKind::Decline, declines, &mut strategies)
                .await?,
        })
    }

    async fn render(
        &self,
        kind: NotificationKind,
        transfers: Vec<TransferRequest>,
        strategies: &mut HashMap<String, DisplayStrategy>,
    ) -> AppResult<Vec<TransferNotification>> {
        let mut notifications = Vec::with_capacity(transfers.len());
        for transfer in transfers {
            let strategy = self.strategy_for(strategies, &transfer).await?;
            notifications.push(TransferNotification::new(kind, transfer, &strategy));
        }
        Ok(notifications)
    }

    async fn strategy_for(
        &self,
        cache: &mut HashMap<String, DisplayStrategy>,
        transfer: &TransferRequest,
    ) -> AppResult<DisplayStrategy> {
        if let Some(strategy) = cache.get(&transfer.item_name) {
            return Ok(strategy.clone());
        }

        let strategy = match self.stores.items.get_item(&transfer.item_name).await? {
            Some(item) => item.display_strategy,
            None => DisplayStrategy::for_metric(transfer.metric),
        };
        cache.insert(transfer.item_name.clone(), strategy.clone());
        Ok(strategy)
    }

    /// Acknowledge a decline seen by the origin shop. Repeating it is a no-op.
    pub async fn acknowledge(&self, session: &ShopSession, id: Uuid) -> AppResult<ConfirmOutcome> {
        let transfer = self
            .stores
            .transfers
            .get_transfer(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Transfer".to_string()))?;

        if transfer.from_shop_id != session.shop_id {
            return Err(AppError::Forbidden(
                "Only the originating shop can acknowledge a decline".to_string(),
            ));
        }

        let (transfer, transition) = self
            .stores
            .transfers
            .acknowledge_decline(id, Some(session.employee_id), Utc::now())
            .await?;

        let applied = transition.applied();
        if applied {
            tracing::info!(%id, shop_id = %session.shop_id, "Decline acknowledged");
            self.events
                .publish(TransferEvent::new(TransferEventKind::Acknowledged, &transfer));
        }

        Ok(ConfirmOutcome { transfer, applied })
    }
}
