//! Client-side driver for the two transfer notification queues
//!
//! The coordinator keeps the arrival and decline queues of one shop in sync
//! with the server. It refreshes when a transfer event for the shop arrives
//! and on a fixed interval as a fallback, and publishes the currently
//! presented pair on a watch channel for the UI.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{
    NotificationKind, NotificationQueue, PresentedNotifications, ShopNotifications, ShopSession,
    TransferNotification,
};
use std::future::Future;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::client::{ClientError, StockApiClient};
use crate::config::NotificationConfig;
use crate::services::{NotificationService, TransferEvent, TransferService};
use crate::AppState;

/// Where notifications come from and where decisions go
#[async_trait]
pub trait NotificationSource: Send + Sync {
    async fn notifications(&self) -> Result<ShopNotifications, ClientError>;

    async fn accept(&self, id: Uuid) -> Result<(), ClientError>;

    async fn decline(&self, id: Uuid, note: &str) -> Result<(), ClientError>;

    async fn acknowledge(&self, id: Uuid) -> Result<(), ClientError>;

    /// Push feed of the shop's transfer events
    async fn subscribe(&self) -> Result<mpsc::Receiver<TransferEvent>, ClientError>;
}

#[async_trait]
impl NotificationSource for StockApiClient {
    async fn notifications(&self) -> Result<ShopNotifications, ClientError> {
        StockApiClient::notifications(self).await
    }

    async fn accept(&self, id: Uuid) -> Result<(), ClientError> {
        StockApiClient::accept(self, id).await.map(|_| ())
    }

    async fn decline(&self, id: Uuid, note: &str) -> Result<(), ClientError> {
        StockApiClient::decline(self, id, note).await.map(|_| ())
    }

    async fn acknowledge(&self, id: Uuid) -> Result<(), ClientError> {
        StockApiClient::acknowledge(self, id).await.map(|_| ())
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<TransferEvent>, ClientError> {
        self.subscribe_events().await
    }
}

/// Source backed by the in-process services, acting as one shop session
#[derive(Clone)]
pub struct LocalNotificationSource {
    session: ShopSession,
    notifications: NotificationService,
    transfers: TransferService,
    state: AppState,
}

impl LocalNotificationSource {
    pub fn new(state: &AppState, session: ShopSession) -> Self {
        Self {
            session,
            notifications: NotificationService::new(state.stores.clone(), state.events.clone()),
            transfers: TransferService::new(
                state.stores.clone(),
                state.events.clone(),
                &state.config.transfers,
            ),
            state: state.clone(),
        }
    }
}

#[async_trait]
impl NotificationSource for LocalNotificationSource {
    async fn notifications(&self) -> Result<ShopNotifications, ClientError> {
        Ok(self.notifications.shop_notifications(&self.session).await?)
    }

    async fn accept(&self, id: Uuid) -> Result<(), ClientError> {
        self.transfers.accept(&self.session, id).await?;
        Ok(())
    }

    async fn decline(&self, id: Uuid, note: &str) -> Result<(), ClientError> {
        self.transfers.decline(&self.session, id, note).await?;
        Ok(())
    }

    async fn acknowledge(&self, id: Uuid) -> Result<(), ClientError> {
        self.notifications.acknowledge(&self.session, id).await?;
        Ok(())
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<TransferEvent>, ClientError> {
        let shop_id = self.session.shop_id;
        let mut events = self.state.events.subscribe();
        let (tx, rx) = mpsc::channel(64);

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) if event.involves(shop_id) => {
                        if tx.send(event).await.is_err() {
                            return;
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(%shop_id, skipped, "Local transfer events lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });

        Ok(rx)
    }
}

/// Keeps one shop's arrival and decline queues current
pub struct TransferNotificationCoordinator<S> {
    source: S,
    arrivals: NotificationQueue,
    declines: NotificationQueue,
    poll_interval: Duration,
    presented: watch::Sender<PresentedNotifications>,
}

impl<S: NotificationSource> TransferNotificationCoordinator<S> {
    pub fn new(source: S, config: &NotificationConfig) -> Self {
        let (presented, _) = watch::channel(PresentedNotifications::default());
        Self {
            source,
            arrivals: NotificationQueue::new(NotificationKind::Arrival, config.arrival_reopen()),
            declines: NotificationQueue::new(NotificationKind::Decline, config.decline_reopen()),
            poll_interval: config.poll_interval(),
            presented,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Receiver of the presented pair, updated on every change
    pub fn watch(&self) -> watch::Receiver<PresentedNotifications> {
        self.presented.subscribe()
    }

    pub fn arrivals(&self) -> &NotificationQueue {
        &self.arrivals
    }

    pub fn declines(&self) -> &NotificationQueue {
        &self.declines
    }

    /// Replace both queues with the server's lists
    pub async fn refresh(&mut self) -> Result<(), ClientError> {
        let ShopNotifications { arrivals, declines } = self.source.notifications().await?;
        tracing::debug!(
            arrivals = arrivals.len(),
            declines = declines.len(),
            "Refreshed transfer notifications"
        );
        self.arrivals.sync(arrivals);
        self.declines.sync(declines);
        self.publish(Utc::now());
        Ok(())
    }

    pub fn current_arrival(&self, now: DateTime<Utc>) -> Option<&TransferNotification> {
        self.arrivals.current(now)
    }

    pub fn current_decline(&self, now: DateTime<Utc>) -> Option<&TransferNotification> {
        self.declines.current(now)
    }

    pub fn presented(&self, now: DateTime<Utc>) -> PresentedNotifications {
        PresentedNotifications {
            arrival: self.current_arrival(now).cloned(),
            decline: self.current_decline(now).cloned(),
        }
    }

    pub fn dismiss_arrival(&mut self, id: Uuid, now: DateTime<Utc>) -> bool {
        let dismissed = self.arrivals.dismiss(id, now);
        self.publish(now);
        dismissed
    }

    pub fn dismiss_decline(&mut self, id: Uuid, now: DateTime<Utc>) -> bool {
        let dismissed = self.declines.dismiss(id, now);
        self.publish(now);
        dismissed
    }

    /// Accept an arrival. A transfer the server no longer knows counts as resolved.
    pub async fn accept(&mut self, id: Uuid) -> Result<(), ClientError> {
        let result = self.source.accept(id).await;
        self.settle(NotificationKind::Arrival, id, result)
    }

    pub async fn decline(&mut self, id: Uuid, note: &str) -> Result<(), ClientError> {
        let result = self.source.decline(id, note).await;
        self.settle(NotificationKind::Arrival, id, result)
    }

    /// Acknowledge a decline for good
    pub async fn acknowledge(&mut self, id: Uuid) -> Result<(), ClientError> {
        let result = self.source.acknowledge(id).await;
        self.settle(NotificationKind::Decline, id, result)
    }

    fn settle(
        &mut self,
        kind: NotificationKind,
        id: Uuid,
        result: Result<(), ClientError>,
    ) -> Result<(), ClientError> {
        match result {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!(%id, "Transfer already gone on the server");
            }
            Err(e) => return Err(e),
        }

        let queue = match kind {
            NotificationKind::Arrival => &mut self.arrivals,
            NotificationKind::Decline => &mut self.declines,
        };
        queue.remove(id);
        self.publish(Utc::now());
        Ok(())
    }

    fn publish(&self, now: DateTime<Utc>) {
        self.presented.send_if_modified(|current| {
            let next = self.presented(now);
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn next_reopen(&self, now: DateTime<Utc>) -> Option<Duration> {
        let at = match (self.arrivals.next_reopen(now), self.declines.next_reopen(now)) {
            (Some(a), Some(d)) => a.min(d),
            (Some(a), None) => a,
            (None, Some(d)) => d,
            (None, None) => return None,
        };
        Some((at - now).to_std().unwrap_or(Duration::ZERO))
    }

    /// Drive the queues until `shutdown` resolves.
    ///
    /// Refreshes immediately, then on every event for the shop and every
    /// poll interval. Without a push feed it keeps polling.
    pub async fn run<F>(mut self, shutdown: F) -> Self
    where
        F: Future<Output = ()> + Send,
    {
        let mut events = match self.source.subscribe().await {
            Ok(rx) => Some(rx),
            Err(e) => {
                tracing::warn!("Transfer event feed unavailable, polling only: {}", e);
                None
            }
        };

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            let reopen = self.next_reopen(Utc::now());

            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh().await {
                        tracing::warn!("Notification refresh failed: {}", e);
                    }
                }
                event = next_event(&mut events) => match event {
                    Some(event) => {
                        tracing::debug!(kind = ?event.kind, transfer_id = %event.transfer_id, "Transfer event received");
                        if let Err(e) = self.refresh().await {
                            tracing::warn!("Notification refresh failed: {}", e);
                        }
                    }
                    None => {
                        tracing::info!("Transfer event feed closed, falling back to polling");
                        events = None;
                    }
                },
                _ = tokio::time::sleep(reopen.unwrap_or(Duration::ZERO)), if reopen.is_some() => {
                    self.publish(Utc::now());
                }
            }
        }

        self
    }
}

async fn next_event(events: &mut Option<mpsc::Receiver<TransferEvent>>) -> Option<TransferEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
