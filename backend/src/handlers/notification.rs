//! HTTP handlers for transfer notifications and the transfer event stream

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use shared::{ConfirmOutcome, ShopNotifications};
use std::convert::Infallible;
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    Stream, StreamExt,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentShop;
use crate::services::NotificationService;
use crate::AppState;

/// Pending arrivals and unacknowledged declines of the session shop
pub async fn list_transfer_notifications(
    State(state): State<AppState>,
    current_shop: CurrentShop,
) -> AppResult<Json<ShopNotifications>> {
    let service = NotificationService::new(state.stores, state.events);
    let notifications = service.shop_notifications(&current_shop.0).await?;
    Ok(Json(notifications))
}

/// Acknowledge a declined transfer
pub async fn acknowledge_notification(
    State(state): State<AppState>,
    current_shop: CurrentShop,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ConfirmOutcome>> {
    let service = NotificationService::new(state.stores, state.events);
    let outcome = service.acknowledge(&current_shop.0, id).await?;
    Ok(Json(outcome))
}

/// Server-sent events for transfers the session shop takes part in
pub async fn transfer_events(
    State(state): State<AppState>,
    current_shop: CurrentShop,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let shop_id = current_shop.0.shop_id;
    tracing::debug!(%shop_id, "Transfer event stream opened");

    let stream = BroadcastStream::new(state.events.subscribe()).filter_map(move |message| {
        match message {
            Ok(event) if event.involves(shop_id) => Event::default()
                .event("transfer")
                .json_data(&event)
                .ok()
                .map(Ok),
            Ok(_) => None,
            // Subscriber fell behind; it should refresh from the API
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(%shop_id, skipped, "Transfer event stream lagged");
                Some(Ok(Event::default().event("lagged").data(skipped.to_string())))
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
