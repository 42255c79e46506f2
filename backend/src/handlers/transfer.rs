//! HTTP handlers for shop-to-shop transfer endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{
    ConfirmOutcome, ConfirmTransferInput, CreateTransferInput, CreatedTransfer, TransferListQuery,
    TransferRequest,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentShop;
use crate::services::TransferService;
use crate::AppState;

fn service(state: AppState) -> TransferService {
    TransferService::new(state.stores, state.events, &state.config.transfers)
}

/// Create a transfer from the session shop.
///
/// Returns 201 for a new transfer and 200 when the request key was replayed.
pub async fn create_transfer(
    State(state): State<AppState>,
    current_shop: CurrentShop,
    Json(input): Json<CreateTransferInput>,
) -> AppResult<(StatusCode, Json<CreatedTransfer>)> {
    let outcome = service(state).create(&current_shop.0, input).await?;
    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(CreatedTransfer {
            transfer_id: outcome.transfer.id,
            transfer: outcome.transfer,
        }),
    ))
}

/// List transfers visible to the session shop
pub async fn list_transfers(
    State(state): State<AppState>,
    current_shop: CurrentShop,
    Query(query): Query<TransferListQuery>,
) -> AppResult<Json<Vec<TransferRequest>>> {
    let transfers = service(state).list(&current_shop.0, query).await?;
    Ok(Json(transfers))
}

/// Get a transfer by ID
pub async fn get_transfer(
    State(state): State<AppState>,
    current_shop: CurrentShop,
    Path(id): Path<Uuid>,
) -> AppResult<Json<TransferRequest>> {
    let transfer = service(state).get(&current_shop.0, id).await?;
    Ok(Json(transfer))
}

/// Accept or decline a transfer addressed to the session shop
pub async fn confirm_transfer(
    State(state): State<AppState>,
    current_shop: CurrentShop,
    Path(id): Path<Uuid>,
    Json(input): Json<ConfirmTransferInput>,
) -> AppResult<Json<ConfirmOutcome>> {
    let outcome = service(state).confirm(&current_shop.0, id, input).await?;
    Ok(Json(outcome))
}
