//! HTTP handler for the stock movement ledger

use axum::{
    extract::{Query, State},
    Json,
};
use shared::{StockMovementQuery, StockMovements};

use crate::error::{AppError, AppResult};
use crate::middleware::CurrentShop;
use crate::services::MovementService;
use crate::AppState;

/// Movements of a shop over an inclusive date range
pub async fn get_stock_movement(
    State(state): State<AppState>,
    current_shop: CurrentShop,
    Query(query): Query<StockMovementQuery>,
) -> AppResult<Json<StockMovements>> {
    let session = current_shop.0;
    let range = query
        .range()
        .map_err(|msg| AppError::validation("from_date", msg))?;
    let shop_id = query.shop_id.unwrap_or(session.shop_id);

    let service = MovementService::new(state.stores);
    let movements = service.query(&session, shop_id, range).await?;
    Ok(Json(movements))
}
