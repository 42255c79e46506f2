//! HTTP handlers for items, item availability and ledger adjustments

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{
    Distribution, Item, ItemDetails, ItemDetailsQuery, RecordDistributionInput, RecordReturnInput,
    RecordSaleInput, RecordSpoilageInput, RegisterItemInput, ReturnRecord, SaleRecord,
    SpoilageRecord,
};

use crate::error::AppResult;
use crate::middleware::CurrentShop;
use crate::services::LedgerService;
use crate::AppState;

/// Current batch availability of an item (`GET /shop-itemdetailsv2`)
pub async fn get_item_details(
    State(state): State<AppState>,
    current_shop: CurrentShop,
    Query(query): Query<ItemDetailsQuery>,
) -> AppResult<Json<ItemDetails>> {
    let session = current_shop.0;
    let shop_id = query.shop_id.unwrap_or(session.shop_id);
    let service = LedgerService::new(state.stores);
    let details = service
        .item_details(&session, shop_id, &query.item_name)
        .await?;
    Ok(Json(details))
}

/// Register or update item reference data
pub async fn put_item(
    State(state): State<AppState>,
    _current_shop: CurrentShop,
    Path(name): Path<String>,
    Json(input): Json<RegisterItemInput>,
) -> AppResult<Json<Item>> {
    let service = LedgerService::new(state.stores);
    let item = service.register_item(&name, input).await?;
    Ok(Json(item))
}

/// Get item reference data
pub async fn get_item(
    State(state): State<AppState>,
    _current_shop: CurrentShop,
    Path(name): Path<String>,
) -> AppResult<Json<Item>> {
    let service = LedgerService::new(state.stores);
    let item = service.get_item(&name).await?;
    Ok(Json(item))
}

/// Record a delivery into the session shop
pub async fn record_distribution(
    State(state): State<AppState>,
    current_shop: CurrentShop,
    Json(input): Json<RecordDistributionInput>,
) -> AppResult<(StatusCode, Json<Distribution>)> {
    let service = LedgerService::new(state.stores);
    let record = service.record_distribution(&current_shop.0, input).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Record a sale
pub async fn record_sale(
    State(state): State<AppState>,
    current_shop: CurrentShop,
    Json(input): Json<RecordSaleInput>,
) -> AppResult<(StatusCode, Json<SaleRecord>)> {
    let service = LedgerService::new(state.stores);
    let record = service.record_sale(&current_shop.0, input).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Record spoilage or breakage
pub async fn record_spoilage(
    State(state): State<AppState>,
    current_shop: CurrentShop,
    Json(input): Json<RecordSpoilageInput>,
) -> AppResult<(StatusCode, Json<SpoilageRecord>)> {
    let service = LedgerService::new(state.stores);
    let record = service.record_spoilage(&current_shop.0, input).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Record a supplier or customer return
pub async fn record_return(
    State(state): State<AppState>,
    current_shop: CurrentShop,
    Json(input): Json<RecordReturnInput>,
) -> AppResult<(StatusCode, Json<ReturnRecord>)> {
    let service = LedgerService::new(state.stores);
    let record = service.record_return(&current_shop.0, input).await?;
    Ok((StatusCode::CREATED, Json(record)))
}
