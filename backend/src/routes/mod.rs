//! Route definitions for the shop stock platform

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - transfer workflow
        .merge(transfer_routes(state.clone()))
        // Protected routes - notifications and event stream
        .merge(notification_routes(state.clone()))
        // Protected routes - items and ledger adjustments
        .merge(stock_routes(state))
}

/// Transfer workflow routes (protected)
fn transfer_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/stock-transfer", post(handlers::create_transfer))
        .route("/shop-to-shop-transfers", get(handlers::list_transfers))
        .route("/shop-to-shop-transfers/:id", get(handlers::get_transfer))
        .route("/confirm-transfer/:id", post(handlers::confirm_transfer))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Notification routes (protected)
fn notification_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/notifications/transfers",
            get(handlers::list_transfer_notifications),
        )
        .route(
            "/acknowledge-notification/:id",
            post(handlers::acknowledge_notification),
        )
        .route("/transfer-events", get(handlers::transfer_events))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Item, availability, movement and adjustment routes (protected)
fn stock_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/shop-itemdetailsv2", get(handlers::get_item_details))
        .route("/stock-movement", get(handlers::get_stock_movement))
        .route(
            "/items/:name",
            get(handlers::get_item).put(handlers::put_item),
        )
        .route("/stock/distributions", post(handlers::record_distribution))
        .route("/stock/sales", post(handlers::record_sale))
        .route("/stock/spoilage", post(handlers::record_spoilage))
        .route("/stock/returns", post(handlers::record_return))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
