//! Shop Stock Platform - Backend
//!
//! Inter-shop stock transfers over a batch ledger: reservation at the
//! source, accept/decline at the destination, decline notices back at the
//! origin, and the stock movement history built on top.

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod store;

pub use config::Config;

use services::TransferEventBus;
use store::Stores;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub config: Arc<Config>,
    pub events: TransferEventBus,
}

impl AppState {
    pub fn new(stores: Stores, config: Config) -> Self {
        let events = TransferEventBus::new(config.events.channel_capacity);
        Self {
            stores,
            config: Arc::new(config),
            events,
        }
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Shop Stock Platform API v1.0"
}
