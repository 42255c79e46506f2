//! Shared types and models for the shop stock transfer platform
//!
//! This crate contains the pure domain shared between the backend, the
//! dashboard (via WASM) and the notification client: reference items and
//! their display strategies, unit conversion, the transfer state machine
//! and the client-side notification queue.

pub mod models;
pub mod notifications;
pub mod types;
pub mod units;
pub mod validation;

pub use models::*;
pub use notifications::*;
pub use types::*;
pub use units::*;
pub use validation::*;
