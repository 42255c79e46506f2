//! HTTP request handlers

mod health;
mod movement;
mod notification;
mod stock;
mod transfer;

pub use health::{health_check, HealthResponse};
pub use movement::get_stock_movement;
pub use notification::{acknowledge_notification, list_transfer_notifications, transfer_events};
pub use stock::{
    get_item, get_item_details, put_item, record_distribution, record_return, record_sale,
    record_spoilage,
};
pub use transfer::{confirm_transfer, create_transfer, get_transfer, list_transfers};
