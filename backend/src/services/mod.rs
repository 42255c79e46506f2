//! Business logic services for the shop stock platform

pub mod events;
pub mod ledger;
pub mod movement;
pub mod notification;
pub mod transfer;

pub use events::{TransferEvent, TransferEventBus, TransferEventKind};
pub use ledger::LedgerService;
pub use movement::MovementService;
pub use notification::NotificationService;
pub use transfer::TransferService;
