//! Domain models for the shop stock transfer platform

mod batch;
mod item;
mod movement;
mod transfer;

pub use batch::*;
pub use item::*;
pub use movement::*;
pub use transfer::*;
