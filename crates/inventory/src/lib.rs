//! Inventory stock ledger domain.
//!
//! Stock movements are immutable ledger entries; stock levels are folded from
//! them on demand. Pure, deterministic logic only (no IO, no storage).

pub mod command;
pub mod movement;
pub mod stock;

pub use command::{
    NewMovement, REFERENCE_MAX_LEN, RecordMovement, TRANSFER_REFERENCE_TYPE, Transfer,
};
pub use movement::{Direction, MOVEMENT_KIND_MAX_LEN, MovementKind, StockMovement};
pub use stock::{StockLevel, StockTotals, current_stock, levels_by_storage};
