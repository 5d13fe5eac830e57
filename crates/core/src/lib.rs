//! `stockledger-core` — shared building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod decimal;
pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use decimal::{MAX_DECIMAL_12_2, check_decimal_12_2};
pub use entity::{Entity, SoftDeletable};
pub use error::{DomainError, DomainResult};
pub use id::{MovementId, ProductId, StorageId};
pub use value_object::ValueObject;
