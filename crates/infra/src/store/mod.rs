//! Storage boundary for the stock ledger.
//!
//! `LedgerStore` is the append-only movement log; `Catalog` owns the product
//! and storage rows movements point at. Both backends implement both traits.

pub mod filter;
pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use filter::{MovementFilter, SortOrder};
pub use in_memory::InMemoryLedgerStore;
pub use postgres::{PostgresLedgerStore, SCHEMA};
pub use r#trait::{Catalog, LedgerStore, MovementStream};
