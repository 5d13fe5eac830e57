//! Infrastructure layer: ledger service, storage backends, configuration.

pub mod config;
pub mod error;
pub mod ledger;
pub mod store;

pub use config::{DatabaseConfig, LedgerConfig};
pub use error::LedgerError;
pub use ledger::{StockLedger, TransferReceipt};
pub use store::{
    Catalog, InMemoryLedgerStore, LedgerStore, MovementFilter, MovementStream, PostgresLedgerStore,
    SortOrder,
};
