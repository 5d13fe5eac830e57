//! Catalog reference entities: products and storages.
//!
//! Pure validation and normalization only (no IO). Stores in `stockledger-infra`
//! persist these and answer existence checks for the ledger.

pub mod product;
pub mod slug;
pub mod storage;

pub use product::{NewProduct, Product};
pub use slug::slugify;
pub use storage::{NewStorage, STORAGE_CODE_MAX_LEN, Storage, storage_code_from_name};
