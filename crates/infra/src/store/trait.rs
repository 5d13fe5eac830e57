use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

use stockledger_catalog::{NewProduct, NewStorage, Product, Storage};
use stockledger_core::{MovementId, ProductId, SoftDeletable, StorageId};
use stockledger_inventory::{NewMovement, StockLevel, StockMovement, StockTotals};

use crate::error::LedgerError;
use crate::store::filter::MovementFilter;

/// Lazy, finite stream of movements produced by one listing call.
pub type MovementStream<'a> = BoxStream<'a, Result<StockMovement, LedgerError>>;

/// Append-only movement log.
///
/// ## Append Semantics
///
/// `append()`:
/// - Persists every movement of the batch atomically (all or nothing)
/// - Assigns ids and `created_at`
/// - Enforces referential integrity: unknown product/storage rows fail with
///   `NotFound` (the relational backend maps its foreign-key violation)
/// - Never checks available stock
///
/// ## Aggregates
///
/// `stock_totals()` and `stock_by_storage()` fold non-deleted movements at
/// query time. There is no stored counter to keep in sync, so concurrent
/// appends need no coordination.
///
/// ## Listing
///
/// `stream()` returns an independent snapshot per call; dropping it early is
/// fine and calling it again restarts from the beginning.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn append(&self, movements: Vec<NewMovement>) -> Result<Vec<StockMovement>, LedgerError>;

    async fn get(
        &self,
        id: MovementId,
        include_deleted: bool,
    ) -> Result<Option<StockMovement>, LedgerError>;

    fn stream(&self, filter: MovementFilter) -> MovementStream<'_>;

    async fn stock_totals(
        &self,
        product_id: ProductId,
        storage_id: Option<StorageId>,
    ) -> Result<StockTotals, LedgerError>;

    async fn stock_by_storage(&self, product_id: ProductId) -> Result<Vec<StockLevel>, LedgerError>;

    /// Set (`Some`) or clear (`None`) the soft-delete marker. The only
    /// mutation a movement allows.
    ///
    /// The state check and the write are one atomic step: setting the marker
    /// on a deleted movement, or clearing it on a live one, fails with
    /// `Validation`. Unknown ids fail with `NotFound`.
    async fn set_deleted(
        &self,
        id: MovementId,
        deleted_at: Option<DateTime<Utc>>,
    ) -> Result<StockMovement, LedgerError>;
}

/// Product/storage registry.
///
/// Hard deletes cascade to the owner's movements. Soft-deleted rows remain
/// readable but do not count as existing for new movements.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn create_product(&self, product: NewProduct) -> Result<Product, LedgerError>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, LedgerError>;

    async fn soft_delete_product(&self, id: ProductId) -> Result<(), LedgerError>;

    async fn delete_product(&self, id: ProductId) -> Result<(), LedgerError>;

    async fn create_storage(&self, storage: NewStorage) -> Result<Storage, LedgerError>;

    async fn get_storage(&self, id: StorageId) -> Result<Option<Storage>, LedgerError>;

    async fn soft_delete_storage(&self, id: StorageId) -> Result<(), LedgerError>;

    async fn delete_storage(&self, id: StorageId) -> Result<(), LedgerError>;

    /// Product exists and is not soft-deleted.
    async fn product_exists(&self, id: ProductId) -> Result<bool, LedgerError> {
        Ok(self.get_product(id).await?.is_some_and(|p| p.is_live()))
    }

    /// Storage exists and is not soft-deleted.
    async fn storage_exists(&self, id: StorageId) -> Result<bool, LedgerError> {
        Ok(self.get_storage(id).await?.is_some_and(|s| s.is_live()))
    }
}

#[async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    async fn append(&self, movements: Vec<NewMovement>) -> Result<Vec<StockMovement>, LedgerError> {
        (**self).append(movements).await
    }

    async fn get(
        &self,
        id: MovementId,
        include_deleted: bool,
    ) -> Result<Option<StockMovement>, LedgerError> {
        (**self).get(id, include_deleted).await
    }

    fn stream(&self, filter: MovementFilter) -> MovementStream<'_> {
        (**self).stream(filter)
    }

    async fn stock_totals(
        &self,
        product_id: ProductId,
        storage_id: Option<StorageId>,
    ) -> Result<StockTotals, LedgerError> {
        (**self).stock_totals(product_id, storage_id).await
    }

    async fn stock_by_storage(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<StockLevel>, LedgerError> {
        (**self).stock_by_storage(product_id).await
    }

    async fn set_deleted(
        &self,
        id: MovementId,
        deleted_at: Option<DateTime<Utc>>,
    ) -> Result<StockMovement, LedgerError> {
        (**self).set_deleted(id, deleted_at).await
    }
}

#[async_trait]
impl<S> Catalog for Arc<S>
where
    S: Catalog + ?Sized,
{
    async fn create_product(&self, product: NewProduct) -> Result<Product, LedgerError> {
        (**self).create_product(product).await
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, LedgerError> {
        (**self).get_product(id).await
    }

    async fn soft_delete_product(&self, id: ProductId) -> Result<(), LedgerError> {
        (**self).soft_delete_product(id).await
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), LedgerError> {
        (**self).delete_product(id).await
    }

    async fn create_storage(&self, storage: NewStorage) -> Result<Storage, LedgerError> {
        (**self).create_storage(storage).await
    }

    async fn get_storage(&self, id: StorageId) -> Result<Option<Storage>, LedgerError> {
        (**self).get_storage(id).await
    }

    async fn soft_delete_storage(&self, id: StorageId) -> Result<(), LedgerError> {
        (**self).soft_delete_storage(id).await
    }

    async fn delete_storage(&self, id: StorageId) -> Result<(), LedgerError> {
        (**self).delete_storage(id).await
    }

    async fn product_exists(&self, id: ProductId) -> Result<bool, LedgerError> {
        (**self).product_exists(id).await
    }

    async fn storage_exists(&self, id: StorageId) -> Result<bool, LedgerError> {
        (**self).storage_exists(id).await
    }
}
