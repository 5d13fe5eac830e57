//! Stock ledger service.
//!
//! Validates commands, checks that the referenced product/storage rows exist,
//! and appends movements through a [`LedgerStore`]. Stock is read back from
//! the store's aggregates; nothing is cached here.

use chrono::{SubsecRound, Utc};
use futures::TryStreamExt;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use stockledger_core::{MovementId, ProductId, StorageId};
use stockledger_inventory::{
    Direction, RecordMovement, StockLevel, StockMovement, StockTotals, Transfer,
};

use crate::error::LedgerError;
use crate::store::{Catalog, LedgerStore, MovementFilter, MovementStream};

/// Both legs of a recorded transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    /// Shared `reference_id` of the two legs.
    pub reference_id: String,
    pub outbound: StockMovement,
    pub inbound: StockMovement,
}

#[derive(Debug, Clone)]
pub struct StockLedger<S> {
    store: S,
}

impl<S> StockLedger<S>
where
    S: LedgerStore + Catalog,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Append one movement.
    ///
    /// Input shape is validated before any lookup, so a malformed command
    /// against a missing product reports `Validation`. Outbound movements are
    /// never refused for lack of stock.
    #[instrument(
        skip(self, command),
        fields(product_id = %command.product_id, storage_id = %command.storage_id),
        err
    )]
    pub async fn record_movement(
        &self,
        command: RecordMovement,
    ) -> Result<StockMovement, LedgerError> {
        let movement = command.validate(Utc::now())?;
        self.ensure_references(movement.product_id, &[movement.storage_id]).await?;

        let stored = self
            .store
            .append(vec![movement])
            .await?
            .pop()
            .ok_or_else(|| LedgerError::Storage("append returned no movement".into()))?;

        tracing::info!(
            movement_id = %stored.id,
            direction = %stored.direction,
            kind = %stored.kind,
            quantity = %stored.quantity,
            "stock movement recorded"
        );

        if stored.direction == Direction::Out {
            self.warn_if_negative(stored.product_id, stored.storage_id).await;
        }
        Ok(stored)
    }

    /// `sum(in) - sum(out)` over live movements, optionally for one storage.
    ///
    /// Zero when nothing is recorded. `NotFound` only for a product that does
    /// not exist; an unknown storage simply has no movements.
    #[instrument(skip(self), fields(product_id = %product_id, storage_id = ?storage_id), err)]
    pub async fn current_stock(
        &self,
        product_id: ProductId,
        storage_id: Option<StorageId>,
    ) -> Result<Decimal, LedgerError> {
        Ok(self.stock_totals(product_id, storage_id).await?.on_hand())
    }

    #[instrument(skip(self), fields(product_id = %product_id, storage_id = ?storage_id), err)]
    pub async fn stock_totals(
        &self,
        product_id: ProductId,
        storage_id: Option<StorageId>,
    ) -> Result<StockTotals, LedgerError> {
        self.ensure_product_row(product_id).await?;
        self.store.stock_totals(product_id, storage_id).await
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub async fn stock_by_storage(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<StockLevel>, LedgerError> {
        self.ensure_product_row(product_id).await?;
        self.store.stock_by_storage(product_id).await
    }

    /// Lazy listing; every call is an independent snapshot.
    pub fn list_movements(&self, filter: MovementFilter) -> MovementStream<'_> {
        self.store.stream(filter)
    }

    pub async fn collect_movements(
        &self,
        filter: MovementFilter,
    ) -> Result<Vec<StockMovement>, LedgerError> {
        self.store.stream(filter).try_collect().await
    }

    #[instrument(skip(self), fields(movement_id = %id), err)]
    pub async fn get_movement(
        &self,
        id: MovementId,
        include_deleted: bool,
    ) -> Result<StockMovement, LedgerError> {
        self.store
            .get(id, include_deleted)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("movement {id}")))
    }

    /// Exclude a movement from every aggregate. It stays in audit listings.
    #[instrument(skip(self), fields(movement_id = %id), err)]
    pub async fn soft_delete_movement(&self, id: MovementId) -> Result<StockMovement, LedgerError> {
        let deleted = self
            .store
            .set_deleted(id, Some(Utc::now().trunc_subsecs(6)))
            .await?;
        tracing::info!(movement_id = %id, "stock movement soft-deleted");
        Ok(deleted)
    }

    #[instrument(skip(self), fields(movement_id = %id), err)]
    pub async fn restore_movement(&self, id: MovementId) -> Result<StockMovement, LedgerError> {
        let restored = self.store.set_deleted(id, None).await?;
        tracing::info!(movement_id = %id, "stock movement restored");
        Ok(restored)
    }

    /// Move stock between two storages as one atomic pair of movements.
    #[instrument(
        skip(self, transfer),
        fields(product_id = %transfer.product_id, from = %transfer.from, to = %transfer.to),
        err
    )]
    pub async fn transfer(&self, transfer: Transfer) -> Result<TransferReceipt, LedgerError> {
        let reference_id = Uuid::now_v7().to_string();
        let [outbound, inbound] = transfer.into_legs(&reference_id, Utc::now())?;
        let storages = [outbound.storage_id, inbound.storage_id];
        self.ensure_references(outbound.product_id, &storages).await?;

        let mut stored = self.store.append(vec![outbound, inbound]).await?.into_iter();
        let (Some(outbound), Some(inbound)) = (stored.next(), stored.next()) else {
            return Err(LedgerError::Storage(
                "transfer append returned fewer than two movements".into(),
            ));
        };

        tracing::info!(
            reference_id = %reference_id,
            quantity = %outbound.quantity,
            "stock transferred"
        );
        self.warn_if_negative(outbound.product_id, outbound.storage_id).await;

        Ok(TransferReceipt {
            reference_id,
            outbound,
            inbound,
        })
    }

    async fn ensure_references(
        &self,
        product_id: ProductId,
        storages: &[StorageId],
    ) -> Result<(), LedgerError> {
        if !self.store.product_exists(product_id).await? {
            return Err(LedgerError::NotFound(format!("product {product_id}")));
        }
        for &storage_id in storages {
            if !self.store.storage_exists(storage_id).await? {
                return Err(LedgerError::NotFound(format!("storage {storage_id}")));
            }
        }
        Ok(())
    }

    // Reads accept soft-deleted products: their history is still queryable.
    async fn ensure_product_row(&self, product_id: ProductId) -> Result<(), LedgerError> {
        match self.store.get_product(product_id).await? {
            Some(_) => Ok(()),
            None => Err(LedgerError::NotFound(format!("product {product_id}"))),
        }
    }

    async fn warn_if_negative(&self, product_id: ProductId, storage_id: StorageId) {
        match self.store.stock_totals(product_id, Some(storage_id)).await {
            Ok(totals) if totals.on_hand() < Decimal::ZERO => {
                tracing::warn!(
                    product_id = %product_id,
                    storage_id = %storage_id,
                    on_hand = %totals.on_hand(),
                    "stock is negative"
                );
            }
            Ok(_) => {}
            Err(err) => tracing::debug!(error = %err, "skipped negative stock check"),
        }
    }
}
