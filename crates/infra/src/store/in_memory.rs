use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use futures::StreamExt;

use stockledger_catalog::{NewProduct, NewStorage, Product, Storage};
use stockledger_core::{MovementId, ProductId, StorageId};
use stockledger_inventory::{NewMovement, StockLevel, StockMovement, StockTotals, levels_by_storage};

use super::filter::{MovementFilter, SortOrder};
use super::r#trait::{Catalog, LedgerStore, MovementStream};
use crate::error::LedgerError;

#[derive(Debug, Default)]
struct State {
    products: BTreeMap<ProductId, Product>,
    storages: BTreeMap<StorageId, Storage>,
    movements: BTreeMap<MovementId, StockMovement>,
    last_product_id: i64,
    last_storage_id: i64,
    last_movement_id: i64,
}

impl State {
    fn check_references(&self, m: &NewMovement) -> Result<(), LedgerError> {
        if !self.products.contains_key(&m.product_id) {
            return Err(LedgerError::NotFound(format!("product {}", m.product_id)));
        }
        if !self.storages.contains_key(&m.storage_id) {
            return Err(LedgerError::NotFound(format!("storage {}", m.storage_id)));
        }
        Ok(())
    }
}

/// In-memory ledger and catalog.
///
/// Intended for tests/dev. Mirrors the relational backend: ids are assigned
/// sequentially, hard deletes cascade to movements, batches are atomic under
/// one write lock. Not optimized for performance (aggregates scan the log).
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<State>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, LedgerError> {
        self.state
            .read()
            .map_err(|_| LedgerError::Storage("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, State>, LedgerError> {
        self.state
            .write()
            .map_err(|_| LedgerError::Storage("lock poisoned".to_string()))
    }

    fn snapshot(&self, filter: &MovementFilter) -> Result<Vec<StockMovement>, LedgerError> {
        let state = self.read()?;
        let mut rows: Vec<StockMovement> = state
            .movements
            .values()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        drop(state);

        rows.sort_by(|a, b| (a.moved_at, a.id).cmp(&(b.moved_at, b.id)));
        if filter.order == SortOrder::Descending {
            rows.reverse();
        }
        Ok(rows)
    }
}

fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn append(&self, movements: Vec<NewMovement>) -> Result<Vec<StockMovement>, LedgerError> {
        if movements.is_empty() {
            return Ok(vec![]);
        }

        let mut state = self.write()?;

        // Validate the whole batch before touching the log (all or nothing).
        for m in &movements {
            state.check_references(m)?;
        }

        let created_at = now();
        let mut committed = Vec::with_capacity(movements.len());
        for m in movements {
            state.last_movement_id += 1;
            let id = MovementId::new(state.last_movement_id);
            let stored = m.into_movement(id, created_at);
            state.movements.insert(id, stored.clone());
            committed.push(stored);
        }

        Ok(committed)
    }

    async fn get(
        &self,
        id: MovementId,
        include_deleted: bool,
    ) -> Result<Option<StockMovement>, LedgerError> {
        let state = self.read()?;
        Ok(state
            .movements
            .get(&id)
            .filter(|m| include_deleted || m.deleted_at.is_none())
            .cloned())
    }

    fn stream(&self, filter: MovementFilter) -> MovementStream<'_> {
        match self.snapshot(&filter) {
            Ok(rows) => futures::stream::iter(rows.into_iter().map(Ok)).boxed(),
            Err(e) => futures::stream::once(async move { Err(e) }).boxed(),
        }
    }

    async fn stock_totals(
        &self,
        product_id: ProductId,
        storage_id: Option<StorageId>,
    ) -> Result<StockTotals, LedgerError> {
        let state = self.read()?;
        Ok(StockTotals::from_movements(state.movements.values().filter(|m| {
            m.product_id == product_id && storage_id.is_none_or(|s| s == m.storage_id)
        })))
    }

    async fn stock_by_storage(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<StockLevel>, LedgerError> {
        let state = self.read()?;
        Ok(levels_by_storage(product_id, state.movements.values()))
    }

    async fn set_deleted(
        &self,
        id: MovementId,
        deleted_at: Option<DateTime<Utc>>,
    ) -> Result<StockMovement, LedgerError> {
        let mut state = self.write()?;
        let movement = state
            .movements
            .get_mut(&id)
            .ok_or_else(|| LedgerError::NotFound(format!("movement {id}")))?;
        match (movement.deleted_at.is_some(), deleted_at.is_some()) {
            (true, true) => {
                return Err(LedgerError::Validation(format!("movement {id} is already deleted")));
            }
            (false, false) => {
                return Err(LedgerError::Validation(format!("movement {id} is not deleted")));
            }
            _ => movement.deleted_at = deleted_at,
        }
        Ok(movement.clone())
    }
}

#[async_trait]
impl Catalog for InMemoryLedgerStore {
    async fn create_product(&self, product: NewProduct) -> Result<Product, LedgerError> {
        let product = product.validate()?;
        let slug = product.slug_or_empty().to_string();

        let mut state = self.write()?;
        if state.products.values().any(|p| p.slug == slug) {
            return Err(LedgerError::Conflict(format!("product slug '{slug}' already exists")));
        }

        state.last_product_id += 1;
        let stored = Product {
            id: ProductId::new(state.last_product_id),
            name: product.name,
            slug,
            price: product.price,
            is_active: product.is_active,
            created_at: now(),
            deleted_at: None,
        };
        state.products.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, LedgerError> {
        Ok(self.read()?.products.get(&id).cloned())
    }

    async fn soft_delete_product(&self, id: ProductId) -> Result<(), LedgerError> {
        let mut state = self.write()?;
        let product = state
            .products
            .get_mut(&id)
            .ok_or_else(|| LedgerError::NotFound(format!("product {id}")))?;
        product.deleted_at.get_or_insert_with(now);
        Ok(())
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), LedgerError> {
        let mut state = self.write()?;
        if state.products.remove(&id).is_none() {
            return Err(LedgerError::NotFound(format!("product {id}")));
        }
        state.movements.retain(|_, m| m.product_id != id);
        Ok(())
    }

    async fn create_storage(&self, storage: NewStorage) -> Result<Storage, LedgerError> {
        let storage = storage.validate()?;
        let code = storage.code_or_empty().to_string();

        let mut state = self.write()?;
        if state.storages.values().any(|s| s.code == code) {
            return Err(LedgerError::Conflict(format!("storage code '{code}' already exists")));
        }

        state.last_storage_id += 1;
        let stored = Storage {
            id: StorageId::new(state.last_storage_id),
            name: storage.name,
            code,
            description: storage.description,
            location: storage.location,
            is_active: storage.is_active,
            metadata: storage.metadata,
            created_at: now(),
            deleted_at: None,
        };
        state.storages.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_storage(&self, id: StorageId) -> Result<Option<Storage>, LedgerError> {
        Ok(self.read()?.storages.get(&id).cloned())
    }

    async fn soft_delete_storage(&self, id: StorageId) -> Result<(), LedgerError> {
        let mut state = self.write()?;
        let storage = state
            .storages
            .get_mut(&id)
            .ok_or_else(|| LedgerError::NotFound(format!("storage {id}")))?;
        storage.deleted_at.get_or_insert_with(now);
        Ok(())
    }

    async fn delete_storage(&self, id: StorageId) -> Result<(), LedgerError> {
        let mut state = self.write()?;
        if state.storages.remove(&id).is_none() {
            return Err(LedgerError::NotFound(format!("storage {id}")));
        }
        state.movements.retain(|_, m| m.storage_id != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use rust_decimal_macros::dec;
    use stockledger_inventory::RecordMovement;

    async fn seeded() -> (InMemoryLedgerStore, ProductId, StorageId) {
        let store = InMemoryLedgerStore::new();
        let product = store.create_product(NewProduct::new("Mug")).await.unwrap();
        let storage = store.create_storage(NewStorage::new("Main")).await.unwrap();
        (store, product.id, storage.id)
    }

    fn new_movement(
        p: ProductId,
        s: StorageId,
        direction: &str,
        q: rust_decimal::Decimal,
    ) -> NewMovement {
        RecordMovement::new(p, s, direction, "adjust", q).validate(Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn append_assigns_sequential_ids() {
        let (store, p, s) = seeded().await;
        let stored = store
            .append(vec![new_movement(p, s, "in", dec!(1)), new_movement(p, s, "out", dec!(1))])
            .await
            .unwrap();
        let ids: Vec<i64> = stored.iter().map(|m| m.id.get()).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn batch_with_unknown_storage_appends_nothing() {
        let (store, p, s) = seeded().await;
        let err = store
            .append(vec![
                new_movement(p, s, "in", dec!(1)),
                new_movement(p, StorageId::new(99), "in", dec!(1)),
            ])
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let all: Vec<_> = store
            .stream(MovementFilter::new().with_deleted())
            .try_collect()
            .await
            .unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn duplicate_storage_code_conflicts() {
        let (store, _, _) = seeded().await;
        let err = store.create_storage(NewStorage::new("main")).await.unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
    }

    #[tokio::test]
    async fn deleting_storage_cascades_only_its_movements() {
        let (store, p, s1) = seeded().await;
        let s2 = store.create_storage(NewStorage::new("Overflow")).await.unwrap().id;
        store
            .append(vec![new_movement(p, s1, "in", dec!(5)), new_movement(p, s2, "in", dec!(7))])
            .await
            .unwrap();

        store.delete_storage(s1).await.unwrap();

        let totals = store.stock_totals(p, None).await.unwrap();
        assert_eq!(totals.on_hand(), dec!(7));
    }

    #[tokio::test]
    async fn set_deleted_checks_current_state() {
        let (store, p, s) = seeded().await;
        let id = store.append(vec![new_movement(p, s, "in", dec!(2))]).await.unwrap()[0].id;

        assert!(store.set_deleted(id, None).await.unwrap_err().is_validation());

        let first = store.set_deleted(id, Some(now())).await.unwrap();
        let err = store.set_deleted(id, Some(now())).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.get(id, true).await.unwrap().unwrap().deleted_at, first.deleted_at);

        assert!(store.set_deleted(id, None).await.unwrap().deleted_at.is_none());
        assert!(store.set_deleted(MovementId::new(99), None).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn soft_deleted_product_is_not_live() {
        let (store, p, _) = seeded().await;
        store.soft_delete_product(p).await.unwrap();
        assert!(!store.product_exists(p).await.unwrap());
        assert!(store.get_product(p).await.unwrap().is_some());
    }
}
