//! Postgres-backed ledger store.
//!
//! Persists movements, products and storages in relational tables (see
//! `schema.sql`). Stock is aggregated with `SUM(...) FILTER (WHERE ...)` on
//! every query; nothing is cached.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | LedgerError | Scenario |
//! |------------|----------------------|-------------|----------|
//! | Database (foreign key violation) | `23503` | `NotFound` | Product/storage removed mid-write |
//! | Database (unique violation) | `23505` | `Conflict` | Duplicate storage code or product slug |
//! | Database (check constraint violation) | `23514` | `Validation` | Row rejected by a CHECK |
//! | Database (other) | Any other | `Storage` | Other database errors |
//! | PoolClosed / Io / other | N/A | `Storage` | Connection failures, timeouts |
//!
//! ## Thread Safety
//!
//! `PostgresLedgerStore` is `Send + Sync` and can be shared across tasks.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

use stockledger_catalog::{NewProduct, NewStorage, Product, Storage};
use stockledger_core::{MovementId, ProductId, StorageId};
use stockledger_inventory::{
    Direction, MovementKind, NewMovement, StockLevel, StockMovement, StockTotals,
};

use super::filter::{MovementFilter, SortOrder};
use super::r#trait::{Catalog, LedgerStore, MovementStream};
use crate::config::DatabaseConfig;
use crate::error::LedgerError;

/// DDL for the ledger tables. Idempotent.
pub const SCHEMA: &str = include_str!("schema.sql");

macro_rules! movement_select {
    () => {
        r#"
        SELECT
            id,
            product_id,
            storage_id,
            direction,
            type,
            quantity,
            unit_cost,
            reference_type,
            reference_id,
            moved_at,
            note,
            metadata,
            created_at,
            deleted_at
        FROM stock_movements
        "#
    };
}

macro_rules! movement_listing {
    ($order:literal) => {
        concat!(
            movement_select!(),
            r#"
        WHERE ($1::bigint IS NULL OR product_id = $1)
            AND ($2::bigint IS NULL OR storage_id = $2)
            AND ($3::text IS NULL OR direction = $3)
            AND ($4::text IS NULL OR type = $4)
            AND ($5::timestamptz IS NULL OR moved_at >= $5)
            AND ($6::timestamptz IS NULL OR moved_at <= $6)
            AND ($7 OR deleted_at IS NULL)
        ORDER BY "#,
            $order
        )
    };
}

const LIST_ASC: &str = movement_listing!("moved_at ASC, id ASC");
const LIST_DESC: &str = movement_listing!("moved_at DESC, id DESC");

const TOTALS_COLUMNS: &str = r#"
    COALESCE(SUM(quantity) FILTER (WHERE direction = 'in'), 0) AS inbound,
    COALESCE(SUM(quantity) FILTER (WHERE direction = 'out'), 0) AS outbound,
    COALESCE(
        SUM(quantity * unit_cost) FILTER (WHERE direction = 'in' AND unit_cost IS NOT NULL),
        0
    ) AS inbound_value,
    COALESCE(
        SUM(quantity) FILTER (WHERE direction = 'in' AND unit_cost IS NOT NULL),
        0
    ) AS costed_inbound
"#;

/// Postgres-backed append-only ledger and catalog.
///
/// Each write is a single statement or a single transaction; aggregates run
/// against committed rows only.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
}

impl PostgresLedgerStore {
    /// Create a store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool from configuration.
    ///
    /// Every connection runs with the configured `statement_timeout`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, LedgerError> {
        let options = PgConnectOptions::from_str(&config.url)
            .map_err(|e| LedgerError::Config(format!("invalid database url: {e}")))?
            .options([("statement_timeout", format!("{}s", config.statement_timeout_secs))]);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.statement_timeout_secs.max(1)))
            .connect_with(options)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        tracing::info!(max_connections = config.max_connections, "connected to postgres");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create tables and indexes if they do not exist.
    #[instrument(skip(self), err)]
    pub async fn apply_schema(&self) -> Result<(), LedgerError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("apply_schema", e))?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[instrument(skip(self, movements), fields(count = movements.len()), err)]
    async fn append(&self, movements: Vec<NewMovement>) -> Result<Vec<StockMovement>, LedgerError> {
        if movements.is_empty() {
            return Ok(vec![]);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let mut committed = Vec::with_capacity(movements.len());
        for m in movements {
            let row = sqlx::query(
                r#"
                INSERT INTO stock_movements (
                    product_id,
                    storage_id,
                    direction,
                    type,
                    quantity,
                    unit_cost,
                    reference_type,
                    reference_id,
                    moved_at,
                    note,
                    metadata
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                RETURNING id, created_at
                "#,
            )
            .bind(m.product_id.get())
            .bind(m.storage_id.get())
            .bind(m.direction.as_str())
            .bind(m.kind.as_str())
            .bind(m.quantity)
            .bind(m.unit_cost)
            .bind(m.reference_type.as_deref())
            .bind(m.reference_id.as_deref())
            .bind(m.moved_at)
            .bind(m.note.as_deref())
            .bind(m.metadata.as_ref())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    LedgerError::NotFound(format!(
                        "product {} or storage {}",
                        m.product_id, m.storage_id
                    ))
                } else {
                    map_sqlx_error("insert_movement", e)
                }
            })?;

            let id: i64 = row.try_get("id").map_err(|e| decode_error("id", e))?;
            let created_at: DateTime<Utc> =
                row.try_get("created_at").map_err(|e| decode_error("created_at", e))?;
            committed.push(m.into_movement(MovementId::new(id), created_at));
        }

        // All or nothing: dropping `tx` on an early return rolls back.
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(committed)
    }

    #[instrument(skip(self), fields(movement_id = %id), err)]
    async fn get(
        &self,
        id: MovementId,
        include_deleted: bool,
    ) -> Result<Option<StockMovement>, LedgerError> {
        let row = sqlx::query(concat!(
            movement_select!(),
            "WHERE id = $1 AND ($2 OR deleted_at IS NULL)"
        ))
        .bind(id.get())
        .bind(include_deleted)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_movement", e))?;

        row.map(|r| decode_movement(&r)).transpose()
    }

    fn stream(&self, filter: MovementFilter) -> MovementStream<'_> {
        let sql = match filter.order {
            SortOrder::Ascending => LIST_ASC,
            SortOrder::Descending => LIST_DESC,
        };

        sqlx::query(sql)
            .bind(filter.product_id.map(ProductId::get))
            .bind(filter.storage_id.map(StorageId::get))
            .bind(filter.direction.map(Direction::as_str))
            .bind(filter.kind.map(String::from))
            .bind(filter.moved_from)
            .bind(filter.moved_to)
            .bind(filter.include_deleted)
            .fetch(&*self.pool)
            .map(|row| {
                let row = row.map_err(|e| map_sqlx_error("stream_movements", e))?;
                decode_movement(&row)
            })
            .boxed()
    }

    #[instrument(skip(self), fields(product_id = %product_id, storage_id = ?storage_id), err)]
    async fn stock_totals(
        &self,
        product_id: ProductId,
        storage_id: Option<StorageId>,
    ) -> Result<StockTotals, LedgerError> {
        let sql = format!(
            "SELECT {TOTALS_COLUMNS} FROM stock_movements \
             WHERE product_id = $1 \
             AND ($2::bigint IS NULL OR storage_id = $2) \
             AND deleted_at IS NULL"
        );
        let row = sqlx::query(&sql)
            .bind(product_id.get())
            .bind(storage_id.map(StorageId::get))
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("stock_totals", e))?;

        decode_totals(&row)
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn stock_by_storage(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<StockLevel>, LedgerError> {
        let sql = format!(
            "SELECT storage_id, {TOTALS_COLUMNS} FROM stock_movements \
             WHERE product_id = $1 AND deleted_at IS NULL \
             GROUP BY storage_id ORDER BY storage_id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(product_id.get())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("stock_by_storage", e))?;

        rows.iter()
            .map(|row| {
                let storage_id: i64 = row
                    .try_get("storage_id")
                    .map_err(|e| decode_error("storage_id", e))?;
                Ok(StockLevel {
                    product_id,
                    storage_id: StorageId::new(storage_id),
                    totals: decode_totals(row)?,
                })
            })
            .collect()
    }

    #[instrument(skip(self), fields(movement_id = %id, deleting = deleted_at.is_some()), err)]
    async fn set_deleted(
        &self,
        id: MovementId,
        deleted_at: Option<DateTime<Utc>>,
    ) -> Result<StockMovement, LedgerError> {
        // State check and write in one statement.
        let row = sqlx::query(
            r#"
            UPDATE stock_movements
            SET deleted_at = $2, updated_at = NOW()
            WHERE id = $1
                AND (deleted_at IS NULL) = ($2::timestamptz IS NOT NULL)
            RETURNING
                id, product_id, storage_id, direction, type, quantity, unit_cost,
                reference_type, reference_id, moved_at, note, metadata, created_at, deleted_at
            "#,
        )
        .bind(id.get())
        .bind(deleted_at)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("set_deleted", e))?;

        if let Some(row) = row {
            return decode_movement(&row);
        }
        match self.get(id, true).await? {
            Some(_) if deleted_at.is_some() => Err(LedgerError::Validation(format!(
                "movement {id} is already deleted"
            ))),
            Some(_) => Err(LedgerError::Validation(format!("movement {id} is not deleted"))),
            None => Err(LedgerError::NotFound(format!("movement {id}"))),
        }
    }
}

#[async_trait]
impl Catalog for PostgresLedgerStore {
    #[instrument(skip(self, product), err)]
    async fn create_product(&self, product: NewProduct) -> Result<Product, LedgerError> {
        let product = product.validate()?;
        let row = sqlx::query(
            r#"
            INSERT INTO products (name, slug, price, is_active)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, slug, price, is_active, created_at, deleted_at
            "#,
        )
        .bind(&product.name)
        .bind(product.slug_or_empty())
        .bind(product.price)
        .bind(product.is_active)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_product", e))?;

        ProductRow::from_row(&row)
            .map(Product::from)
            .map_err(|e| decode_error("products", e))
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, slug, price, is_active, created_at, deleted_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_product", e))?;

        row.map(|r| {
            ProductRow::from_row(&r)
                .map(Product::from)
                .map_err(|e| decode_error("products", e))
        })
        .transpose()
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn soft_delete_product(&self, id: ProductId) -> Result<(), LedgerError> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET deleted_at = COALESCE(deleted_at, NOW()), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("soft_delete_product", e))?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::NotFound(format!("product {id}")));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn delete_product(&self, id: ProductId) -> Result<(), LedgerError> {
        // Movements go with it via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_product", e))?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::NotFound(format!("product {id}")));
        }
        Ok(())
    }

    #[instrument(skip(self, storage), err)]
    async fn create_storage(&self, storage: NewStorage) -> Result<Storage, LedgerError> {
        let storage = storage.validate()?;
        let row = sqlx::query(
            r#"
            INSERT INTO storages (name, code, description, location, is_active, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING
                id, name, code, description, location, is_active, metadata, created_at, deleted_at
            "#,
        )
        .bind(&storage.name)
        .bind(storage.code_or_empty())
        .bind(storage.description.as_deref())
        .bind(storage.location.as_deref())
        .bind(storage.is_active)
        .bind(storage.metadata.as_ref())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_storage", e))?;

        StorageRow::from_row(&row)
            .map(Storage::from)
            .map_err(|e| decode_error("storages", e))
    }

    #[instrument(skip(self), fields(storage_id = %id), err)]
    async fn get_storage(&self, id: StorageId) -> Result<Option<Storage>, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT
                id, name, code, description, location, is_active, metadata, created_at, deleted_at
            FROM storages
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_storage", e))?;

        row.map(|r| {
            StorageRow::from_row(&r)
                .map(Storage::from)
                .map_err(|e| decode_error("storages", e))
        })
        .transpose()
    }

    #[instrument(skip(self), fields(storage_id = %id), err)]
    async fn soft_delete_storage(&self, id: StorageId) -> Result<(), LedgerError> {
        let result = sqlx::query(
            r#"
            UPDATE storages
            SET deleted_at = COALESCE(deleted_at, NOW()), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("soft_delete_storage", e))?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::NotFound(format!("storage {id}")));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(storage_id = %id), err)]
    async fn delete_storage(&self, id: StorageId) -> Result<(), LedgerError> {
        let result = sqlx::query("DELETE FROM storages WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_storage", e))?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::NotFound(format!("storage {id}")));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn product_exists(&self, id: ProductId) -> Result<bool, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM products WHERE id = $1 AND deleted_at IS NULL
            ) AS present
            "#,
        )
        .bind(id.get())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("product_exists", e))?;

        row.try_get("present").map_err(|e| decode_error("present", e))
    }

    #[instrument(skip(self), fields(storage_id = %id), err)]
    async fn storage_exists(&self, id: StorageId) -> Result<bool, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM storages WHERE id = $1 AND deleted_at IS NULL
            ) AS present
            "#,
        )
        .bind(id.get())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("storage_exists", e))?;

        row.try_get("present").map_err(|e| decode_error("present", e))
    }
}

/// Map SQLx errors to LedgerError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> LedgerError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23503") => LedgerError::NotFound(msg),
                Some("23505") => LedgerError::Conflict(msg),
                Some("23514") => LedgerError::Validation(msg),
                _ => LedgerError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            LedgerError::Storage(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::PoolTimedOut => {
            LedgerError::Storage(format!("timed out acquiring a connection in {}", operation))
        }
        _ => LedgerError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().as_deref() == Some("23503");
    }
    false
}

fn decode_error(column: &str, err: sqlx::Error) -> LedgerError {
    LedgerError::Storage(format!("failed to decode {column}: {err}"))
}

fn decode_totals(row: &PgRow) -> Result<StockTotals, LedgerError> {
    let get = |column: &str| -> Result<Decimal, LedgerError> {
        row.try_get(column).map_err(|e| decode_error(column, e))
    };
    Ok(StockTotals {
        inbound: get("inbound")?,
        outbound: get("outbound")?,
        inbound_value: get("inbound_value")?,
        costed_inbound: get("costed_inbound")?,
    })
}

fn decode_movement(row: &PgRow) -> Result<StockMovement, LedgerError> {
    let raw = MovementRow::from_row(row).map_err(|e| decode_error("stock_movements", e))?;
    raw.try_into()
}

// SQLx row types

#[derive(Debug)]
struct MovementRow {
    id: i64,
    product_id: i64,
    storage_id: i64,
    direction: String,
    kind: String,
    quantity: Decimal,
    unit_cost: Option<Decimal>,
    reference_type: Option<String>,
    reference_id: Option<String>,
    moved_at: DateTime<Utc>,
    note: Option<String>,
    metadata: Option<JsonValue>,
    created_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl<'r> FromRow<'r, PgRow> for MovementRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(MovementRow {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            storage_id: row.try_get("storage_id")?,
            direction: row.try_get("direction")?,
            kind: row.try_get("type")?,
            quantity: row.try_get("quantity")?,
            unit_cost: row.try_get("unit_cost")?,
            reference_type: row.try_get("reference_type")?,
            reference_id: row.try_get("reference_id")?,
            moved_at: row.try_get("moved_at")?,
            note: row.try_get("note")?,
            metadata: row.try_get("metadata")?,
            created_at: row.try_get("created_at")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }
}

impl TryFrom<MovementRow> for StockMovement {
    type Error = LedgerError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        let direction: Direction = row
            .direction
            .parse()
            .map_err(|e| {
                LedgerError::Storage(format!("movement {} has corrupt direction: {e}", row.id))
            })?;
        let kind: MovementKind = row
            .kind
            .parse()
            .map_err(|e| {
                LedgerError::Storage(format!("movement {} has corrupt type: {e}", row.id))
            })?;

        Ok(StockMovement {
            id: MovementId::new(row.id),
            product_id: ProductId::new(row.product_id),
            storage_id: StorageId::new(row.storage_id),
            direction,
            kind,
            quantity: row.quantity,
            unit_cost: row.unit_cost,
            reference_type: row.reference_type,
            reference_id: row.reference_id,
            moved_at: row.moved_at,
            note: row.note,
            metadata: row.metadata,
            created_at: row.created_at,
            deleted_at: row.deleted_at,
        })
    }
}

#[derive(Debug)]
struct ProductRow {
    id: i64,
    name: String,
    slug: String,
    price: Decimal,
    is_active: bool,
    created_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl<'r> FromRow<'r, PgRow> for ProductRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            slug: row.try_get("slug")?,
            price: row.try_get("price")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: ProductId::new(row.id),
            name: row.name,
            slug: row.slug,
            price: row.price,
            is_active: row.is_active,
            created_at: row.created_at,
            deleted_at: row.deleted_at,
        }
    }
}

#[derive(Debug)]
struct StorageRow {
    id: i64,
    name: String,
    code: String,
    description: Option<String>,
    location: Option<String>,
    is_active: bool,
    metadata: Option<JsonValue>,
    created_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl<'r> FromRow<'r, PgRow> for StorageRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(StorageRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            code: row.try_get("code")?,
            description: row.try_get("description")?,
            location: row.try_get("location")?,
            is_active: row.try_get("is_active")?,
            metadata: row.try_get("metadata")?,
            created_at: row.try_get("created_at")?,
            deleted_at: row.try_get("deleted_at")?,
        })
    }
}

impl From<StorageRow> for Storage {
    fn from(row: StorageRow) -> Self {
        Storage {
            id: StorageId::new(row.id),
            name: row.name,
            code: row.code,
            description: row.description,
            location: row.location,
            is_active: row.is_active,
            metadata: row.metadata,
            created_at: row.created_at,
            deleted_at: row.deleted_at,
        }
    }
}
