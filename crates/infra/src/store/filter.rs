//! Movement listing filters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{ProductId, SoftDeletable, StorageId};
use stockledger_inventory::{Direction, MovementKind, StockMovement};

/// Ordering of listed movements by `moved_at` (ties broken by id).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Filter criteria for listing movements. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementFilter {
    pub product_id: Option<ProductId>,
    pub storage_id: Option<StorageId>,
    pub direction: Option<Direction>,
    pub kind: Option<MovementKind>,
    /// Inclusive lower bound on `moved_at`.
    pub moved_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `moved_at`.
    pub moved_to: Option<DateTime<Utc>>,
    /// Include soft-deleted rows (audit listing).
    pub include_deleted: bool,
    pub order: SortOrder,
}

impl MovementFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_product(product_id: ProductId) -> Self {
        Self {
            product_id: Some(product_id),
            ..Self::default()
        }
    }

    pub fn in_storage(mut self, storage_id: StorageId) -> Self {
        self.storage_id = Some(storage_id);
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn inbound(self) -> Self {
        self.direction(Direction::In)
    }

    pub fn outbound(self) -> Self {
        self.direction(Direction::Out)
    }

    pub fn kind(mut self, kind: MovementKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn moved_between(mut self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        self.moved_from = from;
        self.moved_to = to;
        self
    }

    pub fn with_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    pub fn newest_first(mut self) -> Self {
        self.order = SortOrder::Descending;
        self
    }

    /// In-process evaluation of the filter (used by the in-memory store).
    pub fn matches(&self, m: &StockMovement) -> bool {
        if !self.include_deleted && m.is_deleted() {
            return false;
        }
        if self.product_id.is_some_and(|p| p != m.product_id) {
            return false;
        }
        if self.storage_id.is_some_and(|s| s != m.storage_id) {
            return false;
        }
        if self.direction.is_some_and(|d| d != m.direction) {
            return false;
        }
        if self.kind.as_ref().is_some_and(|k| *k != m.kind) {
            return false;
        }
        if self.moved_from.is_some_and(|from| m.moved_at < from) {
            return false;
        }
        if self.moved_to.is_some_and(|to| m.moved_at > to) {
            return false;
        }
        true
    }
}
