//! Stock aggregation over the movement log.
//!
//! Stock is never stored: every figure here is folded from movements on
//! demand. Soft-deleted movements never contribute.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{ProductId, SoftDeletable, StorageId};

use crate::movement::{Direction, StockMovement};

/// Aggregated inbound/outbound figures for one inventory line (or a product).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTotals {
    pub inbound: Decimal,
    pub outbound: Decimal,
    /// Sum of `quantity * unit_cost` over inbound movements carrying a cost.
    pub inbound_value: Decimal,
    /// Inbound quantity that carried a cost.
    pub costed_inbound: Decimal,
}

impl StockTotals {
    /// Fold movements, skipping soft-deleted ones.
    pub fn from_movements<'a>(movements: impl IntoIterator<Item = &'a StockMovement>) -> Self {
        let mut totals = Self::default();
        for m in movements {
            totals.add(m);
        }
        totals
    }

    pub fn add(&mut self, movement: &StockMovement) {
        if movement.is_deleted() {
            return;
        }
        match movement.direction {
            Direction::In => {
                self.inbound += movement.quantity;
                if let Some(value) = movement.inbound_value() {
                    self.inbound_value += value;
                    self.costed_inbound += movement.quantity;
                }
            }
            Direction::Out => self.outbound += movement.quantity,
        }
    }

    /// `sum(in) - sum(out)`; may be negative.
    pub fn on_hand(&self) -> Decimal {
        self.inbound - self.outbound
    }

    /// Weighted average cost of costed inbound stock, rounded to cents.
    pub fn average_inbound_cost(&self) -> Option<Decimal> {
        if self.costed_inbound.is_zero() {
            return None;
        }
        Some((self.inbound_value / self.costed_inbound).round_dp(2))
    }
}

/// Stock of one product in one storage.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub product_id: ProductId,
    pub storage_id: StorageId,
    pub totals: StockTotals,
}

impl StockLevel {
    pub fn quantity(&self) -> Decimal {
        self.totals.on_hand()
    }
}

/// Current stock: `sum(in) - sum(out)` over live movements.
pub fn current_stock<'a>(movements: impl IntoIterator<Item = &'a StockMovement>) -> Decimal {
    StockTotals::from_movements(movements).on_hand()
}

/// Per-storage breakdown for one product, ordered by storage id.
///
/// Storages whose movements are all soft-deleted are omitted.
pub fn levels_by_storage<'a>(
    product_id: ProductId,
    movements: impl IntoIterator<Item = &'a StockMovement>,
) -> Vec<StockLevel> {
    let mut by_storage: BTreeMap<StorageId, StockTotals> = BTreeMap::new();
    for m in movements {
        if m.product_id != product_id || m.is_deleted() {
            continue;
        }
        by_storage.entry(m.storage_id).or_default().add(m);
    }

    by_storage
        .into_iter()
        .map(|(storage_id, totals)| StockLevel {
            product_id,
            storage_id,
            totals,
        })
        .collect()
}
