use chrono::{DateTime, SubsecRound, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use stockledger_core::{
    DomainError, DomainResult, MovementId, ProductId, StorageId, check_decimal_12_2,
};

use crate::movement::{Direction, MovementKind, StockMovement};

/// Maximum length of `reference_type` / `reference_id` (`string(255)`).
pub const REFERENCE_MAX_LEN: usize = 255;

/// Reference type stamped on both legs of a transfer.
pub const TRANSFER_REFERENCE_TYPE: &str = "transfer";

/// Command: record one inventory change, as submitted by a caller.
///
/// `direction` and `kind` arrive as text (form input, import rows) and are
/// parsed during validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMovement {
    pub product_id: ProductId,
    pub storage_id: StorageId,
    pub direction: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub quantity: Decimal,
    pub unit_cost: Option<Decimal>,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    /// Defaults to the validation time when absent.
    pub moved_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
    pub metadata: Option<JsonValue>,
}

impl RecordMovement {
    pub fn new(
        product_id: ProductId,
        storage_id: StorageId,
        direction: impl Into<String>,
        kind: impl Into<String>,
        quantity: Decimal,
    ) -> Self {
        Self {
            product_id,
            storage_id,
            direction: direction.into(),
            kind: kind.into(),
            quantity,
            unit_cost: None,
            reference_type: None,
            reference_id: None,
            moved_at: None,
            note: None,
            metadata: None,
        }
    }

    pub fn inbound(
        product_id: ProductId,
        storage_id: StorageId,
        kind: impl Into<String>,
        quantity: Decimal,
    ) -> Self {
        Self::new(product_id, storage_id, Direction::In.as_str(), kind, quantity)
    }

    pub fn outbound(
        product_id: ProductId,
        storage_id: StorageId,
        kind: impl Into<String>,
        quantity: Decimal,
    ) -> Self {
        Self::new(product_id, storage_id, Direction::Out.as_str(), kind, quantity)
    }

    pub fn with_unit_cost(mut self, unit_cost: Decimal) -> Self {
        self.unit_cost = Some(unit_cost);
        self
    }

    pub fn with_reference(
        mut self,
        reference_type: impl Into<String>,
        reference_id: impl Into<String>,
    ) -> Self {
        self.reference_type = Some(reference_type.into());
        self.reference_id = Some(reference_id.into());
        self
    }

    pub fn moved_at(mut self, moved_at: DateTime<Utc>) -> Self {
        self.moved_at = Some(moved_at);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Validate input shape and resolve defaults.
    ///
    /// Does not look at existing stock: outbound movements may exceed what is
    /// on hand.
    pub fn validate(self, now: DateTime<Utc>) -> DomainResult<NewMovement> {
        let direction: Direction = self.direction.parse()?;
        let kind: MovementKind = self.kind.parse()?;
        let quantity = check_quantity(self.quantity)?;

        let unit_cost = match self.unit_cost {
            Some(cost) if cost < Decimal::ZERO => {
                return Err(DomainError::validation("unit_cost cannot be negative"));
            }
            Some(cost) => Some(check_decimal_12_2("unit_cost", cost)?),
            None => None,
        };

        if let Some(meta) = &self.metadata {
            if !meta.is_object() {
                return Err(DomainError::validation("metadata must be a JSON object"));
            }
        }

        Ok(NewMovement {
            product_id: self.product_id,
            storage_id: self.storage_id,
            direction,
            kind,
            quantity,
            unit_cost,
            reference_type: bounded_text("reference_type", self.reference_type)?,
            reference_id: bounded_text("reference_id", self.reference_id)?,
            moved_at: self.moved_at.unwrap_or(now).trunc_subsecs(6),
            note: self.note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            metadata: self.metadata,
        })
    }
}

/// A validated movement, ready to be appended by a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMovement {
    pub product_id: ProductId,
    pub storage_id: StorageId,
    pub direction: Direction,
    #[serde(rename = "type")]
    pub kind: MovementKind,
    pub quantity: Decimal,
    pub unit_cost: Option<Decimal>,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub moved_at: DateTime<Utc>,
    pub note: Option<String>,
    pub metadata: Option<JsonValue>,
}

impl NewMovement {
    /// Materialize the stored record once the store has assigned identity.
    pub fn into_movement(self, id: MovementId, created_at: DateTime<Utc>) -> StockMovement {
        StockMovement {
            id,
            product_id: self.product_id,
            storage_id: self.storage_id,
            direction: self.direction,
            kind: self.kind,
            quantity: self.quantity,
            unit_cost: self.unit_cost,
            reference_type: self.reference_type,
            reference_id: self.reference_id,
            moved_at: self.moved_at,
            note: self.note,
            metadata: self.metadata,
            created_at,
            deleted_at: None,
        }
    }
}

/// Command: move stock of one product between two storages.
///
/// Produces a `transfer_out` leg in `from` and a `transfer_in` leg in `to`
/// sharing one reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub product_id: ProductId,
    pub from: StorageId,
    pub to: StorageId,
    pub quantity: Decimal,
    pub unit_cost: Option<Decimal>,
    pub moved_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

impl Transfer {
    pub fn new(product_id: ProductId, from: StorageId, to: StorageId, quantity: Decimal) -> Self {
        Self {
            product_id,
            from,
            to,
            quantity,
            unit_cost: None,
            moved_at: None,
            note: None,
        }
    }

    /// Validate and expand into the outbound and inbound legs, in that order.
    pub fn into_legs(
        self,
        reference_id: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<[NewMovement; 2]> {
        if self.from == self.to {
            return Err(DomainError::validation(format!(
                "transfer source and destination are the same storage ({})",
                self.from
            )));
        }

        let leg = |storage_id: StorageId, direction: Direction, kind: MovementKind| {
            let mut cmd = RecordMovement::new(
                self.product_id,
                storage_id,
                direction.as_str(),
                kind.as_str(),
                self.quantity,
            )
            .with_reference(TRANSFER_REFERENCE_TYPE, reference_id);
            cmd.unit_cost = self.unit_cost;
            cmd.moved_at = self.moved_at;
            cmd.note = self.note.clone();
            cmd.validate(now)
        };

        let out = leg(self.from, Direction::Out, MovementKind::TransferOut)?;
        let inbound = leg(self.to, Direction::In, MovementKind::TransferIn)?;
        Ok([out, inbound])
    }
}

fn check_quantity(quantity: Decimal) -> DomainResult<Decimal> {
    if quantity <= Decimal::ZERO {
        return Err(DomainError::validation(format!(
            "quantity must be positive, got {quantity}"
        )));
    }
    check_decimal_12_2("quantity", quantity)
}

fn bounded_text(field: &str, value: Option<String>) -> DomainResult<Option<String>> {
    let Some(value) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if value.chars().count() > REFERENCE_MAX_LEN {
        return Err(DomainError::validation(format!(
            "{field} longer than {REFERENCE_MAX_LEN} characters"
        )));
    }
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn product() -> ProductId {
        ProductId::new(1)
    }

    fn storage() -> StorageId {
        StorageId::new(10)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn validate_resolves_defaults() {
        let m = RecordMovement::inbound(product(), storage(), "purchase", dec!(100))
            .with_unit_cost(dec!(3.5))
            .validate(now())
            .unwrap();
        assert_eq!(m.direction, Direction::In);
        assert_eq!(m.kind, MovementKind::Purchase);
        assert_eq!(m.quantity, dec!(100.00));
        assert_eq!(m.unit_cost, Some(dec!(3.50)));
        assert_eq!(m.moved_at, now());
    }

    #[test]
    fn explicit_moved_at_is_kept() {
        let earlier = Utc.with_ymd_and_hms(2025, 12, 24, 8, 30, 0).unwrap();
        let m = RecordMovement::outbound(product(), storage(), "sale", dec!(1))
            .moved_at(earlier)
            .validate(now())
            .unwrap();
        assert_eq!(m.moved_at, earlier);
    }

    #[test]
    fn moved_at_is_truncated_to_microseconds() {
        let precise = now() + chrono::Duration::nanoseconds(123_456_789);
        let m = RecordMovement::inbound(product(), storage(), "adjust", dec!(1))
            .moved_at(precise)
            .validate(now())
            .unwrap();
        assert_eq!(m.moved_at, now() + chrono::Duration::microseconds(123_456));
    }

    #[test]
    fn reference_text_is_bounded() {
        let at_limit = "r".repeat(REFERENCE_MAX_LEN);
        let m = RecordMovement::inbound(product(), storage(), "purchase", dec!(1))
            .with_reference(at_limit.clone(), at_limit.clone())
            .validate(now())
            .unwrap();
        assert_eq!(m.reference_id.as_deref(), Some(at_limit.as_str()));

        let too_long = "r".repeat(REFERENCE_MAX_LEN + 1);
        let err = RecordMovement::inbound(product(), storage(), "purchase", dec!(1))
            .with_reference("purchase_order", too_long.clone())
            .validate(now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("reference_id")));

        let err = RecordMovement::inbound(product(), storage(), "purchase", dec!(1))
            .with_reference(too_long, "PO-1")
            .validate(now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("reference_type")));
    }

    #[test]
    fn rejects_zero_and_negative_quantity() {
        for q in [dec!(0), dec!(-5)] {
            let err = RecordMovement::inbound(product(), storage(), "adjust", q)
                .validate(now())
                .unwrap_err();
            assert!(matches!(err, DomainError::Validation(msg) if msg.contains("positive")));
        }
    }

    #[test]
    fn rejects_invalid_direction() {
        let err = RecordMovement::new(product(), storage(), "both", "adjust", dec!(1))
            .validate(now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn rejects_negative_unit_cost_and_non_object_metadata() {
        let err = RecordMovement::inbound(product(), storage(), "purchase", dec!(1))
            .with_unit_cost(dec!(-0.01))
            .validate(now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = RecordMovement::inbound(product(), storage(), "purchase", dec!(1))
            .with_metadata(json!("import"))
            .validate(now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("metadata")));
    }

    #[test]
    fn blank_optional_text_becomes_none() {
        let m = RecordMovement::inbound(product(), storage(), "return", dec!(2))
            .with_reference("  ", "")
            .with_note("   ")
            .validate(now())
            .unwrap();
        assert_eq!(m.reference_type, None);
        assert_eq!(m.reference_id, None);
        assert_eq!(m.note, None);
    }

    #[test]
    fn transfer_expands_into_two_legs() {
        let legs = Transfer::new(product(), StorageId::new(1), StorageId::new(2), dec!(7))
            .into_legs("ref-1", now())
            .unwrap();
        let [out, inbound] = legs;
        assert_eq!(
            (out.direction, &out.kind, out.storage_id),
            (Direction::Out, &MovementKind::TransferOut, StorageId::new(1))
        );
        assert_eq!(
            (inbound.direction, &inbound.kind, inbound.storage_id),
            (Direction::In, &MovementKind::TransferIn, StorageId::new(2))
        );
        assert_eq!(out.reference_id.as_deref(), Some("ref-1"));
        assert_eq!(inbound.reference_type.as_deref(), Some(TRANSFER_REFERENCE_TYPE));
    }

    #[test]
    fn transfer_to_same_storage_is_rejected() {
        let err = Transfer::new(product(), storage(), storage(), dec!(1))
            .into_legs("ref", now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("same storage")));
    }
}
