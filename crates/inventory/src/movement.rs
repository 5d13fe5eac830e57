use core::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use stockledger_core::{
    DomainError, Entity, MovementId, ProductId, SoftDeletable, StorageId, ValueObject,
};

/// Maximum length of a movement kind (`type` column, `string(32)`).
pub const MOVEMENT_KIND_MAX_LEN: usize = 32;

/// Whether a movement adds stock to or removes stock from a storage.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }

    /// `+1` for inbound, `-1` for outbound.
    pub fn sign(self) -> Decimal {
        match self {
            Direction::In => Decimal::ONE,
            Direction::Out => Decimal::NEGATIVE_ONE,
        }
    }
}

impl ValueObject for Direction {}

impl core::fmt::Display for Direction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in" => Ok(Direction::In),
            "out" => Ok(Direction::Out),
            other => Err(DomainError::validation(format!(
                "direction must be 'in' or 'out', got '{other}'"
            ))),
        }
    }
}

/// Business category of a movement.
///
/// The column is free text; the well-known categories get their own variants
/// and anything else is preserved verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum MovementKind {
    Purchase,
    Sale,
    Adjust,
    TransferIn,
    TransferOut,
    Return,
    Damage,
    Other(String),
}

impl MovementKind {
    pub fn as_str(&self) -> &str {
        match self {
            MovementKind::Purchase => "purchase",
            MovementKind::Sale => "sale",
            MovementKind::Adjust => "adjust",
            MovementKind::TransferIn => "transfer_in",
            MovementKind::TransferOut => "transfer_out",
            MovementKind::Return => "return",
            MovementKind::Damage => "damage",
            MovementKind::Other(s) => s,
        }
    }
}

impl ValueObject for MovementKind {}

impl core::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DomainError::validation("movement type cannot be empty"));
        }
        if s.chars().count() > MOVEMENT_KIND_MAX_LEN {
            return Err(DomainError::validation(format!(
                "movement type longer than {MOVEMENT_KIND_MAX_LEN} characters"
            )));
        }
        // Known kinds match case-insensitively; anything else is kept verbatim.
        Ok(match s.to_ascii_lowercase().as_str() {
            "purchase" => MovementKind::Purchase,
            "sale" => MovementKind::Sale,
            "adjust" => MovementKind::Adjust,
            "transfer_in" => MovementKind::TransferIn,
            "transfer_out" => MovementKind::TransferOut,
            "return" => MovementKind::Return,
            "damage" => MovementKind::Damage,
            _ => MovementKind::Other(s.to_string()),
        })
    }
}

impl From<MovementKind> for String {
    fn from(value: MovementKind) -> Self {
        match value {
            MovementKind::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl TryFrom<String> for MovementKind {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Append-only ledger entry.
///
/// Only `deleted_at` ever changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub storage_id: StorageId,
    pub direction: Direction,
    #[serde(rename = "type")]
    pub kind: MovementKind,
    /// Positive magnitude; the sign comes from `direction`.
    pub quantity: Decimal,
    pub unit_cost: Option<Decimal>,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    /// Effective (business) time of the movement.
    pub moved_at: DateTime<Utc>,
    pub note: Option<String>,
    pub metadata: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl StockMovement {
    /// Quantity with the direction applied.
    pub fn signed_quantity(&self) -> Decimal {
        self.direction.sign() * self.quantity
    }

    /// `quantity * unit_cost` for costed inbound movements.
    pub fn inbound_value(&self) -> Option<Decimal> {
        match (self.direction, self.unit_cost) {
            (Direction::In, Some(cost)) => Some(self.quantity * cost),
            _ => None,
        }
    }
}

impl Entity for StockMovement {
    type Id = MovementId;

    fn id(&self) -> MovementId {
        self.id
    }
}

impl SoftDeletable for StockMovement {
    fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn direction_parses_case_insensitively() {
        assert_eq!(" IN ".parse::<Direction>().unwrap(), Direction::In);
        assert_eq!("out".parse::<Direction>().unwrap(), Direction::Out);
    }

    #[test]
    fn direction_rejects_unknown_values() {
        let err = "sideways".parse::<Direction>().unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("sideways")));
    }

    #[test]
    fn known_kinds_round_trip_through_strings() {
        for s in ["purchase", "sale", "adjust", "transfer_in", "transfer_out", "return", "damage"] {
            let kind: MovementKind = s.parse().unwrap();
            assert!(!matches!(kind, MovementKind::Other(_)), "{s} should be a known kind");
            assert_eq!(String::from(kind), s);
        }
    }

    #[test]
    fn unknown_kind_is_preserved() {
        let kind: MovementKind = "stocktake".parse().unwrap();
        assert_eq!(kind, MovementKind::Other("stocktake".to_string()));
        assert_eq!(kind.as_str(), "stocktake");
    }

    #[test]
    fn known_kinds_ignore_case() {
        assert_eq!("Sale".parse::<MovementKind>().unwrap(), MovementKind::Sale);
        assert_eq!(" TRANSFER_OUT ".parse::<MovementKind>().unwrap(), MovementKind::TransferOut);
        // Custom kinds keep the caller's spelling.
        assert_eq!(
            "StockTake".parse::<MovementKind>().unwrap(),
            MovementKind::Other("StockTake".to_string())
        );
    }

    #[test]
    fn kind_length_is_bounded() {
        let long = "x".repeat(MOVEMENT_KIND_MAX_LEN + 1);
        assert!(long.parse::<MovementKind>().is_err());
        assert!("".parse::<MovementKind>().is_err());
    }

    #[test]
    fn movement_serializes_kind_as_type_column() {
        let m = StockMovement {
            id: MovementId::new(1),
            product_id: ProductId::new(1),
            storage_id: StorageId::new(1),
            direction: Direction::Out,
            kind: MovementKind::Sale,
            quantity: dec!(2.00),
            unit_cost: None,
            reference_type: None,
            reference_id: None,
            moved_at: Utc::now(),
            note: None,
            metadata: None,
            created_at: Utc::now(),
            deleted_at: None,
        };
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["type"], "sale");
        assert_eq!(json["direction"], "out");
        assert_eq!(m.signed_quantity(), dec!(-2));
        assert_eq!(m.inbound_value(), None);
    }
}
