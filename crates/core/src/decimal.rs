//! `decimal(12,2)` column helpers.
//!
//! Quantities, unit costs and prices are persisted as `NUMERIC(12,2)`: at most
//! ten integral digits and two fractional digits.

use rust_decimal::Decimal;

use crate::error::{DomainError, DomainResult};

/// Largest magnitude representable by `decimal(12,2)`: `9999999999.99`.
pub const MAX_DECIMAL_12_2: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2);

/// Check that `value` fits `decimal(12,2)` without rounding.
///
/// Returns the value rescaled to exactly two fractional digits so every
/// backend stores and compares the same representation.
pub fn check_decimal_12_2(field: &str, value: Decimal) -> DomainResult<Decimal> {
    if value.abs() > MAX_DECIMAL_12_2 {
        return Err(DomainError::validation(format!(
            "{field} exceeds {MAX_DECIMAL_12_2}"
        )));
    }
    if value.normalize().scale() > 2 {
        return Err(DomainError::validation(format!(
            "{field} has more than 2 decimal places: {value}"
        )));
    }
    let mut out = value;
    out.rescale(2);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn max_constant_matches_column_bound() {
        assert_eq!(MAX_DECIMAL_12_2, dec!(9999999999.99));
    }

    #[test]
    fn accepts_and_rescales() {
        let v = check_decimal_12_2("quantity", dec!(5)).unwrap();
        assert_eq!(v, dec!(5.00));
        assert_eq!(v.scale(), 2);
        // Trailing zeros beyond two places are not real precision.
        assert_eq!(check_decimal_12_2("quantity", dec!(1.2500)).unwrap(), dec!(1.25));
    }

    #[test]
    fn rejects_excess_scale() {
        let err = check_decimal_12_2("quantity", dec!(1.005)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("decimal places")));
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(check_decimal_12_2("unit_cost", dec!(10000000000)).is_err());
        assert!(check_decimal_12_2("unit_cost", dec!(-10000000000)).is_err());
        assert!(check_decimal_12_2("unit_cost", MAX_DECIMAL_12_2).is_ok());
    }
}
