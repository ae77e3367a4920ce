//! Fixed-point representation of quantities and money
//!
//! The store keeps volumes and quantities as integer thousandths and money as
//! integer hundredths, so that comparisons and decrements are exact and can be
//! performed atomically by the database.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places kept for quantities and volumes (kg, l, pcs)
pub const QUANTITY_SCALE: u32 = 3;

/// Decimal places kept for money (roubles and kopecks)
pub const MONEY_SCALE: u32 = 2;

/// Round a value to the given number of decimal places, half away from zero
pub fn round_to(value: Decimal, scale: u32) -> Decimal {
    value.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert a decimal into its fixed-point integer form.
///
/// Returns `None` when the value does not fit into an `i64` after scaling.
pub fn to_fixed(value: Decimal, scale: u32) -> Option<i64> {
    let factor = Decimal::from(10i64.checked_pow(scale)?);
    round_to(value, scale).checked_mul(factor)?.trunc().to_i64()
}

/// Convert a fixed-point integer back into a decimal
pub fn from_fixed(raw: i64, scale: u32) -> Decimal {
    Decimal::new(raw, scale).normalize()
}

pub fn quantity_to_fixed(value: Decimal) -> Option<i64> {
    to_fixed(value, QUANTITY_SCALE)
}

pub fn quantity_from_fixed(raw: i64) -> Decimal {
    from_fixed(raw, QUANTITY_SCALE)
}

pub fn money_to_fixed(value: Decimal) -> Option<i64> {
    to_fixed(value, MONEY_SCALE)
}

pub fn money_from_fixed(raw: i64) -> Decimal {
    from_fixed(raw, MONEY_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_quantity_round_trip_keeps_three_places() {
        assert_eq!(quantity_to_fixed(dec("12.5")), Some(12_500));
        assert_eq!(quantity_from_fixed(12_500), dec("12.5"));
        assert_eq!(quantity_to_fixed(dec("0.0004")), Some(0));
        assert_eq!(quantity_to_fixed(dec("0.0005")), Some(1));
    }

    #[test]
    fn test_money_rounds_half_away_from_zero() {
        assert_eq!(money_to_fixed(dec("600")), Some(60_000));
        assert_eq!(money_to_fixed(dec("10.005")), Some(1_001));
        assert_eq!(money_to_fixed(dec("-10.005")), Some(-1_001));
    }

    #[test]
    fn test_overflow_is_reported() {
        assert_eq!(money_to_fixed(Decimal::MAX), None);
    }

    proptest! {
        #[test]
        fn prop_fixed_point_is_exact_for_representable_values(raw in -1_000_000_000i64..1_000_000_000) {
            let value = quantity_from_fixed(raw);
            prop_assert_eq!(quantity_to_fixed(value), Some(raw));
        }
    }
}
