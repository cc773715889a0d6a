//! Order money arithmetic.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Totals charged for an order, all in USD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    /// Sum `(unit_price, quantity)` lines and add shipping.
    pub fn compute<I>(lines: I, shipping: Decimal) -> Self
    where
        I: IntoIterator<Item = (Decimal, u32)>,
    {
        let subtotal = lines
            .into_iter()
            .map(|(price, qty)| price * Decimal::from(qty))
            .sum::<Decimal>();
        Self {
            subtotal,
            shipping,
            total: subtotal + shipping,
        }
    }
}

/// Convert a major-unit amount to integer minor units (cents), as required
/// by the redirect gateway. Returns `None` on overflow.
#[must_use]
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_plus_rest_of_world_shipping() {
        let totals = OrderTotals::compute([(Decimal::from(10), 2)], Decimal::from(15));
        assert_eq!(totals.subtotal, Decimal::from(20));
        assert_eq!(totals.total, Decimal::from(35));
    }

    #[test]
    fn test_empty_lines() {
        let totals = OrderTotals::compute(std::iter::empty(), Decimal::ZERO);
        assert_eq!(totals.total, Decimal::ZERO);
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(to_minor_units(Decimal::new(3550, 2)), Some(3550));
        assert_eq!(to_minor_units(Decimal::new(19_995, 3)), Some(2000));
        assert_eq!(to_minor_units(Decimal::from(35)), Some(3500));
    }
}
