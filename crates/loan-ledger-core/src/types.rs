use rust_decimal::{Decimal, RoundingStrategy};

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Contract identifier as assigned by the recording layer.
pub type ContractId = String;

/// Decimal places for reported monetary figures.
pub const MONEY_SCALE: u32 = 2;

/// Round a monetary figure for reporting: half-up at two decimal places.
/// Intermediate arithmetic stays at Decimal's full 28-digit precision;
/// only output figures pass through here.
pub fn round_money(amount: Money) -> Money {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_money_half_up() {
        assert_eq!(round_money(dec!(1.005)), dec!(1.01));
        assert_eq!(round_money(dec!(1.004)), dec!(1.00));
        assert_eq!(round_money(dec!(-1.005)), dec!(-1.01));
    }

    #[test]
    fn test_round_money_preserves_exact_values() {
        assert_eq!(round_money(dec!(100)), dec!(100.00));
        assert_eq!(round_money(dec!(0.25)), dec!(0.25));
    }
}
