use crate::DomainError;
use rust_decimal::Decimal;
use rust_decimal::prelude::*;

/// Returns the price of token A in token B for `tick`, adjusted for token decimals.
/// P = 1.0001 ^ tick * 10 ^ (decimals_a - decimals_b)
pub fn tick_to_token_price(
    tick: i32,
    decimals_a: u8,
    decimals_b: u8,
) -> Result<Decimal, DomainError> {
    let exponent = i32::from(decimals_a) - i32::from(decimals_b);
    let price_f64 = 1.0001f64.powi(tick) * 10f64.powi(exponent);
    Decimal::from_f64(price_f64).ok_or(DomainError::PriceOverflow(tick))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_to_token_price_same_decimals() {
        assert_eq!(tick_to_token_price(0, 9, 9).unwrap(), Decimal::from(1));

        // 1.0001^100 ~= 1.010049
        let p100 = tick_to_token_price(100, 6, 6).unwrap();
        let diff = (p100.to_f64().unwrap() - 1.01004966).abs();
        assert!(diff < 0.000001);
    }

    #[test]
    fn test_tick_to_token_price_applies_decimals() {
        // SOL (9) / USDC (6): tick 0 maps to 1000 USDC per SOL in human units
        let p = tick_to_token_price(0, 9, 6).unwrap();
        assert!((p.to_f64().unwrap() - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_unrepresentable_price_is_an_error() {
        assert!(matches!(
            tick_to_token_price(i32::MAX, 9, 9),
            Err(DomainError::PriceOverflow(i32::MAX))
        ));
    }
}
