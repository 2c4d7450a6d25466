//! Exit decision ladder.
//!
//! Prices here are oracle prices of token A in token B. The band derived from a
//! position's ticks is narrowed by the pool fee so an exit still clears a
//! profit margin. Outside of that effective band the ladder is:
//!
//! - exit side (up for priority A, down for priority B): hard exit once price
//!   is past the raw tick bound by more than `hard_exit_buffer` of the raw band width.
//! - retain side: soft exit once price crosses the soft band, the effective band
//!   widened by `soft_band_widening` of its own width on each side.
//! - anything in between is held as out-of-range.

use crate::DomainError;
use crate::entities::TickRange;
use crate::math::price_tick::tick_to_token_price;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitDecision {
    /// Price is inside the effective band.
    Hold,
    /// Price left the effective band but no exit threshold was crossed.
    OutOfRange,
    /// Price ran past the exit-side bound.
    HardExit,
    /// Price drifted past the soft band on the retain side.
    SoftExit,
}

impl ExitDecision {
    pub fn should_close(&self) -> bool {
        matches!(self, ExitDecision::HardExit | ExitDecision::SoftExit)
    }
}

/// Tunables for the ladder thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitThresholds {
    /// Fraction of the raw band width the price may overshoot the exit bound.
    pub hard_exit_buffer: Decimal,
    /// Fraction of the effective band width added on each side for the soft band.
    pub soft_band_widening: Decimal,
}

impl Default for ExitThresholds {
    fn default() -> Self {
        Self {
            hard_exit_buffer: Decimal::new(1, 1),   // 10%
            soft_band_widening: Decimal::new(5, 1), // 50%
        }
    }
}

/// Price thresholds derived from one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitBand {
    pub price_lower: Decimal,
    pub price_upper: Decimal,
    pub effective_lower: Decimal,
    pub effective_upper: Decimal,
    pub soft_lower: Decimal,
    pub soft_upper: Decimal,
    pub hard_lower: Decimal,
    pub hard_upper: Decimal,
}

impl ExitBand {
    pub fn new(
        price_lower: Decimal,
        price_upper: Decimal,
        fee_rate: Decimal,
        thresholds: ExitThresholds,
    ) -> Result<Self, DomainError> {
        if fee_rate < Decimal::ZERO || fee_rate >= Decimal::ONE {
            return Err(DomainError::InvalidFeeRate(fee_rate.to_string()));
        }
        if price_lower <= Decimal::ZERO {
            return Err(DomainError::NonPositivePrice);
        }

        let effective_lower = price_lower * (Decimal::ONE + fee_rate);
        let effective_upper = price_upper * (Decimal::ONE - fee_rate);
        if effective_lower >= effective_upper {
            return Err(DomainError::InvalidPriceBand {
                lower: effective_lower.to_string(),
                upper: effective_upper.to_string(),
            });
        }

        let widening = (effective_upper - effective_lower) * thresholds.soft_band_widening;
        let buffer = (price_upper - price_lower) * thresholds.hard_exit_buffer;

        Ok(Self {
            price_lower,
            price_upper,
            effective_lower,
            effective_upper,
            soft_lower: effective_lower - widening,
            soft_upper: effective_upper + widening,
            hard_lower: price_lower - buffer,
            hard_upper: price_upper + buffer,
        })
    }

    /// Builds the band from a position's ticks, converting with token decimals.
    pub fn from_ticks(
        range: TickRange,
        decimals_a: u8,
        decimals_b: u8,
        fee_rate: Decimal,
        thresholds: ExitThresholds,
    ) -> Result<Self, DomainError> {
        let price_lower = tick_to_token_price(range.lower(), decimals_a, decimals_b)?;
        let price_upper = tick_to_token_price(range.upper(), decimals_a, decimals_b)?;
        Self::new(price_lower, price_upper, fee_rate, thresholds)
    }

    pub fn decide(&self, oracle_price: Decimal, priority_a_over_b: bool) -> ExitDecision {
        if oracle_price >= self.effective_lower && oracle_price <= self.effective_upper {
            return ExitDecision::Hold;
        }

        let (hard_crossed, soft_crossed) = if priority_a_over_b {
            (oracle_price > self.hard_upper, oracle_price < self.soft_lower)
        } else {
            (oracle_price < self.hard_lower, oracle_price > self.soft_upper)
        };

        if hard_crossed {
            ExitDecision::HardExit
        } else if soft_crossed {
            ExitDecision::SoftExit
        } else {
            ExitDecision::OutOfRange
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn band() -> ExitBand {
        ExitBand::new(dec!(1.00), dec!(1.10), dec!(0.003), ExitThresholds::default()).unwrap()
    }

    #[test]
    fn test_effective_band_is_fee_adjusted() {
        let band = band();
        assert_eq!(band.effective_lower, dec!(1.003));
        assert_eq!(band.effective_upper, dec!(1.0967));
        assert!(band.effective_lower > band.price_lower);
        assert!(band.effective_upper < band.price_upper);
    }

    #[test]
    fn test_ladder_reference_prices() {
        let band = band();
        assert_eq!(band.decide(dec!(1.05), true), ExitDecision::Hold);
        assert_eq!(band.decide(dec!(1.12), true), ExitDecision::HardExit);
        assert_eq!(band.decide(dec!(1.105), true), ExitDecision::OutOfRange);
    }

    #[test]
    fn test_soft_exit_on_retain_side() {
        let band = band();
        // soft_lower = 1.003 - 0.0937 / 2 = 0.95615
        assert_eq!(band.soft_lower, dec!(0.95615));
        assert_eq!(band.decide(dec!(0.97), true), ExitDecision::OutOfRange);
        assert_eq!(band.decide(dec!(0.95), true), ExitDecision::SoftExit);
    }

    #[test]
    fn test_priority_b_mirrors_directions() {
        let band = band();
        // hard_lower = 1.00 - 0.01
        assert_eq!(band.decide(dec!(0.985), false), ExitDecision::HardExit);
        assert_eq!(band.decide(dec!(0.995), false), ExitDecision::OutOfRange);
        assert_eq!(band.decide(dec!(1.12), false), ExitDecision::OutOfRange);
        assert_eq!(band.decide(dec!(1.15), false), ExitDecision::SoftExit);
    }

    #[test]
    fn test_band_edges_are_held() {
        let band = band();
        assert_eq!(band.decide(dec!(1.003), true), ExitDecision::Hold);
        assert_eq!(band.decide(dec!(1.0967), false), ExitDecision::Hold);
    }

    #[test]
    fn test_rejects_fee_that_collapses_band() {
        let err = ExitBand::new(dec!(1.00), dec!(1.01), dec!(0.01), ExitThresholds::default());
        assert!(matches!(err, Err(DomainError::InvalidPriceBand { .. })));
        let err = ExitBand::new(dec!(1.00), dec!(1.10), dec!(1), ExitThresholds::default());
        assert!(matches!(err, Err(DomainError::InvalidFeeRate(_))));
    }

    #[test]
    fn test_should_close() {
        assert!(ExitDecision::HardExit.should_close());
        assert!(ExitDecision::SoftExit.should_close());
        assert!(!ExitDecision::OutOfRange.should_close());
        assert!(!ExitDecision::Hold.should_close());
    }
}
