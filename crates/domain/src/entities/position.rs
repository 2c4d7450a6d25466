use crate::DomainError;
use crate::entities::pool::PoolId;
use crate::entities::user::UserId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionId(pub Uuid);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated tick interval, `lower < upper`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTickRange")]
pub struct TickRange {
    lower: i32,
    upper: i32,
}

#[derive(Deserialize)]
struct RawTickRange {
    lower: i32,
    upper: i32,
}

impl TryFrom<RawTickRange> for TickRange {
    type Error = DomainError;

    fn try_from(raw: RawTickRange) -> Result<Self, Self::Error> {
        TickRange::new(raw.lower, raw.upper)
    }
}

impl TickRange {
    pub fn new(lower: i32, upper: i32) -> Result<Self, DomainError> {
        if lower >= upper {
            return Err(DomainError::InvalidTickRange { lower, upper });
        }
        Ok(Self { lower, upper })
    }

    /// `[lower, lower + width]`.
    pub fn spanning(lower: i32, width: i32) -> Result<Self, DomainError> {
        let upper = lower
            .checked_add(width)
            .ok_or(DomainError::TickOutOfRange(lower))?;
        Self::new(lower, upper)
    }

    pub fn lower(&self) -> i32 {
        self.lower
    }

    pub fn upper(&self) -> i32 {
        self.upper
    }

    pub fn contains(&self, tick: i32) -> bool {
        tick >= self.lower && tick <= self.upper
    }
}

/// An LP position. Created once on a successful open, closed once, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub pool_id: PoolId,
    pub user_id: UserId,
    pub range: TickRange,
    pub liquidity: u128,
    pub deposit_amount: Decimal,
    /// Side the strategy retains, fixed when the position opens.
    pub priority_a_over_b: bool,
    pub open_tx_hash: String,
    pub close_tx_hash: Option<String>,
    pub roi: Option<Decimal>,
    pub pnl: Option<Decimal>,
    pub is_active: bool,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Position {
    /// Applies the one-way active → closed transition.
    ///
    /// Returns `false` and leaves the position untouched if it is already closed.
    pub fn close(
        &mut self,
        tx_hash: String,
        pnl: Decimal,
        roi: Decimal,
        at: DateTime<Utc>,
    ) -> bool {
        if !self.is_active {
            return false;
        }
        self.is_active = false;
        self.close_tx_hash = Some(tx_hash);
        self.pnl = Some(pnl);
        self.roi = Some(roi);
        self.closed_at = Some(at);
        true
    }
}

/// Return on investment of a closed position, `pnl / deposit`.
pub fn roi(pnl: Decimal, deposit: Decimal) -> Decimal {
    if deposit.is_zero() {
        return Decimal::ZERO;
    }
    pnl / deposit
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_tick_range_rejects_inverted() {
        assert!(TickRange::new(10, 10).is_err());
        assert!(TickRange::new(20, 10).is_err());
        let range = TickRange::new(-64, 0).unwrap();
        assert!(range.contains(-10));
        assert!(!range.contains(1));
    }

    #[test]
    fn test_tick_range_deserialize_validates() {
        let bad: Result<TickRange, _> = serde_json::from_str(r#"{"lower":5,"upper":1}"#);
        assert!(bad.is_err());
        let good: TickRange = serde_json::from_str(r#"{"lower":1,"upper":5}"#).unwrap();
        assert_eq!(good.upper(), 5);
    }

    #[test]
    fn test_close_is_one_way() {
        let mut position = Position {
            id: PositionId(Uuid::new_v4()),
            pool_id: PoolId(Uuid::new_v4()),
            user_id: UserId(Uuid::new_v4()),
            range: TickRange::new(0, 64).unwrap(),
            liquidity: 1_000,
            deposit_amount: dec!(100),
            priority_a_over_b: true,
            open_tx_hash: "open".to_string(),
            close_tx_hash: None,
            roi: None,
            pnl: None,
            is_active: true,
            opened_at: Utc::now(),
            closed_at: None,
        };

        assert!(position.close("close".to_string(), dec!(5), dec!(0.05), Utc::now()));
        assert!(!position.is_active);
        assert!(!position.close("again".to_string(), dec!(1), dec!(0.01), Utc::now()));
        assert_eq!(position.close_tx_hash.as_deref(), Some("close"));
    }

    #[test]
    fn test_spanning_rejects_overflow() {
        assert_eq!(TickRange::spanning(0, 64).map(|r| r.upper()), Ok(64));
        assert_eq!(
            TickRange::spanning(i32::MAX - 10, 64),
            Err(DomainError::TickOutOfRange(i32::MAX - 10))
        );
    }

    #[test]
    fn test_roi() {
        assert_eq!(roi(dec!(5), dec!(100)), dec!(0.05));
        assert_eq!(roi(dec!(5), Decimal::ZERO), Decimal::ZERO);
    }
}
