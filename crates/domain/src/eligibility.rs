//! Open-position eligibility.
//!
//! A position is only opened while the pool's price sits inside the active
//! tick bin close to the bound opposite the exit side, so a fresh position is
//! never opened right before the price leaves its range.
//!
//! With `priority_a_over_b` the exit side is the upper bound (token A gets sold
//! as price rises), so the far bound is the lower one. Otherwise the far bound
//! is the upper one.

use crate::DomainError;
use crate::entities::{FetchedPoolState, LiquidityPool, TickRange};

/// The tick bin containing the current price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveBin {
    current_tick: i32,
    tick_spacing: i32,
    bounds: TickRange,
}

impl ActiveBin {
    /// Fails for a non-positive spacing or a tick whose bin does not fit in `i32`.
    pub fn new(current_tick: i32, tick_spacing: i32) -> Result<Self, DomainError> {
        if tick_spacing <= 0 {
            return Err(DomainError::InvalidTickSpacing(tick_spacing));
        }
        let lower = current_tick
            .div_euclid(tick_spacing)
            .checked_mul(tick_spacing)
            .ok_or(DomainError::TickOutOfRange(current_tick))?;
        let bounds = TickRange::spanning(lower, tick_spacing)
            .map_err(|_| DomainError::TickOutOfRange(current_tick))?;
        Ok(Self {
            current_tick,
            tick_spacing,
            bounds,
        })
    }

    pub fn for_pool(pool: &LiquidityPool, state: &FetchedPoolState) -> Result<Self, DomainError> {
        Self::new(state.current_tick, pool.tick_spacing)
    }

    pub fn current_tick(&self) -> i32 {
        self.current_tick
    }

    /// `[lower, lower + spacing]` where `lower` is the largest multiple of the
    /// spacing not above the current tick.
    pub fn tick_bounds(&self) -> TickRange {
        self.bounds
    }

    /// Ticks between the current tick and the bound opposite the exit side.
    pub fn tick_distance_to_far_bound(&self, priority_a_over_b: bool) -> i32 {
        let bounds = self.tick_bounds();
        if priority_a_over_b {
            self.current_tick - bounds.lower()
        } else {
            bounds.upper() - self.current_tick
        }
    }

    pub fn deviation_threshold(&self) -> i32 {
        self.tick_spacing / 3
    }

    /// Inclusive: a distance equal to the threshold is still eligible.
    pub fn can_open_position(&self, priority_a_over_b: bool) -> bool {
        self.tick_distance_to_far_bound(priority_a_over_b) <= self.deviation_threshold()
    }
}

/// Whether a position may be opened on `pool` in its fetched state.
pub fn can_open_position(
    pool: &LiquidityPool,
    state: &FetchedPoolState,
    priority_a_over_b: bool,
) -> Result<bool, DomainError> {
    Ok(ActiveBin::for_pool(pool, state)?.can_open_position(priority_a_over_b))
}
