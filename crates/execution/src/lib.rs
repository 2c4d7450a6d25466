//! Position lifecycle and resilience engine.
//!
//! This crate wires the domain rules to live infrastructure:
//! - Exit decisions on price updates, serialized per token
//! - Open/close orchestration with retries and per-user locking
//! - Pool state refresh and open eligibility
//! - Named-channel event bus

/// Prelude module for convenient imports.
pub mod prelude;

/// Event bus.
pub mod bus;
/// Error taxonomy.
pub mod error;
/// Exit decision engine.
pub mod exit;
/// Position lifecycle orchestration.
pub mod lifecycle;
/// Pool state refresh.
pub mod pools;
/// Settled fan-out.
pub mod settle;

#[cfg(test)]
pub(crate) mod testing;
