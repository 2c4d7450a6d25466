//! Domain model for the LP bot position engine.
//!
//! Pure types and math with no I/O:
//! - Pools, positions, users and wallets
//! - Tick/price conversion
//! - Open-position eligibility
//! - Exit decision ladder

/// Open-position eligibility rules.
pub mod eligibility;
/// Domain entities.
pub mod entities;
/// Shared enumerations.
pub mod enums;
/// Domain errors.
pub mod error;
/// Exit ladder math.
pub mod exit;
/// Tick and price math.
pub mod math;

pub use error::DomainError;
