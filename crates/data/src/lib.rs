//! Persistence, caching and locking for the LP bot.
//!
//! - Two-tier cache (in-process L1, Redis L2)
//! - Lease-based keyed locks (in-process or Redis)
//! - Durable store traits and PostgreSQL repositories

/// Two-tier cache.
pub mod cache;
/// Cache and lock key builders.
pub mod keys;
/// Keyed mutual exclusion with lease TTL.
pub mod lock;
/// Durable store.
pub mod repositories;
