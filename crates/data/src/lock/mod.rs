//! Keyed mutual exclusion across bot processes.
//!
//! Locks are leases: each holds a random token and expires after its TTL, so a
//! crashed holder cannot block a key forever. Release only deletes a key whose
//! stored token still matches.

mod coordinator;
mod memory;
mod redis;

pub use coordinator::*;
pub use memory::*;
pub use self::redis::*;

use async_trait::async_trait;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    #[error("timed out after {waited:?} waiting for lock {key}")]
    Contention { key: String, waited: Duration },

    #[error("lease on {key} expired after {lease_ttl:?} before the action finished")]
    Expired { key: String, lease_ttl: Duration },

    #[error("lock backend error: {0}")]
    Backend(String),
}

impl From<::redis::RedisError> for LockError {
    fn from(e: ::redis::RedisError) -> Self {
        LockError::Backend(e.to_string())
    }
}

impl From<deadpool_redis::PoolError> for LockError {
    fn from(e: deadpool_redis::PoolError) -> Self {
        LockError::Backend(e.to_string())
    }
}

/// A held lease.
#[derive(Debug, Clone)]
pub struct LockHandle {
    /// The locked key.
    pub key: String,
    /// Random owner token; release only succeeds while the key still stores it.
    pub token: String,
    /// Taken before the acquire request was sent, so the local view of the
    /// lease never outlasts the lease held by the backend.
    pub acquired_at: Instant,
    /// Lease length requested from the backend.
    pub lease_ttl: Duration,
}

impl LockHandle {
    /// Time left on the lease; zero once expired.
    pub fn remaining(&self) -> Duration {
        self.lease_ttl.saturating_sub(self.acquired_at.elapsed())
    }
}

/// Storage for lock leases.
#[async_trait]
pub trait LockBackend: Send + Sync {
    /// Sets `key` to `token` if the key is free or its lease has lapsed.
    async fn try_acquire(&self, key: &str, token: &str, ttl: Duration) -> Result<bool, LockError>;

    /// Deletes `key` only if it still holds `token`. Returns whether a delete happened.
    async fn release(&self, key: &str, token: &str) -> Result<bool, LockError>;

    async fn is_locked(&self, key: &str) -> Result<bool, LockError>;
}

/// Lease and wait settings for [`LockCoordinator`].
#[derive(Debug, Clone)]
pub struct LockConfig {
    pub lease_ttl: Duration,
    /// How long to wait for contended keys before giving up.
    pub acquire_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            lease_ttl: Duration::from_secs(60),
            acquire_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(50),
        }
    }
}
