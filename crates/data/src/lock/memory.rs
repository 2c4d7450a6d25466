use super::{LockBackend, LockError};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Lease {
    token: String,
    expires_at: Instant,
}

/// Single-process lock backend.
#[derive(Debug, Default)]
pub struct InMemoryLockBackend {
    leases: DashMap<String, Lease>,
}

impl InMemoryLockBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockBackend for InMemoryLockBackend {
    async fn try_acquire(&self, key: &str, token: &str, ttl: Duration) -> Result<bool, LockError> {
        let now = Instant::now();
        let lease = Lease {
            token: token.to_string(),
            expires_at: now + ttl,
        };
        match self.leases.entry(key.to_string()) {
            Entry::Occupied(mut held) => {
                if held.get().expires_at > now {
                    return Ok(false);
                }
                held.insert(lease);
                Ok(true)
            }
            Entry::Vacant(free) => {
                free.insert(lease);
                Ok(true)
            }
        }
    }

    async fn release(&self, key: &str, token: &str) -> Result<bool, LockError> {
        Ok(self
            .leases
            .remove_if(key, |_, lease| lease.token == token)
            .is_some())
    }

    async fn is_locked(&self, key: &str) -> Result<bool, LockError> {
        let now = Instant::now();
        Ok(self
            .leases
            .get(key)
            .is_some_and(|lease| lease.expires_at > now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_release_requires_matching_token() {
        let backend = InMemoryLockBackend::new();
        assert!(backend.try_acquire("k", "t1", Duration::from_secs(10)).await.unwrap());
        assert!(!backend.try_acquire("k", "t2", Duration::from_secs(10)).await.unwrap());

        assert!(!backend.release("k", "t2").await.unwrap());
        assert!(backend.is_locked("k").await.unwrap());

        assert!(backend.release("k", "t1").await.unwrap());
        assert!(!backend.is_locked("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_lapsed_lease_can_be_taken_over() {
        let backend = InMemoryLockBackend::new();
        assert!(backend.try_acquire("k", "t1", Duration::from_millis(10)).await.unwrap());
        tokio::time::sleep(Duration::from_millis(25)).await;

        assert!(!backend.is_locked("k").await.unwrap());
        assert!(backend.try_acquire("k", "t2", Duration::from_secs(10)).await.unwrap());
        // the stale holder must not free the new lease
        assert!(!backend.release("k", "t1").await.unwrap());
    }
}
