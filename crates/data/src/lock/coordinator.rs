use super::{LockBackend, LockConfig, LockError, LockHandle};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

/// Runs actions while holding keyed leases.
#[derive(Clone)]
pub struct LockCoordinator {
    backend: Arc<dyn LockBackend>,
    config: LockConfig,
}

impl LockCoordinator {
    pub fn new(backend: Arc<dyn LockBackend>, config: LockConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Runs `action` holding a lease on every `acquire` key.
    ///
    /// Waits first until no `block` key is held by anyone, then acquires the
    /// `acquire` keys. Each wait is bounded by `acquire_timeout`. The action runs
    /// with a deadline equal to the shortest remaining lease; when it is hit the
    /// action is dropped and [`LockError::Expired`] returned. The held `release`
    /// keys are released on every exit path; acquired keys not listed in
    /// `release` are left to expire with their lease.
    pub async fn with_locks<T, E, F, Fut>(
        &self,
        acquire: &[String],
        block: &[String],
        release: &[String],
        action: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<LockError>,
    {
        let deadline = Instant::now() + self.config.acquire_timeout;

        for key in block {
            if acquire.contains(key) {
                continue;
            }
            self.wait_unlocked(key, deadline).await?;
        }

        let mut held: Vec<LockHandle> = Vec::with_capacity(acquire.len());
        for key in acquire {
            match self.acquire(key, deadline).await {
                Ok(handle) => held.push(handle),
                Err(e) => {
                    self.release_all(&held, |_| true).await;
                    return Err(e.into());
                }
            }
        }

        let lease = held.iter().min_by_key(|h| h.remaining()).cloned();
        let outcome = match &lease {
            Some(shortest) => tokio::time::timeout(shortest.remaining(), action())
                .await
                .map_err(|_| {
                    warn!(
                        key = %shortest.key,
                        lease_ttl = ?shortest.lease_ttl,
                        "Lock lease expired during action"
                    );
                    LockError::Expired {
                        key: shortest.key.clone(),
                        lease_ttl: shortest.lease_ttl,
                    }
                }),
            None => Ok(action().await),
        };

        self.release_all(&held, |key| release.iter().any(|r| r == key))
            .await;

        match outcome {
            Ok(result) => result,
            Err(e) => Err(e.into()),
        }
    }

    async fn acquire(&self, key: &str, deadline: Instant) -> Result<LockHandle, LockError> {
        let token = Uuid::new_v4().to_string();
        let started = Instant::now();
        loop {
            // The backend starts the lease before replying.
            let attempted_at = Instant::now();
            if self
                .backend
                .try_acquire(key, &token, self.config.lease_ttl)
                .await?
            {
                debug!(key, "Lock acquired");
                return Ok(LockHandle {
                    key: key.to_string(),
                    token,
                    acquired_at: attempted_at,
                    lease_ttl: self.config.lease_ttl,
                });
            }
            self.pause_until(key, started, deadline).await?;
        }
    }

    async fn wait_unlocked(&self, key: &str, deadline: Instant) -> Result<(), LockError> {
        let started = Instant::now();
        while self.backend.is_locked(key).await? {
            self.pause_until(key, started, deadline).await?;
        }
        Ok(())
    }

    async fn pause_until(
        &self,
        key: &str,
        started: Instant,
        deadline: Instant,
    ) -> Result<(), LockError> {
        let now = Instant::now();
        if now >= deadline {
            return Err(LockError::Contention {
                key: key.to_string(),
                waited: now.duration_since(started),
            });
        }
        tokio::time::sleep(self.config.poll_interval.min(deadline - now)).await;
        Ok(())
    }

    async fn release_all<P>(&self, held: &[LockHandle], should_release: P)
    where
        P: Fn(&str) -> bool,
    {
        for handle in held.iter().filter(|h| should_release(&h.key)) {
            match self.backend.release(&handle.key, &handle.token).await {
                Ok(true) => debug!(key = %handle.key, "Lock released"),
                Ok(false) => warn!(key = %handle.key, "Lock was no longer held at release"),
                Err(e) => warn!(key = %handle.key, error = %e, "Failed to release lock"),
            }
        }
    }
}
