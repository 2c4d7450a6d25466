use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("tier unavailable: {0}")]
    Unavailable(String),
}

impl From<deadpool_redis::PoolError> for CacheError {
    fn from(e: deadpool_redis::PoolError) -> Self {
        CacheError::Pool(e.to_string())
    }
}

/// Which level of the cache a tier serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierKind {
    Local,
    Shared,
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TierKind::Local => write!(f, "l1"),
            TierKind::Shared => write!(f, "l2"),
        }
    }
}

/// A value read from a tier together with the lifetime it has left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierValue {
    pub value: String,
    /// `None` when the tier keeps the entry without expiry.
    pub remaining: Option<Duration>,
}

impl TierValue {
    /// Caps `ttl` at what the entry has left.
    pub fn capped_ttl(&self, ttl: Duration) -> Duration {
        self.remaining.map_or(ttl, |remaining| remaining.min(ttl))
    }
}

/// One level of the cache, storing serialized values.
#[async_trait]
pub trait CacheTier: Send + Sync {
    fn kind(&self) -> TierKind;

    async fn get_entry(&self, key: &str) -> Result<Option<TierValue>, CacheError>;

    /// Entries aligned with `keys`; misses are `None`.
    async fn mget_entries(&self, keys: &[String]) -> Result<Vec<Option<TierValue>>, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn mset(&self, entries: &[(String, String)], ttl: Duration) -> Result<(), CacheError>;

    /// Writes each entry only where the key holds no live value.
    /// Entries carry their own TTL.
    async fn mset_if_absent(
        &self,
        entries: &[(String, String, Duration)],
    ) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.get_entry(key).await?.map(|entry| entry.value))
    }

    /// Values aligned with `keys`; misses are `None`.
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheError> {
        Ok(self
            .mget_entries(keys)
            .await?
            .into_iter()
            .map(|entry| entry.map(|e| e.value))
            .collect())
    }
}
