//! Redis-backed L2 tier.

use super::{CacheError, CacheTier, TierKind, TierValue};
use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use std::time::Duration;

/// Shared L2 tier. Keys are prefixed with a namespace so several bots can share one Redis.
pub struct RedisCache {
    pool: Pool,
    namespace: String,
}

impl RedisCache {
    pub fn new(redis_url: &str, namespace: impl Into<String>) -> Result<Self, CacheError> {
        let pool = Config::from_url(redis_url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Ok(Self::from_pool(pool, namespace))
    }

    pub fn from_pool(pool: Pool, namespace: impl Into<String>) -> Self {
        Self {
            pool,
            namespace: namespace.into(),
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// Interprets a `PTTL` reply. `None` means the key is gone.
fn remaining_from_pttl(pttl: i64) -> Option<Option<Duration>> {
    match pttl {
        -1 => Some(None),
        ms if ms >= 0 => Some(Some(Duration::from_millis(ms.unsigned_abs()))),
        _ => None,
    }
}

fn tier_value(value: Option<String>, pttl: i64) -> Option<TierValue> {
    let remaining = remaining_from_pttl(pttl)?;
    value.map(|value| TierValue { value, remaining })
}

#[async_trait]
impl CacheTier for RedisCache {
    fn kind(&self) -> TierKind {
        TierKind::Shared
    }

    async fn get_entry(&self, key: &str) -> Result<Option<TierValue>, CacheError> {
        let mut conn = self.pool.get().await?;
        let key = self.key(key);
        let (value, pttl): (Option<String>, i64) = redis::pipe()
            .cmd("GET")
            .arg(&key)
            .cmd("PTTL")
            .arg(&key)
            .query_async(&mut conn)
            .await?;
        Ok(tier_value(value, pttl))
    }

    async fn mget_entries(&self, keys: &[String]) -> Result<Vec<Option<TierValue>>, CacheError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.pool.get().await?;
        let namespaced: Vec<String> = keys.iter().map(|k| self.key(k)).collect();
        let mut values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&namespaced)
            .query_async(&mut conn)
            .await?;

        let hits: Vec<usize> = (0..values.len()).filter(|&i| values[i].is_some()).collect();
        if hits.is_empty() {
            return Ok(vec![None; keys.len()]);
        }
        let mut pipe = redis::pipe();
        for &index in &hits {
            pipe.cmd("PTTL").arg(&namespaced[index]);
        }
        let ttls: Vec<i64> = pipe.query_async(&mut conn).await?;

        let mut entries = vec![None; keys.len()];
        for (index, pttl) in hits.into_iter().zip(ttls) {
            entries[index] = tier_value(values[index].take(), pttl);
        }
        Ok(entries)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.pool.get().await?;
        redis::cmd("SET")
            .arg(self.key(key))
            .arg(value)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn mset(&self, entries: &[(String, String)], ttl: Duration) -> Result<(), CacheError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut conn = self.pool.get().await?;
        let mut pipe = redis::pipe();
        for (key, value) in entries {
            pipe.cmd("SET")
                .arg(self.key(key))
                .arg(value)
                .arg("PX")
                .arg(ttl_millis(ttl))
                .ignore();
        }
        pipe.query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }

    async fn mset_if_absent(
        &self,
        entries: &[(String, String, Duration)],
    ) -> Result<(), CacheError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut conn = self.pool.get().await?;
        let mut pipe = redis::pipe();
        for (key, value, ttl) in entries {
            pipe.cmd("SET")
                .arg(self.key(key))
                .arg(value)
                .arg("NX")
                .arg("PX")
                .arg(ttl_millis(*ttl))
                .ignore();
        }
        pipe.query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.pool.get().await?;
        redis::cmd("DEL")
            .arg(self.key(key))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }
}
