use super::{CacheError, CacheTier, LocalCache, TierKind, TierValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for [`TieredCache`].
#[derive(Debug, Clone)]
pub struct TieredCacheConfig {
    /// Upper bound on how long a value lives in L1, regardless of the requested TTL.
    pub l1_max_ttl: Duration,
    /// How often a local L1 drops expired entries nobody reads again.
    pub l1_purge_interval: Duration,
}

impl Default for TieredCacheConfig {
    fn default() -> Self {
        Self {
            l1_max_ttl: Duration::from_secs(5),
            l1_purge_interval: Duration::from_secs(30),
        }
    }
}

/// Cache-aside store over a local L1 and a shared L2.
///
/// Reads try L1, then L2; an L2 hit repopulates L1 in the background,
/// never past the L2 entry's own expiry and never over a value written
/// meanwhile. Writes go to both tiers concurrently. Tier errors are logged and
/// reported as misses.
#[derive(Clone)]
pub struct TieredCache {
    l1: Arc<dyn CacheTier>,
    l2: Arc<dyn CacheTier>,
    config: TieredCacheConfig,
}

fn log_tier_error(kind: TierKind, op: &'static str, key: &str, error: &CacheError) {
    warn!(tier = %kind, op, key, error = %error, "Cache tier error ignored");
}

impl TieredCache {
    pub fn new(l1: Arc<dyn CacheTier>, l2: Arc<dyn CacheTier>, config: TieredCacheConfig) -> Self {
        Self { l1, l2, config }
    }

    /// Uses an in-process [`LocalCache`] as L1.
    ///
    /// Inside a tokio runtime this also starts a purge task that lives as
    /// long as the local tier.
    pub fn with_local_l1(l2: Arc<dyn CacheTier>, config: TieredCacheConfig) -> Self {
        let l1 = Arc::new(LocalCache::new());
        if tokio::runtime::Handle::try_current().is_ok() {
            spawn_purge(Arc::downgrade(&l1), config.l1_purge_interval);
        }
        Self::new(l1, l2, config)
    }

    fn l1_ttl(&self, ttl: Duration) -> Duration {
        ttl.min(self.config.l1_max_ttl)
    }

    fn repopulate_l1(&self, found: Vec<(String, TierValue)>) {
        let entries: Vec<(String, String, Duration)> = found
            .into_iter()
            .map(|(key, entry)| {
                let ttl = entry.capped_ttl(self.config.l1_max_ttl);
                (key, entry.value, ttl)
            })
            .filter(|(_, _, ttl)| !ttl.is_zero())
            .collect();
        if entries.is_empty() {
            return;
        }
        let l1 = self.l1.clone();
        tokio::spawn(async move {
            if let Err(e) = l1.mset_if_absent(&entries).await {
                log_tier_error(l1.kind(), "repopulate", &entries[0].0, &e);
            }
        });
    }

    pub async fn get_raw(&self, key: &str) -> Option<String> {
        match self.l1.get(key).await {
            Ok(Some(value)) => return Some(value),
            Ok(None) => {}
            Err(e) => log_tier_error(self.l1.kind(), "get", key, &e),
        }

        match self.l2.get_entry(key).await {
            Ok(Some(entry)) => {
                debug!(key, "L2 hit, repopulating L1");
                let value = entry.value.clone();
                self.repopulate_l1(vec![(key.to_string(), entry)]);
                Some(value)
            }
            Ok(None) => None,
            Err(e) => {
                log_tier_error(self.l2.kind(), "get", key, &e);
                None
            }
        }
    }

    /// Reads and decodes `key`. Undecodable values are treated as misses.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_raw(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Discarding undecodable cache value");
                None
            }
        }
    }

    pub async fn set_raw(&self, key: &str, value: &str, ttl: Duration) {
        let l1_ttl = self.l1_ttl(ttl);
        let (l1, l2) = tokio::join!(self.l1.set(key, value, l1_ttl), self.l2.set(key, value, ttl));
        if let Err(e) = l1 {
            log_tier_error(self.l1.kind(), "set", key, &e);
        }
        if let Err(e) = l2 {
            log_tier_error(self.l2.kind(), "set", key, &e);
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        match serde_json::to_string(value) {
            Ok(raw) => self.set_raw(key, &raw, ttl).await,
            Err(e) => warn!(key, error = %e, "Skipping unserializable cache value"),
        }
    }

    /// Values aligned with `keys`. Keys missing from L1 are fetched from L2 in one batch.
    pub async fn mget_raw(&self, keys: &[String]) -> Vec<Option<String>> {
        if keys.is_empty() {
            return Vec::new();
        }

        let mut values = match self.l1.mget(keys).await {
            Ok(values) if values.len() == keys.len() => values,
            Ok(_) => vec![None; keys.len()],
            Err(e) => {
                log_tier_error(self.l1.kind(), "mget", &keys[0], &e);
                vec![None; keys.len()]
            }
        };

        let missing: Vec<usize> = (0..keys.len()).filter(|&i| values[i].is_none()).collect();
        if missing.is_empty() {
            return values;
        }

        let missing_keys: Vec<String> = missing.iter().map(|&i| keys[i].clone()).collect();
        match self.l2.mget_entries(&missing_keys).await {
            Ok(found) => {
                let mut refill = Vec::new();
                for (index, entry) in missing.into_iter().zip(found) {
                    if let Some(entry) = entry {
                        values[index] = Some(entry.value.clone());
                        refill.push((keys[index].clone(), entry));
                    }
                }
                self.repopulate_l1(refill);
            }
            Err(e) => log_tier_error(self.l2.kind(), "mget", &missing_keys[0], &e),
        }
        values
    }

    pub async fn mget<T: DeserializeOwned>(&self, keys: &[String]) -> Vec<Option<T>> {
        self.mget_raw(keys)
            .await
            .into_iter()
            .zip(keys)
            .map(|(raw, key)| {
                raw.and_then(|raw| match serde_json::from_str(&raw) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        warn!(key = %key, error = %e, "Discarding undecodable cache value");
                        None
                    }
                })
            })
            .collect()
    }

    pub async fn mset<T: Serialize>(&self, entries: &[(String, T)], ttl: Duration) {
        let mut encoded = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            match serde_json::to_string(value) {
                Ok(raw) => encoded.push((key.clone(), raw)),
                Err(e) => warn!(key = %key, error = %e, "Skipping unserializable cache value"),
            }
        }
        if encoded.is_empty() {
            return;
        }

        let l1_ttl = self.l1_ttl(ttl);
        let (l1, l2) = tokio::join!(self.l1.mset(&encoded, l1_ttl), self.l2.mset(&encoded, ttl));
        if let Err(e) = l1 {
            log_tier_error(self.l1.kind(), "mset", &encoded[0].0, &e);
        }
        if let Err(e) = l2 {
            log_tier_error(self.l2.kind(), "mset", &encoded[0].0, &e);
        }
    }

    pub async fn delete(&self, key: &str) {
        let (l1, l2) = tokio::join!(self.l1.delete(key), self.l2.delete(key));
        if let Err(e) = l1 {
            log_tier_error(self.l1.kind(), "delete", key, &e);
        }
        if let Err(e) = l2 {
            log_tier_error(self.l2.kind(), "delete", key, &e);
        }
    }

    /// Returns the cached value or runs `loader`, caching its result for `ttl`.
    pub async fn get_or_load<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        loader: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }
        let value = loader().await?;
        self.set(key, &value, ttl).await;
        Ok(value)
    }
}

fn spawn_purge(l1: Weak<LocalCache>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(l1) = l1.upgrade() else { break };
            let purged = l1.purge_expired();
            if purged > 0 {
                debug!(purged, "Purged expired L1 entries");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FailingTier;

    #[async_trait]
    impl CacheTier for FailingTier {
        fn kind(&self) -> TierKind {
            TierKind::Shared
        }

        async fn get_entry(&self, _key: &str) -> Result<Option<TierValue>, CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }

        async fn mget_entries(
            &self,
            _keys: &[String],
        ) -> Result<Vec<Option<TierValue>>, CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }

        async fn mset_if_absent(
            &self,
            _entries: &[(String, String, Duration)],
        ) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }

        async fn mset(
            &self,
            _entries: &[(String, String)],
            _ttl: Duration,
        ) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }

        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }
    }

    fn tiers() -> (Arc<LocalCache>, Arc<LocalCache>, TieredCache) {
        let l1 = Arc::new(LocalCache::new());
        let l2 = Arc::new(LocalCache::new());
        let cache = TieredCache::new(l1.clone(), l2.clone(), TieredCacheConfig::default());
        (l1, l2, cache)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn test_l2_failure_is_swallowed() {
        let cache = TieredCache::with_local_l1(Arc::new(FailingTier), TieredCacheConfig::default());

        cache.set("k", &42u32, Duration::from_secs(60)).await;
        assert_eq!(cache.get::<u32>("k").await, Some(42));
        assert_eq!(cache.get::<u32>("other").await, None);
        cache.delete("k").await;
        assert_eq!(cache.get::<u32>("k").await, None);
    }

    #[tokio::test]
    async fn test_l2_hit_repopulates_l1() {
        let (l1, l2, cache) = tiers();
        l2.set("k", "\"v\"", Duration::from_secs(60)).await.unwrap();

        assert_eq!(cache.get::<String>("k").await.as_deref(), Some("v"));
        settle().await;

        assert_eq!(l1.get("k").await.unwrap().as_deref(), Some("\"v\""));
    }

    #[tokio::test]
    async fn test_l1_ttl_is_capped() {
        let l1 = Arc::new(LocalCache::new());
        let l2 = Arc::new(LocalCache::new());
        let cache = TieredCache::new(
            l1.clone(),
            l2.clone(),
            TieredCacheConfig {
                l1_max_ttl: Duration::from_millis(10),
                ..Default::default()
            },
        );

        cache.set("k", &1u8, Duration::from_secs(60)).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(l1.get("k").await.unwrap(), None);
        assert_eq!(l2.get("k").await.unwrap().as_deref(), Some("1"));
        assert_eq!(cache.get::<u8>("k").await, Some(1));
    }

    #[tokio::test]
    async fn test_mget_merges_tiers() {
        let (l1, l2, cache) = tiers();
        l1.set("a", "1", Duration::from_secs(60)).await.unwrap();
        l2.set("b", "2", Duration::from_secs(60)).await.unwrap();

        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let values: Vec<Option<u32>> = cache.mget(&keys).await;
        assert_eq!(values, vec![Some(1), Some(2), None]);

        settle().await;
        assert_eq!(l1.get("b").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_undecodable_value_is_a_miss() {
        let (_l1, l2, cache) = tiers();
        l2.set("k", "not-json", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get::<u32>("k").await, None);
    }

    #[tokio::test]
    async fn test_get_or_load_caches_result() {
        let (_l1, _l2, cache) = tiers();
        let mut loads = 0;

        let first: Result<u32, String> = cache
            .get_or_load("k", Duration::from_secs(60), || {
                loads += 1;
                async { Ok(7) }
            })
            .await;
        assert_eq!(first, Ok(7));

        let second: Result<u32, String> = cache
            .get_or_load("k", Duration::from_secs(60), || async { Err("loader ran".to_string()) })
            .await;
        assert_eq!(second, Ok(7));
        assert_eq!(loads, 1);
    }

    #[tokio::test]
    async fn test_refill_never_overwrites_newer_write() {
        let (l1, l2, cache) = tiers();
        l2.set("k", "1", Duration::from_secs(60)).await.unwrap();

        assert_eq!(cache.get::<u32>("k").await, Some(1));
        cache.set("k", &2u32, Duration::from_secs(60)).await;
        settle().await;

        assert_eq!(l1.get("k").await.unwrap().as_deref(), Some("2"));
        assert_eq!(cache.get::<u32>("k").await, Some(2));
    }

    #[tokio::test]
    async fn test_refill_does_not_outlive_l2_entry() {
        let (l1, l2, cache) = tiers();
        l2.set("price", "100", Duration::from_millis(50)).await.unwrap();

        assert_eq!(cache.get::<u32>("price").await, Some(100));
        settle().await;
        assert_eq!(l1.get("price").await.unwrap().as_deref(), Some("100"));

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(l2.get("price").await.unwrap(), None);
        assert_eq!(cache.get::<u32>("price").await, None);
    }

    #[tokio::test]
    async fn test_mget_refill_is_capped_per_entry() {
        let (l1, l2, cache) = tiers();
        l2.set("a", "1", Duration::from_millis(40)).await.unwrap();
        l2.set("b", "2", Duration::from_secs(60)).await.unwrap();

        let keys = vec!["a".to_string(), "b".to_string()];
        let values: Vec<Option<u32>> = cache.mget(&keys).await;
        assert_eq!(values, vec![Some(1), Some(2)]);

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(l1.get("a").await.unwrap(), None);
        assert_eq!(l1.get("b").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_local_l1_is_purged_in_background() {
        let l1 = Arc::new(LocalCache::new());
        spawn_purge(Arc::downgrade(&l1), Duration::from_millis(10));
        l1.set("k", "v", Duration::ZERO).await.unwrap();
        assert_eq!(l1.len(), 1);

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(l1.is_empty());
    }
}
