use super::{CacheError, CacheTier, TierKind, TierValue};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::{Duration, Instant};

/// A stored value and its lifetime.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: String,
    pub ttl: Duration,
    pub stored_at: Instant,
}

impl CacheEntry {
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) >= self.ttl
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.ttl.saturating_sub(now.saturating_duration_since(self.stored_at))
    }
}

/// Process-local L1 tier. Expired entries are dropped lazily on read.
#[derive(Debug, Default)]
pub struct LocalCache {
    entries: DashMap<String, CacheEntry>,
}

impl LocalCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self, key: &str, now: Instant) -> Option<TierValue> {
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                return Some(TierValue {
                    value: entry.value.clone(),
                    remaining: Some(entry.remaining(now)),
                });
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        }
        None
    }

    fn write(&self, key: &str, value: &str, ttl: Duration) {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                ttl,
                stored_at: Instant::now(),
            },
        );
    }

    /// Inserts unless a live entry is present; returns whether it wrote.
    fn write_if_absent(&self, key: &str, value: &str, ttl: Duration) -> bool {
        let now = Instant::now();
        let entry = CacheEntry {
            value: value.to_string(),
            ttl,
            stored_at: now,
        };
        match self.entries.entry(key.to_string()) {
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
                true
            }
            Entry::Occupied(mut occupied) if occupied.get().is_expired(now) => {
                occupied.insert(entry);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Drops every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheTier for LocalCache {
    fn kind(&self) -> TierKind {
        TierKind::Local
    }

    async fn get_entry(&self, key: &str) -> Result<Option<TierValue>, CacheError> {
        Ok(self.read(key, Instant::now()))
    }

    async fn mget_entries(&self, keys: &[String]) -> Result<Vec<Option<TierValue>>, CacheError> {
        let now = Instant::now();
        Ok(keys.iter().map(|key| self.read(key, now)).collect())
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.write(key, value, ttl);
        Ok(())
    }

    async fn mset(&self, entries: &[(String, String)], ttl: Duration) -> Result<(), CacheError> {
        for (key, value) in entries {
            self.write(key, value, ttl);
        }
        Ok(())
    }

    async fn mset_if_absent(
        &self,
        entries: &[(String, String, Duration)],
    ) -> Result<(), CacheError> {
        for (key, value, ttl) in entries {
            self.write_if_absent(key, value, *ttl);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }
}
