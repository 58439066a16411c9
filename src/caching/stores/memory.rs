//! # In-Memory Cache Store
//!
//! A process-local store on top of `DashMap`. Expired entries are dropped
//! lazily when they are touched, and every `SWEEP_INTERVAL` writes a sweep
//! reclaims expired entries nobody reads again. There is no background task
//! and no size-based eviction.

use super::{CacheStore, CacheTtl, TtlStatus};
use crate::caching::CacheResult;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::debug;

/// Writes between two sweeps of expired entries
pub const SWEEP_INTERVAL: u64 = 256;

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// In-memory cache implementation
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: DashMap<String, StoredValue>,
    expired_cleanups: AtomicU64,
    writes: AtomicU64,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|entry| !entry.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries removed because their deadline had passed
    pub fn expired_cleanups(&self) -> u64 {
        self.expired_cleanups.load(Ordering::Relaxed)
    }

    /// Drop every expired entry; returns how many were removed
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.entries.retain(|_, value| {
            let keep = !value.is_expired(now);
            if !keep {
                removed += 1;
            }
            keep
        });

        if removed > 0 {
            self.expired_cleanups.fetch_add(removed as u64, Ordering::Relaxed);
            debug!(removed = removed, "Swept expired in-memory entries");
        }
        removed
    }

    /// Return the live entry for `key`, removing it if it has expired
    fn live(&self, key: &str) -> Option<StoredValue> {
        let now = Instant::now();
        let stored = self.entries.get(key)?.value().clone();

        if stored.is_expired(now) {
            if self
                .entries
                .remove_if(key, |_, value| value.is_expired(now))
                .is_some()
            {
                self.expired_cleanups.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Dropped expired in-memory entry");
            }
            return None;
        }

        Some(stored)
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.live(key).map(|stored| stored.value))
    }

    async fn set(&self, key: &str, value: &str, ttl: CacheTtl) -> CacheResult<()> {
        let expires_at = match ttl {
            CacheTtl::Perpetual => None,
            CacheTtl::Expiring(ttl) => Some(Instant::now() + ttl),
        };

        self.entries.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at,
            },
        );

        if (self.writes.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_INTERVAL == 0 {
            self.sweep_expired();
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let existed = self.live(key).is_some();
        self.entries.remove(key);
        Ok(existed)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        Ok(self.live(key).is_some())
    }

    async fn ttl(&self, key: &str) -> CacheResult<TtlStatus> {
        let status = match self.live(key) {
            None => TtlStatus::Absent,
            Some(StoredValue { expires_at: None, .. }) => TtlStatus::NoExpiration,
            Some(StoredValue {
                expires_at: Some(deadline),
                ..
            }) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                // Round up so a live key never reports zero seconds left
                let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
                TtlStatus::Remaining(secs)
            }
        };
        Ok(status)
    }

    async fn persist(&self, key: &str) -> CacheResult<bool> {
        if self.live(key).is_none() {
            return Ok(false);
        }

        match self.entries.get_mut(key) {
            Some(mut stored) if stored.expires_at.is_some() => {
                stored.expires_at = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ping(&self) -> CacheResult<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_basic_operations() {
        let cache = InMemoryCache::new();

        cache.set("reverse:abc", "{\"a\":1}", CacheTtl::Perpetual).await.unwrap();
        assert_eq!(cache.get("reverse:abc").await.unwrap().as_deref(), Some("{\"a\":1}"));
        assert!(cache.exists("reverse:abc").await.unwrap());

        assert!(cache.delete("reverse:abc").await.unwrap());
        assert!(!cache.delete("reverse:abc").await.unwrap());
        assert!(!cache.exists("reverse:abc").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let cache = InMemoryCache::new();

        cache.set("k", "one", CacheTtl::from_secs(60)).await.unwrap();
        cache.set("k", "two", CacheTtl::Perpetual).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("two"));
        assert_eq!(cache.ttl("k").await.unwrap(), TtlStatus::NoExpiration);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let cache = InMemoryCache::new();

        cache
            .set("expire_test", "value", CacheTtl::Expiring(Duration::from_millis(100)))
            .await
            .unwrap();
        assert!(cache.exists("expire_test").await.unwrap());
        assert_eq!(cache.ttl("expire_test").await.unwrap(), TtlStatus::Remaining(1));

        sleep(Duration::from_millis(150)).await;

        assert_eq!(cache.get("expire_test").await.unwrap(), None);
        assert_eq!(cache.ttl("expire_test").await.unwrap(), TtlStatus::Absent);
        assert_eq!(cache.expired_cleanups(), 1);
    }

    #[tokio::test]
    async fn test_unread_expired_entries_are_swept_by_writes() {
        let cache = InMemoryCache::new();

        cache
            .set("forgotten", "v", CacheTtl::Expiring(Duration::from_millis(10)))
            .await
            .unwrap();
        sleep(Duration::from_millis(30)).await;

        for i in 1..SWEEP_INTERVAL {
            cache.set(&format!("k{}", i), "v", CacheTtl::Perpetual).await.unwrap();
        }

        assert!(!cache.entries.contains_key("forgotten"));
        assert_eq!(cache.entries.len() as u64, SWEEP_INTERVAL - 1);
        assert_eq!(cache.expired_cleanups(), 1);
    }

    #[tokio::test]
    async fn test_sweep_keeps_live_entries() {
        let cache = InMemoryCache::new();
        cache.set("short", "v", CacheTtl::Expiring(Duration::from_millis(10))).await.unwrap();
        cache.set("long", "v", CacheTtl::from_secs(60)).await.unwrap();
        cache.set("forever", "v", CacheTtl::Perpetual).await.unwrap();
        sleep(Duration::from_millis(30)).await;

        assert_eq!(cache.sweep_expired(), 1);
        assert_eq!(cache.entries.len(), 2);
        assert_eq!(cache.sweep_expired(), 0);
    }

    #[tokio::test]
    async fn test_persist() {
        let cache = InMemoryCache::new();

        cache.set("k", "v", CacheTtl::from_secs(30)).await.unwrap();
        assert!(matches!(cache.ttl("k").await.unwrap(), TtlStatus::Remaining(s) if s <= 30));

        assert!(cache.persist("k").await.unwrap());
        assert_eq!(cache.ttl("k").await.unwrap(), TtlStatus::NoExpiration);

        // Already perpetual, and missing keys
        assert!(!cache.persist("k").await.unwrap());
        assert!(!cache.persist("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_ping() {
        let cache = InMemoryCache::new();
        assert!(cache.ping().await.unwrap());
        assert_eq!(cache.backend_name(), "memory");
    }
}
