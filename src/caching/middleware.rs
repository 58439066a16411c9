//! # Response Cache Middleware
//!
//! `ResponseCache::with_cache` wraps an expensive computation (the provider
//! call) with a read-through cache:
//!
//! ```text
//! CHECK_STORE ─┬─ unavailable ─────────────────────────▶ COMPUTE ─▶ RETURN
//!              ├─ HIT  ─▶ ENRICH ─▶ RETURN
//!              └─ MISS ─▶ COMPUTE ─▶ CAPTURE ─▶ RETURN
//!                                       └──(background)──▶ STORE
//! ```
//!
//! Only `Resolution::Success` is captured. The write happens in a tracked
//! background task so the caller never waits on the store; `flush` awaits the
//! outstanding writes. There is no single-flight coordination: concurrent
//! misses for one key each compute and each write.

use super::cache_manager::CacheManager;
use super::entry::CacheEntry;
use super::key_generator::OperationKind;
use super::stores::CacheTtl;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

/// Outcome of a computation that reports logical success explicitly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution<T> {
    Success(T),
    Failure { reason: String },
}

impl<T> Resolution<T> {
    pub fn failure<S: Into<String>>(reason: S) -> Self {
        Self::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Resolution<U> {
        match self {
            Self::Success(value) => Resolution::Success(f(value)),
            Self::Failure { reason } => Resolution::Failure { reason },
        }
    }

    pub fn success(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure { .. } => None,
        }
    }
}

/// How results of one operation kind are cached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub kind: OperationKind,
    pub ttl: CacheTtl,
}

impl CachePolicy {
    pub fn new(kind: OperationKind, ttl: CacheTtl) -> Self {
        Self { kind, ttl }
    }

    pub fn perpetual(kind: OperationKind) -> Self {
        Self::new(kind, CacheTtl::Perpetual)
    }
}

/// Cache provenance merged around a served payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheInfo {
    /// Served from the cache rather than computed
    pub cached: bool,
    pub cache_age_seconds: u64,
    pub perpetual: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<DateTime<Utc>>,
    pub served_at: DateTime<Utc>,
    pub operation_kind: OperationKind,
}

/// A payload together with where it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Served<T> {
    pub payload: T,
    pub cache: CacheInfo,
}

impl<T> Served<T> {
    fn from_entry(entry: CacheEntry<T>, now: DateTime<Utc>) -> Self {
        let metadata = entry.metadata;
        Self {
            payload: entry.payload,
            cache: CacheInfo {
                cached: true,
                cache_age_seconds: metadata.age_seconds(now),
                perpetual: metadata.perpetual,
                cached_at: Some(metadata.cached_at),
                served_at: now,
                operation_kind: metadata.operation_kind,
            },
        }
    }

    fn computed(payload: T, policy: &CachePolicy, stored: bool) -> Self {
        Self {
            payload,
            cache: CacheInfo {
                cached: false,
                cache_age_seconds: 0,
                perpetual: stored && policy.ttl.is_perpetual(),
                cached_at: None,
                served_at: Utc::now(),
                operation_kind: policy.kind,
            },
        }
    }
}

/// Read-through cache around expensive computations
#[derive(Clone)]
pub struct ResponseCache {
    manager: Arc<CacheManager>,
    writes: TaskTracker,
}

impl ResponseCache {
    pub fn new(manager: Arc<CacheManager>) -> Self {
        Self {
            manager,
            writes: TaskTracker::new(),
        }
    }

    pub fn manager(&self) -> &Arc<CacheManager> {
        &self.manager
    }

    /// Serve `key` from the cache or run `compute` once and store its success.
    ///
    /// Cache failures never surface here; the result is the same as without a
    /// cache, only slower.
    pub async fn with_cache<T, F, Fut>(
        &self,
        key: &str,
        policy: &CachePolicy,
        compute: F,
    ) -> Resolution<Served<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Resolution<T>>,
    {
        if !self.manager.is_available().await {
            debug!(key = %key, "Cache unavailable, passing through");
            return compute()
                .await
                .map(|payload| Served::computed(payload, policy, false));
        }

        if let Some(entry) = self.manager.get::<CacheEntry<T>>(key).await {
            debug!(key = %key, "Cache hit");
            return Resolution::Success(Served::from_entry(entry, Utc::now()));
        }

        debug!(key = %key, "Cache miss, computing");
        match compute().await {
            Resolution::Success(payload) => {
                let entry = CacheEntry::new(&payload, policy.kind, policy.ttl);
                let stored = self.store_in_background(key, entry, policy.ttl);
                Resolution::Success(Served::computed(payload, policy, stored))
            }
            Resolution::Failure { reason } => {
                debug!(key = %key, reason = %reason, "Computation failed, not caching");
                Resolution::Failure { reason }
            }
        }
    }

    /// Spawn the write of a fresh entry; returns whether a write was scheduled
    fn store_in_background<T: Serialize>(&self, key: &str, entry: CacheEntry<&T>, ttl: CacheTtl) -> bool {
        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to serialize computed result, not caching");
                return false;
            }
        };

        let manager = self.manager.clone();
        let key = key.to_string();
        self.writes.spawn(async move {
            if let Err(e) = manager.try_set_raw(&key, &raw, ttl).await {
                warn!(key = %key, error = %e, "Cache write failed");
            }
        });
        true
    }

    /// Number of background writes still running
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    /// Wait for every background write started so far
    pub async fn flush(&self) {
        self.writes.close();
        self.writes.wait().await;
        self.writes.reopen();
    }
}
