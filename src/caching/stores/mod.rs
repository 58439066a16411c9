//! # Cache Stores Module
//!
//! Raw key-value backends behind a single `CacheStore` trait: an in-memory
//! store, a Redis socket client and a Redis-compatible REST client. The backend
//! is chosen once, when the `CacheManager` is initialised.
//!
//! Stores speak plain strings and may fail. Decoding and failure absorption
//! happen one level up, in the manager.

pub mod memory;
pub mod redis_store;
pub mod rest_store;

pub use memory::InMemoryCache;
pub use redis_store::{RedisCache, RedisCacheConfig};
pub use rest_store::{RestCache, RestCacheConfig};

use super::CacheResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Expiration policy of a stored entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTtl {
    /// No deadline; removed only by explicit deletion
    Perpetual,
    /// Removed by the backend once the duration has elapsed
    Expiring(Duration),
}

impl CacheTtl {
    /// `0` is the no-expiration sentinel
    pub fn from_secs(seconds: u64) -> Self {
        Self::from_duration(Duration::from_secs(seconds))
    }

    pub fn from_duration(ttl: Duration) -> Self {
        if ttl.is_zero() {
            Self::Perpetual
        } else {
            Self::Expiring(ttl)
        }
    }

    pub fn is_perpetual(&self) -> bool {
        matches!(self, Self::Perpetual)
    }

    /// TTL as declared in entry metadata, `0` for perpetual entries.
    ///
    /// Sub-second remainders round up so an expiring entry never declares `0`.
    pub fn declared_seconds(&self) -> u64 {
        match self {
            Self::Perpetual => 0,
            Self::Expiring(ttl) => ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0),
        }
    }
}

/// Remaining lifetime of a key as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "seconds", rename_all = "snake_case")]
pub enum TtlStatus {
    Remaining(u64),
    NoExpiration,
    Absent,
}

impl TtlStatus {
    /// Interpret a Redis `TTL` reply (`-2` missing key, `-1` no deadline)
    pub fn from_redis_reply(reply: i64) -> Self {
        match reply {
            -2 => Self::Absent,
            -1 => Self::NoExpiration,
            n if n >= 0 => Self::Remaining(n as u64),
            _ => Self::Absent,
        }
    }

    pub fn exists(&self) -> bool {
        !matches!(self, Self::Absent)
    }
}

/// Trait for cache store implementations
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Short backend identifier used in logs and health output
    fn backend_name(&self) -> &'static str;

    /// Get the raw stored text
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store `value`, replacing any existing entry
    async fn set(&self, key: &str, value: &str, ttl: CacheTtl) -> CacheResult<()>;

    /// Delete a key, returning whether it existed
    async fn delete(&self, key: &str) -> CacheResult<bool>;

    async fn exists(&self, key: &str) -> CacheResult<bool>;

    async fn ttl(&self, key: &str) -> CacheResult<TtlStatus>;

    /// Drop the deadline of an expiring key; `false` if missing or already perpetual
    async fn persist(&self, key: &str) -> CacheResult<bool>;

    /// Liveness check without side effects
    async fn ping(&self) -> CacheResult<bool>;
}
