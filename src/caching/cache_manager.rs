//! # Cache Manager
//!
//! The non-throwing facade over a `CacheStore`. Every public operation bounds
//! the backend call with `operation_timeout` and turns failures into a miss,
//! `false` or `TtlStatus::Absent`, so callers can proceed as though the cache
//! did not exist. The `try_*` variants keep the error for tooling that needs it.
//!
//! Lifecycle is explicit: `new` builds an unconnected manager, `init` connects
//! to the configured backend and `close` releases it. A failed `init` leaves
//! the cache disabled until `init` is called again.

use super::stores::{
    CacheStore, CacheTtl, InMemoryCache, RedisCache, RedisCacheConfig, RestCache,
    RestCacheConfig, TtlStatus,
};
use super::{CacheError, CacheResult, DEFAULT_QUANTIZATION_PRECISION};
use super::key_generator::MAX_QUANTIZATION_PRECISION;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Which backend the manager connects to on `init`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Process-local store, lost on restart
    Memory,
    /// Redis over its native protocol
    Redis(RedisCacheConfig),
    /// Redis over the Upstash-style REST protocol
    Rest(RestCacheConfig),
    /// No cache; every lookup passes through
    Disabled,
}

impl BackendConfig {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Redis(_) => "redis",
            Self::Rest(_) => "rest",
            Self::Disabled => "disabled",
        }
    }
}

fn default_backend() -> BackendConfig {
    BackendConfig::Memory
}

fn default_quantization_precision() -> u32 {
    DEFAULT_QUANTIZATION_PRECISION
}

fn default_operation_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_diagnostics_ttl() -> Duration {
    Duration::from_secs(60)
}

fn default_warmup_concurrency() -> usize {
    16
}

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_backend")]
    pub backend: BackendConfig,

    /// TTL applied to new entries; `0s` stores them perpetually
    #[serde(default, with = "humantime_serde")]
    pub default_ttl: Duration,

    /// Decimal places kept when quantizing coordinates
    #[serde(default = "default_quantization_precision")]
    pub quantization_precision: u32,

    /// Upper bound for a single backend call
    #[serde(default = "default_operation_timeout", with = "humantime_serde")]
    pub operation_timeout: Duration,

    /// Upper bound for connecting in `init`
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// TTL of the synthetic round-trip entry
    #[serde(default = "default_diagnostics_ttl", with = "humantime_serde")]
    pub diagnostics_ttl: Duration,

    /// Concurrent existence checks during warmup estimation
    #[serde(default = "default_warmup_concurrency")]
    pub warmup_concurrency: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            default_ttl: Duration::ZERO,
            quantization_precision: default_quantization_precision(),
            operation_timeout: default_operation_timeout(),
            connect_timeout: default_connect_timeout(),
            diagnostics_ttl: default_diagnostics_ttl(),
            warmup_concurrency: default_warmup_concurrency(),
        }
    }
}

impl CacheConfig {
    /// Expiration policy for entries written with the default TTL
    pub fn default_cache_ttl(&self) -> CacheTtl {
        CacheTtl::from_duration(self.default_ttl)
    }

    pub fn validate(&self) -> CacheResult<()> {
        let invalid = |message: String| -> CacheResult<()> { Err(CacheError::Configuration { message }) };

        if !(1..=MAX_QUANTIZATION_PRECISION).contains(&self.quantization_precision) {
            return invalid(format!(
                "quantization_precision must be between 1 and {}, got {}",
                MAX_QUANTIZATION_PRECISION, self.quantization_precision
            ));
        }
        if self.operation_timeout.is_zero() {
            return invalid("operation_timeout must be greater than zero".to_string());
        }
        if self.connect_timeout.is_zero() {
            return invalid("connect_timeout must be greater than zero".to_string());
        }
        if self.diagnostics_ttl.is_zero() {
            return invalid("diagnostics_ttl must be greater than zero".to_string());
        }
        if self.warmup_concurrency == 0 {
            return invalid("warmup_concurrency must be greater than zero".to_string());
        }

        match &self.backend {
            BackendConfig::Redis(redis) => {
                if let Err(e) = url::Url::parse(&redis.url) {
                    return invalid(format!("invalid redis url '{}': {}", redis.url, e));
                }
            }
            BackendConfig::Rest(rest) => {
                if let Err(e) = url::Url::parse(&rest.url) {
                    return invalid(format!("invalid REST cache url '{}': {}", rest.url, e));
                }
                if rest.token.trim().is_empty() {
                    return invalid("REST cache token must not be empty".to_string());
                }
            }
            BackendConfig::Memory | BackendConfig::Disabled => {}
        }

        Ok(())
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    /// Connected backend, `None` when the cache is disabled
    pub backend: Option<String>,

    /// A store is connected
    pub available: bool,

    /// The last backend call failed
    pub degraded: bool,

    /// Total cache hits
    pub hits: u64,

    /// Total cache misses, including reads absorbed after a failure
    pub misses: u64,

    /// Cache hit ratio
    pub hit_ratio: f64,

    /// Successful writes
    pub writes: u64,

    /// Backend calls that failed or timed out
    pub errors: u64,

    /// Stored values that could not be decoded
    pub malformed_entries: u64,

    /// Statistics collection start time
    pub start_time: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    errors: AtomicU64,
    malformed: AtomicU64,
}

/// Degrading facade over the configured cache store
pub struct CacheManager {
    config: CacheConfig,
    store: RwLock<Option<Arc<dyn CacheStore>>>,
    degraded: AtomicBool,
    counters: Counters,
    start_time: chrono::DateTime<chrono::Utc>,
}

impl CacheManager {
    /// Create a manager that is not connected yet; call `init` before use
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            store: RwLock::new(None),
            degraded: AtomicBool::new(false),
            counters: Counters::default(),
            start_time: chrono::Utc::now(),
        }
    }

    /// Create a manager around an already constructed store
    pub fn with_store(config: CacheConfig, store: Arc<dyn CacheStore>) -> Self {
        Self {
            store: RwLock::new(Some(store)),
            ..Self::new(config)
        }
    }

    /// Connect to the configured backend. Returns whether a store is available.
    ///
    /// Failure is logged and leaves the cache disabled; lookups keep working
    /// in pass-through mode.
    pub async fn init(&self) -> bool {
        let backend = self.config.backend.name();

        let connected = match tokio::time::timeout(self.config.connect_timeout, self.connect()).await {
            Ok(Ok(store)) => store,
            Ok(Err(e)) => {
                warn!(backend = backend, error = %e, "Cache backend unavailable, continuing without cache");
                None
            }
            Err(_) => {
                warn!(backend = backend, timeout = ?self.config.connect_timeout, "Cache backend connect timed out, continuing without cache");
                None
            }
        };

        let available = connected.is_some();
        *self.store.write().await = connected;
        self.degraded.store(false, Ordering::Relaxed);

        if available {
            info!(backend = backend, "Cache store initialized");
        }
        available
    }

    async fn connect(&self) -> CacheResult<Option<Arc<dyn CacheStore>>> {
        let store: Arc<dyn CacheStore> = match &self.config.backend {
            BackendConfig::Disabled => {
                info!("Cache disabled by configuration");
                return Ok(None);
            }
            BackendConfig::Memory => Arc::new(InMemoryCache::new()),
            BackendConfig::Redis(redis) => Arc::new(RedisCache::new(redis.clone()).await?),
            BackendConfig::Rest(rest) => {
                let store = RestCache::new(rest.clone())?;
                if !store.ping().await? {
                    return Err(CacheError::store("REST backend did not answer PING"));
                }
                Arc::new(store)
            }
        };
        Ok(Some(store))
    }

    /// Release the store; subsequent operations pass through
    pub async fn close(&self) {
        if let Some(store) = self.store.write().await.take() {
            info!(backend = store.backend_name(), "Cache store closed");
        }
    }

    /// Get cache configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Whether a store is connected. No backend call is made.
    pub async fn is_available(&self) -> bool {
        self.store.read().await.is_some()
    }

    pub async fn backend_name(&self) -> Option<&'static str> {
        self.store.read().await.as_ref().map(|store| store.backend_name())
    }

    /// Round-trip liveness check
    pub async fn ping(&self) -> bool {
        self.call("ping", |store| async move { store.ping().await })
            .await
            .unwrap_or(false)
    }

    /// Read and decode a value. Malformed payloads are logged and treated as absent.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.try_get_raw(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) | Err(_) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Err(e) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                self.counters.malformed.fetch_add(1, Ordering::Relaxed);
                warn!(key = %key, error = %e, "Malformed cache entry treated as absent");
                None
            }
        }
    }

    /// Serialize and store a value. `CacheTtl::Perpetual` stores it without a deadline.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: CacheTtl) -> bool {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to serialize cache value");
                return false;
            }
        };
        self.try_set_raw(key, &raw, ttl).await.is_ok()
    }

    /// Delete a key, returning whether an entry existed
    pub async fn delete(&self, key: &str) -> bool {
        self.try_delete(key).await.unwrap_or(false)
    }

    pub async fn exists(&self, key: &str) -> bool {
        self.try_exists(key).await.unwrap_or(false)
    }

    pub async fn ttl_remaining(&self, key: &str) -> TtlStatus {
        self.try_ttl(key).await.unwrap_or(TtlStatus::Absent)
    }

    /// Convert an expiring entry to perpetual in place
    pub async fn remove_expiration(&self, key: &str) -> bool {
        self.try_remove_expiration(key).await.unwrap_or(false)
    }

    pub async fn try_get_raw(&self, key: &str) -> CacheResult<Option<String>> {
        self.call("get", |store| async move { store.get(key).await }).await
    }

    pub async fn try_set_raw(&self, key: &str, value: &str, ttl: CacheTtl) -> CacheResult<()> {
        self.call("set", |store| async move { store.set(key, value, ttl).await })
            .await?;
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, ttl = ?ttl, "Cached entry");
        Ok(())
    }

    pub async fn try_delete(&self, key: &str) -> CacheResult<bool> {
        self.call("delete", |store| async move { store.delete(key).await }).await
    }

    pub async fn try_exists(&self, key: &str) -> CacheResult<bool> {
        self.call("exists", |store| async move { store.exists(key).await }).await
    }

    pub async fn try_ttl(&self, key: &str) -> CacheResult<TtlStatus> {
        self.call("ttl", |store| async move { store.ttl(key).await }).await
    }

    pub async fn try_remove_expiration(&self, key: &str) -> CacheResult<bool> {
        self.call("persist", |store| async move { store.persist(key).await }).await
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        let hits = self.counters.hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        let backend = self.backend_name().await;

        CacheStats {
            available: backend.is_some(),
            backend: backend.map(str::to_string),
            degraded: self.degraded.load(Ordering::Relaxed),
            hits,
            misses,
            hit_ratio: if lookups > 0 { hits as f64 / lookups as f64 } else { 0.0 },
            writes: self.counters.writes.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
            malformed_entries: self.counters.malformed.load(Ordering::Relaxed),
            start_time: self.start_time,
        }
    }

    /// Run one bounded backend call and track healthy/degraded transitions
    async fn call<T, F, Fut>(&self, operation: &'static str, f: F) -> CacheResult<T>
    where
        F: FnOnce(Arc<dyn CacheStore>) -> Fut,
        Fut: Future<Output = CacheResult<T>>,
    {
        let store = self
            .store
            .read()
            .await
            .clone()
            .ok_or(CacheError::Unavailable)?;

        let result = match tokio::time::timeout(self.config.operation_timeout, f(store)).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout),
        };

        match &result {
            Ok(_) => {
                if self.degraded.swap(false, Ordering::Relaxed) {
                    info!(operation = operation, "Cache backend recovered");
                }
            }
            Err(e) => {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                if !self.degraded.swap(true, Ordering::Relaxed) {
                    warn!(operation = operation, error = %e, "Cache backend degraded, serving without cache");
                } else {
                    debug!(operation = operation, error = %e, "Cache operation failed");
                }
            }
        }

        result
    }
}
