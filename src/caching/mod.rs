//! # Geocode Response Cache
//!
//! This module provides the caching layer that sits in front of the external
//! geocoding provider. Resolved lookups are stored either perpetually or with a
//! TTL, and every cache failure degrades to "cache unavailable" instead of
//! failing the lookup.
//!
//! ## Features
//! - Deterministic cache keys with coordinate quantization
//! - Interchangeable backends: in-memory, Redis (socket) and Redis REST
//! - Perpetual (`TTL = 0`) and expiring entries
//! - A `with_cache` wrapper that serves hits and writes misses behind the response
//! - Provenance metadata embedded in every stored document
//! - Introspection, round-trip diagnostics, repair, warmup and migration tooling
//!
//! ## Architecture
//! 1. **Key Generator**: turns a `LookupRequest` into a stable key
//! 2. **Cache Stores**: raw backends behind the `CacheStore` trait
//! 3. **Cache Manager**: the non-throwing facade with timeouts and degradation
//! 4. **Response Cache**: the `with_cache` decorator around the provider call
//! 5. **Tooling**: introspection, diagnostics, warmup/migration and admin routes
//!
//! ## Usage Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use geocode_cache::caching::{
//!     CacheConfig, CacheManager, CachePolicy, KeyGenerator, LookupRequest, OperationKind,
//!     Resolution, ResponseCache,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CacheConfig::default();
//! let manager = Arc::new(CacheManager::new(config.clone()));
//! manager.init().await;
//!
//! let request = LookupRequest::reverse(40.71276, -74.00594);
//! let key = KeyGenerator::new(config.quantization_precision).key_for(&request)?;
//!
//! let cache = ResponseCache::new(manager.clone());
//! let policy = CachePolicy::new(OperationKind::Reverse, config.default_cache_ttl());
//! let served = cache
//!     .with_cache(&key, &policy, || async {
//!         Resolution::Success(serde_json::json!({"formatted_address": "New York, NY, USA"}))
//!     })
//!     .await;
//! # let _ = served;
//! # Ok(())
//! # }
//! ```

pub mod admin;
pub mod cache_manager;
pub mod diagnostics;
pub mod entry;
pub mod introspection;
pub mod key_generator;
pub mod middleware;
pub mod stores;
pub mod warmup;

pub use admin::{CacheAdminRouter, CacheAdminState};
pub use cache_manager::{BackendConfig, CacheConfig, CacheManager, CacheStats};
pub use diagnostics::{
    CacheDiagnostics, DiagnosticStep, KeyInspection, RoundTripReport, StepResult,
    DIAGNOSTIC_KEY_PREFIX,
};
pub use entry::{CacheEntry, CacheMetadata};
pub use introspection::{CacheIntrospector, KeyDescription};
pub use key_generator::{
    derive_key, quantize, CacheKey, KeyGenerator, LookupInput, LookupRequest, NormalizedInputs,
    OperationKind, DEFAULT_QUANTIZATION_PRECISION, MAX_QUANTIZATION_PRECISION,
};
pub use middleware::{CacheInfo, CachePolicy, Resolution, ResponseCache, Served};
pub use stores::{
    CacheStore, CacheTtl, InMemoryCache, RedisCache, RedisCacheConfig, RestCache, RestCacheConfig,
    TtlStatus,
};
pub use warmup::{
    CacheMaintenance, MigrationItemError, MigrationReport, MigrationTarget, WarmupEstimate,
    WarmupItemError,
};

/// Cache operation result
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-specific error types
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache store error: {message}")]
    Store { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Cache REST backend error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid lookup request: {field} - {reason}")]
    InvalidRequest { field: String, reason: String },

    #[error("Malformed cache entry at {key}: {reason}")]
    MalformedEntry { key: String, reason: String },

    #[error("Pattern-based migration is not supported (pattern: {pattern}); supply an explicit key list")]
    PatternMigrationUnsupported { pattern: String },

    #[error("Cache configuration error: {message}")]
    Configuration { message: String },

    #[error("Cache operation timeout")]
    Timeout,

    #[error("Cache not available")]
    Unavailable,
}

impl CacheError {
    pub(crate) fn invalid_request<F: Into<String>, R: Into<String>>(field: F, reason: R) -> Self {
        Self::InvalidRequest {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn store<S: Into<String>>(message: S) -> Self {
        Self::Store {
            message: message.into(),
        }
    }
}
