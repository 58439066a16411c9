//! # Geocode Service
//!
//! Composes key derivation and the response cache around a geocoding
//! provider. The provider itself (HTTP client, result parsing) lives outside
//! this crate and plugs in through `GeocodeProvider`.

use crate::caching::{
    derive_key, CacheConfig, CachePolicy, KeyGenerator, LookupInput, LookupRequest, NormalizedInputs,
    OperationKind, Resolution, ResponseCache, Served,
};
use crate::core::error::GeocacheResult;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// The expensive computation behind a cache miss
#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    /// Coordinates to address
    async fn reverse(&self, lat: f64, lng: f64, language: Option<&str>) -> Resolution<Value>;

    /// Address to coordinates
    async fn forward(&self, address: &str, language: Option<&str>) -> Resolution<Value>;
}

/// Cached geocoding lookups
pub struct GeocodeService<P> {
    provider: P,
    cache: ResponseCache,
    keys: KeyGenerator,
    reverse_policy: CachePolicy,
    forward_policy: CachePolicy,
}

impl<P: GeocodeProvider> GeocodeService<P> {
    pub fn new(provider: P, cache: ResponseCache, config: &CacheConfig) -> Self {
        let ttl = config.default_cache_ttl();
        Self {
            provider,
            cache,
            keys: KeyGenerator::new(config.quantization_precision),
            reverse_policy: CachePolicy::new(OperationKind::Reverse, ttl),
            forward_policy: CachePolicy::new(OperationKind::Forward, ttl),
        }
    }

    /// Override the cache policy of one operation kind
    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        match policy.kind {
            OperationKind::Reverse => self.reverse_policy = policy,
            OperationKind::Forward => self.forward_policy = policy,
        }
        self
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub async fn reverse(&self, lat: f64, lng: f64) -> GeocacheResult<Resolution<Served<Value>>> {
        self.lookup(&LookupRequest::reverse(lat, lng)).await
    }

    pub async fn forward(&self, address: &str) -> GeocacheResult<Resolution<Served<Value>>> {
        self.lookup(&LookupRequest::forward(address)).await
    }

    /// Resolve a lookup through the cache.
    ///
    /// Invalid requests are rejected before the store or the provider is
    /// touched. The provider is called with the normalized inputs, so the
    /// stored result matches every request that shares its key.
    pub async fn lookup(&self, request: &LookupRequest) -> GeocacheResult<Resolution<Served<Value>>> {
        let normalized = self.keys.normalize(request)?;
        let key = derive_key(request.kind, &normalized, request.user_scope.as_deref());
        let policy = match request.kind {
            OperationKind::Reverse => &self.reverse_policy,
            OperationKind::Forward => &self.forward_policy,
        };

        debug!(key = %key, kind = %request.kind, "Geocode lookup");
        let resolution = self
            .cache
            .with_cache(&key, policy, || self.resolve(request, &normalized))
            .await;
        Ok(resolution)
    }

    async fn resolve(&self, request: &LookupRequest, normalized: &NormalizedInputs) -> Resolution<Value> {
        let language = normalized.language.as_deref();

        match &request.input {
            LookupInput::Address { .. } => match normalized.address.as_deref() {
                Some(address) => self.provider.forward(address, language).await,
                None => Resolution::failure("normalized forward lookup has no address"),
            },
            LookupInput::Coordinates { .. } => match (normalized.lat_value(), normalized.lng_value()) {
                (Some(lat), Some(lng)) => self.provider.reverse(lat, lng, language).await,
                _ => Resolution::failure("normalized reverse lookup has no coordinates"),
            },
        }
    }
}
