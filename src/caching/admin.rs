//! # Cache Admin Interface
//!
//! Operational HTTP endpoints over the cache tooling: health, statistics,
//! per-key introspection and repair, round-trip diagnostics, warmup estimation
//! and expiring-to-perpetual migration.

use super::{
    derive_key, CacheDiagnostics, CacheIntrospector, CacheMaintenance, CacheManager, CacheStats,
    KeyDescription, KeyGenerator, KeyInspection, LookupRequest, MigrationReport, MigrationTarget,
    NormalizedInputs, OperationKind, RoundTripReport, WarmupEstimate,
};
use crate::core::error::{GeocacheError, GeocacheResult};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Cache admin state
#[derive(Clone)]
pub struct CacheAdminState {
    pub cache_manager: Arc<CacheManager>,
    pub introspector: Arc<CacheIntrospector>,
    pub diagnostics: Arc<CacheDiagnostics>,
    pub maintenance: Arc<CacheMaintenance>,
    pub key_generator: KeyGenerator,
}

impl CacheAdminState {
    pub fn new(cache_manager: Arc<CacheManager>) -> Self {
        Self {
            introspector: Arc::new(CacheIntrospector::new(cache_manager.clone())),
            diagnostics: Arc::new(CacheDiagnostics::new(cache_manager.clone())),
            maintenance: Arc::new(CacheMaintenance::new(cache_manager.clone())),
            key_generator: KeyGenerator::new(cache_manager.config().quantization_precision),
            cache_manager,
        }
    }
}

/// Cache admin router
pub struct CacheAdminRouter;

impl CacheAdminRouter {
    /// Create cache admin router
    pub fn create_router(state: CacheAdminState) -> Router {
        Router::new()
            .route("/cache/health", get(get_cache_health))
            .route("/cache/stats", get(get_cache_stats))
            .route("/cache/keys/derive", post(derive_cache_key))
            .route("/cache/keys/:key", get(describe_cache_key).delete(repair_cache_key))
            .route("/cache/keys/:key/inspect", get(inspect_cache_key))
            .route("/cache/diagnostics/round-trip", post(run_round_trip))
            .route("/cache/warmup/estimate", post(estimate_warmup))
            .route("/cache/migrate", post(migrate_to_perpetual))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}

/// Cache health response
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheHealthResponse {
    pub healthy: bool,
    pub available: bool,
    pub backend: Option<String>,
    pub degraded: bool,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Cache statistics response
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheStatsResponse {
    pub stats: CacheStats,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Outcome of a key repair
#[derive(Debug, Serialize, Deserialize)]
pub struct RepairResponse {
    pub key: String,
    pub deleted: bool,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Warmup estimation request
#[derive(Debug, Serialize, Deserialize)]
pub struct WarmupRequest {
    pub requests: Vec<LookupRequest>,
}

/// Key derived from a lookup request
#[derive(Debug, Serialize, Deserialize)]
pub struct DerivedKeyResponse {
    pub key: String,
    pub kind: OperationKind,
    pub normalized: NormalizedInputs,
}

/// Get cache health status
pub async fn get_cache_health(State(state): State<CacheAdminState>) -> Json<CacheHealthResponse> {
    let available = state.cache_manager.is_available().await;
    let healthy = available && state.cache_manager.ping().await;
    let stats = state.cache_manager.stats().await;

    Json(CacheHealthResponse {
        healthy,
        available,
        backend: stats.backend,
        degraded: stats.degraded,
        timestamp: chrono::Utc::now(),
    })
}

/// Get cache statistics
pub async fn get_cache_stats(State(state): State<CacheAdminState>) -> Json<CacheStatsResponse> {
    let stats = state.cache_manager.stats().await;

    info!(
        hits = stats.hits,
        misses = stats.misses,
        "Cache stats requested - hit_ratio: {:.2}%",
        stats.hit_ratio * 100.0
    );

    Json(CacheStatsResponse {
        stats,
        timestamp: chrono::Utc::now(),
    })
}

/// Describe a stored key
pub async fn describe_cache_key(
    State(state): State<CacheAdminState>,
    Path(key): Path<String>,
) -> GeocacheResult<Json<KeyDescription>> {
    state
        .introspector
        .describe(&key)
        .await
        .map(Json)
        .ok_or_else(|| GeocacheError::not_found(format!("cache key '{}'", key)))
}

/// Inspect the raw representation of a key
pub async fn inspect_cache_key(
    State(state): State<CacheAdminState>,
    Path(key): Path<String>,
) -> Json<KeyInspection> {
    Json(state.diagnostics.inspect_key(&key).await)
}

/// Delete a key suspected of holding a malformed payload
pub async fn repair_cache_key(
    State(state): State<CacheAdminState>,
    Path(key): Path<String>,
) -> Json<RepairResponse> {
    let deleted = state.diagnostics.repair_key(&key).await;
    info!(key = %key, deleted = deleted, "Cache key repair requested via admin API");

    Json(RepairResponse {
        key,
        deleted,
        timestamp: chrono::Utc::now(),
    })
}

/// Run the write/read/delete round trip against the live store
pub async fn run_round_trip(State(state): State<CacheAdminState>) -> Json<RoundTripReport> {
    Json(state.diagnostics.run_round_trip_check().await)
}

/// Forecast hits for a batch of lookups
pub async fn estimate_warmup(
    State(state): State<CacheAdminState>,
    Json(request): Json<WarmupRequest>,
) -> Json<WarmupEstimate> {
    Json(state.maintenance.estimate_warmup(&request.requests).await)
}

/// Convert listed expiring keys to perpetual
pub async fn migrate_to_perpetual(
    State(state): State<CacheAdminState>,
    Json(target): Json<MigrationTarget>,
) -> GeocacheResult<Json<MigrationReport>> {
    let report = state.maintenance.migrate_expiring_to_perpetual(target).await?;
    Ok(Json(report))
}

/// Derive the cache key of a lookup request
pub async fn derive_cache_key(
    State(state): State<CacheAdminState>,
    Json(request): Json<LookupRequest>,
) -> GeocacheResult<Json<DerivedKeyResponse>> {
    let normalized = state.key_generator.normalize(&request)?;
    let key = derive_key(request.kind, &normalized, request.user_scope.as_deref());

    Ok(Json(DerivedKeyResponse {
        key,
        kind: request.kind,
        normalized,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caching::{BackendConfig, CacheConfig, CacheEntry, CacheTtl, TtlStatus};
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::json;

    async fn create_test_state() -> CacheAdminState {
        let cache_manager = Arc::new(CacheManager::new(CacheConfig::default()));
        cache_manager.init().await;
        CacheAdminState::new(cache_manager)
    }

    #[tokio::test]
    async fn test_cache_health_endpoint() {
        let state = create_test_state().await;
        let server = TestServer::new(CacheAdminRouter::create_router(state)).unwrap();

        let response = server.get("/cache/health").await;
        assert_eq!(response.status_code(), StatusCode::OK);

        let health: CacheHealthResponse = response.json();
        assert!(health.healthy);
        assert_eq!(health.backend.as_deref(), Some("memory"));
    }

    #[tokio::test]
    async fn test_cache_health_when_disabled() {
        let cache_manager = Arc::new(CacheManager::new(CacheConfig {
            backend: BackendConfig::Disabled,
            ..Default::default()
        }));
        cache_manager.init().await;
        let server =
            TestServer::new(CacheAdminRouter::create_router(CacheAdminState::new(cache_manager))).unwrap();

        let health: CacheHealthResponse = server.get("/cache/health").await.json();
        assert!(!health.healthy);
        assert!(!health.available);
    }

    #[tokio::test]
    async fn test_cache_stats_endpoint() {
        let state = create_test_state().await;
        state.cache_manager.set("k", &1, CacheTtl::Perpetual).await;
        let server = TestServer::new(CacheAdminRouter::create_router(state)).unwrap();

        let response = server.get("/cache/stats").await;
        assert_eq!(response.status_code(), StatusCode::OK);

        let stats: CacheStatsResponse = response.json();
        assert_eq!(stats.stats.writes, 1);
    }

    #[tokio::test]
    async fn test_describe_inspect_and_repair() {
        let state = create_test_state().await;
        let entry = CacheEntry::new(json!({"a": 1}), OperationKind::Reverse, CacheTtl::Perpetual);
        state.cache_manager.set("reverse:abc", &entry, CacheTtl::Perpetual).await;
        let server = TestServer::new(CacheAdminRouter::create_router(state.clone())).unwrap();

        let description: KeyDescription = server.get("/cache/keys/reverse:abc").await.json();
        assert!(description.is_perpetual);
        assert_eq!(description.ttl_remaining, TtlStatus::NoExpiration);

        let inspection: KeyInspection = server.get("/cache/keys/reverse:abc/inspect").await.json();
        assert_eq!(inspection.decoded_type.as_deref(), Some("object"));

        let response = server.delete("/cache/keys/reverse:abc").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let repair: RepairResponse = response.json();
        assert!(repair.deleted);

        let response = server.get("/cache/keys/reverse:abc").await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_round_trip_endpoint() {
        let state = create_test_state().await;
        let server = TestServer::new(CacheAdminRouter::create_router(state.clone())).unwrap();

        let report: RoundTripReport = server.post("/cache/diagnostics/round-trip").await.json();
        assert!(report.passed);
        assert!(!state.cache_manager.exists(&report.key).await);
    }

    #[tokio::test]
    async fn test_warmup_endpoint() {
        let state = create_test_state().await;
        let server = TestServer::new(CacheAdminRouter::create_router(state)).unwrap();

        let response = server
            .post("/cache/warmup/estimate")
            .json(&json!({
                "requests": [
                    {"kind": "reverse", "lat": 40.71, "lng": -74.01},
                    {"kind": "forward", "address": ""}
                ]
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);

        let estimate: WarmupEstimate = response.json();
        assert_eq!(estimate.total, 2);
        assert_eq!(estimate.needs_resolution, 1);
        assert_eq!(estimate.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_migrate_endpoint() {
        let state = create_test_state().await;
        state.cache_manager.set("forward:a", &1, CacheTtl::from_secs(60)).await;
        let server = TestServer::new(CacheAdminRouter::create_router(state)).unwrap();

        let report: MigrationReport = server
            .post("/cache/migrate")
            .json(&json!({"keys": ["forward:a"]}))
            .await
            .json();
        assert_eq!(report.migrated, 1);

        let response = server
            .post("/cache/migrate")
            .json(&json!({"pattern": "forward:*"}))
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"]["type"], "unsupported_operation");
    }

    #[tokio::test]
    async fn test_derive_key_endpoint() {
        let state = create_test_state().await;
        let server = TestServer::new(CacheAdminRouter::create_router(state)).unwrap();

        let derived: DerivedKeyResponse = server
            .post("/cache/keys/derive")
            .json(&json!({"kind": "reverse", "lat": 40.71276, "lng": -74.00594}))
            .await
            .json();
        assert_eq!(
            derived.key,
            "reverse:33d03bf74225002cd81e9f5c8348b066a29dace328fa7fafdf47b6637d6b8a4a"
        );
        assert_eq!(derived.normalized.lat.as_deref(), Some("40.71"));

        let response = server
            .post("/cache/keys/derive")
            .json(&json!({"kind": "reverse", "lat": 91.0, "lng": 0.0}))
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_derive_key_endpoint_matches_key_generator() {
        let state = create_test_state().await;
        let server = TestServer::new(CacheAdminRouter::create_router(state)).unwrap();

        let derived: DerivedKeyResponse = server
            .post("/cache/keys/derive")
            .json(&json!({"kind": "forward", "address": " Berlin ", "language": "DE", "userScope": "tenant-7"}))
            .await
            .json();

        let request = LookupRequest::forward("Berlin")
            .with_language("de")
            .with_user_scope("tenant-7");
        assert_eq!(derived.key, KeyGenerator::default().key_for(&request).unwrap());
        assert!(derived.key.starts_with("forward:user:tenant-7:"));
        assert_eq!(derived.normalized.address.as_deref(), Some("Berlin"));
    }
}
