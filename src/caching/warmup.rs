//! Batch maintenance: warmup forecasting and expiring-to-perpetual migration.

use super::cache_manager::CacheManager;
use super::key_generator::{KeyGenerator, LookupRequest};
use super::{CacheError, CacheResult};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// A request that could not be turned into a key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmupItemError {
    pub index: usize,
    pub message: String,
}

/// Forecast of how a batch of lookups would hit the cache
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarmupEstimate {
    pub total: usize,
    pub already_cached: usize,
    pub needs_resolution: usize,
    pub errors: Vec<WarmupItemError>,
    pub store_available: bool,
    /// Existence checks that failed and were counted as needing resolution
    pub store_errors: usize,
}

/// Which keys to migrate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationTarget {
    Keys(Vec<String>),
    /// Rejected: keys are never enumerated by pattern
    Pattern(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationItemError {
    pub key: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub requested: usize,
    /// Keys whose deadline was removed
    pub migrated: usize,
    /// Keys that were missing or already perpetual
    pub unchanged: usize,
    pub errors: Vec<MigrationItemError>,
}

enum Existence {
    Cached,
    Missing,
    StoreError,
}

pub struct CacheMaintenance {
    manager: Arc<CacheManager>,
    keys: KeyGenerator,
    concurrency: usize,
}

impl CacheMaintenance {
    pub fn new(manager: Arc<CacheManager>) -> Self {
        let config = manager.config();
        let keys = KeyGenerator::new(config.quantization_precision);
        let concurrency = config.warmup_concurrency.max(1);
        Self {
            manager,
            keys,
            concurrency,
        }
    }

    /// Check which requests are already cached. Never computes anything.
    pub async fn estimate_warmup(&self, requests: &[LookupRequest]) -> WarmupEstimate {
        let store_available = self.manager.is_available().await;
        let mut estimate = WarmupEstimate {
            total: requests.len(),
            store_available,
            ..Default::default()
        };

        let mut keys = Vec::with_capacity(requests.len());
        for (index, request) in requests.iter().enumerate() {
            match self.keys.key_for(request) {
                Ok(key) => keys.push(key),
                Err(e) => estimate.errors.push(WarmupItemError {
                    index,
                    message: e.to_string(),
                }),
            }
        }

        if !store_available {
            estimate.needs_resolution = keys.len();
            return estimate;
        }

        let manager = &self.manager;
        let results: Vec<Existence> = stream::iter(keys)
            .map(|key| async move {
                match manager.try_exists(&key).await {
                    Ok(true) => Existence::Cached,
                    Ok(false) => Existence::Missing,
                    Err(_) => Existence::StoreError,
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for result in results {
            match result {
                Existence::Cached => estimate.already_cached += 1,
                Existence::Missing => estimate.needs_resolution += 1,
                Existence::StoreError => {
                    estimate.needs_resolution += 1;
                    estimate.store_errors += 1;
                }
            }
        }

        info!(
            total = estimate.total,
            already_cached = estimate.already_cached,
            needs_resolution = estimate.needs_resolution,
            invalid = estimate.errors.len(),
            "Warmup estimate computed"
        );
        estimate
    }

    /// Remove the deadline of every listed key. Patterns are rejected.
    pub async fn migrate_expiring_to_perpetual(
        &self,
        target: MigrationTarget,
    ) -> CacheResult<MigrationReport> {
        let keys = match target {
            MigrationTarget::Keys(keys) => keys,
            MigrationTarget::Pattern(pattern) => {
                return Err(CacheError::PatternMigrationUnsupported { pattern });
            }
        };

        let mut report = MigrationReport {
            requested: keys.len(),
            ..Default::default()
        };

        let manager = &self.manager;
        let results: Vec<(String, CacheResult<bool>)> = stream::iter(keys)
            .map(|key| async move {
                let result = manager.try_remove_expiration(&key).await;
                (key, result)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (key, result) in results {
            match result {
                Ok(true) => report.migrated += 1,
                Ok(false) => report.unchanged += 1,
                Err(e) => report.errors.push(MigrationItemError {
                    key,
                    message: e.to_string(),
                }),
            }
        }

        info!(
            requested = report.requested,
            migrated = report.migrated,
            unchanged = report.unchanged,
            failed = report.errors.len(),
            "Expiring entries migrated to perpetual"
        );
        Ok(report)
    }
}
