//! Read-only view of a single cache key for operational tooling.

use super::cache_manager::CacheManager;
use super::entry::{CacheMetadata, MetadataView};
use super::stores::TtlStatus;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// State of a stored key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyDescription {
    pub key: String,
    pub exists: bool,
    pub ttl_remaining: TtlStatus,
    /// The backend holds the key without a deadline
    pub is_perpetual: bool,
    /// Embedded metadata, `None` if the document could not be decoded
    pub stored_metadata: Option<CacheMetadata>,
    pub age_seconds: Option<u64>,
}

pub struct CacheIntrospector {
    manager: Arc<CacheManager>,
}

impl CacheIntrospector {
    pub fn new(manager: Arc<CacheManager>) -> Self {
        Self { manager }
    }

    /// Describe `key`, or `None` when it is absent or the store is unavailable.
    /// Only the metadata part of the document is decoded.
    pub async fn describe(&self, key: &str) -> Option<KeyDescription> {
        let raw = self.manager.try_get_raw(key).await.ok().flatten()?;
        let ttl_remaining = self.manager.ttl_remaining(key).await;

        let stored_metadata = match serde_json::from_str::<MetadataView>(&raw) {
            Ok(view) => Some(view.metadata),
            Err(e) => {
                debug!(key = %key, error = %e, "Stored entry has no readable metadata");
                None
            }
        };
        let age_seconds = stored_metadata
            .as_ref()
            .map(|metadata| metadata.age_seconds(Utc::now()));

        Some(KeyDescription {
            key: key.to_string(),
            exists: true,
            is_perpetual: ttl_remaining == TtlStatus::NoExpiration,
            ttl_remaining,
            stored_metadata,
            age_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caching::cache_manager::CacheConfig;
    use crate::caching::entry::CacheEntry;
    use crate::caching::key_generator::OperationKind;
    use crate::caching::stores::CacheTtl;
    use serde_json::json;

    async fn setup() -> (Arc<CacheManager>, CacheIntrospector) {
        let manager = Arc::new(CacheManager::new(CacheConfig::default()));
        manager.init().await;
        (manager.clone(), CacheIntrospector::new(manager))
    }

    #[tokio::test]
    async fn test_describe_perpetual_entry() {
        let (manager, introspector) = setup().await;
        let entry = CacheEntry::new(json!({"a": 1}), OperationKind::Reverse, CacheTtl::Perpetual);
        manager.set("reverse:abc", &entry, CacheTtl::Perpetual).await;

        let description = introspector.describe("reverse:abc").await.unwrap();
        assert!(description.exists);
        assert!(description.is_perpetual);
        assert_eq!(description.ttl_remaining, TtlStatus::NoExpiration);
        assert_eq!(description.stored_metadata, Some(entry.metadata));
        assert!(description.age_seconds.unwrap() <= 1);
    }

    #[tokio::test]
    async fn test_describe_expiring_entry() {
        let (manager, introspector) = setup().await;
        let ttl = CacheTtl::from_secs(600);
        let entry = CacheEntry::new(json!([1, 2]), OperationKind::Forward, ttl);
        manager.set("forward:abc", &entry, ttl).await;

        let description = introspector.describe("forward:abc").await.unwrap();
        assert!(!description.is_perpetual);
        assert!(matches!(description.ttl_remaining, TtlStatus::Remaining(s) if s <= 600));
        assert_eq!(description.stored_metadata.unwrap().declared_ttl_seconds, 600);
    }

    #[tokio::test]
    async fn test_describe_absent_and_malformed() {
        let (manager, introspector) = setup().await;
        assert!(introspector.describe("reverse:missing").await.is_none());

        manager.try_set_raw("reverse:bad", "not json", CacheTtl::Perpetual).await.unwrap();
        let description = introspector.describe("reverse:bad").await.unwrap();
        assert!(description.stored_metadata.is_none());
        assert!(description.age_seconds.is_none());

        // Describing never mutates the entry
        assert_eq!(
            manager.try_get_raw("reverse:bad").await.unwrap().as_deref(),
            Some("not json")
        );
    }
}
