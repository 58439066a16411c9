//! # Redis Cache Store
//!
//! Socket-based Redis backend. A `ConnectionManager` multiplexes commands and
//! reconnects on its own; every key is namespaced with an optional prefix so
//! several deployments can share one Redis database.

use super::{CacheStore, CacheTtl, TtlStatus};
use crate::caching::CacheResult;
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Redis cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisCacheConfig {
    /// Redis connection URL
    pub url: String,

    /// Prefix prepended to every key
    #[serde(default)]
    pub key_prefix: String,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            key_prefix: String::new(),
        }
    }
}

/// Redis cache implementation
pub struct RedisCache {
    config: RedisCacheConfig,
    connection: ConnectionManager,
}

impl RedisCache {
    /// Connect to Redis. Fails if the server cannot be reached.
    pub async fn new(config: RedisCacheConfig) -> CacheResult<Self> {
        let client = Client::open(config.url.as_str())?;
        let connection = ConnectionManager::new(client).await?;

        info!(backend = "redis", url = %config.url, "Redis cache connected");

        Ok(Self { config, connection })
    }

    /// Get the full cache key with prefix
    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }

    fn conn(&self) -> ConnectionManager {
        self.connection.clone()
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let value: Option<String> = self.conn().get(self.full_key(key)).await?;
        debug!(key = %key, hit = value.is_some(), "Redis GET");
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: CacheTtl) -> CacheResult<()> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(self.full_key(key)).arg(value);

        if let CacheTtl::Expiring(ttl) = ttl {
            // Whole seconds use EX as documented; sub-second TTLs fall back to PX
            if ttl.subsec_nanos() == 0 {
                cmd.arg("EX").arg(ttl.as_secs());
            } else {
                cmd.arg("PX").arg(ttl.as_millis().max(1) as u64);
            }
        }

        cmd.query_async::<_, ()>(&mut self.conn()).await?;
        debug!(key = %key, perpetual = ttl.is_perpetual(), "Redis SET");
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let deleted: i64 = self.conn().del(self.full_key(key)).await?;
        Ok(deleted > 0)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let exists: bool = self.conn().exists(self.full_key(key)).await?;
        Ok(exists)
    }

    async fn ttl(&self, key: &str) -> CacheResult<TtlStatus> {
        let reply: i64 = self.conn().ttl(self.full_key(key)).await?;
        Ok(TtlStatus::from_redis_reply(reply))
    }

    async fn persist(&self, key: &str) -> CacheResult<bool> {
        let persisted: bool = self.conn().persist(self.full_key(key)).await?;
        Ok(persisted)
    }

    async fn ping(&self) -> CacheResult<bool> {
        let response: String = redis::cmd("PING").query_async(&mut self.conn()).await?;
        Ok(response == "PONG")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn setup_redis_cache() -> RedisCache {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let config = RedisCacheConfig {
            url,
            key_prefix: format!("geocache-test:{}:", uuid::Uuid::new_v4()),
        };
        RedisCache::new(config).await.unwrap()
    }

    #[tokio::test]
    #[ignore] // Requires a running Redis (REDIS_URL)
    async fn test_basic_operations() {
        let cache = setup_redis_cache().await;

        cache.set("test_key", "test_value", CacheTtl::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("test_key").await.unwrap().as_deref(), Some("test_value"));
        assert!(cache.exists("test_key").await.unwrap());

        assert!(cache.delete("test_key").await.unwrap());
        assert!(!cache.exists("test_key").await.unwrap());
    }

    #[tokio::test]
    #[ignore] // Requires a running Redis (REDIS_URL)
    async fn test_perpetual_and_persist() {
        let cache = setup_redis_cache().await;

        cache.set("perpetual", "v", CacheTtl::Perpetual).await.unwrap();
        assert_eq!(cache.ttl("perpetual").await.unwrap(), TtlStatus::NoExpiration);

        cache.set("expiring", "v", CacheTtl::from_secs(120)).await.unwrap();
        assert!(matches!(cache.ttl("expiring").await.unwrap(), TtlStatus::Remaining(_)));
        assert!(cache.persist("expiring").await.unwrap());
        assert_eq!(cache.ttl("expiring").await.unwrap(), TtlStatus::NoExpiration);

        assert_eq!(cache.ttl("missing").await.unwrap(), TtlStatus::Absent);

        cache.delete("perpetual").await.unwrap();
        cache.delete("expiring").await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires a running Redis (REDIS_URL)
    async fn test_ttl_expiration() {
        let cache = setup_redis_cache().await;

        cache.set("expire_test", "expire_value", CacheTtl::from_secs(1)).await.unwrap();
        assert!(cache.exists("expire_test").await.unwrap());

        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(cache.get("expire_test").await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore] // Requires a running Redis (REDIS_URL)
    async fn test_ping() {
        let cache = setup_redis_cache().await;
        assert!(cache.ping().await.unwrap());
    }
}
