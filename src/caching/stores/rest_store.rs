//! # Redis REST Cache Store
//!
//! Redis over HTTPS, for hosted Redis offerings that expose the Upstash-style
//! REST protocol. Each command is POSTed as a JSON array (`["GET", "key"]`)
//! with a bearer token and answered with `{"result": ...}` or `{"error": "..."}`.

use super::{CacheStore, CacheTtl, TtlStatus};
use crate::caching::{CacheError, CacheResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

fn default_request_timeout() -> Duration {
    Duration::from_secs(5)
}

/// REST cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestCacheConfig {
    /// Base URL of the REST endpoint
    pub url: String,

    /// Bearer token sent with every command
    pub token: String,

    /// Prefix prepended to every key
    #[serde(default)]
    pub key_prefix: String,

    /// Per-request HTTP timeout
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for RestCacheConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            key_prefix: String::new(),
            request_timeout: default_request_timeout(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RestReply {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

/// REST cache implementation
pub struct RestCache {
    config: RestCacheConfig,
    client: Client,
}

impl RestCache {
    /// Build the HTTP client. No request is issued until the first command.
    pub fn new(config: RestCacheConfig) -> CacheResult<Self> {
        url::Url::parse(&config.url).map_err(|e| CacheError::Configuration {
            message: format!("invalid REST cache url '{}': {}", config.url, e),
        })?;

        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { config, client })
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }

    /// Send one command and return its `result`
    async fn command(&self, command: Value) -> CacheResult<Value> {
        let response = self
            .client
            .post(self.config.url.as_str())
            .bearer_auth(&self.config.token)
            .json(&command)
            .send()
            .await?;

        let status = response.status();
        let reply: RestReply = response.json().await?;

        if let Some(error) = reply.error {
            return Err(CacheError::store(format!("REST backend rejected command: {}", error)));
        }
        if !status.is_success() {
            return Err(CacheError::store(format!("REST backend returned HTTP {}", status)));
        }

        debug!(backend = "rest", command = %command[0], "REST cache command");
        Ok(reply.result)
    }

    async fn integer_command(&self, command: Value) -> CacheResult<i64> {
        let result = self.command(command).await?;
        result
            .as_i64()
            .ok_or_else(|| CacheError::store(format!("expected an integer reply, got {}", result)))
    }
}

#[async_trait]
impl CacheStore for RestCache {
    fn backend_name(&self) -> &'static str {
        "rest"
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        match self.command(json!(["GET", self.full_key(key)])).await? {
            Value::Null => Ok(None),
            Value::String(value) => Ok(Some(value)),
            other => Err(CacheError::store(format!("unexpected GET reply: {}", other))),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: CacheTtl) -> CacheResult<()> {
        let command = match ttl {
            CacheTtl::Perpetual => json!(["SET", self.full_key(key), value]),
            CacheTtl::Expiring(ttl) if ttl.subsec_nanos() == 0 => {
                json!(["SET", self.full_key(key), value, "EX", ttl.as_secs()])
            }
            CacheTtl::Expiring(ttl) => {
                json!(["SET", self.full_key(key), value, "PX", ttl.as_millis().max(1) as u64])
            }
        };

        self.command(command).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        Ok(self.integer_command(json!(["DEL", self.full_key(key)])).await? > 0)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        Ok(self.integer_command(json!(["EXISTS", self.full_key(key)])).await? > 0)
    }

    async fn ttl(&self, key: &str) -> CacheResult<TtlStatus> {
        let reply = self.integer_command(json!(["TTL", self.full_key(key)])).await?;
        Ok(TtlStatus::from_redis_reply(reply))
    }

    async fn persist(&self, key: &str) -> CacheResult<bool> {
        Ok(self.integer_command(json!(["PERSIST", self.full_key(key)])).await? == 1)
    }

    async fn ping(&self) -> CacheResult<bool> {
        let result = self.command(json!(["PING"])).await?;
        Ok(result.as_str() == Some("PONG"))
    }
}
