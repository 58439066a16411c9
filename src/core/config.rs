//! # Configuration Module
//!
//! Loads the service configuration from YAML (or JSON, by extension), applies
//! `GEOCACHE_*` environment overrides on top, and validates the result before
//! anything is started.
//!
//! ```yaml
//! server:
//!   bind_address: "0.0.0.0:8081"
//! cache:
//!   backend:
//!     type: redis
//!     url: "redis://localhost:6379"
//!   default_ttl: 30days
//!   quantization_precision: 2
//! logging:
//!   level: info
//!   format: json
//! ```

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

use crate::caching::{BackendConfig, CacheConfig, RedisCacheConfig, RestCacheConfig};
use crate::core::error::{GeocacheError, GeocacheResult};
use crate::observability::logging::parse_level;
use crate::observability::LogConfig;

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "GEOCACHE_CONFIG_PATH";

/// Top-level service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeocacheConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub logging: LogConfig,
}

/// Admin HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

fn default_bind_address() -> String {
    "0.0.0.0:8081".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

impl GeocacheConfig {
    /// Load from the file named by `GEOCACHE_CONFIG_PATH`.
    ///
    /// Without the variable, or when the file does not exist, the defaults
    /// are used. Environment overrides and validation apply either way.
    pub async fn load() -> GeocacheResult<Self> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if Path::new(&path).exists() => Self::load_from_file(path).await,
            _ => Self::from_env(),
        }
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> GeocacheResult<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file, or JSON when the extension is `.json`
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> GeocacheResult<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GeocacheError::config(format!("Failed to read config file {}: {}", path.display(), e)))?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let mut config: GeocacheConfig = if is_json {
            serde_json::from_str(&content)
                .map_err(|e| GeocacheError::config(format!("Failed to parse JSON config: {}", e)))?
        } else {
            serde_yaml::from_str(&content)
                .map_err(|e| GeocacheError::config(format!("Failed to parse config: {}", e)))?
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `GEOCACHE_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) -> GeocacheResult<()> {
        use std::env;

        if let Ok(backend) = env::var("GEOCACHE_BACKEND") {
            self.cache.backend = match backend.trim().to_lowercase().as_str() {
                "memory" => BackendConfig::Memory,
                "disabled" | "none" => BackendConfig::Disabled,
                "redis" => match &self.cache.backend {
                    BackendConfig::Redis(redis) => BackendConfig::Redis(redis.clone()),
                    _ => BackendConfig::Redis(RedisCacheConfig::default()),
                },
                "rest" => match &self.cache.backend {
                    BackendConfig::Rest(rest) => BackendConfig::Rest(rest.clone()),
                    _ => BackendConfig::Rest(RestCacheConfig::default()),
                },
                other => {
                    return Err(GeocacheError::config(format!(
                        "Invalid GEOCACHE_BACKEND: unknown backend '{}'",
                        other
                    )))
                }
            };
        }

        if let Ok(url) = env::var("GEOCACHE_REDIS_URL") {
            if let BackendConfig::Redis(redis) = &mut self.cache.backend {
                redis.url = url;
            }
        }

        if let BackendConfig::Rest(rest) = &mut self.cache.backend {
            if let Ok(url) = env::var("GEOCACHE_REST_URL") {
                rest.url = url;
            }
            if let Ok(token) = env::var("GEOCACHE_REST_TOKEN") {
                rest.token = token;
            }
        }

        if let Ok(ttl) = env::var("GEOCACHE_DEFAULT_TTL") {
            self.cache.default_ttl = humantime::parse_duration(&ttl)
                .map_err(|e| GeocacheError::config(format!("Invalid GEOCACHE_DEFAULT_TTL: {}", e)))?;
        }

        if let Ok(precision) = env::var("GEOCACHE_QUANTIZATION_PRECISION") {
            self.cache.quantization_precision = precision
                .parse()
                .map_err(|e| GeocacheError::config(format!("Invalid GEOCACHE_QUANTIZATION_PRECISION: {}", e)))?;
        }

        if let Ok(timeout) = env::var("GEOCACHE_OPERATION_TIMEOUT") {
            self.cache.operation_timeout = humantime::parse_duration(&timeout)
                .map_err(|e| GeocacheError::config(format!("Invalid GEOCACHE_OPERATION_TIMEOUT: {}", e)))?;
        }

        if let Ok(addr) = env::var("GEOCACHE_BIND_ADDRESS") {
            self.server.bind_address = addr;
        }

        if let Ok(level) = env::var("GEOCACHE_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(format) = env::var("GEOCACHE_LOG_FORMAT") {
            self.logging.format = format
                .parse()
                .map_err(|e| GeocacheError::config(format!("Invalid GEOCACHE_LOG_FORMAT: {}", e)))?;
        }

        Ok(())
    }

    pub fn validate(&self) -> GeocacheResult<()> {
        self.cache.validate()?;
        parse_level(&self.logging.level)?;
        self.bind_address()?;
        Ok(())
    }

    pub fn bind_address(&self) -> GeocacheResult<SocketAddr> {
        self.server.bind_address.parse().map_err(|e| {
            GeocacheError::config(format!("Invalid bind_address '{}': {}", self.server.bind_address, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::LogFormat;
    use std::io::Write;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    // Environment variables are process-wide
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_defaults_are_valid() {
        let config = GeocacheConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.bind_address, "0.0.0.0:8081");
        assert_eq!(config.cache.backend, BackendConfig::Memory);
        assert!(config.cache.default_cache_ttl().is_perpetual());
    }

    #[tokio::test]
    async fn test_load_yaml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
server:
  bind_address: "127.0.0.1:9000"
cache:
  backend:
    type: redis
    url: "redis://cache.internal:6379"
    key_prefix: "geo:"
  default_ttl: 1h
  quantization_precision: 3
logging:
  level: debug
  format: text
"#
        )
        .unwrap();

        let config = GeocacheConfig::load_from_file(file.path()).await.unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:9000");
        assert_eq!(config.cache.default_ttl, Duration::from_secs(3600));
        assert_eq!(config.cache.quantization_precision, 3);
        assert_eq!(config.logging.format, LogFormat::Text);
        match config.cache.backend {
            BackendConfig::Redis(redis) => assert_eq!(redis.key_prefix, "geo:"),
            other => panic!("expected redis backend, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_load_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"cache": {{"backend": {{"type": "disabled"}}, "default_ttl": "10m"}}}}"#
        )
        .unwrap();

        let config = GeocacheConfig::load_from_file(file.path()).await.unwrap();
        assert_eq!(config.cache.backend, BackendConfig::Disabled);
        assert_eq!(config.cache.default_ttl, Duration::from_secs(600));
    }

    #[tokio::test]
    async fn test_invalid_file_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "cache:\n  quantization_precision: 9").unwrap();

        let err = GeocacheConfig::load_from_file(file.path()).await.unwrap_err();
        assert!(matches!(err, GeocacheError::Configuration { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        std::env::set_var("GEOCACHE_BACKEND", "rest");
        std::env::set_var("GEOCACHE_REST_URL", "https://cache.example.com");
        std::env::set_var("GEOCACHE_REST_TOKEN", "token");
        std::env::set_var("GEOCACHE_DEFAULT_TTL", "2h");
        std::env::set_var("GEOCACHE_LOG_FORMAT", "text");

        let mut config = GeocacheConfig::default();
        let result = config.apply_env_overrides();

        for var in [
            "GEOCACHE_BACKEND",
            "GEOCACHE_REST_URL",
            "GEOCACHE_REST_TOKEN",
            "GEOCACHE_DEFAULT_TTL",
            "GEOCACHE_LOG_FORMAT",
        ] {
            std::env::remove_var(var);
        }

        result.unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.default_ttl, Duration::from_secs(7200));
        assert_eq!(config.logging.format, LogFormat::Text);
        match config.cache.backend {
            BackendConfig::Rest(rest) => {
                assert_eq!(rest.url, "https://cache.example.com");
                assert_eq!(rest.token, "token");
            }
            other => panic!("expected rest backend, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_env_override() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        std::env::set_var("GEOCACHE_QUANTIZATION_PRECISION", "two");

        let mut config = GeocacheConfig::default();
        let result = config.apply_env_overrides();
        std::env::remove_var("GEOCACHE_QUANTIZATION_PRECISION");

        let err = result.unwrap_err();
        assert!(err.to_string().contains("GEOCACHE_QUANTIZATION_PRECISION"));
    }

    #[test]
    fn test_bad_bind_address() {
        let mut config = GeocacheConfig::default();
        config.server.bind_address = "localhost".to_string();
        assert!(config.validate().is_err());
    }
}
