//! # Structured Logging
//!
//! Installs the global `tracing` subscriber: an `EnvFilter` seeded with the
//! configured level and a JSON or text `fmt` layer. Calling it twice is
//! harmless; the second call logs a warning and keeps the first subscriber.

use tracing::{warn, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::core::error::{GeocacheError, GeocacheResult};
use crate::observability::config::{LogConfig, LogFormat};

/// Parse a log level name
pub fn parse_level(level: &str) -> GeocacheResult<Level> {
    match level.trim().to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(GeocacheError::config(format!("unknown log level '{}'", other))),
    }
}

/// Initialise the global subscriber
pub fn init_logging(config: &LogConfig) -> GeocacheResult<()> {
    let level = parse_level(&config.level)?;
    let env_filter = EnvFilter::from_default_env().add_directive(level.into());

    let result = match config.format {
        LogFormat::Json => Registry::default()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true),
            )
            .try_init(),
        LogFormat::Text => Registry::default()
            .with(env_filter)
            .with(fmt::layer().with_target(true))
            .try_init(),
    };

    if result.is_err() {
        warn!("Tracing subscriber already initialized, skipping initialization");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG").unwrap(), Level::DEBUG);
        assert_eq!(parse_level(" warn ").unwrap(), Level::WARN);
        assert!(parse_level("verbose").is_err());
    }

    #[test]
    fn test_init_twice_is_tolerated() {
        let config = LogConfig {
            level: "debug".to_string(),
            format: LogFormat::Text,
        };
        assert!(init_logging(&config).is_ok());
        assert!(init_logging(&config).is_ok());
    }
}
