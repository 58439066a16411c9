//! # Error Handling Module
//!
//! Application-level errors for the geocode cache service, built with `thiserror`.
//!
//! Cache-layer failures (`crate::caching::CacheError`) are normally absorbed by
//! the cache facade and never reach this type. The ones that do, such as an
//! invalid lookup request or a rejected pattern migration, are converted here
//! and mapped to HTTP status codes for the admin endpoints.
//!
//! ## Error Flow
//! ```text
//! CacheError ──(From)──▶ GeocacheError ──(IntoResponse)──▶ JSON error body
//! ```
//! The JSON body is always shaped as:
//! ```json
//! { "error": { "code": 400, "message": "...", "type": "request_validation_error" } }
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::caching::CacheError;

/// Main result type used throughout the service
pub type GeocacheResult<T> = Result<T, GeocacheError>;

/// Error types for the geocode cache service
#[derive(Debug, Error, Clone)]
pub enum GeocacheError {
    /// Configuration-related errors (invalid config, unreadable files, bad env overrides)
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A lookup request that cannot be normalized into a cache key
    #[error("Request validation failed: {field} - {reason}")]
    RequestValidation { field: String, reason: String },

    /// The requested cache key does not exist
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// Cache operations that were surfaced instead of absorbed
    #[error("Cache error: {message}")]
    Cache { message: String },

    /// The operation is not supported by this deployment
    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    /// Internal errors for unexpected failures
    #[error("Internal server error: {message}")]
    Internal { message: String },

    /// I/O errors (config files, socket binding)
    #[error("I/O error: {message}")]
    Io { message: String },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json { message: String },

    /// YAML parsing errors for configuration files
    #[error("YAML error: {message}")]
    Yaml { message: String },
}

impl GeocacheError {
    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a validation error for a specific request field
    pub fn validation<F: Into<String>, S: Into<String>>(field: F, reason: S) -> Self {
        Self::RequestValidation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a not found error with a custom message
    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create an internal error with a custom message
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::RequestValidation { .. } => StatusCode::BAD_REQUEST,
            Self::Unsupported { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Cache { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Json { .. } => StatusCode::BAD_REQUEST,
            Self::Configuration { .. }
            | Self::Internal { .. }
            | Self::Io { .. }
            | Self::Yaml { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a string representation of the error type for API responses
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration_error",
            Self::RequestValidation { .. } => "request_validation_error",
            Self::NotFound { .. } => "not_found",
            Self::Cache { .. } => "cache_error",
            Self::Unsupported { .. } => "unsupported_operation",
            Self::Internal { .. } => "internal_error",
            Self::Io { .. } => "io_error",
            Self::Json { .. } => "json_error",
            Self::Yaml { .. } => "yaml_error",
        }
    }
}

impl From<CacheError> for GeocacheError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::InvalidRequest { field, reason } => Self::RequestValidation { field, reason },
            CacheError::PatternMigrationUnsupported { .. } => Self::Unsupported {
                message: err.to_string(),
            },
            CacheError::Configuration { message } => Self::Configuration { message },
            other => Self::Cache {
                message: other.to_string(),
            },
        }
    }
}

impl From<std::io::Error> for GeocacheError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for GeocacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for GeocacheError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml {
            message: err.to_string(),
        }
    }
}

/// Converts errors into structured JSON responses for the admin router
impl IntoResponse for GeocacheError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let error_response = json!({
            "error": {
                "code": status.as_u16(),
                "message": self.to_string(),
                "type": self.error_type(),
            }
        });

        (status, Json(error_response)).into_response()
    }
}
