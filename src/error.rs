// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for agenttrace.
//!
//! Configuration errors are the only errors that reach callers of the
//! lifecycle API. Everything else that can go wrong inside the telemetry
//! pipeline is contained: export failures are logged and reported through
//! `flush()` returning `false`, and errors raised by instrumented operations
//! pass through untouched.

use thiserror::Error;

/// Errors that can occur while resolving or loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("IO error reading config: {0}")]
    IoError(String),

    #[error("YAML parsing error: {0}")]
    YamlError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(String),
}

impl ConfigError {
    /// Create an invalid-value error for a field.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Name of the offending field, if the error is about one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingField(field) => Some(field),
            Self::InvalidValue { field, .. } => Some(field),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::IoError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::YamlError(err.to_string())
    }
}

/// Errors reported by a span exporter.
#[derive(Error, Debug, Clone)]
pub enum ExportError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Batch rejected: {0}")]
    Rejected(String),

    #[error("Export timed out after {0}ms")]
    Timeout(u64),

    #[error("Exporter is shut down")]
    ShutDown,
}

impl ExportError {
    /// Check if retrying the same batch could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}

/// Errors returned by provider clients.
///
/// Instrumented providers hand these back to the caller unchanged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("API error: {message}")]
    ApiError {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Streaming error: {0}")]
    StreamError(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl ProviderError {
    /// Create an API error with status code.
    pub fn api(message: impl Into<String>, status_code: u16) -> Self {
        Self::ApiError {
            message: message.into(),
            status_code: Some(status_code),
        }
    }
}

/// Errors that can occur while registering an instrumentation point.
#[derive(Error, Debug)]
pub enum InstrumentError {
    #[error("Instrumentation already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Failed to register {name}: {message}")]
    RegistrationFailed { name: String, message: String },
}

/// Result type alias using anyhow for flexible error handling.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_field() {
        let err = ConfigError::invalid("batchSize", "must be at least 1");
        assert_eq!(err.field(), Some("batchSize"));
        assert!(err.to_string().contains("batchSize"));

        let err = ConfigError::MissingField("apiKey".to_string());
        assert_eq!(err.field(), Some("apiKey"));

        let err = ConfigError::IoError("disk".to_string());
        assert_eq!(err.field(), None);
    }

    #[test]
    fn test_config_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ConfigError = io_err.into();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_config_error_from_json() {
        let result: std::result::Result<serde_json::Value, _> = serde_json::from_str("{nope");
        let err: ConfigError = result.unwrap_err().into();
        assert!(matches!(err, ConfigError::JsonError(_)));
    }

    #[test]
    fn test_export_error_retryable() {
        assert!(ExportError::Transport("reset".to_string()).is_retryable());
        assert!(ExportError::Timeout(500).is_retryable());
        assert!(!ExportError::Rejected("bad key".to_string()).is_retryable());
        assert!(!ExportError::ShutDown.is_retryable());
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::api("overloaded", 529);
        assert_eq!(err.to_string(), "API error: overloaded");
        assert_eq!(ProviderError::Timeout(30).to_string(), "Timeout after 30ms");
    }
}
