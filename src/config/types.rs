// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration type definitions.
//!
//! [`TraceConfig`] is the partial, user-facing form: every field is optional
//! and numeric fields are signed so out-of-range input from files or the
//! environment is reported by validation instead of failing to parse.
//! [`ResolvedConfig`] is the validated snapshot the client holds for its
//! lifetime.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of spans per export batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default interval between background exports.
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 5_000;

/// Default number of export retries before a batch is dropped.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default upper bound on a shutdown drain.
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5_000;

/// Smallest accepted flush interval (and shutdown timeout).
pub const MIN_FLUSH_INTERVAL_MS: i64 = 100;

/// Partial configuration, as provided by callers, files, or the environment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceConfig {
    /// Credential for the telemetry backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Identifier of the agent that owns the spans
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,

    /// Attach prompt/response payloads to LLM spans
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_content: Option<bool>,

    /// Attach binary payloads too (requires include_content)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_binary_content: Option<bool>,

    /// Spans per export batch (>= 1)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<i64>,

    /// Background export interval in milliseconds (>= 100)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flush_interval_ms: Option<i64>,

    /// Export retries before a batch is dropped (>= 0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<i64>,

    /// Verbose span logging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,

    /// Register the Ctrl-C exit hook
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle_signals: Option<bool>,

    /// Upper bound on the shutdown drain in milliseconds (>= 100)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shutdown_timeout_ms: Option<i64>,
}

impl TraceConfig {
    /// Create a config with just the credential and agent id.
    pub fn new(api_key: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            agent_id: Some(agent_id.into()),
            ..Default::default()
        }
    }

    /// Set the credential.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Enable or disable content capture.
    pub fn with_include_content(mut self, include: bool) -> Self {
        self.include_content = Some(include);
        self
    }

    /// Enable or disable binary content capture.
    pub fn with_include_binary_content(mut self, include: bool) -> Self {
        self.include_binary_content = Some(include);
        self
    }

    /// Set the batch size.
    pub fn with_batch_size(mut self, size: i64) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Set the flush interval in milliseconds.
    pub fn with_flush_interval_ms(mut self, ms: i64) -> Self {
        self.flush_interval_ms = Some(ms);
        self
    }

    /// Set the retry limit.
    pub fn with_max_retries(mut self, retries: i64) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Enable or disable debug mode.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = Some(debug);
        self
    }

    /// Enable or disable the Ctrl-C exit hook.
    pub fn with_handle_signals(mut self, handle: bool) -> Self {
        self.handle_signals = Some(handle);
        self
    }

    pub fn with_shutdown_timeout_ms(mut self, ms: i64) -> Self {
        self.shutdown_timeout_ms = Some(ms);
        self
    }
}

/// Validated configuration snapshot.
#[derive(Clone, PartialEq)]
pub struct ResolvedConfig {
    pub api_key: String,
    pub agent_id: Option<String>,
    pub include_content: bool,
    pub include_binary_content: bool,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub max_retries: u32,
    pub debug: bool,
    pub handle_signals: bool,
    pub shutdown_timeout: Duration,
}

impl ResolvedConfig {
    /// Whether binary payloads may be attached to spans.
    pub fn allows_binary_content(&self) -> bool {
        self.include_content && self.include_binary_content
    }

    /// Credential with everything but the last four characters masked.
    pub fn redacted_api_key(&self) -> String {
        let chars: Vec<char> = self.api_key.chars().collect();
        if chars.len() <= 4 {
            return "****".to_string();
        }
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("****{}", tail)
    }

    /// Convert back to a partial config with the credential redacted,
    /// suitable for display.
    pub fn to_display_config(&self) -> TraceConfig {
        TraceConfig {
            api_key: Some(self.redacted_api_key()),
            agent_id: self.agent_id.clone(),
            include_content: Some(self.include_content),
            include_binary_content: Some(self.include_binary_content),
            batch_size: Some(self.batch_size as i64),
            flush_interval_ms: Some(self.flush_interval.as_millis() as i64),
            max_retries: Some(self.max_retries as i64),
            debug: Some(self.debug),
            handle_signals: Some(self.handle_signals),
            shutdown_timeout_ms: Some(self.shutdown_timeout.as_millis() as i64),
        }
    }
}

impl fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("api_key", &self.redacted_api_key())
            .field("agent_id", &self.agent_id)
            .field("include_content", &self.include_content)
            .field("include_binary_content", &self.include_binary_content)
            .field("batch_size", &self.batch_size)
            .field("flush_interval", &self.flush_interval)
            .field("max_retries", &self.max_retries)
            .field("debug", &self.debug)
            .field("handle_signals", &self.handle_signals)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(api_key: &str) -> ResolvedConfig {
        ResolvedConfig {
            api_key: api_key.to_string(),
            agent_id: None,
            include_content: true,
            include_binary_content: false,
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: Duration::from_millis(DEFAULT_FLUSH_INTERVAL_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            debug: false,
            handle_signals: false,
            shutdown_timeout: Duration::from_millis(DEFAULT_SHUTDOWN_TIMEOUT_MS),
        }
    }

    #[test]
    fn test_trace_config_camel_case() {
        let config: TraceConfig =
            serde_json::from_str(r#"{"apiKey": "k", "agentId": "a", "batchSize": 10}"#).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("k"));
        assert_eq!(config.agent_id.as_deref(), Some("a"));
        assert_eq!(config.batch_size, Some(10));
        assert_eq!(config.flush_interval_ms, None);
    }

    #[test]
    fn test_trace_config_negative_values_parse() {
        let config: TraceConfig = serde_json::from_str(r#"{"maxRetries": -1}"#).unwrap();
        assert_eq!(config.max_retries, Some(-1));
    }

    #[test]
    fn test_redacted_debug() {
        let config = resolved("sk-secret-value-1234");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("****1234"));
        assert_eq!(resolved("abc").redacted_api_key(), "****");
    }

    #[test]
    fn test_binary_content_requires_content() {
        let mut config = resolved("key");
        config.include_binary_content = true;
        assert!(config.allows_binary_content());
        config.include_content = false;
        assert!(!config.allows_binary_content());
    }

    #[test]
    fn test_display_config_round_trip_fields() {
        let display = resolved("sk-abcdefgh").to_display_config();
        assert_eq!(display.api_key.as_deref(), Some("****efgh"));
        assert_eq!(display.batch_size, Some(100));
        assert_eq!(display.flush_interval_ms, Some(5000));
    }
}
