// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration merging and validation.
//!
//! Partial configs are layered with [`merge_config`] (later layers win
//! field by field) and then turned into a [`ResolvedConfig`] by
//! [`resolve_config`], which applies defaults and validates bounds.

use std::time::Duration;

use crate::error::ConfigError;

use super::types::{
    ResolvedConfig, TraceConfig, DEFAULT_BATCH_SIZE, DEFAULT_FLUSH_INTERVAL_MS,
    DEFAULT_MAX_RETRIES, DEFAULT_SHUTDOWN_TIMEOUT_MS, MIN_FLUSH_INTERVAL_MS,
};

/// Default configuration values, as a partial config.
pub fn default_config() -> TraceConfig {
    TraceConfig {
        api_key: None,
        agent_id: None,
        include_content: Some(false),
        include_binary_content: Some(false),
        batch_size: Some(DEFAULT_BATCH_SIZE as i64),
        flush_interval_ms: Some(DEFAULT_FLUSH_INTERVAL_MS as i64),
        max_retries: Some(DEFAULT_MAX_RETRIES as i64),
        debug: Some(false),
        handle_signals: Some(true),
        shutdown_timeout_ms: Some(DEFAULT_SHUTDOWN_TIMEOUT_MS as i64),
    }
}

/// Merge configuration layers with precedence.
///
/// Layers are applied in order, so the last layer has the highest
/// precedence. Only fields that are set in a layer override earlier ones.
pub fn merge_config<I>(layers: I) -> TraceConfig
where
    I: IntoIterator<Item = TraceConfig>,
{
    let mut result = TraceConfig::default();
    for layer in layers {
        apply_layer(&mut result, layer);
    }
    result
}

fn apply_layer(result: &mut TraceConfig, layer: TraceConfig) {
    if layer.api_key.is_some() {
        result.api_key = layer.api_key;
    }
    if layer.agent_id.is_some() {
        result.agent_id = layer.agent_id;
    }
    if layer.include_content.is_some() {
        result.include_content = layer.include_content;
    }
    if layer.include_binary_content.is_some() {
        result.include_binary_content = layer.include_binary_content;
    }
    if layer.batch_size.is_some() {
        result.batch_size = layer.batch_size;
    }
    if layer.flush_interval_ms.is_some() {
        result.flush_interval_ms = layer.flush_interval_ms;
    }
    if layer.max_retries.is_some() {
        result.max_retries = layer.max_retries;
    }
    if layer.debug.is_some() {
        result.debug = layer.debug;
    }
    if layer.handle_signals.is_some() {
        result.handle_signals = layer.handle_signals;
    }
    if layer.shutdown_timeout_ms.is_some() {
        result.shutdown_timeout_ms = layer.shutdown_timeout_ms;
    }
}

/// Merge explicit values over defaults and validate the result.
///
/// Fails on the first violated constraint, checked in the order
/// apiKey, agentId, batchSize, flushIntervalMs, maxRetries,
/// shutdownTimeoutMs.
pub fn resolve_config(explicit: TraceConfig) -> Result<ResolvedConfig, ConfigError> {
    let merged = merge_config([default_config(), explicit]);

    let api_key = match merged.api_key {
        Some(key) if !key.trim().is_empty() => key,
        Some(_) => return Err(ConfigError::invalid("apiKey", "must not be empty")),
        None => return Err(ConfigError::MissingField("apiKey".to_string())),
    };

    let agent_id = match merged.agent_id {
        Some(id) if id.trim().is_empty() => {
            return Err(ConfigError::invalid("agentId", "must not be empty"));
        }
        other => other,
    };

    let batch_size = merged.batch_size.unwrap_or(DEFAULT_BATCH_SIZE as i64);
    if batch_size < 1 {
        return Err(ConfigError::invalid(
            "batchSize",
            format!("must be at least 1, got {}", batch_size),
        ));
    }

    let flush_interval_ms = merged
        .flush_interval_ms
        .unwrap_or(DEFAULT_FLUSH_INTERVAL_MS as i64);
    if flush_interval_ms < MIN_FLUSH_INTERVAL_MS {
        return Err(ConfigError::invalid(
            "flushIntervalMs",
            format!(
                "must be at least {}ms, got {}",
                MIN_FLUSH_INTERVAL_MS, flush_interval_ms
            ),
        ));
    }

    let max_retries = merged.max_retries.unwrap_or(DEFAULT_MAX_RETRIES as i64);
    if max_retries < 0 {
        return Err(ConfigError::invalid(
            "maxRetries",
            format!("must not be negative, got {}", max_retries),
        ));
    }
    let max_retries = u32::try_from(max_retries)
        .map_err(|_| ConfigError::invalid("maxRetries", "is too large"))?;

    let shutdown_timeout_ms = merged
        .shutdown_timeout_ms
        .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_MS as i64);
    if shutdown_timeout_ms < MIN_FLUSH_INTERVAL_MS {
        return Err(ConfigError::invalid(
            "shutdownTimeoutMs",
            format!(
                "must be at least {}ms, got {}",
                MIN_FLUSH_INTERVAL_MS, shutdown_timeout_ms
            ),
        ));
    }

    Ok(ResolvedConfig {
        api_key,
        agent_id,
        include_content: merged.include_content.unwrap_or(false),
        include_binary_content: merged.include_binary_content.unwrap_or(false),
        batch_size: batch_size as usize,
        flush_interval: Duration::from_millis(flush_interval_ms as u64),
        max_retries,
        debug: merged.debug.unwrap_or(false),
        handle_signals: merged.handle_signals.unwrap_or(true),
        shutdown_timeout: Duration::from_millis(shutdown_timeout_ms as u64),
    })
}
