// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration loading from files and the environment.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

use super::types::TraceConfig;

/// Global config directory name.
pub const GLOBAL_CONFIG_DIR: &str = ".agenttrace";

/// Global config file name.
pub const GLOBAL_CONFIG_FILE: &str = "config.json";

/// Prefix shared by all recognized environment variables.
pub const ENV_PREFIX: &str = "AGENTTRACE_";

/// Get the global config file path (~/.agenttrace/config.json).
pub fn get_global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(GLOBAL_CONFIG_DIR).join(GLOBAL_CONFIG_FILE))
}

/// Load the global configuration file, if present.
pub fn load_global_config() -> Result<Option<TraceConfig>, ConfigError> {
    let path = match get_global_config_path() {
        Some(p) => p,
        None => return Ok(None),
    };

    if !path.exists() {
        return Ok(None);
    }

    load_config_file(&path).map(Some)
}

/// Load a configuration file (JSON or YAML, chosen by extension).
pub fn load_config_file(path: &Path) -> Result<TraceConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    match extension.to_lowercase().as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&content).map_err(ConfigError::from),
        _ => serde_json::from_str(&content).map_err(ConfigError::from),
    }
}

/// Read configuration from `AGENTTRACE_*` environment variables.
pub fn load_env_config() -> Result<TraceConfig, ConfigError> {
    env_config_from(|name| std::env::var(name).ok())
}

/// Build a partial config from a variable lookup.
///
/// Recognized names: `AGENTTRACE_API_KEY`, `AGENTTRACE_AGENT_ID`,
/// `AGENTTRACE_INCLUDE_CONTENT`, `AGENTTRACE_INCLUDE_BINARY_CONTENT`,
/// `AGENTTRACE_BATCH_SIZE`, `AGENTTRACE_FLUSH_INTERVAL_MS`,
/// `AGENTTRACE_MAX_RETRIES`, `AGENTTRACE_DEBUG`,
/// `AGENTTRACE_HANDLE_SIGNALS`, `AGENTTRACE_SHUTDOWN_TIMEOUT_MS`.
pub fn env_config_from<F>(lookup: F) -> Result<TraceConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |suffix: &str| {
        lookup(&format!("{}{}", ENV_PREFIX, suffix)).filter(|v| !v.trim().is_empty())
    };

    Ok(TraceConfig {
        api_key: get("API_KEY"),
        agent_id: get("AGENT_ID"),
        include_content: parse_bool("includeContent", get("INCLUDE_CONTENT"))?,
        include_binary_content: parse_bool(
            "includeBinaryContent",
            get("INCLUDE_BINARY_CONTENT"),
        )?,
        batch_size: parse_int("batchSize", get("BATCH_SIZE"))?,
        flush_interval_ms: parse_int("flushIntervalMs", get("FLUSH_INTERVAL_MS"))?,
        max_retries: parse_int("maxRetries", get("MAX_RETRIES"))?,
        debug: parse_bool("debug", get("DEBUG"))?,
        handle_signals: parse_bool("handleSignals", get("HANDLE_SIGNALS"))?,
        shutdown_timeout_ms: parse_int("shutdownTimeoutMs", get("SHUTDOWN_TIMEOUT_MS"))?,
    })
}

fn parse_bool(field: &str, value: Option<String>) -> Result<Option<bool>, ConfigError> {
    let value = match value {
        Some(v) => v,
        None => return Ok(None),
    };
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        other => Err(ConfigError::invalid(
            field,
            format!("expected a boolean, got '{}'", other),
        )),
    }
}

fn parse_int(field: &str, value: Option<String>) -> Result<Option<i64>, ConfigError> {
    match value {
        Some(v) => v
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| ConfigError::invalid(field, format!("expected an integer, got '{}'", v))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_load_json_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("agenttrace.json");
        std::fs::write(&path, r#"{"apiKey": "k", "includeContent": true}"#).unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("k"));
        assert_eq!(config.include_content, Some(true));
    }

    #[test]
    fn test_load_yaml_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("agenttrace.yaml");
        std::fs::write(&path, "apiKey: k\nbatchSize: 25\nflushIntervalMs: 250\n").unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.batch_size, Some(25));
        assert_eq!(config.flush_interval_ms, Some(250));
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = load_config_file(&temp.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_env_config() {
        let config = env_config_from(lookup(&[
            ("AGENTTRACE_API_KEY", "env-key"),
            ("AGENTTRACE_INCLUDE_CONTENT", "yes"),
            ("AGENTTRACE_BATCH_SIZE", "7"),
            ("AGENTTRACE_DEBUG", "0"),
            ("AGENTTRACE_AGENT_ID", "  "),
        ]))
        .unwrap();

        assert_eq!(config.api_key.as_deref(), Some("env-key"));
        assert_eq!(config.include_content, Some(true));
        assert_eq!(config.batch_size, Some(7));
        assert_eq!(config.debug, Some(false));
        assert_eq!(config.agent_id, None);
    }

    #[test]
    fn test_env_config_bad_values() {
        let err = env_config_from(lookup(&[("AGENTTRACE_BATCH_SIZE", "lots")])).unwrap_err();
        assert_eq!(err.field(), Some("batchSize"));

        let err = env_config_from(lookup(&[("AGENTTRACE_DEBUG", "maybe")])).unwrap_err();
        assert_eq!(err.field(), Some("debug"));
    }
}
