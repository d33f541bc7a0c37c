// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration module for agenttrace.
//!
//! Handles loading, merging, and validation of configuration from multiple sources:
//! - Global config: ~/.agenttrace/config.json
//! - An explicit JSON or YAML file
//! - Environment: `AGENTTRACE_*` variables
//!
//! Sources are merged with precedence (env > file > global > defaults).
//! [`crate::client::init`] itself only merges the explicit values it is
//! given over the defaults; the loaders exist for binaries and hosts that
//! want file/env driven setup.

mod loader;
mod merger;
mod types;

pub use loader::{
    env_config_from, get_global_config_path, load_config_file, load_env_config,
    load_global_config, ENV_PREFIX, GLOBAL_CONFIG_DIR, GLOBAL_CONFIG_FILE,
};

pub use merger::{default_config, merge_config, resolve_config};

pub use types::{
    ResolvedConfig, TraceConfig, DEFAULT_BATCH_SIZE, DEFAULT_FLUSH_INTERVAL_MS,
    DEFAULT_MAX_RETRIES, DEFAULT_SHUTDOWN_TIMEOUT_MS, MIN_FLUSH_INTERVAL_MS,
};

use crate::error::ConfigError;
use std::path::Path;

/// Load and merge the global file, an optional explicit file, and the
/// environment into one partial config.
pub fn load_config(file: Option<&Path>) -> Result<TraceConfig, ConfigError> {
    let global = load_global_config()?;
    let explicit = match file {
        Some(path) => Some(load_config_file(path)?),
        None => None,
    };
    let env = load_env_config()?;

    Ok(merge_config(
        global.into_iter().chain(explicit).chain(std::iter::once(env)),
    ))
}
