// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Log output for hosts and the `agenttrace` binary.
//!
//! The library only emits `tracing` events; installing a subscriber is the
//! host's decision. This helper builds the usual registry for hosts that
//! have none.

use std::io;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Options for [`init_logging`].
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Level used when neither `filter_directive` nor RUST_LOG is set.
    pub default_level: Level,
    pub include_file_line: bool,
    pub include_target: bool,
    pub ansi_colors: bool,
    pub compact: bool,
    /// Explicit filter directive; takes precedence over RUST_LOG.
    pub filter_directive: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_level: Level::INFO,
            include_file_line: false,
            include_target: true,
            ansi_colors: true,
            compact: true,
            filter_directive: None,
        }
    }
}

impl LoggingConfig {
    /// Verbose output with source locations.
    pub fn development() -> Self {
        Self {
            default_level: Level::DEBUG,
            include_file_line: true,
            include_target: true,
            ansi_colors: true,
            compact: false,
            filter_directive: None,
        }
    }

    /// Warnings and errors only.
    pub fn production() -> Self {
        Self {
            default_level: Level::WARN,
            include_file_line: false,
            include_target: false,
            ansi_colors: false,
            compact: true,
            filter_directive: None,
        }
    }

    /// Everything from this crate, no colors.
    pub fn testing() -> Self {
        Self {
            default_level: Level::TRACE,
            include_file_line: true,
            include_target: true,
            ansi_colors: false,
            compact: false,
            filter_directive: Some("agenttrace=trace".to_string()),
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter_directive = Some(filter.into());
        self
    }

    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi_colors = ansi;
        self
    }

    fn env_filter(&self) -> EnvFilter {
        let fallback = || EnvFilter::new(self.default_level.to_string());
        match &self.filter_directive {
            Some(directive) => EnvFilter::try_new(directive).unwrap_or_else(|_| fallback()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback()),
        }
    }
}

/// Install a global fmt subscriber writing to stderr.
///
/// Fails if a global subscriber is already set.
///
/// # Example
///
/// ```rust,ignore
/// use agenttrace::telemetry::{init_logging, LoggingConfig};
///
/// init_logging(&LoggingConfig::development())?;
/// ```
pub fn init_logging(config: &LoggingConfig) -> io::Result<()> {
    let filter = config.env_filter();

    let fmt_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(config.ansi_colors)
        .with_target(config.include_target)
        .with_file(config.include_file_line)
        .with_line_number(config.include_file_line);

    let result = if config.compact {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.compact())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
    };

    result.map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
}
