// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! agenttrace - span lifecycle telemetry for LLM agents.
//!
//! Records model calls, streams, and the work around them as spans, and
//! hands finished spans to a batching export pipeline.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`client`] - Process-wide init, flush, and shutdown
//! - [`config`] - Configuration loading, merging, and validation
//! - [`error`] - Error types and result aliases
//! - [`telemetry`] - Span model, tracer, ambient context, and metrics
//! - [`stream`] - Pull, push, and deferred-usage stream instrumentation
//! - [`export`] - Span processors and exporters
//! - [`instrument`] - Instrumentation registry and traced provider wrapper
//! - [`types`] - Provider-facing message and response types
//!
//! # Example
//!
//! ```rust,ignore
//! use agenttrace::{init, shutdown, start_llm_span, with_context, Metadata, TraceConfig};
//!
//! init(TraceConfig::new(api_key, "support-bot"))?;
//!
//! with_context(Metadata::new().with_user_id("u-42"), async {
//!     let span = start_llm_span("chat", "openai", "gpt-4o");
//!     // ... call the model ...
//!     span.end(SpanOutcome::ok());
//! })
//! .await;
//!
//! shutdown().await;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod instrument;
pub mod stream;
pub mod telemetry;
pub mod types;

// Re-export commonly used items at crate root
pub use client::{
    debug_enabled, flush, get_config, init, init_with_exporter, is_initialized, set_debug_mode,
    shutdown, Client,
};
pub use config::{ResolvedConfig, TraceConfig};
pub use error::{ConfigError, ExportError, InstrumentError, ProviderError, Result};
pub use export::{InMemoryExporter, LogExporter, SpanExporter};
pub use instrument::{instrument, is_instrumented, uninstrument, InstrumentedProvider};
pub use stream::{wrap_deferred_usage, wrap_pull_stream, wrap_push_stream, ChunkFields};
pub use telemetry::{
    current_context, end_span, in_span, propagate, start_llm_span, start_span, traced,
    traced_with, with_context, with_context_sync, Content, Metadata, SpanHandle, SpanOutcome,
    SpanStatus, TokenCounts,
};

/// agenttrace version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
