// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Span model, lifecycle, and ambient context.
//!
//! - **Tracer**: starts spans and ends each one exactly once, applying the
//!   content-capture policy on the way out
//! - **Context**: task-scoped metadata frames that parent nested spans
//! - **Metrics**: counters for the span and export pipeline
//! - **Logging**: optional subscriber setup for hosts
//!
//! # Usage
//!
//! ```rust,ignore
//! use agenttrace::telemetry::{start_llm_span, traced_with, SpanOutcome, TokenCounts};
//!
//! let span = start_llm_span("chat", "openai", "gpt-4o");
//! let reply = traced_with(span, client.complete(req), |r| {
//!     SpanOutcome::ok().with_usage(TokenCounts::new(r.input, r.output))
//! })
//! .await?;
//! ```

pub mod attributes;
pub mod context;
mod ids;
mod logging;
pub mod metrics;
mod span;
mod tracer;

pub use context::{
    current_context, in_span, propagate, with_context, with_context_sync, Metadata,
};
pub use ids::{SpanContext, SpanId, TraceId};
pub use logging::{init_logging, LoggingConfig};
pub use metrics::{Histogram, MetricsSnapshot, PipelineMetrics};
pub use span::{
    AttributeValue, Attributes, Content, FinishedSpan, SpanEvent, SpanHandle, SpanOutcome,
    SpanStatus, TokenCounts,
};
pub use tracer::{
    end_span, start_llm_span, start_span, start_span_with_attributes, traced, traced_with, Tracer,
};

pub(crate) use tracer::rearm_not_initialized_warning;
