// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Streaming instrumentation.
//!
//! Provider streams come in three shapes: a pull-style `Stream` of chunks,
//! a push-style emitter with separate data/end/error channels, and a
//! deferred usage total delivered by its own future. Each shape has an
//! adapter here, and all of them report into one [`StreamAggregator`]
//! whose finalize guard ends the span exactly once.
//!
//! # Example
//!
//! ```rust,ignore
//! use agenttrace::stream::{wrap_pull_stream, ChunkFields};
//! use agenttrace::telemetry::start_llm_span;
//!
//! let span = start_llm_span("chat.stream", "openai", "gpt-4o");
//! let mut chunks = wrap_pull_stream(span, client.stream(req), |c: &Chunk| {
//!     ChunkFields::text(c.delta.clone())
//! });
//! while let Some(chunk) = chunks.next().await {
//!     print!("{}", chunk?.delta);
//! }
//! ```

mod aggregator;
mod guard;
mod pull;
mod push;
mod usage;

pub use aggregator::{ChunkFields, StreamAggregator};
pub use guard::FinalizeGuard;
pub use pull::InstrumentedStream;
pub use push::{Emission, EventEmitter, EventNames};
pub use usage::{wrap_deferred_usage, DeferredUsage};

use std::fmt;
use std::sync::Arc;

use crate::telemetry::SpanHandle;

/// Wrap a pull-style stream. The span ends when the stream does.
pub fn wrap_pull_stream<S, X>(span: SpanHandle, source: S, extract: X) -> InstrumentedStream<S, X> {
    InstrumentedStream::new(source, StreamAggregator::new(span), extract)
}

/// Instrument a push-style emitter. The span ends on the first `end` or
/// `error` emission.
///
/// The emitter is returned so call sites can keep chaining on it.
pub fn wrap_push_stream<T, E, X>(
    span: SpanHandle,
    emitter: Arc<EventEmitter<T, E>>,
    names: &EventNames,
    extract: X,
) -> Arc<EventEmitter<T, E>>
where
    T: 'static,
    E: fmt::Display + 'static,
    X: Fn(&T) -> ChunkFields + Send + Sync + 'static,
{
    StreamAggregator::new(span).attach(emitter.as_ref(), names, extract);
    emitter
}
