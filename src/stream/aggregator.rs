// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Aggregation state shared by the stream adapters.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use crate::telemetry::attributes as attr;
use crate::telemetry::{end_span, Content, SpanHandle, SpanOutcome, TokenCounts};

use super::guard::FinalizeGuard;

/// What one chunk contributes to the aggregate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkFields {
    /// Text appended to the running output.
    pub text: Option<String>,
    /// Counts seen in this chunk; absent counts leave earlier values alone.
    pub usage: TokenCounts,
    pub finish_reason: Option<String>,
}

impl ChunkFields {
    /// A chunk that contributes nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A chunk carrying text.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn with_usage(mut self, usage: TokenCounts) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_finish_reason(mut self, reason: impl Into<String>) -> Self {
        self.finish_reason = Some(reason.into());
        self
    }
}

#[derive(Debug, Default)]
struct State {
    text: String,
    usage: TokenCounts,
    finish_reason: Option<String>,
    input: Option<Content>,
    chunks: u64,
    first_chunk_after: Option<Duration>,
    stream_done: bool,
    usage_settled: bool,
    error: Option<String>,
    incomplete: bool,
}

struct Inner {
    span: SpanHandle,
    state: Mutex<State>,
    guard: FinalizeGuard,
    started: Instant,
}

/// Running totals for one streamed call, ending its span exactly once.
///
/// The span is finalized when the stream completes and, for aggregators
/// created with [`with_deferred_usage`](Self::with_deferred_usage), the
/// usage total has also settled. An error finalizes immediately. Whichever
/// path gets there first wins; the rest are ignored.
#[derive(Clone)]
pub struct StreamAggregator {
    inner: Arc<Inner>,
}

impl StreamAggregator {
    /// Aggregator that finalizes as soon as the stream completes.
    pub fn new(span: SpanHandle) -> Self {
        Self::build(span, true)
    }

    /// Aggregator that also waits for a separately delivered usage total.
    pub fn with_deferred_usage(span: SpanHandle) -> Self {
        Self::build(span, false)
    }

    fn build(span: SpanHandle, usage_settled: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                span,
                state: Mutex::new(State {
                    usage_settled,
                    ..Default::default()
                }),
                guard: FinalizeGuard::new(),
                started: Instant::now(),
            }),
        }
    }

    /// Attach the prompt payload, subject to the content policy at end.
    pub fn with_input(self, input: impl Into<Content>) -> Self {
        self.inner.state.lock().input = Some(input.into());
        self
    }

    pub fn span(&self) -> &SpanHandle {
        &self.inner.span
    }

    pub fn is_finalized(&self) -> bool {
        self.inner.guard.is_claimed()
    }

    /// Text accumulated so far.
    pub fn text(&self) -> String {
        self.inner.state.lock().text.clone()
    }

    pub fn usage(&self) -> TokenCounts {
        self.inner.state.lock().usage
    }

    pub fn chunks(&self) -> u64 {
        self.inner.state.lock().chunks
    }

    /// Fold one chunk into the totals. Ignored after finalize.
    pub fn record(&self, fields: ChunkFields) {
        if self.is_finalized() {
            return;
        }
        let elapsed = self.inner.started.elapsed();
        let mut state = self.inner.state.lock();
        if state.error.is_some() {
            return;
        }

        state.chunks += 1;
        state.first_chunk_after.get_or_insert(elapsed);
        if let Some(text) = fields.text {
            state.text.push_str(&text);
        }
        state.usage.merge_from(&fields.usage);
        if fields.finish_reason.is_some() {
            state.finish_reason = fields.finish_reason;
        }
    }

    /// The stream ended normally.
    pub fn complete(&self) {
        let ready = {
            let mut state = self.inner.state.lock();
            state.stream_done = true;
            state.usage_settled
        };
        if ready {
            self.finalize();
        }
    }

    /// The stream failed. Finalizes immediately with error status.
    pub fn fail(&self, error: impl fmt::Display) {
        {
            let mut state = self.inner.state.lock();
            if state.error.is_none() {
                state.error = Some(error.to_string());
            }
        }
        self.finalize();
    }

    /// A deferred usage total arrived.
    pub fn resolve_usage(&self, usage: TokenCounts) {
        let ready = {
            let mut state = self.inner.state.lock();
            if !self.inner.guard.is_claimed() {
                state.usage.merge_from(&usage);
            }
            state.usage_settled = true;
            state.stream_done
        };
        if ready {
            self.finalize();
        }
    }

    /// The deferred usage total will never arrive.
    pub fn abandon_usage(&self) {
        let ready = {
            let mut state = self.inner.state.lock();
            state.usage_settled = true;
            state.stream_done
        };
        if ready {
            self.finalize();
        }
    }

    /// The consumer stopped before the stream ended. Finalizes with what
    /// was accumulated and marks the span incomplete.
    pub fn cancel(&self) {
        if self.is_finalized() {
            return;
        }
        {
            let mut state = self.inner.state.lock();
            state.incomplete = true;
            state.stream_done = true;
            state.usage_settled = true;
        }
        self.finalize();
    }

    fn finalize(&self) {
        if !self.inner.guard.try_claim() {
            return;
        }

        let outcome = {
            let state = self.inner.state.lock();
            build_outcome(&state)
        };
        debug!(span = %self.inner.span.name(), "Finalizing stream span");
        end_span(&self.inner.span, outcome);
    }
}

impl fmt::Debug for StreamAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamAggregator")
            .field("span", &self.inner.span)
            .field("finalized", &self.is_finalized())
            .finish()
    }
}

fn build_outcome(state: &State) -> SpanOutcome {
    let mut outcome = match &state.error {
        Some(error) => SpanOutcome::failed(error),
        None => SpanOutcome::ok(),
    }
    .with_stream(true)
    .with_usage(state.usage)
    .with_attribute(attr::LLM_STREAM_CHUNKS, state.chunks);

    if let Some(after) = state.first_chunk_after {
        outcome = outcome.with_attribute(
            attr::LLM_STREAM_TIME_TO_FIRST_CHUNK_MS,
            after.as_secs_f64() * 1000.0,
        );
    }
    if let Some(reason) = &state.finish_reason {
        outcome = outcome.with_finish_reason(reason.as_str());
    }
    if state.incomplete {
        outcome = outcome.with_attribute(attr::LLM_STREAM_INCOMPLETE, true);
    }
    if let Some(input) = &state.input {
        outcome = outcome.with_input(input.clone());
    }
    if !state.text.is_empty() {
        outcome = outcome.with_output(state.text.as_str());
    }
    outcome
}
