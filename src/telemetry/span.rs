// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Span handles, outcomes, and finished span records.
//!
//! A [`SpanHandle`] is a cheap, cloneable reference to one in-flight span.
//! It is ended exactly once: the first call to [`SpanHandle::end`] fixes
//! the terminal attributes and status and hands a [`FinishedSpan`] to the
//! exporter pipeline; every later call is a silent no-op.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::attributes as attr;
use super::ids::{SpanContext, SpanId, TraceId};
use super::tracer::Tracer;

/// A primitive span attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    /// Convert a JSON value, keeping only primitives.
    ///
    /// Nulls, arrays and objects yield `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float)),
            serde_json::Value::String(s) => Some(Self::String(s.clone())),
            _ => None,
        }
    }

    /// Get the value as a string slice, if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the value as an integer, if it is one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get the value as a bool, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for AttributeValue {
    fn from(i: i32) -> Self {
        Self::Int(i as i64)
    }
}

impl From<u32> for AttributeValue {
    fn from(i: u32) -> Self {
        Self::Int(i as i64)
    }
}

impl From<u64> for AttributeValue {
    fn from(i: u64) -> Self {
        Self::Int(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

impl From<usize> for AttributeValue {
    fn from(i: usize) -> Self {
        Self::Int(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

impl From<f64> for AttributeValue {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

/// Span attributes, ordered by key.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// Terminal status of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    #[default]
    Unset,
    Ok,
    Error,
}

/// A timestamped event recorded on a span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanEvent {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub attributes: Attributes,
}

/// Token counts for an LLM call.
///
/// Absent counts stay `None`; they are never coerced to zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCounts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

impl TokenCounts {
    /// Counts with input and output set and the total derived.
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens: Some(input_tokens),
            output_tokens: Some(output_tokens),
            total_tokens: Some(input_tokens.saturating_add(output_tokens)),
        }
    }

    /// True when no count is present.
    pub fn is_empty(&self) -> bool {
        self.input_tokens.is_none() && self.output_tokens.is_none() && self.total_tokens.is_none()
    }

    /// Overwrite each count that is present in `newer`.
    pub fn merge_from(&mut self, newer: &TokenCounts) {
        if newer.input_tokens.is_some() {
            self.input_tokens = newer.input_tokens;
        }
        if newer.output_tokens.is_some() {
            self.output_tokens = newer.output_tokens;
        }
        if newer.total_tokens.is_some() {
            self.total_tokens = newer.total_tokens;
        }
    }
}

/// A prompt or response payload offered for content capture.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// Plain text, attached verbatim.
    Text(String),
    /// Structured payload, attached as serialized JSON.
    Json(serde_json::Value),
    /// Raw bytes, attached only when binary capture is enabled.
    Binary { mime_type: String, data: Vec<u8> },
}

impl Content {
    /// Serialize a value into a JSON payload.
    ///
    /// Values that cannot be represented as JSON become `None`.
    pub fn json<T: Serialize>(value: &T) -> Option<Self> {
        serde_json::to_value(value).ok().map(Self::Json)
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<serde_json::Value> for Content {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

/// How a span ended: status, terminal attributes, and optional payloads.
#[derive(Debug, Clone, Default)]
pub struct SpanOutcome {
    /// Explicit status; defaults to ok, or error when `error` is set.
    pub status: Option<SpanStatus>,
    /// Extra attributes to set at end.
    pub attributes: Attributes,
    /// Error message to record as an exception event.
    pub error: Option<String>,
    /// Token usage, only the present counts are recorded.
    pub usage: TokenCounts,
    /// Whether the call was streamed.
    pub stream: Option<bool>,
    pub finish_reason: Option<String>,
    /// Prompt payload, subject to the content policy.
    pub input: Option<Content>,
    /// Response payload, subject to the content policy.
    pub output: Option<Content>,
}

impl SpanOutcome {
    /// A successful outcome.
    pub fn ok() -> Self {
        Self {
            status: Some(SpanStatus::Ok),
            ..Default::default()
        }
    }

    /// A failed outcome carrying the error's message.
    pub fn failed(error: impl fmt::Display) -> Self {
        Self {
            status: Some(SpanStatus::Error),
            error: Some(error.to_string()),
            ..Default::default()
        }
    }

    /// Set token usage.
    pub fn with_usage(mut self, usage: TokenCounts) -> Self {
        self.usage = usage;
        self
    }

    /// Mark the call as streamed or not.
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = Some(stream);
        self
    }

    /// Set the finish reason.
    pub fn with_finish_reason(mut self, reason: impl Into<String>) -> Self {
        self.finish_reason = Some(reason.into());
        self
    }

    /// Set the prompt payload.
    pub fn with_input(mut self, input: impl Into<Content>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Set the response payload.
    pub fn with_output(mut self, output: impl Into<Content>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Add a terminal attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Effective status after applying the error rule.
    pub fn resolved_status(&self) -> SpanStatus {
        if self.error.is_some() {
            SpanStatus::Error
        } else {
            self.status.unwrap_or(SpanStatus::Ok)
        }
    }
}

/// The immutable record of an ended span, as handed to exporters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishedSpan {
    pub name: String,
    pub trace_id: TraceId,
    pub span_id: SpanId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<SpanId>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: f64,
    pub attributes: Attributes,
    pub status: SpanStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<SpanEvent>,
}

impl FinishedSpan {
    /// Look up an attribute.
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Check whether the span ended with error status.
    pub fn is_error(&self) -> bool {
        self.status == SpanStatus::Error
    }

    /// Span context of this record.
    pub fn span_context(&self) -> SpanContext {
        SpanContext {
            trace_id: self.trace_id,
            span_id: self.span_id,
        }
    }
}

/// Mutable part of an in-flight span.
#[derive(Debug, Default)]
pub(crate) struct SpanState {
    pub(crate) attributes: Attributes,
    pub(crate) status: SpanStatus,
    pub(crate) status_message: Option<String>,
    pub(crate) events: Vec<SpanEvent>,
}

struct SpanInner {
    name: String,
    context: SpanContext,
    parent_span_id: Option<SpanId>,
    start_time: DateTime<Utc>,
    started: Instant,
    state: Mutex<SpanState>,
    ended: AtomicBool,
    tracer: Option<Arc<Tracer>>,
}

/// Handle to one in-flight span.
#[derive(Clone)]
pub struct SpanHandle {
    inner: Arc<SpanInner>,
}

impl SpanHandle {
    pub(crate) fn new(
        name: impl Into<String>,
        context: SpanContext,
        parent_span_id: Option<SpanId>,
        attributes: Attributes,
        tracer: Option<Arc<Tracer>>,
    ) -> Self {
        Self {
            inner: Arc::new(SpanInner {
                name: name.into(),
                context,
                parent_span_id,
                start_time: Utc::now(),
                started: Instant::now(),
                state: Mutex::new(SpanState {
                    attributes,
                    ..Default::default()
                }),
                ended: AtomicBool::new(false),
                tracer,
            }),
        }
    }

    /// Span name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Identity of this span.
    pub fn span_context(&self) -> SpanContext {
        self.inner.context
    }

    pub fn trace_id(&self) -> TraceId {
        self.inner.context.trace_id
    }

    pub fn span_id(&self) -> SpanId {
        self.inner.context.span_id
    }

    pub fn parent_span_id(&self) -> Option<SpanId> {
        self.inner.parent_span_id
    }

    /// Whether ending this span exports anything.
    ///
    /// Spans started before the client is initialized are non-recording.
    pub fn is_recording(&self) -> bool {
        self.inner.tracer.is_some()
    }

    /// Whether the span has been ended.
    pub fn is_ended(&self) -> bool {
        self.inner.ended.load(Ordering::Acquire)
    }

    /// Time since the span started.
    pub fn elapsed(&self) -> Duration {
        self.inner.started.elapsed()
    }

    /// Set an attribute. Returns `false` once the span has ended.
    pub fn set_attribute(&self, key: impl Into<String>, value: impl Into<AttributeValue>) -> bool {
        let mut state = self.inner.state.lock();
        if self.is_ended() {
            return false;
        }
        state.attributes.insert(key.into(), value.into());
        true
    }

    /// Current value of an attribute.
    pub fn attribute(&self, key: &str) -> Option<AttributeValue> {
        self.inner.state.lock().attributes.get(key).cloned()
    }

    /// Current status.
    pub fn status(&self) -> SpanStatus {
        self.inner.state.lock().status
    }

    /// Record a named event. Returns `false` once the span has ended.
    pub fn add_event(&self, name: impl Into<String>, attributes: Attributes) -> bool {
        let mut state = self.inner.state.lock();
        if self.is_ended() {
            return false;
        }
        state.events.push(SpanEvent {
            name: name.into(),
            timestamp: Utc::now(),
            attributes,
        });
        true
    }

    /// End the span. Repeated calls are ignored.
    pub fn end(&self, outcome: SpanOutcome) {
        super::tracer::end_span(self, outcome);
    }

    pub(crate) fn tracer(&self) -> Option<&Arc<Tracer>> {
        self.inner.tracer.as_ref()
    }

    /// Run `finalize` against the span state exactly once.
    ///
    /// The end-guard is claimed while the state lock is held, so no
    /// attribute can be written after the terminal ones. Returns `None`
    /// if the span had already ended.
    pub(crate) fn finish_with<F>(&self, finalize: F) -> Option<FinishedSpan>
    where
        F: FnOnce(&mut SpanState),
    {
        let mut state = self.inner.state.lock();
        if self
            .inner
            .ended
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }

        finalize(&mut state);

        let duration = self.inner.started.elapsed();
        let end_time = self.inner.start_time
            + chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero());

        Some(FinishedSpan {
            name: self.inner.name.clone(),
            trace_id: self.inner.context.trace_id,
            span_id: self.inner.context.span_id,
            parent_span_id: self.inner.parent_span_id,
            start_time: self.inner.start_time,
            end_time,
            duration_ms: duration.as_secs_f64() * 1000.0,
            attributes: std::mem::take(&mut state.attributes),
            status: state.status,
            status_message: state.status_message.clone(),
            events: std::mem::take(&mut state.events),
        })
    }
}

impl fmt::Debug for SpanHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpanHandle")
            .field("name", &self.inner.name)
            .field("trace_id", &self.inner.context.trace_id)
            .field("span_id", &self.inner.context.span_id)
            .field("recording", &self.is_recording())
            .field("ended", &self.is_ended())
            .finish()
    }
}

/// Build the exception event for an error message.
pub(crate) fn exception_event(message: &str) -> SpanEvent {
    let mut attributes = Attributes::new();
    attributes.insert(attr::EXCEPTION_MESSAGE.to_string(), message.into());
    SpanEvent {
        name: attr::EXCEPTION_EVENT.to_string(),
        timestamp: Utc::now(),
        attributes,
    }
}
