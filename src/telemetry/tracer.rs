// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Span lifecycle: starting spans under the ambient context and ending
//! them exactly once with the content-capture policy applied.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use base64::Engine;
use tracing::{debug, info, warn};

use crate::config::ResolvedConfig;
use crate::export::SpanProcessor;

use super::attributes as attr;
use super::context;
use super::ids::SpanContext;
use super::metrics::PipelineMetrics;
use super::span::{
    exception_event, Attributes, Content, FinishedSpan, SpanHandle, SpanOutcome, SpanState,
};

static NOT_INITIALIZED_WARNED: AtomicBool = AtomicBool::new(false);

/// Creates spans and routes finished ones to a processor.
pub struct Tracer {
    config: Arc<ResolvedConfig>,
    processor: Arc<dyn SpanProcessor>,
    metrics: Arc<PipelineMetrics>,
}

impl Tracer {
    /// Create a tracer over a configuration snapshot and processor.
    pub fn new(
        config: Arc<ResolvedConfig>,
        processor: Arc<dyn SpanProcessor>,
        metrics: Arc<PipelineMetrics>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            processor,
            metrics,
        })
    }

    /// Configuration this tracer applies.
    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Pipeline counters.
    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    /// Start a span parented to the ambient active span, if any.
    pub fn start_span(self: &Arc<Self>, name: &str, attributes: Attributes) -> SpanHandle {
        self.metrics.record_started();
        new_handle(name, attributes, Some(Arc::clone(self)))
    }

    /// Start an LLM span with provider, model and agent attributes set.
    pub fn start_llm_span(self: &Arc<Self>, name: &str, provider: &str, model: &str) -> SpanHandle {
        let mut attributes = llm_attributes(provider, model);
        if let Some(agent_id) = &self.config.agent_id {
            attributes.insert(attr::AGENT_ID.to_string(), agent_id.as_str().into());
        }
        self.start_span(name, attributes)
    }

    /// Finalize a span with this tracer's policy. Repeated calls are ignored.
    pub(crate) fn finish(&self, handle: &SpanHandle, outcome: SpanOutcome) {
        let config = &self.config;
        let record = handle.finish_with(|state| apply_outcome(state, &outcome, config));

        let span = match record {
            Some(span) => span,
            None => {
                debug!(span = %handle.name(), "Ignoring end of already-ended span");
                return;
            }
        };

        self.metrics.record_ended();
        if let (Some(input), Some(output)) = (outcome.usage.input_tokens, outcome.usage.output_tokens) {
            self.metrics.record_tokens(input, output);
        }

        if crate::client::debug_enabled() {
            log_finished(&span);
        }

        self.processor.on_end(span);
    }
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer").field("config", &self.config).finish()
    }
}

fn new_handle(name: &str, mut attributes: Attributes, tracer: Option<Arc<Tracer>>) -> SpanHandle {
    attributes
        .entry(attr::SPAN_KIND.to_string())
        .or_insert_with(|| "span".into());

    let parent = context::current_span_context();
    let span_context = parent
        .map(|p| p.new_child())
        .unwrap_or_else(SpanContext::new_root);

    SpanHandle::new(
        name,
        span_context,
        parent.map(|p| p.span_id),
        attributes,
        tracer,
    )
}

fn llm_attributes(provider: &str, model: &str) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert(attr::SPAN_KIND.to_string(), "llm".into());
    attributes.insert(attr::GEN_AI_SYSTEM.to_string(), provider.into());
    attributes.insert(attr::GEN_AI_REQUEST_MODEL.to_string(), model.into());
    attributes
}

fn apply_outcome(state: &mut SpanState, outcome: &SpanOutcome, config: &ResolvedConfig) {
    for (key, value) in &outcome.attributes {
        state.attributes.insert(key.clone(), value.clone());
    }

    let usage = &outcome.usage;
    if let Some(n) = usage.input_tokens {
        state.attributes.insert(attr::GEN_AI_USAGE_INPUT_TOKENS.to_string(), n.into());
    }
    if let Some(n) = usage.output_tokens {
        state.attributes.insert(attr::GEN_AI_USAGE_OUTPUT_TOKENS.to_string(), n.into());
    }
    if let Some(n) = usage.total_tokens {
        state.attributes.insert(attr::GEN_AI_USAGE_TOTAL_TOKENS.to_string(), n.into());
    }
    if let Some(stream) = outcome.stream {
        state.attributes.insert(attr::LLM_STREAMING.to_string(), stream.into());
    }
    if let Some(reason) = &outcome.finish_reason {
        state.attributes.insert(attr::GEN_AI_FINISH_REASON.to_string(), reason.as_str().into());
    }

    if config.include_content {
        if let Some(input) = outcome.input.as_ref().and_then(|c| render_content(c, config)) {
            state.attributes.insert(attr::GEN_AI_PROMPT.to_string(), input.into());
        }
        if let Some(output) = outcome.output.as_ref().and_then(|c| render_content(c, config)) {
            state.attributes.insert(attr::GEN_AI_COMPLETION.to_string(), output.into());
        }
    }

    state.status = outcome.resolved_status();
    if let Some(error) = &outcome.error {
        state.status_message = Some(error.clone());
        state.events.push(exception_event(error));
    }
}

/// Serialize a payload for attachment, or `None` if policy forbids it.
fn render_content(content: &Content, config: &ResolvedConfig) -> Option<String> {
    match content {
        Content::Text(text) => Some(text.clone()),
        Content::Json(value) => serde_json::to_string(value).ok(),
        Content::Binary { mime_type, data } => {
            if !config.allows_binary_content() {
                return None;
            }
            let encoded = base64::engine::general_purpose::STANDARD.encode(data);
            let payload = serde_json::json!({
                "mimeType": mime_type,
                "size": data.len(),
                "data": encoded,
            });
            Some(payload.to_string())
        }
    }
}

fn log_finished(span: &FinishedSpan) {
    info!(
        target: "agenttrace::debug",
        span = %span.name,
        trace_id = %span.trace_id,
        span_id = %span.span_id,
        status = ?span.status,
        duration_ms = span.duration_ms,
        attributes = span.attributes.len(),
        "Span finalized"
    );
}

fn warn_not_initialized(operation: &str) {
    if !NOT_INITIALIZED_WARNED.swap(true, Ordering::Relaxed) {
        warn!(
            operation,
            "agenttrace is not initialized; spans will not be recorded until init() is called"
        );
    }
}

/// Re-arm the one-shot "not initialized" warning.
pub(crate) fn rearm_not_initialized_warning() {
    NOT_INITIALIZED_WARNED.store(false, Ordering::Relaxed);
}

/// Start a span on the global client.
///
/// Before initialization this returns a non-recording handle: ids and
/// parenting still work, nothing is exported.
pub fn start_span(name: &str) -> SpanHandle {
    start_span_with_attributes(name, Attributes::new())
}

/// Start a span with initial attributes on the global client.
pub fn start_span_with_attributes(name: &str, attributes: Attributes) -> SpanHandle {
    match crate::client::current_tracer() {
        Some(tracer) => tracer.start_span(name, attributes),
        None => {
            warn_not_initialized("start_span");
            new_handle(name, attributes, None)
        }
    }
}

/// Start an LLM span on the global client.
pub fn start_llm_span(name: &str, provider: &str, model: &str) -> SpanHandle {
    match crate::client::current_tracer() {
        Some(tracer) => tracer.start_llm_span(name, provider, model),
        None => {
            warn_not_initialized("start_llm_span");
            new_handle(name, llm_attributes(provider, model), None)
        }
    }
}

/// End a span. A second call on the same handle is a silent no-op.
pub fn end_span(handle: &SpanHandle, outcome: SpanOutcome) {
    match handle.tracer() {
        Some(tracer) => tracer.finish(handle, outcome),
        None => {
            handle.finish_with(|state| state.status = outcome.resolved_status());
        }
    }
}

/// Ends the span with an error if dropped while still armed.
///
/// Covers futures that are dropped (or unwind) before they complete.
pub(crate) struct EndOnDrop {
    span: Option<SpanHandle>,
}

impl EndOnDrop {
    pub(crate) fn new(span: &SpanHandle) -> Self {
        Self {
            span: Some(span.clone()),
        }
    }

    pub(crate) fn disarm(&mut self) {
        self.span = None;
    }
}

impl Drop for EndOnDrop {
    fn drop(&mut self) {
        if let Some(span) = self.span.take() {
            end_span(&span, SpanOutcome::failed("scope dropped before completion"));
        }
    }
}

/// Run a fallible future as the active span and end the span with its
/// outcome. The result is returned unchanged.
pub async fn traced<F, T, E>(span: SpanHandle, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    traced_with(span, fut, |_| SpanOutcome::ok()).await
}

/// Like [`traced`], deriving the success outcome (usage, payloads) from
/// the value.
pub async fn traced_with<F, T, E, O>(span: SpanHandle, fut: F, on_success: O) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: fmt::Display,
    O: FnOnce(&T) -> SpanOutcome,
{
    let mut guard = EndOnDrop::new(&span);
    let result = context::in_span(&span, fut).await;
    guard.disarm();

    match &result {
        Ok(value) => end_span(&span, on_success(value)),
        Err(err) => end_span(&span, SpanOutcome::failed(err)),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve_config, TraceConfig};
    use crate::telemetry::span::{SpanStatus, TokenCounts};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<FinishedSpan>>);

    impl SpanProcessor for Collect {
        fn on_end(&self, span: FinishedSpan) {
            self.0.lock().push(span);
        }
    }

    fn test_tracer(config: TraceConfig) -> (Arc<Tracer>, Arc<Collect>) {
        let config = Arc::new(resolve_config(config).unwrap());
        let sink = Arc::new(Collect::default());
        let tracer = Tracer::new(config, sink.clone(), Arc::new(PipelineMetrics::new()));
        (tracer, sink)
    }

    #[test]
    fn test_llm_span_standard_attributes() {
        let (tracer, sink) = test_tracer(TraceConfig::new("k", "agent-7"));
        let span = tracer.start_llm_span("chat", "openai", "gpt-4o");
        end_span(&span, SpanOutcome::ok());

        let spans = sink.0.lock();
        let record = &spans[0];
        assert_eq!(record.attribute(attr::GEN_AI_SYSTEM).unwrap().as_str(), Some("openai"));
        assert_eq!(record.attribute(attr::GEN_AI_REQUEST_MODEL).unwrap().as_str(), Some("gpt-4o"));
        assert_eq!(record.attribute(attr::AGENT_ID).unwrap().as_str(), Some("agent-7"));
        assert_eq!(record.attribute(attr::SPAN_KIND).unwrap().as_str(), Some("llm"));
        assert_eq!(record.status, SpanStatus::Ok);
    }

    #[test]
    fn test_end_twice_exports_once() {
        let (tracer, sink) = test_tracer(TraceConfig::new("k", "a"));
        let span = tracer.start_span("op", Attributes::new());
        span.end(SpanOutcome::ok());
        span.end(SpanOutcome::failed("late"));

        let spans = sink.0.lock();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].status, SpanStatus::Ok);
        assert!(spans[0].events.is_empty());
        assert_eq!(tracer.metrics().snapshot().spans_ended, 1);
    }

    #[test]
    fn test_error_outcome_records_exception() {
        let (tracer, sink) = test_tracer(TraceConfig::new("k", "a"));
        let span = tracer.start_span("op", Attributes::new());
        end_span(&span, SpanOutcome::failed("rate limited"));

        let spans = sink.0.lock();
        assert_eq!(spans[0].status, SpanStatus::Error);
        assert_eq!(spans[0].status_message.as_deref(), Some("rate limited"));
        assert_eq!(spans[0].events.len(), 1);
        assert_eq!(spans[0].events[0].name, attr::EXCEPTION_EVENT);
    }

    #[test]
    fn test_absent_tokens_not_coerced() {
        let (tracer, sink) = test_tracer(TraceConfig::new("k", "a"));
        let span = tracer.start_llm_span("chat", "anthropic", "claude");
        let usage = TokenCounts {
            output_tokens: Some(0),
            ..Default::default()
        };
        end_span(&span, SpanOutcome::ok().with_usage(usage));

        let spans = sink.0.lock();
        assert!(spans[0].attribute(attr::GEN_AI_USAGE_INPUT_TOKENS).is_none());
        assert!(spans[0].attribute(attr::GEN_AI_USAGE_TOTAL_TOKENS).is_none());
        assert_eq!(
            spans[0].attribute(attr::GEN_AI_USAGE_OUTPUT_TOKENS).unwrap().as_i64(),
            Some(0)
        );
    }

    #[test]
    fn test_content_excluded_by_default() {
        let (tracer, sink) = test_tracer(TraceConfig::new("k", "a"));
        let span = tracer.start_llm_span("chat", "openai", "gpt-4o");
        end_span(
            &span,
            SpanOutcome::ok().with_input("hello").with_output("world"),
        );

        let spans = sink.0.lock();
        assert!(spans[0].attribute(attr::GEN_AI_PROMPT).is_none());
        assert!(spans[0].attribute(attr::GEN_AI_COMPLETION).is_none());
    }

    #[test]
    fn test_content_included_serialized() {
        let (tracer, sink) = test_tracer(TraceConfig::new("k", "a").with_include_content(true));
        let prompt = serde_json::json!([{"role": "user", "content": "hi"}]);
        let span = tracer.start_llm_span("chat", "openai", "gpt-4o");
        end_span(
            &span,
            SpanOutcome::ok()
                .with_input(prompt.clone())
                .with_output("hello there"),
        );

        let spans = sink.0.lock();
        assert_eq!(
            spans[0].attribute(attr::GEN_AI_PROMPT).unwrap().as_str(),
            Some(serde_json::to_string(&prompt).unwrap().as_str())
        );
        assert_eq!(
            spans[0].attribute(attr::GEN_AI_COMPLETION).unwrap().as_str(),
            Some("hello there")
        );
    }

    #[test]
    fn test_binary_content_needs_both_flags() {
        let binary = Content::Binary {
            mime_type: "image/png".to_string(),
            data: vec![1, 2, 3],
        };

        let (tracer, sink) = test_tracer(TraceConfig::new("k", "a").with_include_content(true));
        let span = tracer.start_llm_span("vision", "openai", "gpt-4o");
        end_span(&span, SpanOutcome::ok().with_input(binary.clone()));
        assert!(sink.0.lock()[0].attribute(attr::GEN_AI_PROMPT).is_none());

        let (tracer, sink) = test_tracer(
            TraceConfig::new("k", "a")
                .with_include_content(true)
                .with_include_binary_content(true),
        );
        let span = tracer.start_llm_span("vision", "openai", "gpt-4o");
        end_span(&span, SpanOutcome::ok().with_input(binary));

        let spans = sink.0.lock();
        let attached = spans[0].attribute(attr::GEN_AI_PROMPT).unwrap().as_str().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(attached).unwrap();
        assert_eq!(parsed["mimeType"], "image/png");
        assert_eq!(parsed["size"], 3);
        assert_eq!(parsed["data"], "AQID");
    }

    #[test]
    fn test_detached_span_end_is_silent() {
        let span = new_handle("detached", Attributes::new(), None);
        assert!(!span.is_recording());
        end_span(&span, SpanOutcome::failed("ignored"));
        end_span(&span, SpanOutcome::ok());
        assert!(span.is_ended());
        assert_eq!(span.status(), SpanStatus::Error);
    }

    #[tokio::test]
    async fn test_traced_passes_error_through() {
        let (tracer, sink) = test_tracer(TraceConfig::new("k", "a"));
        let span = tracer.start_span("call", Attributes::new());

        let result: Result<u32, String> = traced(span, async { Err("upstream 500".to_string()) }).await;
        assert_eq!(result, Err("upstream 500".to_string()));

        let spans = sink.0.lock();
        assert_eq!(spans[0].status, SpanStatus::Error);
        assert_eq!(spans[0].status_message.as_deref(), Some("upstream 500"));
    }

    #[tokio::test]
    async fn test_traced_parents_nested_spans() {
        let (tracer, sink) = test_tracer(TraceConfig::new("k", "a"));
        let outer = tracer.start_span("outer", Attributes::new());
        let outer_ctx = outer.span_context();

        let inner_tracer = tracer.clone();
        let result: Result<(), String> = traced(outer, async move {
            let inner = inner_tracer.start_span("inner", Attributes::new());
            inner.end(SpanOutcome::ok());
            Ok(())
        })
        .await;
        assert!(result.is_ok());

        let spans = sink.0.lock();
        let inner = spans.iter().find(|s| s.name == "inner").unwrap();
        assert_eq!(inner.parent_span_id, Some(outer_ctx.span_id));
        assert_eq!(inner.trace_id, outer_ctx.trace_id);
    }

    #[tokio::test]
    async fn test_dropped_traced_future_ends_span() {
        let (tracer, sink) = test_tracer(TraceConfig::new("k", "a"));
        let span = tracer.start_span("abandoned", Attributes::new());

        let fut = traced(span.clone(), std::future::pending::<Result<(), String>>());
        let timed_out = tokio::time::timeout(std::time::Duration::from_millis(10), fut).await;
        assert!(timed_out.is_err());

        assert!(span.is_ended());
        let spans = sink.0.lock();
        assert_eq!(spans[0].status, SpanStatus::Error);
    }
}
