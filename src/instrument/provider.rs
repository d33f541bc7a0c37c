// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tracing wrapper for [`Provider`] implementations.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ProviderError;
use crate::stream::{wrap_deferred_usage, ChunkFields, StreamAggregator};
use crate::telemetry::{
    in_span, start_llm_span, traced_with, Content, SpanOutcome, TokenCounts,
};
use crate::types::{EventCallback, Message, Provider, ProviderResponse, StreamEvent};

/// Span name for non-streaming calls.
pub const CHAT_SPAN: &str = "llm.chat";
/// Span name for streaming calls.
pub const STREAM_SPAN: &str = "llm.chat.stream";

/// Wraps a provider so every call produces one LLM span.
///
/// Results, events, and errors reach the caller exactly as the inner
/// provider produced them.
///
/// # Example
///
/// ```rust,ignore
/// let provider = InstrumentedProvider::new(AnthropicProvider::new(key));
/// let reply = provider.chat(&[Message::user("hi")], None).await?;
/// ```
pub struct InstrumentedProvider<P> {
    inner: P,
}

impl<P: Provider> InstrumentedProvider<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn into_inner(self) -> P {
        self.inner
    }
}

/// Prompt payload: the system prompt (if any) followed by the messages.
fn prompt_content(messages: &[Message], system_prompt: Option<&str>) -> Content {
    let mut entries = Vec::with_capacity(messages.len() + 1);
    if let Some(system) = system_prompt {
        entries.push(json!({ "role": "system", "content": system }));
    }
    for message in messages {
        entries.push(json!({ "role": message.role, "content": message.content }));
    }
    Content::Json(Value::Array(entries))
}

fn response_outcome(response: &ProviderResponse, input: Content) -> SpanOutcome {
    let mut outcome = SpanOutcome::ok()
        .with_stream(false)
        .with_finish_reason(response.stop_reason.as_str())
        .with_input(input)
        .with_output(response.content.as_str());
    if let Some(usage) = &response.usage {
        outcome = outcome.with_usage(TokenCounts::from(usage));
    }
    outcome
}

/// Finalizes the aggregator as incomplete if the call is dropped early.
struct CancelOnDrop(Option<StreamAggregator>);

impl CancelOnDrop {
    fn disarm(&mut self) {
        self.0 = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(aggregator) = self.0.take() {
            aggregator.cancel();
        }
    }
}

#[async_trait]
impl<P: Provider> Provider for InstrumentedProvider<P> {
    async fn chat(
        &self,
        messages: &[Message],
        system_prompt: Option<&str>,
    ) -> Result<ProviderResponse, ProviderError> {
        let span = start_llm_span(CHAT_SPAN, self.inner.name(), self.inner.model());
        let input = prompt_content(messages, system_prompt);

        traced_with(span, self.inner.chat(messages, system_prompt), move |response| {
            response_outcome(response, input)
        })
        .await
    }

    async fn stream_chat(
        &self,
        messages: &[Message],
        system_prompt: Option<&str>,
        on_event: EventCallback,
    ) -> Result<ProviderResponse, ProviderError> {
        let span = start_llm_span(STREAM_SPAN, self.inner.name(), self.inner.model());
        let aggregator = StreamAggregator::with_deferred_usage(span.clone())
            .with_input(prompt_content(messages, system_prompt));
        let mut cancel = CancelOnDrop(Some(aggregator.clone()));

        let events = aggregator.clone();
        let forward: EventCallback = Box::new(move |event: StreamEvent| {
            match &event {
                StreamEvent::TextDelta(text) => events.record(ChunkFields::text(text.as_str())),
                StreamEvent::Usage(usage) => {
                    events.record(ChunkFields::empty().with_usage(TokenCounts::from(usage)))
                }
                StreamEvent::Done(reason) => {
                    events.record(ChunkFields::empty().with_finish_reason(reason.as_str()))
                }
                StreamEvent::Error(message) => events.fail(message),
                StreamEvent::ReasoningDelta(_) => {}
            }
            on_event(event);
        });

        // Usage on the final response settles after the stream itself.
        let call = in_span(&span, self.inner.stream_chat(messages, system_prompt, forward));
        let result = wrap_deferred_usage(&aggregator, call, |response: &ProviderResponse| {
            response
                .usage
                .as_ref()
                .map(TokenCounts::from)
                .unwrap_or_default()
        })
        .await;
        cancel.disarm();

        match &result {
            Ok(_) => aggregator.complete(),
            Err(err) => aggregator.fail(err),
        }
        result
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TokenUsage;

    #[test]
    fn test_prompt_content_includes_system() {
        let content = prompt_content(&[Message::user("hi")], Some("be brief"));
        let Content::Json(Value::Array(entries)) = content else {
            panic!("expected JSON array");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["role"], "system");
        assert_eq!(entries[1]["role"], "user");
        assert_eq!(entries[1]["content"], "hi");
    }

    #[test]
    fn test_response_outcome() {
        let response = ProviderResponse::text("hello").with_usage(TokenUsage::new(7, 2));
        let outcome = response_outcome(&response, Content::Text("q".to_string()));

        assert_eq!(outcome.stream, Some(false));
        assert_eq!(outcome.finish_reason.as_deref(), Some("end_turn"));
        assert_eq!(outcome.usage, TokenCounts::new(7, 2));
        assert_eq!(outcome.output, Some(Content::Text("hello".to_string())));
    }

    #[test]
    fn test_response_without_usage_leaves_counts_absent() {
        let outcome = response_outcome(&ProviderResponse::text("x"), Content::Text(String::new()));
        assert!(outcome.usage.is_empty());
    }
}
