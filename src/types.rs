// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Provider-facing types.
//!
//! The minimal shape of an LLM provider client that [`crate::instrument`]
//! knows how to wrap: messages in, a response (or a stream of events) out.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::telemetry::TokenCounts;

// ============================================================================
// Message Types
// ============================================================================

/// Role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

// ============================================================================
// Token Usage & Provider Response
// ============================================================================

/// Token usage reported by a provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// Get total tokens (input + output).
    pub fn total(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

impl From<&TokenUsage> for TokenCounts {
    fn from(usage: &TokenUsage) -> Self {
        TokenCounts::new(usage.input_tokens.into(), usage.output_tokens.into())
    }
}

/// Reason why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
}

impl StopReason {
    /// Wire name, as recorded in `gen_ai.response.finish_reason`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EndTurn => "end_turn",
            Self::ToolUse => "tool_use",
            Self::MaxTokens => "max_tokens",
        }
    }
}

/// Response from a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub content: String,
    pub stop_reason: StopReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl ProviderResponse {
    /// Create a text response that ended its turn.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            stop_reason: StopReason::EndTurn,
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn with_stop_reason(mut self, reason: StopReason) -> Self {
        self.stop_reason = reason;
        self
    }
}

// ============================================================================
// Streaming Types
// ============================================================================

/// Events emitted during streaming responses.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A chunk of text content.
    TextDelta(String),
    /// A chunk of reasoning content; not part of the completion text.
    ReasoningDelta(String),
    /// Token usage, usually sent near the end of the stream.
    Usage(TokenUsage),
    /// Stream completed with stop reason.
    Done(StopReason),
    /// An error occurred during streaming.
    Error(String),
}

impl StreamEvent {
    /// Get the text content if this is a text delta.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::TextDelta(s) => Some(s),
            _ => None,
        }
    }
}

/// Callback receiving stream events.
pub type EventCallback = Box<dyn Fn(StreamEvent) + Send + Sync>;

// ============================================================================
// Provider Trait
// ============================================================================

/// A chat-completion provider client.
///
/// # Example
///
/// ```rust,ignore
/// use agenttrace::types::{Message, Provider, ProviderResponse};
///
/// struct Echo;
///
/// #[async_trait]
/// impl Provider for Echo {
///     async fn chat(&self, messages: &[Message], _: Option<&str>)
///         -> Result<ProviderResponse, ProviderError>
///     {
///         Ok(ProviderResponse::text(messages[0].content.clone()))
///     }
///     // ...
/// }
/// ```
#[async_trait]
pub trait Provider: Send + Sync {
    /// Send a chat completion request.
    async fn chat(
        &self,
        messages: &[Message],
        system_prompt: Option<&str>,
    ) -> Result<ProviderResponse, ProviderError>;

    /// Send a streaming request, delivering events to `on_event`, and
    /// return the final response once the stream completes.
    async fn stream_chat(
        &self,
        messages: &[Message],
        system_prompt: Option<&str>,
        on_event: EventCallback,
    ) -> Result<ProviderResponse, ProviderError>;

    /// Provider name, recorded as `gen_ai.system`.
    fn name(&self) -> &str;

    /// Model in use, recorded as `gen_ai.request.model`.
    fn model(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serialization() {
        let json = serde_json::to_string(&Message::user("test")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"test"}"#);
    }

    #[test]
    fn test_token_usage_to_counts() {
        let usage = TokenUsage::new(100, 50);
        assert_eq!(usage.total(), 150);

        let counts = TokenCounts::from(&usage);
        assert_eq!(counts.input_tokens, Some(100));
        assert_eq!(counts.output_tokens, Some(50));
        assert_eq!(counts.total_tokens, Some(150));
    }

    #[test]
    fn test_stop_reason_names() {
        assert_eq!(StopReason::EndTurn.as_str(), "end_turn");
        assert_eq!(
            serde_json::to_string(&StopReason::MaxTokens).unwrap(),
            format!("\"{}\"", StopReason::MaxTokens.as_str())
        );
    }

    #[test]
    fn test_provider_response_builder() {
        let response = ProviderResponse::text("Hello!")
            .with_usage(TokenUsage::new(3, 2))
            .with_stop_reason(StopReason::MaxTokens);
        assert_eq!(response.content, "Hello!");
        assert_eq!(response.stop_reason, StopReason::MaxTokens);
        assert_eq!(response.usage.map(|u| u.total()), Some(5));
    }
}
