// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Well-known span attribute names.
//!
//! LLM attributes follow the OpenTelemetry GenAI naming where one exists.

/// Provider that served the call (e.g. "openai").
pub const GEN_AI_SYSTEM: &str = "gen_ai.system";
/// Model requested by the caller.
pub const GEN_AI_REQUEST_MODEL: &str = "gen_ai.request.model";
pub const GEN_AI_USAGE_INPUT_TOKENS: &str = "gen_ai.usage.input_tokens";
pub const GEN_AI_USAGE_OUTPUT_TOKENS: &str = "gen_ai.usage.output_tokens";
pub const GEN_AI_USAGE_TOTAL_TOKENS: &str = "gen_ai.usage.total_tokens";
pub const GEN_AI_FINISH_REASON: &str = "gen_ai.response.finish_reason";
/// Serialized prompt payload (content capture only).
pub const GEN_AI_PROMPT: &str = "gen_ai.prompt";
/// Serialized response payload (content capture only).
pub const GEN_AI_COMPLETION: &str = "gen_ai.completion";

/// Agent that owns the span.
pub const AGENT_ID: &str = "agent.id";
/// Kind of span: "llm", "context", or "span".
pub const SPAN_KIND: &str = "span.kind";

pub const LLM_STREAMING: &str = "llm.streaming";
pub const LLM_STREAM_CHUNKS: &str = "llm.stream.chunks";
pub const LLM_STREAM_TIME_TO_FIRST_CHUNK_MS: &str = "llm.stream.time_to_first_chunk_ms";
/// Set when a stream was dropped before it completed.
pub const LLM_STREAM_INCOMPLETE: &str = "llm.stream.incomplete";

pub const USER_ID: &str = "user.id";
pub const SESSION_ID: &str = "session.id";
pub const TRACE_ID: &str = "trace.id";
/// Prefix for free-form context metadata entries.
pub const METADATA_PREFIX: &str = "metadata.";

/// Name of the event recorded when a span ends with an error.
pub const EXCEPTION_EVENT: &str = "exception";
pub const EXCEPTION_MESSAGE: &str = "exception.message";
