// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Ambient trace context scoped to a call tree.
//!
//! Frames live in a tokio task-local, so they follow a future across
//! suspension points and two unrelated tasks never see each other's frame.
//! A nested frame is built by copying the parent and applying the child's
//! keys; the parent is never mutated.
//!
//! # Example
//!
//! ```rust,ignore
//! use agenttrace::telemetry::context::{current_context, with_context, Metadata};
//!
//! let meta = Metadata::new().with_user_id("u-42").with("tier", "pro");
//! let answer = with_context(meta, async {
//!     assert!(current_context().is_some());
//!     provider.chat(messages).await
//! })
//! .await?;
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::attributes as attr;
use super::ids::SpanContext;
use super::span::{AttributeValue, Attributes, SpanHandle, SpanOutcome};
use super::tracer::{end_span, start_span_with_attributes, EndOnDrop};

/// Metadata key for the user id.
pub const USER_ID_KEY: &str = "userId";
/// Metadata key for the session id.
pub const SESSION_ID_KEY: &str = "sessionId";
/// Metadata key for a caller-supplied trace id.
pub const TRACE_ID_KEY: &str = "traceId";

/// Free-form key-values visible to everything inside a context scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, Value>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn with_user_id(self, user_id: impl Into<String>) -> Self {
        self.with(USER_ID_KEY, user_id.into())
    }

    pub fn with_session_id(self, session_id: impl Into<String>) -> Self {
        self.with(SESSION_ID_KEY, session_id.into())
    }

    pub fn with_trace_id(self, trace_id: impl Into<String>) -> Self {
        self.with(TRACE_ID_KEY, trace_id.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.get(USER_ID_KEY).and_then(Value::as_str)
    }

    pub fn session_id(&self) -> Option<&str> {
        self.get(SESSION_ID_KEY).and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// A copy of `self` with `child`'s entries applied on top.
    pub fn merged_with(&self, child: &Metadata) -> Metadata {
        let mut merged = self.0.clone();
        for (key, value) in &child.0 {
            merged.insert(key.clone(), value.clone());
        }
        Metadata(merged)
    }
}

impl From<BTreeMap<String, Value>> for Metadata {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[derive(Debug, Clone, Default)]
struct ContextFrame {
    metadata: Option<Metadata>,
    active_span: Option<SpanContext>,
}

tokio::task_local! {
    static FRAME: ContextFrame;
}

fn current_frame() -> ContextFrame {
    FRAME.try_with(Clone::clone).unwrap_or_default()
}

/// Metadata visible at the call site, or `None` outside any scope.
pub fn current_context() -> Option<Metadata> {
    FRAME.try_with(|f| f.metadata.clone()).ok().flatten()
}

/// The span new spans should be parented to.
pub(crate) fn current_span_context() -> Option<SpanContext> {
    FRAME.try_with(|f| f.active_span).ok().flatten()
}

/// Span attributes for a context scope.
///
/// Well-known ids map to their own attribute names; other entries are
/// kept under `metadata.` when they are primitive.
fn context_attributes(metadata: &Metadata) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert(attr::SPAN_KIND.to_string(), "context".into());

    for (key, value) in metadata.iter() {
        let Some(value) = AttributeValue::from_json(value) else {
            continue;
        };
        let name = match key.as_str() {
            USER_ID_KEY => attr::USER_ID.to_string(),
            SESSION_ID_KEY => attr::SESSION_ID.to_string(),
            TRACE_ID_KEY => attr::TRACE_ID.to_string(),
            other => format!("{}{}", attr::METADATA_PREFIX, other),
        };
        attributes.insert(name, value);
    }
    attributes
}

fn open_scope(metadata: Metadata) -> (SpanHandle, ContextFrame) {
    let parent = current_frame();
    let merged = match parent.metadata {
        Some(ref existing) => existing.merged_with(&metadata),
        None => metadata,
    };

    let span = start_span_with_attributes("context", context_attributes(&merged));
    let frame = ContextFrame {
        metadata: Some(merged),
        active_span: Some(span.span_context()),
    };
    (span, frame)
}

fn close_scope<T, E: fmt::Display>(span: &SpanHandle, result: &Result<T, E>) {
    match result {
        Ok(_) => end_span(span, SpanOutcome::ok()),
        Err(err) => end_span(span, SpanOutcome::failed(err)),
    }
}

/// Run `fut` with `metadata` merged into the ambient context.
///
/// A "context" span covers the scope and becomes the parent of spans
/// started inside it. The future's result is returned unchanged; an error
/// also marks the span as failed.
pub async fn with_context<F, T, E>(metadata: Metadata, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let (span, frame) = open_scope(metadata);
    let mut guard = EndOnDrop::new(&span);

    let result = FRAME.scope(frame, fut).await;

    guard.disarm();
    close_scope(&span, &result);
    result
}

/// Synchronous form of [`with_context`].
pub fn with_context_sync<F, T, E>(metadata: Metadata, f: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
    E: fmt::Display,
{
    let (span, frame) = open_scope(metadata);
    let mut guard = EndOnDrop::new(&span);

    let result = FRAME.sync_scope(frame, f);

    guard.disarm();
    close_scope(&span, &result);
    result
}

/// Run `fut` with `span` as the parent of spans started inside it.
///
/// Metadata is inherited unchanged. The span is not ended.
pub async fn in_span<F: Future>(span: &SpanHandle, fut: F) -> F::Output {
    let mut frame = current_frame();
    frame.active_span = Some(span.span_context());
    FRAME.scope(frame, fut).await
}

/// Carry the current frame into a future that will run elsewhere,
/// typically a `tokio::spawn`ed task.
pub fn propagate<F: Future>(fut: F) -> impl Future<Output = F::Output> {
    FRAME.scope(current_frame(), fut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(key: &str, value: Value) -> Metadata {
        Metadata::new().with(key, value)
    }

    #[test]
    fn test_merge_child_wins() {
        let parent = meta("a", json!(1)).with("shared", "parent");
        let child = meta("b", json!(2)).with("shared", "child");
        let merged = parent.merged_with(&child);

        assert_eq!(merged.get("a"), Some(&json!(1)));
        assert_eq!(merged.get("b"), Some(&json!(2)));
        assert_eq!(merged.get("shared"), Some(&json!("child")));
        assert_eq!(parent.get("b"), None);
    }

    #[test]
    fn test_context_attributes() {
        let metadata = Metadata::new()
            .with_user_id("u1")
            .with_session_id("s1")
            .with_trace_id("t1")
            .with("plan", "pro")
            .with("retries", 2)
            .with("nested", json!({"x": 1}))
            .with("list", json!([1, 2]));
        let attributes = context_attributes(&metadata);

        assert_eq!(attributes[attr::USER_ID].as_str(), Some("u1"));
        assert_eq!(attributes[attr::SESSION_ID].as_str(), Some("s1"));
        assert_eq!(attributes[attr::TRACE_ID].as_str(), Some("t1"));
        assert_eq!(attributes["metadata.plan"].as_str(), Some("pro"));
        assert_eq!(attributes["metadata.retries"].as_i64(), Some(2));
        assert!(!attributes.contains_key("metadata.nested"));
        assert!(!attributes.contains_key("metadata.list"));
        assert_eq!(attributes[attr::SPAN_KIND].as_str(), Some("context"));
    }

    #[test]
    fn test_no_context_outside_scope() {
        assert!(current_context().is_none());
        assert!(current_span_context().is_none());
    }

    #[tokio::test]
    async fn test_nested_scopes_restore_parent() {
        let outer: Result<(), String> = with_context(meta("a", json!(1)), async {
            let inner: Result<Metadata, String> = with_context(meta("b", json!(2)), async {
                Ok(current_context().unwrap_or_default())
            })
            .await;
            let inner = inner.unwrap();
            assert_eq!(inner.get("a"), Some(&json!(1)));
            assert_eq!(inner.get("b"), Some(&json!(2)));

            let after = current_context().unwrap_or_default();
            assert_eq!(after, meta("a", json!(1)));
            Ok(())
        })
        .await;
        assert!(outer.is_ok());
        assert!(current_context().is_none());
    }

    #[tokio::test]
    async fn test_error_passes_through_scope() {
        let result: Result<u8, String> =
            with_context(Metadata::new(), async { Err("boom".to_string()) }).await;
        assert_eq!(result, Err("boom".to_string()));
        assert!(current_context().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_scopes_isolated() {
        let left = with_context(meta("side", json!("left")), async {
            tokio::task::yield_now().await;
            Ok::<_, String>(current_context().and_then(|m| m.get("side").cloned()))
        });
        let right = with_context(meta("side", json!("right")), async {
            tokio::task::yield_now().await;
            Ok::<_, String>(current_context().and_then(|m| m.get("side").cloned()))
        });

        let (left, right) = tokio::join!(left, right);
        assert_eq!(left.unwrap(), Some(json!("left")));
        assert_eq!(right.unwrap(), Some(json!("right")));
    }

    #[tokio::test]
    async fn test_propagate_into_spawned_task() {
        let seen: Result<Option<Value>, String> = with_context(meta("k", json!("v")), async {
            let handle = tokio::spawn(propagate(async {
                current_context().and_then(|m| m.get("k").cloned())
            }));
            Ok(handle.await.ok().flatten())
        })
        .await;
        assert_eq!(seen.unwrap(), Some(json!("v")));
    }

    #[test]
    fn test_sync_scope() {
        let seen: Result<Option<Metadata>, String> =
            with_context_sync(meta("sync", json!(true)), || Ok(current_context()));
        assert_eq!(seen.unwrap(), Some(meta("sync", json!(true))));
        assert!(current_context().is_none());
    }
}
