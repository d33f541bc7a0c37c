// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Exporter that keeps spans in memory.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::ExportError;
use crate::telemetry::FinishedSpan;

use super::SpanExporter;

#[derive(Default)]
struct State {
    spans: Mutex<Vec<FinishedSpan>>,
    export_calls: AtomicUsize,
    flush_calls: AtomicUsize,
    shutdown_calls: AtomicUsize,
    shutdown_done: AtomicBool,
    failure: Mutex<Option<ExportError>>,
    shutdown_delay: Mutex<Option<Duration>>,
    export_delay: Mutex<Option<Duration>>,
}

/// Collects exported spans for inspection.
///
/// Clones share the same storage, so a test can keep one clone and hand
/// another to the client.
#[derive(Clone, Default)]
pub struct InMemoryExporter {
    state: Arc<State>,
}

impl InMemoryExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every export with `error` until cleared.
    pub fn with_failure(self, error: ExportError) -> Self {
        self.set_failure(Some(error));
        self
    }

    /// Make `shutdown` take at least `delay`.
    pub fn with_shutdown_delay(self, delay: Duration) -> Self {
        *self.state.shutdown_delay.lock() = Some(delay);
        self
    }

    /// Make every `export` take at least `delay` before storing the batch.
    pub fn with_export_delay(self, delay: Duration) -> Self {
        *self.state.export_delay.lock() = Some(delay);
        self
    }

    pub fn set_failure(&self, error: Option<ExportError>) {
        *self.state.failure.lock() = error;
    }

    /// All spans exported so far.
    pub fn spans(&self) -> Vec<FinishedSpan> {
        self.state.spans.lock().clone()
    }

    /// Exported spans with the given name.
    pub fn spans_named(&self, name: &str) -> Vec<FinishedSpan> {
        self.state
            .spans
            .lock()
            .iter()
            .filter(|s| s.name == name)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.state.spans.lock().clear();
    }

    pub fn export_calls(&self) -> usize {
        self.state.export_calls.load(Ordering::SeqCst)
    }

    pub fn flush_calls(&self) -> usize {
        self.state.flush_calls.load(Ordering::SeqCst)
    }

    pub fn shutdown_calls(&self) -> usize {
        self.state.shutdown_calls.load(Ordering::SeqCst)
    }

    /// Whether a `shutdown` call has run to completion.
    pub fn is_shutdown_complete(&self) -> bool {
        self.state.shutdown_done.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpanExporter for InMemoryExporter {
    async fn export(&self, batch: Vec<FinishedSpan>) -> Result<(), ExportError> {
        self.state.export_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.state.export_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.state.shutdown_done.load(Ordering::SeqCst) {
            return Err(ExportError::ShutDown);
        }
        if let Some(err) = self.state.failure.lock().clone() {
            return Err(err);
        }
        self.state.spans.lock().extend(batch);
        Ok(())
    }

    async fn flush(&self) -> bool {
        self.state.flush_calls.fetch_add(1, Ordering::SeqCst);
        true
    }

    async fn shutdown(&self) {
        self.state.shutdown_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.state.shutdown_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.state.shutdown_done.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{SpanId, SpanStatus, TraceId};
    use chrono::Utc;

    fn record(name: &str) -> FinishedSpan {
        let now = Utc::now();
        FinishedSpan {
            name: name.to_string(),
            trace_id: TraceId::new(),
            span_id: SpanId::new(),
            parent_span_id: None,
            start_time: now,
            end_time: now,
            duration_ms: 1.0,
            attributes: Default::default(),
            status: SpanStatus::Ok,
            status_message: None,
            events: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_collects_and_shares() {
        let exporter = InMemoryExporter::new();
        let handle = exporter.clone();

        exporter.export(vec![record("a"), record("b")]).await.unwrap();
        assert_eq!(handle.spans().len(), 2);
        assert_eq!(handle.spans_named("b").len(), 1);
        assert_eq!(handle.export_calls(), 1);

        handle.clear();
        assert!(exporter.spans().is_empty());
    }

    #[tokio::test]
    async fn test_failure_mode() {
        let exporter = InMemoryExporter::new().with_failure(ExportError::Transport("down".into()));
        assert!(exporter.export(vec![record("a")]).await.is_err());
        assert!(exporter.spans().is_empty());

        exporter.set_failure(None);
        assert!(exporter.export(vec![record("a")]).await.is_ok());
    }

    #[tokio::test]
    async fn test_rejects_after_shutdown() {
        let exporter = InMemoryExporter::new();
        exporter.shutdown().await;
        assert!(exporter.is_shutdown_complete());
        assert!(matches!(
            exporter.export(vec![record("a")]).await,
            Err(ExportError::ShutDown)
        ));
    }
}
