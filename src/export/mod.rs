// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Handing finished spans to a backend.
//!
//! The tracer only knows [`SpanProcessor`]; the bundled
//! [`BatchSpanProcessor`] buffers spans and drives any [`SpanExporter`]
//! with retries. Export failures never reach instrumented call sites.

mod batch;
mod log;
mod memory;

pub use batch::{backoff_delay, BatchConfig, BatchSpanProcessor, INITIAL_BACKOFF, MAX_BACKOFF};
pub use log::LogExporter;
pub use memory::InMemoryExporter;

use async_trait::async_trait;

use crate::error::ExportError;
use crate::telemetry::FinishedSpan;

/// Receives every span as it ends.
///
/// Called synchronously from `end_span`; implementations must not block.
pub trait SpanProcessor: Send + Sync {
    fn on_end(&self, span: FinishedSpan);
}

/// Transmits batches of finished spans.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpanExporter: Send + Sync {
    /// Send one batch. Retryable errors are retried by the processor.
    async fn export(&self, batch: Vec<FinishedSpan>) -> Result<(), ExportError>;

    /// Push out anything the exporter itself buffers.
    async fn flush(&self) -> bool {
        true
    }

    /// Release resources. Called once, after the final flush.
    async fn shutdown(&self) {}
}
