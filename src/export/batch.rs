// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Batching span processor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::config::ResolvedConfig;
use crate::telemetry::{FinishedSpan, PipelineMetrics};

use super::{SpanExporter, SpanProcessor};

/// First retry delay.
pub const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
/// Upper bound on any retry delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Delay before retry number `attempt` (zero-based).
pub fn backoff_delay(attempt: u32) -> Duration {
    let factor = 1u32 << attempt.min(16);
    INITIAL_BACKOFF.saturating_mul(factor).min(MAX_BACKOFF)
}

/// Batching knobs taken from the resolved configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub max_retries: u32,
}

impl From<&ResolvedConfig> for BatchConfig {
    fn from(config: &ResolvedConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            flush_interval: config.flush_interval,
            max_retries: config.max_retries,
        }
    }
}

/// Buffers finished spans and exports them in batches.
///
/// A batch is exported as soon as the buffer reaches `batch_size`, and an
/// interval task exports whatever is pending every `flush_interval`. Both
/// need a tokio runtime; without one, spans stay buffered until
/// [`force_flush`](Self::force_flush).
pub struct BatchSpanProcessor {
    exporter: Arc<dyn SpanExporter>,
    config: BatchConfig,
    buffer: Mutex<Vec<FinishedSpan>>,
    in_flight: Mutex<Vec<JoinHandle<bool>>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    shut_down: AtomicBool,
    metrics: Arc<PipelineMetrics>,
}

impl BatchSpanProcessor {
    /// Create a processor and start its interval task if a runtime exists.
    pub fn new(
        exporter: Arc<dyn SpanExporter>,
        config: BatchConfig,
        metrics: Arc<PipelineMetrics>,
    ) -> Arc<Self> {
        let processor = Arc::new(Self {
            exporter,
            config,
            buffer: Mutex::new(Vec::with_capacity(config.batch_size.min(1024))),
            in_flight: Mutex::new(Vec::new()),
            ticker: Mutex::new(None),
            shut_down: AtomicBool::new(false),
            metrics,
        });
        processor.start_ticker();
        processor
    }

    fn start_ticker(self: &Arc<Self>) {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                debug!("No tokio runtime; interval export disabled");
                return;
            }
        };

        let weak = Arc::downgrade(self);
        let period = self.config.flush_interval;
        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(processor) = weak.upgrade() else {
                    break;
                };
                processor.spawn_pending();
            }
        });
        *self.ticker.lock() = Some(handle);
    }

    /// Number of spans waiting in the buffer.
    pub fn pending(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    fn take_buffer(&self) -> Vec<FinishedSpan> {
        std::mem::take(&mut *self.buffer.lock())
    }

    /// Hand the buffered spans to a tracked export task.
    fn spawn_pending(&self) {
        let batch = self.take_buffer();
        if !batch.is_empty() {
            self.spawn_export(batch);
        }
    }

    fn spawn_export(&self, batch: Vec<FinishedSpan>) {
        match Handle::try_current() {
            Ok(runtime) => {
                let handle = runtime.spawn(export_with_retry(
                    Arc::clone(&self.exporter),
                    batch,
                    self.config.max_retries,
                    Arc::clone(&self.metrics),
                ));
                let mut in_flight = self.in_flight.lock();
                in_flight.retain(|h| !h.is_finished());
                in_flight.push(handle);
            }
            Err(_) => {
                // Keep order: the full batch goes back in front.
                let mut buffer = self.buffer.lock();
                let newer = std::mem::replace(&mut *buffer, batch);
                buffer.extend(newer);
            }
        }
    }

    async fn export_pending(&self) -> bool {
        let batch = self.take_buffer();
        if batch.is_empty() {
            return true;
        }
        export_with_retry(
            Arc::clone(&self.exporter),
            batch,
            self.config.max_retries,
            Arc::clone(&self.metrics),
        )
        .await
    }

    /// Export everything buffered, wait for in-flight batches, then flush
    /// the exporter.
    ///
    /// Returns `false` if any export failed or the timeout elapsed.
    pub async fn force_flush(&self, timeout: Duration) -> bool {
        let work = async {
            let mut ok = self.await_in_flight().await;
            ok &= self.export_pending().await;
            ok &= self.await_in_flight().await;

            self.exporter.flush().await && ok
        };

        match tokio::time::timeout(timeout, work).await {
            Ok(ok) => ok,
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "Span flush timed out");
                false
            }
        }
    }

    /// Wait for every spawned export, including ones started while
    /// waiting.
    async fn await_in_flight(&self) -> bool {
        let mut ok = true;
        loop {
            let handles = std::mem::take(&mut *self.in_flight.lock());
            if handles.is_empty() {
                return ok;
            }
            for handle in handles {
                ok &= handle.await.unwrap_or(false);
            }
        }
    }

    /// Stop the interval task, flush, and shut the exporter down.
    ///
    /// Only the first call does anything; later calls return `true`.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return true;
        }

        // Interval exports run as tracked tasks; only the ticker stops here.
        let ticker = self.ticker.lock().take();
        if let Some(ticker) = ticker {
            ticker.abort();
            let _ = ticker.await;
        }

        let flushed = self.force_flush(timeout).await;
        self.exporter.shutdown().await;
        debug!(flushed, "Span processor shut down");
        flushed
    }
}

impl SpanProcessor for BatchSpanProcessor {
    fn on_end(&self, span: FinishedSpan) {
        if self.is_shut_down() {
            debug!(span = %span.name, "Discarding span ended after shutdown");
            return;
        }

        let full = {
            let mut buffer = self.buffer.lock();
            buffer.push(span);
            if buffer.len() >= self.config.batch_size {
                Some(std::mem::take(&mut *buffer))
            } else {
                None
            }
        };

        if let Some(batch) = full {
            self.spawn_export(batch);
        }
    }
}

impl Drop for BatchSpanProcessor {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.get_mut().take() {
            ticker.abort();
        }
    }
}

/// Export one batch, retrying retryable failures with backoff.
async fn export_with_retry(
    exporter: Arc<dyn SpanExporter>,
    batch: Vec<FinishedSpan>,
    max_retries: u32,
    metrics: Arc<PipelineMetrics>,
) -> bool {
    let size = batch.len();
    let mut attempt = 0u32;

    loop {
        let started = Instant::now();
        match exporter.export(batch.clone()).await {
            Ok(()) => {
                metrics.record_export(size, started.elapsed());
                debug!(spans = size, attempt, "Exported span batch");
                return true;
            }
            Err(err) if err.is_retryable() && attempt < max_retries => {
                let delay = backoff_delay(attempt);
                warn!(
                    attempt = attempt + 1,
                    max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Span export failed, retrying"
                );
                metrics.record_retry();
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                error!(
                    spans = size,
                    attempts = attempt + 1,
                    error = %err,
                    "Dropping span batch"
                );
                metrics.record_dropped(size);
                return false;
            }
        }
    }
}
