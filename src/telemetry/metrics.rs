// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Pipeline counters for the span lifecycle and export path.
//!
//! Plain atomics, no external metrics stack. One instance lives per client
//! and is shared by the tracer and the batch processor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Counters for spans flowing through one client.
#[derive(Debug)]
pub struct PipelineMetrics {
    spans_started: AtomicU64,
    spans_ended: AtomicU64,
    spans_exported: AtomicU64,
    spans_dropped: AtomicU64,
    export_batches: AtomicU64,
    export_retries: AtomicU64,
    export_failures: AtomicU64,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
    export_latency: Mutex<Histogram>,
    start_time: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            spans_started: AtomicU64::new(0),
            spans_ended: AtomicU64::new(0),
            spans_exported: AtomicU64::new(0),
            spans_dropped: AtomicU64::new(0),
            export_batches: AtomicU64::new(0),
            export_retries: AtomicU64::new(0),
            export_failures: AtomicU64::new(0),
            input_tokens: AtomicU64::new(0),
            output_tokens: AtomicU64::new(0),
            export_latency: Mutex::new(Histogram::default()),
            start_time: Instant::now(),
        }
    }

    pub(crate) fn record_started(&self) {
        self.spans_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_ended(&self) {
        self.spans_ended.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_tokens(&self, input: u64, output: u64) {
        self.input_tokens.fetch_add(input, Ordering::Relaxed);
        self.output_tokens.fetch_add(output, Ordering::Relaxed);
    }

    /// Record one successful batch export.
    pub(crate) fn record_export(&self, spans: usize, latency: Duration) {
        self.export_batches.fetch_add(1, Ordering::Relaxed);
        self.spans_exported.fetch_add(spans as u64, Ordering::Relaxed);
        self.export_latency.lock().record(latency);
    }

    pub(crate) fn record_retry(&self) {
        self.export_retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a batch that was given up on.
    pub(crate) fn record_dropped(&self, spans: usize) {
        self.export_failures.fetch_add(1, Ordering::Relaxed);
        self.spans_dropped.fetch_add(spans as u64, Ordering::Relaxed);
    }

    /// Take a snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let latency = self.export_latency.lock();
        MetricsSnapshot {
            spans_started: self.spans_started.load(Ordering::Relaxed),
            spans_ended: self.spans_ended.load(Ordering::Relaxed),
            spans_exported: self.spans_exported.load(Ordering::Relaxed),
            spans_dropped: self.spans_dropped.load(Ordering::Relaxed),
            export_batches: self.export_batches.load(Ordering::Relaxed),
            export_retries: self.export_retries.load(Ordering::Relaxed),
            export_failures: self.export_failures.load(Ordering::Relaxed),
            input_tokens: self.input_tokens.load(Ordering::Relaxed),
            output_tokens: self.output_tokens.load(Ordering::Relaxed),
            export_p50: latency.percentile(50.0),
            export_p99: latency.percentile(99.0),
            uptime: self.start_time.elapsed(),
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-bucket latency histogram.
#[derive(Debug, Clone)]
pub struct Histogram {
    /// Upper bounds in microseconds.
    buckets: Vec<u64>,
    counts: Vec<u64>,
}

impl Histogram {
    /// Create a histogram with custom bucket bounds (in microseconds).
    pub fn with_buckets(buckets: Vec<u64>) -> Self {
        let counts = vec![0; buckets.len() + 1];
        Self { buckets, counts }
    }

    pub fn record(&mut self, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        let idx = self
            .buckets
            .iter()
            .position(|&b| micros <= b)
            .unwrap_or(self.buckets.len());
        self.counts[idx] += 1;
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Approximate percentile, reported as the bucket's upper bound.
    pub fn percentile(&self, p: f64) -> Duration {
        let total = self.total();
        if total == 0 {
            return Duration::ZERO;
        }

        let target = (total as f64 * p / 100.0).ceil() as u64;
        let mut cumulative = 0u64;
        for (i, &count) in self.counts.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                let micros = match self.buckets.get(i) {
                    Some(&bound) => bound,
                    // overflow bucket
                    None => self.buckets.last().copied().unwrap_or(0) * 10,
                };
                return Duration::from_micros(micros);
            }
        }
        Duration::ZERO
    }
}

impl Default for Histogram {
    fn default() -> Self {
        // 1ms, 10ms, 100ms, 1s, 10s
        Self::with_buckets(vec![1_000, 10_000, 100_000, 1_000_000, 10_000_000])
    }
}

/// Point-in-time copy of the pipeline counters.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub spans_started: u64,
    pub spans_ended: u64,
    pub spans_exported: u64,
    pub spans_dropped: u64,
    pub export_batches: u64,
    pub export_retries: u64,
    pub export_failures: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub export_p50: Duration,
    pub export_p99: Duration,
    pub uptime: Duration,
}

impl MetricsSnapshot {
    /// Spans ended but neither exported nor dropped yet.
    pub fn pending(&self) -> u64 {
        self.spans_ended
            .saturating_sub(self.spans_exported)
            .saturating_sub(self.spans_dropped)
    }

    /// Format as a human-readable report.
    pub fn format_report(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Pipeline Report ===\n\n");
        report.push_str(&format!("Uptime: {:.2?}\n", self.uptime));
        report.push_str(&format!(
            "Spans: {} started, {} ended, {} exported, {} dropped\n",
            self.spans_started, self.spans_ended, self.spans_exported, self.spans_dropped
        ));
        report.push_str(&format!(
            "Exports: {} batches, {} retries, {} failures\n",
            self.export_batches, self.export_retries, self.export_failures
        ));
        if self.export_batches > 0 {
            report.push_str(&format!(
                "Export latency: p50={:.2?} p99={:.2?}\n",
                self.export_p50, self.export_p99
            ));
        }
        report.push_str(&format!(
            "Tokens: {} input, {} output\n",
            self.input_tokens, self.output_tokens
        ));

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = PipelineMetrics::new();
        metrics.record_started();
        metrics.record_started();
        metrics.record_ended();
        metrics.record_ended();
        metrics.record_export(1, Duration::from_millis(5));
        metrics.record_retry();
        metrics.record_tokens(100, 20);

        let snap = metrics.snapshot();
        assert_eq!(snap.spans_started, 2);
        assert_eq!(snap.spans_ended, 2);
        assert_eq!(snap.spans_exported, 1);
        assert_eq!(snap.export_retries, 1);
        assert_eq!(snap.input_tokens, 100);
        assert_eq!(snap.output_tokens, 20);
        assert_eq!(snap.pending(), 1);
    }

    #[test]
    fn test_dropped_counts_failures() {
        let metrics = PipelineMetrics::new();
        metrics.record_dropped(4);
        let snap = metrics.snapshot();
        assert_eq!(snap.spans_dropped, 4);
        assert_eq!(snap.export_failures, 1);
    }

    #[test]
    fn test_histogram_percentile() {
        let mut hist = Histogram::default();
        for _ in 0..9 {
            hist.record(Duration::from_micros(500));
        }
        hist.record(Duration::from_millis(50));

        assert_eq!(hist.total(), 10);
        assert_eq!(hist.percentile(50.0), Duration::from_millis(1));
        assert_eq!(hist.percentile(99.0), Duration::from_millis(100));
        assert_eq!(Histogram::default().percentile(50.0), Duration::ZERO);
    }

    #[test]
    fn test_format_report() {
        let metrics = PipelineMetrics::new();
        metrics.record_export(3, Duration::from_millis(2));
        let report = metrics.snapshot().format_report();
        assert!(report.contains("Pipeline Report"));
        assert!(report.contains("3 exported"));
        assert!(report.contains("Export latency"));
    }
}
