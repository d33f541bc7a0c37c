// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Deferred usage: a future that delivers token totals after (or apart
//! from) the stream itself.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tracing::debug;

use crate::telemetry::TokenCounts;

use super::aggregator::StreamAggregator;

/// Wraps a usage-bearing future and settles the aggregator's usage when
/// it resolves.
///
/// The wrapped future's output is returned unchanged. An error, or
/// dropping the future unresolved, settles usage as unavailable so the
/// span can still finalize.
pub struct DeferredUsage<F, X> {
    source: Pin<Box<F>>,
    extract: Option<X>,
    aggregator: StreamAggregator,
    settled: bool,
}

impl<F, X> DeferredUsage<F, X> {
    pub fn new(source: F, aggregator: StreamAggregator, extract: X) -> Self {
        Self {
            source: Box::pin(source),
            extract: Some(extract),
            aggregator,
            settled: false,
        }
    }
}

impl<F, X, T, E> Future for DeferredUsage<F, X>
where
    F: Future<Output = Result<T, E>>,
    X: FnOnce(&T) -> TokenCounts + Unpin,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let result = match this.source.as_mut().poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(result) => result,
        };

        this.settled = true;
        match (&result, this.extract.take()) {
            (Ok(value), Some(extract)) => this.aggregator.resolve_usage(extract(value)),
            _ => {
                debug!("Deferred usage unavailable");
                this.aggregator.abandon_usage();
            }
        }
        Poll::Ready(result)
    }
}

impl<F, X> Drop for DeferredUsage<F, X> {
    fn drop(&mut self) {
        if !self.settled {
            self.aggregator.abandon_usage();
        }
    }
}

/// Attach a deferred usage future to `aggregator`.
pub fn wrap_deferred_usage<F, X>(
    aggregator: &StreamAggregator,
    source: F,
    extract: X,
) -> DeferredUsage<F, X> {
    DeferredUsage::new(source, aggregator.clone(), extract)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::start_span;

    #[tokio::test]
    async fn test_resolves_usage() {
        let agg = StreamAggregator::with_deferred_usage(start_span("deferred"));
        agg.complete();

        let value = wrap_deferred_usage(&agg, async { Ok::<_, String>((12u64, 8u64)) }, |t: &(u64, u64)| {
            TokenCounts::new(t.0, t.1)
        })
        .await;

        assert_eq!(value, Ok((12, 8)));
        assert!(agg.is_finalized());
        assert_eq!(agg.usage(), TokenCounts::new(12, 8));
    }

    #[tokio::test]
    async fn test_error_abandons_usage() {
        let agg = StreamAggregator::with_deferred_usage(start_span("deferred"));
        agg.complete();

        let result = wrap_deferred_usage(&agg, async { Err::<u64, _>("no usage") }, |n: &u64| {
            TokenCounts::new(*n, 0)
        })
        .await;

        assert_eq!(result, Err("no usage"));
        assert!(agg.is_finalized());
        assert!(agg.usage().is_empty());
    }

    #[test]
    fn test_drop_abandons_usage() {
        let agg = StreamAggregator::with_deferred_usage(start_span("deferred"));
        agg.complete();

        let pending = wrap_deferred_usage(
            &agg,
            std::future::pending::<Result<u64, String>>(),
            |n: &u64| TokenCounts::new(*n, 0),
        );
        assert!(!agg.is_finalized());
        drop(pending);
        assert!(agg.is_finalized());
    }
}
