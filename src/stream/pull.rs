// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Pull-style adapter over `futures::Stream`.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;

use super::aggregator::{ChunkFields, StreamAggregator};

/// A stream that yields exactly what its source yields while feeding
/// every item to a [`StreamAggregator`].
///
/// Source errors are recorded on the span and passed through unchanged.
/// Dropping the stream before it ends finalizes the span as incomplete.
pub struct InstrumentedStream<S, X> {
    source: Pin<Box<S>>,
    extract: X,
    aggregator: StreamAggregator,
    done: bool,
}

impl<S, X> InstrumentedStream<S, X> {
    /// Wrap `source`, reporting into an existing aggregator.
    pub fn new(source: S, aggregator: StreamAggregator, extract: X) -> Self {
        Self {
            source: Box::pin(source),
            extract,
            aggregator,
            done: false,
        }
    }

    pub fn aggregator(&self) -> &StreamAggregator {
        &self.aggregator
    }
}

impl<S, X, T, E> Stream for InstrumentedStream<S, X>
where
    S: Stream<Item = Result<T, E>>,
    X: FnMut(&T) -> ChunkFields + Unpin,
    E: fmt::Display,
{
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        match this.source.as_mut().poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(item))) => {
                this.aggregator.record((this.extract)(&item));
                Poll::Ready(Some(Ok(item)))
            }
            Poll::Ready(Some(Err(err))) => {
                this.aggregator.fail(&err);
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                this.done = true;
                this.aggregator.complete();
                Poll::Ready(None)
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            (0, Some(0))
        } else {
            self.source.size_hint()
        }
    }
}

impl<S, X> Drop for InstrumentedStream<S, X> {
    fn drop(&mut self) {
        if !self.done {
            self.aggregator.cancel();
        }
    }
}
