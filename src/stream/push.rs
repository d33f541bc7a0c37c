// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Push-style adapter over a named-event emitter.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::aggregator::{ChunkFields, StreamAggregator};

/// One event delivered by an [`EventEmitter`].
#[derive(Debug, Clone, PartialEq)]
pub enum Emission<T, E> {
    Data(T),
    End,
    Error(E),
}

type Listener<T, E> = Arc<dyn Fn(&Emission<T, E>) + Send + Sync>;

/// Minimal emitter with listeners keyed by event name.
///
/// Listeners run synchronously, in registration order, on the emitting
/// thread.
pub struct EventEmitter<T, E> {
    listeners: Mutex<HashMap<String, Vec<Listener<T, E>>>>,
}

impl<T, E> EventEmitter<T, E> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
        }
    }

    /// Register a listener for `event`.
    pub fn on<L>(&self, event: &str, listener: L)
    where
        L: Fn(&Emission<T, E>) + Send + Sync + 'static,
    {
        self.listeners
            .lock()
            .entry(event.to_string())
            .or_default()
            .push(Arc::new(listener));
    }

    /// Deliver `emission` to every listener of `event`.
    ///
    /// Returns `false` if nobody was listening. Listeners may register
    /// further listeners; those see the next emission, not this one.
    pub fn emit(&self, event: &str, emission: Emission<T, E>) -> bool {
        let listeners = match self.listeners.lock().get(event) {
            Some(list) if !list.is_empty() => list.clone(),
            _ => return false,
        };
        for listener in &listeners {
            listener(&emission);
        }
        true
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.lock().get(event).map_or(0, Vec::len)
    }
}

impl<T, E> Default for EventEmitter<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for EventEmitter<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.lock();
        let mut events: Vec<_> = listeners.keys().cloned().collect();
        events.sort();
        f.debug_struct("EventEmitter").field("events", &events).finish()
    }
}

/// Names of the data, end, and error channels on an emitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventNames {
    pub data: String,
    pub end: String,
    pub error: String,
}

impl EventNames {
    pub fn new(data: impl Into<String>, end: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            end: end.into(),
            error: error.into(),
        }
    }
}

impl Default for EventNames {
    fn default() -> Self {
        Self::new("data", "end", "error")
    }
}

impl StreamAggregator {
    /// Feed an emitter's data, end, and error channels into this
    /// aggregator. Existing and later listeners are unaffected.
    pub fn attach<T, E, X>(&self, emitter: &EventEmitter<T, E>, names: &EventNames, extract: X)
    where
        T: 'static,
        E: fmt::Display + 'static,
        X: Fn(&T) -> ChunkFields + Send + Sync + 'static,
    {
        let agg = self.clone();
        emitter.on(&names.data, move |emission| {
            if let Emission::Data(item) = emission {
                agg.record(extract(item));
            }
        });

        let agg = self.clone();
        emitter.on(&names.end, move |_| agg.complete());

        let agg = self.clone();
        emitter.on(&names.error, move |emission| match emission {
            Emission::Error(err) => agg.fail(err),
            _ => agg.fail("stream emitted error"),
        });
    }
}
