// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Trace and span identifiers.

use std::fmt;
use uuid::Uuid;

/// A 128-bit identifier shared by every span in one trace.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId(Uuid);

impl TraceId {
    /// Generate a new random trace ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a trace ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Get a short representation (first 8 hex characters).
    pub fn short(&self) -> String {
        self.to_string()[..8].to_string()
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl fmt::Debug for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TraceId({})", self.short())
    }
}

impl From<Uuid> for TraceId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl serde::Serialize for TraceId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for TraceId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Uuid::parse_str(&s)
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}

/// A 64-bit identifier for one span.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanId(u64);

impl SpanId {
    /// Generate a new random, non-zero span ID.
    pub fn new() -> Self {
        loop {
            let (high, low) = Uuid::new_v4().as_u64_pair();
            let id = high ^ low;
            if id != 0 {
                return Self(id);
            }
        }
    }

    /// Create a span ID from a raw value.
    pub fn from_u64(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for SpanId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::Debug for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpanId({})", self)
    }
}

impl serde::Serialize for SpanId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for SpanId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        u64::from_str_radix(&s, 16)
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}

/// The identity of a span within its trace, used for parenting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanContext {
    pub trace_id: TraceId,
    pub span_id: SpanId,
}

impl SpanContext {
    /// Context for a new root span.
    pub fn new_root() -> Self {
        Self {
            trace_id: TraceId::new(),
            span_id: SpanId::new(),
        }
    }

    /// Context for a new child of this span.
    pub fn new_child(&self) -> Self {
        Self {
            trace_id: self.trace_id,
            span_id: SpanId::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_id_unique() {
        assert_ne!(TraceId::new(), TraceId::new());
    }

    #[test]
    fn test_trace_id_display_is_hex() {
        let uuid = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        let id = TraceId::from_uuid(uuid);
        assert_eq!(id.to_string(), "550e8400e29b41d4a716446655440000");
        assert_eq!(id.short(), "550e8400");
    }

    #[test]
    fn test_span_id_display() {
        let id = SpanId::from_u64(0xab);
        assert_eq!(id.to_string(), "00000000000000ab");
        assert!(format!("{:?}", id).starts_with("SpanId("));
    }

    #[test]
    fn test_ids_serde() {
        let trace = TraceId::new();
        let json = serde_json::to_string(&trace).unwrap();
        let parsed: TraceId = serde_json::from_str(&json).unwrap();
        assert_eq!(trace, parsed);

        let span = SpanId::new();
        let json = serde_json::to_string(&span).unwrap();
        let parsed: SpanId = serde_json::from_str(&json).unwrap();
        assert_eq!(span, parsed);
    }

    #[test]
    fn test_child_shares_trace() {
        let root = SpanContext::new_root();
        let child = root.new_child();
        assert_eq!(root.trace_id, child.trace_id);
        assert_ne!(root.span_id, child.span_id);
    }
}
