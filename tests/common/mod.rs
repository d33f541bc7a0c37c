// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Shared helpers for integration tests.
//!
//! The client registry is process-wide, so every test that touches it
//! holds the serial lock for its whole body.

#![allow(dead_code)]

use std::sync::Arc;

use agenttrace::client::{init_with_exporter, reset_registry, Client};
use agenttrace::config::TraceConfig;
use agenttrace::export::InMemoryExporter;
use once_cell::sync::Lazy;
use tokio::sync::{Mutex, MutexGuard};

static SERIAL: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Take the serial lock and start from an empty registry.
pub async fn serial() -> MutexGuard<'static, ()> {
    let guard = SERIAL.lock().await;
    reset_registry();
    guard
}

/// Config with a long flush interval and no signal hook.
pub fn test_config() -> TraceConfig {
    TraceConfig::new("test-key-0000", "test-agent")
        .with_handle_signals(false)
        .with_flush_interval_ms(60_000)
}

/// Initialize the global client with an in-memory exporter.
pub fn init_memory(config: TraceConfig) -> (Arc<Client>, InMemoryExporter) {
    let exporter = InMemoryExporter::new();
    let client = init_with_exporter(config, Arc::new(exporter.clone())).unwrap();
    (client, exporter)
}
