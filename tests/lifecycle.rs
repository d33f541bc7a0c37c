// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Client lifecycle: init, flush, shutdown across the global registry.

mod common;

use std::sync::Arc;
use std::time::Duration;

use agenttrace::client;
use agenttrace::error::{ConfigError, ExportError};
use agenttrace::export::InMemoryExporter;
use agenttrace::telemetry::{end_span, start_span, SpanOutcome};

use common::{init_memory, serial, test_config};

#[tokio::test]
async fn test_init_exposes_config() {
    let _lock = serial().await;
    assert!(!client::is_initialized());
    assert!(client::get_config().is_none());

    init_memory(test_config().with_batch_size(10).with_include_content(true));

    assert!(client::is_initialized());
    let config = client::get_config().unwrap();
    assert_eq!(config.agent_id.as_deref(), Some("test-agent"));
    assert_eq!(config.batch_size, 10);
    assert!(config.include_content);

    client::shutdown().await;
}

#[tokio::test]
async fn test_second_init_returns_existing_client() {
    let _lock = serial().await;
    let (first, _) = init_memory(test_config());

    let other = InMemoryExporter::new();
    let second =
        client::init_with_exporter(test_config().with_batch_size(7), Arc::new(other)).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(client::get_config().unwrap().batch_size, 100);

    client::shutdown().await;
}

#[tokio::test]
async fn test_invalid_config_leaves_uninitialized() {
    let _lock = serial().await;

    let result = client::init_with_exporter(
        test_config().with_flush_interval_ms(10),
        Arc::new(InMemoryExporter::new()),
    );
    let err = result.unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { .. }));
    assert_eq!(err.field(), Some("flushIntervalMs"));
    assert!(!client::is_initialized());
}

#[tokio::test]
async fn test_flush_before_init_returns_false() {
    let _lock = serial().await;
    assert!(!client::flush(100).await);
}

#[tokio::test]
async fn test_flush_exports_pending_spans() {
    let _lock = serial().await;
    let (client, exporter) = init_memory(test_config());

    let span = start_span("unit-of-work");
    end_span(&span, SpanOutcome::ok());
    assert!(exporter.spans().is_empty());

    assert!(client::flush(1_000).await);
    assert_eq!(exporter.spans_named("unit-of-work").len(), 1);
    assert_eq!(client.metrics().snapshot().spans_exported, 1);

    client::shutdown().await;
}

#[tokio::test]
async fn test_flush_reports_export_failure() {
    let _lock = serial().await;
    let exporter = InMemoryExporter::new().with_failure(ExportError::Rejected("bad key".into()));
    let client =
        client::init_with_exporter(test_config(), Arc::new(exporter.clone())).unwrap();

    start_span("doomed").end(SpanOutcome::ok());

    assert!(!client::flush(1_000).await);
    let snapshot = client.metrics().snapshot();
    assert_eq!(snapshot.spans_dropped, 1);
    assert_eq!(snapshot.spans_exported, 0);

    client::shutdown().await;
}

#[tokio::test]
async fn test_batch_size_triggers_export() {
    let _lock = serial().await;
    let (_, exporter) = init_memory(test_config().with_batch_size(2));

    start_span("a").end(SpanOutcome::ok());
    start_span("b").end(SpanOutcome::ok());

    for _ in 0..50 {
        if exporter.spans().len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(exporter.spans().len(), 2);

    client::shutdown().await;
}

#[tokio::test]
async fn test_shutdown_drains_and_resets() {
    let _lock = serial().await;
    let (_, exporter) = init_memory(test_config());

    start_span("last-words").end(SpanOutcome::ok());
    client::shutdown().await;

    assert_eq!(exporter.spans_named("last-words").len(), 1);
    assert_eq!(exporter.shutdown_calls(), 1);
    assert!(!client::is_initialized());
    assert!(client::get_config().is_none());

    // A fresh client can be created afterwards.
    let (_, fresh) = init_memory(test_config().with_batch_size(5));
    assert_eq!(client::get_config().unwrap().batch_size, 5);
    client::shutdown().await;
    assert_eq!(fresh.shutdown_calls(), 1);
    assert_eq!(exporter.shutdown_calls(), 1);
}

#[tokio::test]
async fn test_concurrent_shutdown_runs_once() {
    let _lock = serial().await;
    let exporter = InMemoryExporter::new().with_shutdown_delay(Duration::from_millis(100));
    client::init_with_exporter(test_config(), Arc::new(exporter.clone())).unwrap();

    let tasks: Vec<_> = (0..5).map(|_| tokio::spawn(client::shutdown())).collect();
    for task in tasks {
        task.await.unwrap();
        // Every caller returns only after the teardown finished.
        assert!(exporter.is_shutdown_complete());
    }

    assert_eq!(exporter.shutdown_calls(), 1);
    assert!(!client::is_initialized());
}

#[tokio::test]
async fn test_shutdown_without_client_is_noop() {
    let _lock = serial().await;
    client::shutdown().await;
    client::shutdown().await;
    assert!(!client::is_initialized());
}

#[tokio::test]
async fn test_spans_after_shutdown_are_not_recorded() {
    let _lock = serial().await;
    let (_, exporter) = init_memory(test_config());
    client::shutdown().await;

    let span = start_span("too-late");
    assert!(!span.is_recording());
    span.end(SpanOutcome::ok());
    assert!(exporter.spans_named("too-late").is_empty());
}

#[tokio::test]
async fn test_debug_override_cleared_by_shutdown() {
    let _lock = serial().await;
    init_memory(test_config().with_debug(false));
    assert!(!client::debug_enabled());

    client::set_debug_mode(true);
    assert!(client::debug_enabled());

    client::shutdown().await;
    init_memory(test_config().with_debug(false));
    assert!(!client::debug_enabled());
    client::shutdown().await;
}

#[tokio::test]
async fn test_signal_hook_follows_config() {
    let _lock = serial().await;
    init_memory(test_config().with_handle_signals(true));
    assert!(client::has_exit_hook());

    client::shutdown().await;
    assert!(!client::has_exit_hook());

    init_memory(test_config());
    assert!(!client::has_exit_hook());
    client::shutdown().await;
}
