// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Exporter that writes spans to the log.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::ExportError;
use crate::telemetry::FinishedSpan;

use super::SpanExporter;

/// Emits each finished span as one `info` event under `agenttrace::export`.
///
/// The default exporter when none is supplied to `init`.
#[derive(Debug, Clone, Default)]
pub struct LogExporter {
    /// Include the full attribute map as JSON.
    pub verbose: bool,
}

impl LogExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verbose() -> Self {
        Self { verbose: true }
    }
}

#[async_trait]
impl SpanExporter for LogExporter {
    async fn export(&self, batch: Vec<FinishedSpan>) -> Result<(), ExportError> {
        for span in &batch {
            let attributes = if self.verbose {
                serde_json::to_string(&span.attributes)
                    .map_err(|e| ExportError::Rejected(e.to_string()))?
            } else {
                String::new()
            };

            info!(
                target: "agenttrace::export",
                name = %span.name,
                trace_id = %span.trace_id,
                span_id = %span.span_id,
                parent = ?span.parent_span_id.map(|id| id.to_string()),
                status = ?span.status,
                duration_ms = span.duration_ms,
                attributes = %attributes,
                "span"
            );
        }
        debug!(spans = batch.len(), "Logged span batch");
        Ok(())
    }
}
