// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Process-wide client lifecycle: init, flush, shutdown.
//!
//! One [`Client`] lives in a registry for the life of the process, or
//! until [`shutdown`]. `init` is first-caller-wins. `shutdown` is safe to
//! call from many tasks at once: the first call creates a shared teardown
//! future and every caller awaits that same future.
//!
//! # Example
//!
//! ```rust,ignore
//! use agenttrace::{client, config::TraceConfig};
//!
//! client::init(TraceConfig::new(api_key, "support-bot"))?;
//! // ... instrumented work ...
//! client::shutdown().await;
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{resolve_config, ResolvedConfig, TraceConfig};
use crate::error::ConfigError;
use crate::export::{BatchConfig, BatchSpanProcessor, LogExporter, SpanExporter};
use crate::telemetry::{rearm_not_initialized_warning, PipelineMetrics, Tracer};

/// Exit status used after an interrupt-triggered shutdown.
pub const INTERRUPT_EXIT_CODE: i32 = 130;

const DEBUG_UNSET: u8 = 0;
const DEBUG_OFF: u8 = 1;
const DEBUG_ON: u8 = 2;

static DEBUG_OVERRIDE: AtomicU8 = AtomicU8::new(DEBUG_UNSET);

type Teardown = Shared<BoxFuture<'static, ()>>;

struct Registry {
    client: RwLock<Option<Arc<Client>>>,
    teardown: Mutex<Option<Teardown>>,
    exit_hook: Mutex<Option<JoinHandle<()>>>,
}

static REGISTRY: Lazy<Registry> = Lazy::new(|| Registry {
    client: RwLock::new(None),
    teardown: Mutex::new(None),
    exit_hook: Mutex::new(None),
});

/// The configured tracer pipeline.
pub struct Client {
    config: Arc<ResolvedConfig>,
    tracer: Arc<Tracer>,
    processor: Arc<BatchSpanProcessor>,
    metrics: Arc<PipelineMetrics>,
}

impl Client {
    /// Build a pipeline outside the global registry.
    pub fn new(config: ResolvedConfig, exporter: Arc<dyn SpanExporter>) -> Arc<Self> {
        let config = Arc::new(config);
        let metrics = Arc::new(PipelineMetrics::new());
        let processor =
            BatchSpanProcessor::new(exporter, BatchConfig::from(config.as_ref()), metrics.clone());
        let tracer = Tracer::new(config.clone(), processor.clone(), metrics.clone());

        Arc::new(Self {
            config,
            tracer,
            processor,
            metrics,
        })
    }

    pub fn config(&self) -> &Arc<ResolvedConfig> {
        &self.config
    }

    pub fn tracer(&self) -> &Arc<Tracer> {
        &self.tracer
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    /// Drain pending spans through the exporter.
    pub async fn flush(&self, timeout: Duration) -> bool {
        self.processor.force_flush(timeout).await
    }

    async fn close(&self) -> bool {
        self.processor.shutdown(self.config.shutdown_timeout).await
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("pending", &self.processor.pending())
            .finish()
    }
}

/// Initialize the global client with the default log exporter.
pub fn init(config: TraceConfig) -> Result<Arc<Client>, ConfigError> {
    init_with_exporter(config, Arc::new(LogExporter::new()))
}

/// Initialize the global client with a specific exporter.
///
/// If a client already exists it is returned unchanged, the arguments
/// are ignored, and a warning is logged. Configuration errors are only
/// reported on the call that would create the client.
pub fn init_with_exporter(
    config: TraceConfig,
    exporter: Arc<dyn SpanExporter>,
) -> Result<Arc<Client>, ConfigError> {
    let mut slot = REGISTRY.client.write();
    if let Some(existing) = slot.as_ref() {
        warn!("agenttrace already initialized; returning the existing client");
        return Ok(Arc::clone(existing));
    }

    let resolved = resolve_config(config)?;
    let handle_signals = resolved.handle_signals;
    let client = Client::new(resolved, exporter);
    *slot = Some(Arc::clone(&client));
    drop(slot);

    rearm_not_initialized_warning();
    if handle_signals {
        register_exit_hook();
    }

    info!(
        agent_id = client.config.agent_id.as_deref().unwrap_or("-"),
        batch_size = client.config.batch_size,
        include_content = client.config.include_content,
        "agenttrace initialized"
    );
    Ok(client)
}

/// The current client, if initialized.
pub fn current() -> Option<Arc<Client>> {
    REGISTRY.client.read().clone()
}

pub fn is_initialized() -> bool {
    REGISTRY.client.read().is_some()
}

/// Configuration of the current client.
pub fn get_config() -> Option<Arc<ResolvedConfig>> {
    REGISTRY.client.read().as_ref().map(|c| Arc::clone(&c.config))
}

pub(crate) fn current_tracer() -> Option<Arc<Tracer>> {
    REGISTRY.client.read().as_ref().map(|c| Arc::clone(&c.tracer))
}

/// Drain pending spans. Returns `false` when uninitialized, when an
/// export fails, or when the timeout elapses.
pub async fn flush(timeout_ms: u64) -> bool {
    let Some(client) = current() else {
        warn!("flush called before agenttrace was initialized");
        return false;
    };
    client.flush(Duration::from_millis(timeout_ms)).await
}

/// Tear down the global client.
///
/// Concurrent callers share one teardown and all return once it is done.
/// Afterwards `init` creates a fresh client.
pub async fn shutdown() {
    let teardown = {
        let mut slot = REGISTRY.teardown.lock();
        match slot.as_ref() {
            Some(in_flight) => in_flight.clone(),
            None => {
                let fresh = teardown().boxed().shared();
                *slot = Some(fresh.clone());
                fresh
            }
        }
    };
    teardown.await;
}

async fn teardown() {
    remove_exit_hook();

    let client = current();
    if let Some(client) = client {
        if !client.close().await {
            warn!("Some spans could not be exported before shutdown");
        }
    }

    *REGISTRY.client.write() = None;
    DEBUG_OVERRIDE.store(DEBUG_UNSET, Ordering::Release);
    REGISTRY.teardown.lock().take();
    debug!("agenttrace shut down");
}

fn register_exit_hook() {
    let mut hook = REGISTRY.exit_hook.lock();
    if hook.as_ref().is_some_and(|h| !h.is_finished()) {
        return;
    }

    let runtime = match Handle::try_current() {
        Ok(runtime) => runtime,
        Err(_) => {
            debug!("No tokio runtime; interrupt hook not registered");
            return;
        }
    };

    *hook = Some(runtime.spawn(async {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        // Leave the slot first so teardown does not abort this task.
        REGISTRY.exit_hook.lock().take();
        warn!("Interrupted; flushing spans before exit");
        shutdown().await;
        std::process::exit(INTERRUPT_EXIT_CODE);
    }));
}

fn remove_exit_hook() {
    if let Some(hook) = REGISTRY.exit_hook.lock().take() {
        hook.abort();
    }
}

/// Whether the interrupt hook is currently registered.
pub fn has_exit_hook() -> bool {
    REGISTRY
        .exit_hook
        .lock()
        .as_ref()
        .is_some_and(|h| !h.is_finished())
}

/// Override the configured debug flag until the next shutdown.
pub fn set_debug_mode(enabled: bool) {
    let value = if enabled { DEBUG_ON } else { DEBUG_OFF };
    DEBUG_OVERRIDE.store(value, Ordering::Release);
}

/// Whether finished spans are echoed to the log.
pub fn debug_enabled() -> bool {
    match DEBUG_OVERRIDE.load(Ordering::Acquire) {
        DEBUG_ON => true,
        DEBUG_OFF => false,
        _ => get_config().is_some_and(|c| c.debug),
    }
}

/// Drop all global state without flushing. For test isolation.
#[doc(hidden)]
pub fn reset_registry() {
    remove_exit_hook();
    REGISTRY.client.write().take();
    REGISTRY.teardown.lock().take();
    DEBUG_OVERRIDE.store(DEBUG_UNSET, Ordering::Release);
    rearm_not_initialized_warning();
}
