// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Instrumentation points.
//!
//! An [`Instrumentation`] hooks one provider library into the tracer and
//! hands back a closure that undoes the hook. The registry keeps those
//! closures so everything can be unhooked by name or all at once.
//!
//! Registering and unregistering are startup/shutdown operations. They
//! are not meant to race with calls that are already instrumented.

mod provider;

pub use provider::InstrumentedProvider;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::InstrumentError;

/// Undoes one registration.
pub type Unregister = Box<dyn FnOnce() + Send>;

/// A pluggable hook for one provider library.
pub trait Instrumentation: Send + Sync {
    /// Unique name, used as the registry key.
    fn name(&self) -> &str;

    /// Install the hook.
    fn register(&self) -> Result<Unregister, InstrumentError>;
}

/// Active registrations, in registration order.
#[derive(Default)]
pub struct InstrumentationRegistry {
    active: Mutex<Vec<(String, Unregister)>>,
}

impl InstrumentationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `point` unless one with the same name is active.
    pub fn instrument(&self, point: &dyn Instrumentation) -> Result<(), InstrumentError> {
        let name = point.name().to_string();
        if self.is_instrumented(&name) {
            return Err(InstrumentError::AlreadyRegistered(name));
        }

        let unregister = point.register()?;
        self.active.lock().push((name.clone(), unregister));
        debug!(instrumentation = %name, "Instrumentation registered");
        Ok(())
    }

    /// Undo one registration. Returns `false` if `name` was not active.
    pub fn uninstrument(&self, name: &str) -> bool {
        let removed = {
            let mut active = self.active.lock();
            active
                .iter()
                .position(|(n, _)| n == name)
                .map(|idx| active.remove(idx))
        };

        match removed {
            Some((_, unregister)) => {
                unregister();
                debug!(instrumentation = %name, "Instrumentation removed");
                true
            }
            None => false,
        }
    }

    /// Undo every registration, newest first. Returns how many were removed.
    pub fn uninstrument_all(&self) -> usize {
        let drained = std::mem::take(&mut *self.active.lock());
        let count = drained.len();
        for (_, unregister) in drained.into_iter().rev() {
            unregister();
        }
        count
    }

    pub fn is_instrumented(&self, name: &str) -> bool {
        self.active.lock().iter().any(|(n, _)| n == name)
    }

    /// Names of active registrations, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.active.lock().iter().map(|(n, _)| n.clone()).collect()
    }
}

static INSTRUMENTATIONS: Lazy<InstrumentationRegistry> = Lazy::new(InstrumentationRegistry::new);

/// Register an instrumentation point globally.
///
/// Failures are logged and reported as `false`; they never propagate.
pub fn instrument(point: &dyn Instrumentation) -> bool {
    match INSTRUMENTATIONS.instrument(point) {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "Instrumentation not registered");
            false
        }
    }
}

pub fn uninstrument(name: &str) -> bool {
    INSTRUMENTATIONS.uninstrument(name)
}

pub fn uninstrument_all() -> usize {
    INSTRUMENTATIONS.uninstrument_all()
}

pub fn is_instrumented(name: &str) -> bool {
    INSTRUMENTATIONS.is_instrumented(name)
}
