// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::sync::atomic::{AtomicBool, Ordering};

/// One-shot flag deciding which completion path finalizes a stream.
///
/// Claiming is a single compare-and-swap, so a completion path that
/// re-enters another one (an `end` listener that triggers `error`, say)
/// still cannot finalize twice.
#[derive(Debug, Default)]
pub struct FinalizeGuard(AtomicBool);

impl FinalizeGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the right to finalize. Only the first caller gets `true`.
    pub fn try_claim(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_claimed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
