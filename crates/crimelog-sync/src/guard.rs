//! Loop guard that keeps the engine's own write-backs from being re-imported.
//!
//! The guard is a lease with an expiry rather than a flag cleared by a timer.
//! [`LoopGuard::acquire`] hands out a [`GuardLease`]; while any lease is alive
//! the guard is held, and once the last lease drops it stays held for the
//! quiet period so the file watcher's delayed notification is still covered.
//! Acquiring again before the quiet period ends re-arms it.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use time::OffsetDateTime;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Default)]
struct GuardState {
    /// Live leases.
    holders: usize,
    /// When the quiet period after the last release ends.
    release_at: Option<Instant>,
    last_acquired: Option<OffsetDateTime>,
}

/// Shared, time-bounded "sync in progress" flag.
///
/// Cloning is cheap; clones share the same state.
#[derive(Debug, Clone)]
pub struct LoopGuard {
    state: Arc<Mutex<GuardState>>,
    quiet: Duration,
}

impl LoopGuard {
    /// Create a guard that stays held for `quiet` after its last release.
    pub fn new(quiet: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(GuardState::default())),
            quiet,
        }
    }

    /// Take a lease. The guard is held at least until the lease drops.
    pub fn acquire(&self) -> GuardLease {
        let mut state = self.lock();
        state.holders += 1;
        state.release_at = None;
        state.last_acquired = Some(OffsetDateTime::now_utc());
        debug!("Loop guard acquired ({} holders)", state.holders);
        GuardLease {
            guard: self.clone(),
        }
    }

    /// True while a lease is alive or the quiet period has not elapsed.
    pub fn is_held(&self) -> bool {
        let state = self.lock();
        state.holders > 0 || state.release_at.is_some_and(|at| Instant::now() < at)
    }

    /// When a lease was last taken.
    pub fn last_acquired(&self) -> Option<OffsetDateTime> {
        self.lock().last_acquired
    }

    /// Quiet period applied after the last release.
    pub fn quiet_period(&self) -> Duration {
        self.quiet
    }

    fn release(&self) {
        let mut state = self.lock();
        state.holders = state.holders.saturating_sub(1);
        if state.holders == 0 {
            state.release_at = Some(Instant::now() + self.quiet);
            debug!("Loop guard released, quiet for {:?}", self.quiet);
        }
    }

    fn lock(&self) -> MutexGuard<'_, GuardState> {
        // state stays consistent even if a holder panicked
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A held loop guard. Dropping it starts the quiet period.
#[derive(Debug)]
#[must_use = "the guard is released as soon as the lease is dropped"]
pub struct GuardLease {
    guard: LoopGuard,
}

impl Drop for GuardLease {
    fn drop(&mut self) {
        self.guard.release();
    }
}
