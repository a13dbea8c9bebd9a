//! Timing and sizing knobs for the sync engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Engine settings. Every field has a default, so a partial TOML table works.
///
/// ```
/// use crimelog_sync::SyncSettings;
///
/// let settings = SyncSettings::default();
/// assert_eq!(settings.debounce().as_millis(), 500);
/// assert_eq!(settings.guard_quiet().as_secs(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Quiet time after the last file change before re-importing.
    pub debounce_ms: u64,
    /// How long the loop guard stays held after a write-back finishes.
    pub guard_quiet_ms: u64,
    /// Size and mtime must be unchanged this long before a change is reported.
    pub stability_ms: u64,
    /// How often size and mtime are polled while waiting for stability.
    pub poll_interval_ms: u64,
    /// Keep-alive interval for subscriptions.
    pub keepalive_secs: u64,
    /// How long a computed summary is reused.
    pub summary_ttl_secs: u64,
    /// Events buffered per subscriber before new ones are dropped.
    pub subscriber_buffer: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            guard_quiet_ms: 2000,
            stability_ms: 1000,
            poll_interval_ms: 300,
            keepalive_secs: 30,
            summary_ttl_secs: 5,
            subscriber_buffer: 16,
        }
    }
}

impl SyncSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn guard_quiet(&self) -> Duration {
        Duration::from_millis(self.guard_quiet_ms)
    }

    pub fn stability(&self) -> Duration {
        Duration::from_millis(self.stability_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Longest time the watcher may take to act on a change: the stability
    /// window, one extra poll, then the debounce. The loop guard's quiet period
    /// must exceed it.
    pub fn reaction_window(&self) -> Duration {
        self.stability() + self.poll_interval() + self.debounce()
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }

    pub fn summary_ttl(&self) -> Duration {
        Duration::from_secs(self.summary_ttl_secs)
    }
}
