//! Sync daemon and command-line tools for crime-log datasets.
//!
//! The `crimelog-service` binary runs a [`crimelog_sync::SyncEngine`] in the
//! foreground, or performs one-shot imports, exports and status checks.
//!
//! # Configuration
//!
//! Read from `~/.config/crimelog/service.toml`:
//!
//! ```toml
//! [storage]
//! path = "~/.local/share/crimelog/data.db"
//!
//! [source]
//! path = "/srv/shared/crime.xlsx"
//!
//! [sync]
//! debounce_ms = 500
//! guard_quiet_ms = 2000
//! stability_ms = 1000
//! poll_interval_ms = 300
//! keepalive_secs = 30
//! ```

pub mod config;
pub mod report;

pub use config::{Config, ConfigError, SourceConfig, StorageConfig, ValidationError};
pub use report::StatusReport;
