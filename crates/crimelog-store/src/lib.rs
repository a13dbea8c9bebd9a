//! Local persistence for crime-log records.
//!
//! This crate provides the SQLite-backed record store used by the
//! synchronization engine.
//!
//! # Features
//!
//! - Record CRUD with field validation
//! - Filtered, paginated listings and aggregate summaries
//! - Transactional full-dataset replacement for imports
//! - Persisted settings (the bound data-source path)
//!
//! # Example
//!
//! ```no_run
//! use crimelog_store::{RecordFilter, Store};
//!
//! let store = Store::open_default()?;
//!
//! let page = store.list(&RecordFilter::new().year(2024), 1, 50)?;
//! println!("{} of {} records", page.records.len(), page.total);
//! # Ok::<(), crimelog_store::Error>(())
//! ```

mod error;
mod queries;
mod registry;
mod schema;
mod store;

pub use error::{Error, Result};
pub use queries::{MAX_PAGE_SIZE, RecordFilter, RecordPage};
pub use registry::DATA_SOURCE_KEY;
pub use store::Store;

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/crimelog/data.db`
/// - macOS: `~/Library/Application Support/crimelog/data.db`
/// - Windows: `C:\Users\<user>\AppData\Local\crimelog\data.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("crimelog")
        .join("data.db")
}
