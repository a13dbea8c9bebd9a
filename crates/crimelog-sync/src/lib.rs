//! Synchronization engine for crime-log datasets.
//!
//! Keeps a spreadsheet workbook and the SQLite record store consistent under
//! edits from both sides, and tells subscribers when the dataset changes.
//!
//! # Components
//!
//! - [`import`] / [`export`]: workbook parsing and writing (calamine, umya-spreadsheet, csv)
//! - [`LoopGuard`]: keeps the engine's own write-backs from being re-imported
//! - [`ChangeWatcher`]: debounced re-import on external edits
//! - [`Broadcaster`]: fan-out of [`DatasetEvent`]s with a summary cache
//! - [`DataSourceRegistry`]: the persisted bound path and its [`DataSourceStatus`]
//! - [`SyncEngine`]: ties it all together
//!
//! # Example
//!
//! ```no_run
//! use crimelog_store::Store;
//! use crimelog_sync::{SyncEngine, SyncSettings};
//! use crimelog_types::NewRecord;
//!
//! # async fn run() -> crimelog_sync::Result<()> {
//! let engine = SyncEngine::new(Store::open_default()?, SyncSettings::default());
//! engine.restore().await?;
//!
//! // Written to the store, then back to the bound workbook
//! engine
//!     .insert(&NewRecord::new(2024, 5, "Central", "Theft", 1, 0))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod broadcast;
pub mod cache;
pub mod engine;
pub mod error;
pub mod export;
pub mod guard;
pub mod import;
pub mod registry;
pub mod settings;
pub mod source;
pub mod watcher;
pub mod workbook;

pub use broadcast::{
    Broadcaster, DatasetEvent, MAX_MISSED_EVENTS, Subscription, SubscriptionId,
};
pub use cache::SummaryCache;
pub use engine::{EngineStatus, SyncEngine, WriteBackStatus};
pub use error::{Error, ExportError, ImportError, Result, WatchError};
pub use export::{SHEET_NAME, export_from, write_workbook};
pub use guard::{GuardLease, LoopGuard};
pub use import::{WorkbookFormat, import_into, read_workbook};
pub use registry::{DataSourceRegistry, DataSourceStatus};
pub use settings::SyncSettings;
pub use source::{FileEventSource, FileSignal, Stability};
pub use watcher::{ChangeHandler, ChangeWatcher, WatchTiming, WatcherState};
pub use workbook::{CellValue, Column, MAX_IMPORTED_COUNT};
