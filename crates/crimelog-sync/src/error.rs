//! Error types for crimelog-sync.

use std::path::PathBuf;

/// Result type for crimelog-sync operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while reading a workbook. The store is left unchanged.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// The workbook does not exist.
    #[error("Workbook not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The file extension is not a supported workbook format.
    #[error("Unsupported workbook format: {0}")]
    UnsupportedFormat(String),

    /// The spreadsheet could not be opened or parsed.
    #[error("Failed to read workbook: {0}")]
    Read(String),

    /// The workbook contains no sheets.
    #[error("Workbook has no sheets")]
    NoSheets,

    /// The header row has no recognized column label.
    #[error("No recognized columns in header row")]
    NoRecognizedColumns,

    /// CSV parse error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Replacing the store contents failed.
    #[error("Store error: {0}")]
    Store(#[from] crimelog_store::Error),

    /// The blocking parse task panicked or was cancelled.
    #[error("Import task failed: {0}")]
    Task(String),
}

/// Errors raised while writing a workbook. The store stays authoritative.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The file extension is not a writable format.
    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),

    /// The spreadsheet writer failed.
    #[error("Failed to write workbook: {0}")]
    Write(String),

    /// CSV write error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Reading the store failed.
    #[error("Store error: {0}")]
    Store(#[from] crimelog_store::Error),

    /// The blocking write task panicked or was cancelled.
    #[error("Export task failed: {0}")]
    Task(String),
}

/// Errors from the file watcher. These are logged, never fatal.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The underlying notify watcher failed.
    #[error("Watch error: {0}")]
    Notify(#[from] notify::Error),

    /// The path has no file name or parent directory to watch.
    #[error("Cannot watch path: {}", .0.display())]
    InvalidPath(PathBuf),
}

/// Top-level error for engine operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] crimelog_store::Error),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Watch(#[from] WatchError),
}

impl Error {
    /// True when the error is a missing record.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Store(e) if e.is_not_found())
    }

    /// True when the error is a rejected record.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Store(crimelog_store::Error::Validation(_)))
    }
}
