//! Error types for crimelog-store.

use std::path::PathBuf;

use crimelog_types::ValidationError;

/// Result type for crimelog-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in crimelog-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The database was written by a newer schema than this build knows.
    #[error("Unsupported schema version {found} (newest supported is {supported})")]
    UnsupportedSchema { found: i32, supported: i32 },

    /// No record with this id.
    #[error("Record not found: {0}")]
    NotFound(i64),

    /// Record fields were rejected; nothing was written.
    #[error("Invalid record: {0}")]
    Validation(#[from] ValidationError),
}

impl Error {
    /// True for [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
