//! Persisted settings, including the bound data-source path.

use std::path::{Path, PathBuf};

use rusqlite::OptionalExtension;
use time::OffsetDateTime;
use tracing::info;

use crate::error::Result;
use crate::store::Store;

/// Settings key holding the bound workbook path.
pub const DATA_SOURCE_KEY: &str = "data_source_path";

impl Store {
    /// Read a setting.
    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM settings WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Write a setting, replacing any previous value.
    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
            rusqlite::params![key, value, OffsetDateTime::now_utc().unix_timestamp()],
        )?;
        Ok(())
    }

    /// Remove a setting. Returns whether it existed.
    pub fn delete_setting(&self, key: &str) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM settings WHERE key = ?", [key])?;
        Ok(affected > 0)
    }

    /// The bound data-source path, if any.
    pub fn data_source(&self) -> Result<Option<PathBuf>> {
        Ok(self.get_setting(DATA_SOURCE_KEY)?.map(PathBuf::from))
    }

    /// Persist the bound data-source path.
    pub fn set_data_source(&self, path: &Path) -> Result<()> {
        self.set_setting(DATA_SOURCE_KEY, &path.to_string_lossy())?;
        info!("Data source set to {}", path.display());
        Ok(())
    }

    /// Forget the bound data-source path.
    pub fn clear_data_source(&self) -> Result<()> {
        if self.delete_setting(DATA_SOURCE_KEY)? {
            info!("Data source cleared");
        }
        Ok(())
    }
}
