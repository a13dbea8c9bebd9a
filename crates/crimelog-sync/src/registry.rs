//! Data-source registry: which workbook the dataset is bound to.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crimelog_store::Store;

use crate::error::Result;

/// Whether a workbook is bound and reachable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum DataSourceStatus {
    /// No workbook is bound.
    Unbound,
    /// The bound workbook exists and is a regular file.
    Healthy { path: PathBuf },
    /// A workbook is bound but cannot be read.
    Unreachable { path: PathBuf, reason: String },
}

impl DataSourceStatus {
    /// Compute the status of an optional bound path.
    pub fn probe(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return DataSourceStatus::Unbound;
        };

        match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() => DataSourceStatus::Healthy {
                path: path.to_path_buf(),
            },
            Ok(_) => DataSourceStatus::Unreachable {
                path: path.to_path_buf(),
                reason: "not a regular file".to_string(),
            },
            Err(e) => DataSourceStatus::Unreachable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
        }
    }

    /// The bound path, healthy or not.
    pub fn path(&self) -> Option<&Path> {
        match self {
            DataSourceStatus::Unbound => None,
            DataSourceStatus::Healthy { path } | DataSourceStatus::Unreachable { path, .. } => {
                Some(path)
            }
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, DataSourceStatus::Healthy { .. })
    }
}

/// Persists the bound path in the store's settings table.
#[derive(Clone)]
pub struct DataSourceRegistry {
    store: Arc<Mutex<Store>>,
}

impl DataSourceRegistry {
    pub fn new(store: Arc<Mutex<Store>>) -> Self {
        Self { store }
    }

    /// The bound path, if any.
    pub async fn get(&self) -> Result<Option<PathBuf>> {
        Ok(self.store.lock().await.data_source()?)
    }

    pub async fn set(&self, path: &Path) -> Result<()> {
        Ok(self.store.lock().await.set_data_source(path)?)
    }

    pub async fn clear(&self) -> Result<()> {
        Ok(self.store.lock().await.clear_data_source()?)
    }

    /// Current status of the bound path.
    pub async fn status(&self) -> Result<DataSourceStatus> {
        let path = self.get().await?;
        Ok(DataSourceStatus::probe(path.as_deref()))
    }
}
