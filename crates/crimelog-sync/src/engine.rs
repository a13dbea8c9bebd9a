//! Sync engine: the store, the bound workbook, and their subscribers.
//!
//! Mutations go to the store first. Once committed, the full dataset is
//! written back to the bound workbook (holding the loop guard) and a
//! `data-updated` event is published. External edits to the workbook come
//! back through the [`ChangeWatcher`] and replace the store's contents.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crimelog_store::{RecordFilter, RecordPage, Store};
use crimelog_types::{DatasetSummary, NewRecord, Record, RecordPatch};

use crate::broadcast::{Broadcaster, DatasetEvent, Subscription, SubscriptionId};
use crate::cache::SummaryCache;
use crate::error::{ExportError, ImportError, Result};
use crate::export::write_workbook;
use crate::guard::LoopGuard;
use crate::import::read_workbook;
use crate::registry::{DataSourceRegistry, DataSourceStatus};
use crate::settings::SyncSettings;
use crate::source::Stability;
use crate::watcher::{ChangeHandler, ChangeWatcher, WatchTiming, WatcherState};

/// Outcome of the last write-back to the bound workbook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteBackStatus {
    pub path: PathBuf,
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
    /// Records written, on success.
    pub records: Option<usize>,
    /// Failure message, on error.
    pub error: Option<String>,
}

impl WriteBackStatus {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Point-in-time view of the engine.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub source: DataSourceStatus,
    pub records: u64,
    pub watcher: WatcherState,
    pub guard_held: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub guard_last_acquired: Option<OffsetDateTime>,
    pub subscribers: usize,
    pub last_write_back: Option<WriteBackStatus>,
}

struct EngineCore {
    store: Arc<Mutex<Store>>,
    registry: DataSourceRegistry,
    guard: LoopGuard,
    broadcaster: Broadcaster,
    cache: SummaryCache,
    /// Serializes exports so file contents follow store order.
    export_lock: Mutex<()>,
    last_write_back: std::sync::Mutex<Option<WriteBackStatus>>,
}

impl EngineCore {
    async fn import_from(&self, path: &Path) -> Result<usize> {
        let owned = path.to_path_buf();
        let records = tokio::task::spawn_blocking(move || read_workbook(&owned))
            .await
            .map_err(|e| ImportError::Task(e.to_string()))??;

        let count = {
            let store = self.store.lock().await;
            store.replace_all(&records).map_err(ImportError::from)?
        };

        info!("Imported {} records from {}", count, path.display());
        self.broadcaster.publish(DatasetEvent::data_updated());
        Ok(count)
    }

    async fn export_to(&self, path: &Path) -> Result<usize> {
        let _serial = self.export_lock.lock().await;
        let _lease = self.guard.acquire();

        let records = self
            .store
            .lock()
            .await
            .all_records()
            .map_err(ExportError::from)?;

        let owned = path.to_path_buf();
        let count = tokio::task::spawn_blocking(move || write_workbook(&records, &owned))
            .await
            .map_err(|e| ExportError::Task(e.to_string()))??;

        debug!("Exported {} records to {}", count, path.display());
        Ok(count)
    }

    /// Write back to the bound workbook, if any. Failures are logged and recorded.
    async fn write_back(&self) {
        let path = match self.registry.get().await {
            Ok(Some(path)) => path,
            Ok(None) => return,
            Err(e) => {
                warn!("Cannot read data source setting: {}", e);
                return;
            }
        };

        let result = self.export_to(&path).await;
        let status = match result {
            Ok(count) => WriteBackStatus {
                path,
                at: OffsetDateTime::now_utc(),
                records: Some(count),
                error: None,
            },
            Err(e) => {
                warn!("Write-back to {} failed: {}", path.display(), e);
                WriteBackStatus {
                    path,
                    at: OffsetDateTime::now_utc(),
                    records: None,
                    error: Some(e.to_string()),
                }
            }
        };
        *self
            .last_write_back
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(status);
    }

    async fn after_mutation(&self) {
        self.write_back().await;
        self.broadcaster.publish(DatasetEvent::data_updated());
    }

    fn last_write_back(&self) -> Option<WriteBackStatus> {
        self.last_write_back
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl ChangeHandler for EngineCore {
    async fn on_external_change(&self, path: &Path) -> Result<usize> {
        self.import_from(path).await
    }
}

/// Keeps the record store and the bound workbook in sync.
///
/// Must be created inside a tokio runtime.
pub struct SyncEngine {
    core: Arc<EngineCore>,
    watcher: ChangeWatcher,
    keepalive: CancellationToken,
}

impl SyncEngine {
    /// Create an engine over `store`. No workbook is bound yet; see
    /// [`SyncEngine::restore`] and [`SyncEngine::bind_source`].
    pub fn new(store: Store, settings: SyncSettings) -> Self {
        let store = Arc::new(Mutex::new(store));
        let guard = LoopGuard::new(settings.guard_quiet());
        let cache = SummaryCache::new(settings.summary_ttl());
        let broadcaster = Broadcaster::new(settings.subscriber_buffer, cache.clone());

        let core = Arc::new(EngineCore {
            registry: DataSourceRegistry::new(Arc::clone(&store)),
            store,
            guard: guard.clone(),
            broadcaster: broadcaster.clone(),
            cache,
            export_lock: Mutex::new(()),
            last_write_back: std::sync::Mutex::new(None),
        });

        let watcher = ChangeWatcher::new(
            core.clone(),
            guard,
            WatchTiming {
                debounce: settings.debounce(),
                stability: Stability {
                    threshold: settings.stability(),
                    poll_interval: settings.poll_interval(),
                },
            },
        );

        let keepalive = CancellationToken::new();
        if !settings.keepalive().is_zero() {
            broadcaster.spawn_keepalive(settings.keepalive(), keepalive.clone());
        }

        Self {
            core,
            watcher,
            keepalive,
        }
    }

    // === Queries ===

    pub async fn list(&self, filter: &RecordFilter, page: u32, page_size: u32) -> Result<RecordPage> {
        Ok(self.core.store.lock().await.list(filter, page, page_size)?)
    }

    pub async fn get(&self, id: i64) -> Result<Option<Record>> {
        Ok(self.core.store.lock().await.get_record(id)?)
    }

    /// Summary for `filter`, served from the cache while fresh.
    pub async fn summarize(&self, filter: &RecordFilter) -> Result<DatasetSummary> {
        if let Some(summary) = self.core.cache.get(filter) {
            return Ok(summary);
        }
        let generation = self.core.cache.generation();
        let summary = self.core.store.lock().await.summarize(filter)?;
        self.core.cache.put(filter.clone(), summary.clone(), generation);
        Ok(summary)
    }

    pub async fn count(&self) -> Result<u64> {
        Ok(self.core.store.lock().await.count()?)
    }

    // === Mutations ===

    /// Insert a record, write back, publish.
    pub async fn insert(&self, record: &NewRecord) -> Result<Record> {
        let record = self.core.store.lock().await.insert(record)?;
        self.core.after_mutation().await;
        Ok(record)
    }

    /// Update a record, write back, publish.
    pub async fn update(&self, id: i64, patch: &RecordPatch) -> Result<Record> {
        let record = self.core.store.lock().await.update(id, patch)?;
        self.core.after_mutation().await;
        Ok(record)
    }

    /// Delete a record, write back, publish.
    pub async fn delete(&self, id: i64) -> Result<()> {
        self.core.store.lock().await.delete(id)?;
        self.core.after_mutation().await;
        Ok(())
    }

    // === Workbooks ===

    /// Replace the dataset with the contents of `path` and publish.
    pub async fn import_from(&self, path: &Path) -> Result<usize> {
        self.core.import_from(path).await
    }

    /// Write the dataset to `path`. Holds the loop guard; does not publish.
    pub async fn export_to(&self, path: &Path) -> Result<usize> {
        self.core.export_to(path).await
    }

    /// Import `path`, remember it as the data source, and start watching it.
    ///
    /// A watcher failure is logged; the binding still stands.
    pub async fn bind_source(&self, path: &Path) -> Result<usize> {
        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        let count = self.core.import_from(&path).await?;
        self.core.registry.set(&path).await?;
        if let Err(e) = self.watcher.bind(&path) {
            warn!("Cannot watch {}: {}", path.display(), e);
        }
        info!("Bound data source {}", path.display());
        Ok(count)
    }

    /// Stop watching and forget the data source. The dataset is kept.
    pub async fn unbind_source(&self) -> Result<()> {
        self.watcher.unbind();
        self.core.registry.clear().await?;
        info!("Data source unbound");
        Ok(())
    }

    /// Unbind the data source and delete every record. The workbook is left alone.
    pub async fn clear_dataset(&self) -> Result<()> {
        self.unbind_source().await?;
        self.core.store.lock().await.replace_all(&[])?;
        self.core.broadcaster.publish(DatasetEvent::data_updated());
        info!("Dataset cleared");
        Ok(())
    }

    /// Re-attach to the data source saved by a previous run.
    ///
    /// A reachable workbook is re-imported and watched. An unreachable one
    /// stays registered so it can be fixed without rebinding.
    pub async fn restore(&self) -> Result<DataSourceStatus> {
        let status = self.core.registry.status().await?;
        match &status {
            DataSourceStatus::Unbound => debug!("No saved data source"),
            DataSourceStatus::Healthy { path } => {
                if let Err(e) = self.core.import_from(path).await {
                    warn!("Re-import of {} failed: {}", path.display(), e);
                }
                if let Err(e) = self.watcher.bind(path) {
                    warn!("Cannot watch {}: {}", path.display(), e);
                }
                info!("Restored data source {}", path.display());
            }
            DataSourceStatus::Unreachable { path, reason } => {
                warn!("Saved data source {} is unavailable: {}", path.display(), reason);
            }
        }
        Ok(status)
    }

    // === Subscriptions and status ===

    pub fn subscribe(&self) -> Subscription {
        self.core.broadcaster.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.core.broadcaster.unsubscribe(id)
    }

    pub async fn data_source(&self) -> Result<DataSourceStatus> {
        self.core.registry.status().await
    }

    pub fn watcher_state(&self) -> WatcherState {
        self.watcher.state()
    }

    pub fn subscribe_watcher_state(&self) -> watch::Receiver<WatcherState> {
        self.watcher.subscribe_state()
    }

    /// Loop guard shared by write-backs and the watcher.
    pub fn loop_guard(&self) -> &LoopGuard {
        &self.core.guard
    }

    pub fn last_write_back(&self) -> Option<WriteBackStatus> {
        self.core.last_write_back()
    }

    pub async fn status(&self) -> Result<EngineStatus> {
        Ok(EngineStatus {
            source: self.data_source().await?,
            records: self.count().await?,
            watcher: self.watcher.state(),
            guard_held: self.core.guard.is_held(),
            guard_last_acquired: self.core.guard.last_acquired(),
            subscribers: self.core.broadcaster.subscriber_count(),
            last_write_back: self.core.last_write_back(),
        })
    }

    /// Stop watching and stop keep-alives. The registry is left as is.
    pub fn shutdown(&self) {
        self.watcher.unbind();
        self.keepalive.cancel();
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.keepalive.cancel();
    }
}
