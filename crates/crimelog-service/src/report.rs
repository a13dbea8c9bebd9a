//! One-shot status report for the `status` command.

use serde::Serialize;

use crimelog_store::RecordFilter;
use crimelog_sync::{DataSourceStatus, SyncEngine, WatcherState};
use crimelog_types::DatasetSummary;

/// Bound source, record count and whole-dataset summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub source: DataSourceStatus,
    pub records: u64,
    pub watcher: WatcherState,
    pub summary: DatasetSummary,
}

impl StatusReport {
    pub async fn collect(engine: &SyncEngine) -> crimelog_sync::Result<Self> {
        let status = engine.status().await?;
        let summary = engine.summarize(&RecordFilter::new()).await?;
        Ok(Self {
            source: status.source,
            records: status.records,
            watcher: status.watcher,
            summary,
        })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
