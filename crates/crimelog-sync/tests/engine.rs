//! End-to-end behavior of the sync engine against real files.

use std::path::Path;
use std::time::Duration;

use crimelog_store::{RecordFilter, Store};
use crimelog_sync::{
    DataSourceStatus, DatasetEvent, MAX_IMPORTED_COUNT, Subscription, SyncEngine, SyncSettings,
    read_workbook, write_workbook,
};
use crimelog_types::{NewRecord, RecordPatch};

fn fast_settings() -> SyncSettings {
    SyncSettings {
        debounce_ms: 50,
        guard_quiet_ms: 1000,
        stability_ms: 100,
        poll_interval_ms: 20,
        keepalive_secs: 0,
        summary_ttl_secs: 60,
        subscriber_buffer: 16,
    }
}

fn seed_workbook(path: &Path, records: &[NewRecord]) {
    let store = Store::open_in_memory().unwrap();
    store.replace_all(records).unwrap();
    write_workbook(&store.all_records().unwrap(), path).unwrap();
}

async fn next_kind(sub: &mut Subscription, wait: Duration) -> Option<&'static str> {
    tokio::time::timeout(wait, sub.recv())
        .await
        .ok()
        .flatten()
        .map(|event| event.kind())
}

async fn connected(engine: &SyncEngine) -> Subscription {
    let mut sub = engine.subscribe();
    assert_eq!(
        next_kind(&mut sub, Duration::from_secs(1)).await,
        Some("connected")
    );
    sub
}

#[tokio::test]
async fn mutation_writes_back_and_publishes_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("crime.xlsx");
    seed_workbook(&path, &[NewRecord::new(2024, 1, "Central", "Theft", 1, 1)]);

    let engine = SyncEngine::new(Store::open_in_memory().unwrap(), fast_settings());
    assert_eq!(engine.bind_source(&path).await.unwrap(), 1);

    let mut sub = connected(&engine).await;
    let record = engine
        .insert(&NewRecord::new(2024, 2, "North", "Fraud", 0, 4))
        .await
        .unwrap();
    assert_eq!(record.id, 2);

    assert_eq!(
        next_kind(&mut sub, Duration::from_secs(1)).await,
        Some("data-updated")
    );
    assert_eq!(read_workbook(&path).unwrap().len(), 2);
    assert!(engine.last_write_back().unwrap().is_ok());
    assert!(engine.loop_guard().is_held());

    // the watcher sees the write-back but the loop guard suppresses it
    assert_eq!(next_kind(&mut sub, Duration::from_millis(700)).await, None);
    assert_eq!(engine.count().await.unwrap(), 2);
}

#[tokio::test]
async fn external_edit_is_reimported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("crime.xlsx");
    seed_workbook(&path, &[NewRecord::new(2024, 1, "Central", "Theft", 1, 1)]);

    let engine = SyncEngine::new(Store::open_in_memory().unwrap(), fast_settings());
    engine.bind_source(&path).await.unwrap();
    let mut sub = connected(&engine).await;

    seed_workbook(
        &path,
        &[
            NewRecord::new(2024, 1, "Central", "Theft", 1, 1),
            NewRecord::new(2024, 3, "Harbor", "Burglary", 2, 2),
            NewRecord::new(2024, 4, "Harbor", "Burglary", 0, 3),
        ],
    );

    assert_eq!(
        next_kind(&mut sub, Duration::from_secs(10)).await,
        Some("data-updated")
    );
    assert_eq!(engine.count().await.unwrap(), 3);
}

#[tokio::test]
async fn write_back_failure_keeps_mutation() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("nested");
    std::fs::create_dir(&nested).unwrap();
    let path = nested.join("crime.csv");
    std::fs::write(&path, "Year,Month,Police Station,Crime Type,Under Investigation,Closed\n").unwrap();

    let engine = SyncEngine::new(Store::open_in_memory().unwrap(), fast_settings());
    assert_eq!(engine.bind_source(&path).await.unwrap(), 0);

    std::fs::remove_dir_all(&nested).unwrap();
    let mut sub = connected(&engine).await;

    engine
        .insert(&NewRecord::new(2024, 1, "Central", "Theft", 1, 1))
        .await
        .unwrap();

    assert_eq!(engine.count().await.unwrap(), 1);
    let status = engine.last_write_back().unwrap();
    assert!(!status.is_ok());
    assert!(status.records.is_none());
    assert_eq!(
        next_kind(&mut sub, Duration::from_secs(1)).await,
        Some("data-updated")
    );
    assert!(matches!(
        engine.data_source().await.unwrap(),
        DataSourceStatus::Unreachable { .. }
    ));
}

#[tokio::test]
async fn failed_mutations_do_not_publish() {
    let engine = SyncEngine::new(Store::open_in_memory().unwrap(), fast_settings());
    let mut sub = connected(&engine).await;

    let err = engine.delete(99).await.unwrap_err();
    assert!(err.is_not_found());

    let err = engine
        .insert(&NewRecord::new(2024, 1, "Central", "Theft", -1, 0))
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let err = engine
        .update(5, &RecordPatch::new().closed(1))
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    assert_eq!(next_kind(&mut sub, Duration::from_millis(100)).await, None);
    assert!(engine.last_write_back().is_none());
}

#[tokio::test]
async fn summary_cache_is_invalidated_by_mutations() {
    let engine = SyncEngine::new(Store::open_in_memory().unwrap(), fast_settings());
    engine
        .insert(&NewRecord::new(2024, 1, "Central", "Theft", 2, 3))
        .await
        .unwrap();

    let before = engine.summarize(&RecordFilter::new()).await.unwrap();
    assert_eq!(before.total_records, 1);

    engine
        .insert(&NewRecord::new(2024, 1, "North", "Theft", 0, 5))
        .await
        .unwrap();

    let after = engine.summarize(&RecordFilter::new()).await.unwrap();
    assert_eq!(after.total_records, 2);
    assert_eq!(after.total_under_investigation, 2);
    assert_eq!(after.total_closed, 8);
    assert_eq!(after.closure_rate, 80.0);
}

#[tokio::test]
async fn export_does_not_publish() {
    let dir = tempfile::tempdir().unwrap();
    let engine = SyncEngine::new(Store::open_in_memory().unwrap(), fast_settings());
    engine
        .insert(&NewRecord::new(2024, 1, "Central", "Theft", 2, 3))
        .await
        .unwrap();
    let mut sub = connected(&engine).await;

    let out = dir.path().join("download.xlsx");
    assert_eq!(engine.export_to(&out).await.unwrap(), 1);
    assert!(engine.loop_guard().last_acquired().is_some());
    assert_eq!(next_kind(&mut sub, Duration::from_millis(100)).await, None);
}

#[tokio::test]
async fn failed_import_leaves_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let bad = dir.path().join("bad.csv");
    std::fs::write(&bad, "Remarks\nnothing useful\n").unwrap();

    let engine = SyncEngine::new(Store::open_in_memory().unwrap(), fast_settings());
    engine
        .insert(&NewRecord::new(2024, 1, "Central", "Theft", 2, 3))
        .await
        .unwrap();

    assert!(engine.import_from(&bad).await.is_err());
    assert!(engine.bind_source(&bad).await.is_err());
    assert_eq!(engine.count().await.unwrap(), 1);
    assert_eq!(engine.data_source().await.unwrap(), DataSourceStatus::Unbound);
}

#[tokio::test]
async fn oversized_counts_import_and_summarize() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("huge.csv");
    std::fs::write(
        &path,
        "Year,Month,Police Station,Crime Type,Under Investigation,Closed\n\
         2024,1,Central,Theft,9223372036854775807,1\n\
         2024,2,Central,Theft,9223372036854775807,1\n",
    )
    .unwrap();

    let engine = SyncEngine::new(Store::open_in_memory().unwrap(), fast_settings());
    assert_eq!(engine.import_from(&path).await.unwrap(), 2);

    let summary = engine.summarize(&RecordFilter::new()).await.unwrap();
    assert_eq!(summary.total_under_investigation, 2 * MAX_IMPORTED_COUNT);
    assert_eq!(summary.total_closed, 2);
    assert_eq!(summary.closure_rate, 0.0);
}

#[tokio::test]
async fn restore_rebinds_saved_source() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("data.db");
    let path = dir.path().join("crime.xlsx");
    seed_workbook(&path, &[NewRecord::new(2024, 1, "Central", "Theft", 1, 1)]);

    {
        let engine = SyncEngine::new(Store::open(&db).unwrap(), fast_settings());
        engine.bind_source(&path).await.unwrap();
        engine.shutdown();
    }

    // edited while nothing was running
    seed_workbook(
        &path,
        &[
            NewRecord::new(2024, 1, "Central", "Theft", 1, 1),
            NewRecord::new(2024, 2, "Central", "Theft", 1, 1),
        ],
    );

    let engine = SyncEngine::new(Store::open(&db).unwrap(), fast_settings());
    let status = engine.restore().await.unwrap();
    assert!(status.is_healthy());
    assert_eq!(engine.count().await.unwrap(), 2);
    assert!(engine.status().await.unwrap().source.is_healthy());
}

#[tokio::test]
async fn clear_dataset_unbinds_and_empties() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("crime.xlsx");
    seed_workbook(&path, &[NewRecord::new(2024, 1, "Central", "Theft", 1, 1)]);

    let engine = SyncEngine::new(Store::open_in_memory().unwrap(), fast_settings());
    engine.bind_source(&path).await.unwrap();
    let mut sub = connected(&engine).await;

    engine.clear_dataset().await.unwrap();

    assert_eq!(engine.count().await.unwrap(), 0);
    assert_eq!(engine.data_source().await.unwrap(), DataSourceStatus::Unbound);
    assert_eq!(
        next_kind(&mut sub, Duration::from_secs(1)).await,
        Some("data-updated")
    );
    // the workbook itself is untouched
    assert_eq!(read_workbook(&path).unwrap().len(), 1);
}

#[tokio::test]
async fn sse_frames_for_subscribers() {
    let engine = SyncEngine::new(Store::open_in_memory().unwrap(), fast_settings());
    let mut sub = engine.subscribe();

    let event = sub.recv().await.unwrap();
    assert!(matches!(event, DatasetEvent::Connected { .. }));
    let frame = event.sse_frame().unwrap();
    assert!(frame.starts_with("data: {\"type\":\"connected\""));
    assert!(frame.ends_with("\n\n"));

    assert!(engine.unsubscribe(sub.id()));
    assert_eq!(engine.status().await.unwrap().subscribers, 0);
}
