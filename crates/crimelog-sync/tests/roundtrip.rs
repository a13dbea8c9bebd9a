//! Workbook export/import round trips.

use std::collections::BTreeMap;

use crimelog_store::{RecordFilter, Store};
use crimelog_sync::{export_from, import_into};
use crimelog_types::NewRecord;

fn sample() -> Vec<NewRecord> {
    vec![
        NewRecord::new(2024, 1, "Central", "Theft", 2, 3),
        NewRecord::new(2024, 1, "Central", "Theft", 2, 3),
        NewRecord::new(2023, 12, "North", "Fraud", 0, 5),
        NewRecord::new(2022, 6, "Harbor", "Assault", 7, 0),
    ]
}

fn multiset(records: &[NewRecord]) -> BTreeMap<NewRecord, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(record.clone()).or_insert(0) += 1;
    }
    counts
}

fn stored(store: &Store) -> Vec<NewRecord> {
    store
        .all_records()
        .unwrap()
        .iter()
        .map(|r| r.to_new_record())
        .collect()
}

#[test]
fn xlsx_round_trip_preserves_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("crime.xlsx");

    let source = Store::open_in_memory().unwrap();
    source.replace_all(&sample()).unwrap();
    assert_eq!(export_from(&source, &path).unwrap(), 4);

    let target = Store::open_in_memory().unwrap();
    assert_eq!(import_into(&target, &path).unwrap(), 4);

    assert_eq!(multiset(&stored(&target)), multiset(&sample()));
}

#[test]
fn csv_round_trip_preserves_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("crime.csv");

    let source = Store::open_in_memory().unwrap();
    source.replace_all(&sample()).unwrap();
    export_from(&source, &path).unwrap();

    let target = Store::open_in_memory().unwrap();
    import_into(&target, &path).unwrap();

    assert_eq!(multiset(&stored(&target)), multiset(&sample()));
}

#[test]
fn importing_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("crime.xlsx");

    let source = Store::open_in_memory().unwrap();
    source.replace_all(&sample()).unwrap();
    export_from(&source, &path).unwrap();

    let store = Store::open_in_memory().unwrap();
    import_into(&store, &path).unwrap();
    let first = store.summarize(&RecordFilter::new()).unwrap();
    import_into(&store, &path).unwrap();
    let second = store.summarize(&RecordFilter::new()).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.total_records, 4);

    // ids are reassigned from 1 on every import
    let ids: Vec<_> = store.all_records().unwrap().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
}
