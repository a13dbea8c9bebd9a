//! On-disk behavior of the record store.

use std::path::Path;

use crimelog_store::{RecordFilter, Store};
use crimelog_types::NewRecord;

#[test]
fn records_and_settings_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.db");

    {
        let store = Store::open(&path).unwrap();
        store
            .insert(&NewRecord::new(2024, 6, "Harbor", "Burglary", 4, 1))
            .unwrap();
        store.set_data_source(Path::new("/srv/crime.xlsx")).unwrap();
    }

    let store = Store::open(&path).unwrap();
    assert_eq!(store.count().unwrap(), 1);
    assert_eq!(
        store.data_source().unwrap().as_deref(),
        Some(Path::new("/srv/crime.xlsx"))
    );

    let summary = store.summarize(&RecordFilter::new()).unwrap();
    assert_eq!(summary.stations, vec!["Harbor"]);
    assert_eq!(summary.closure_rate, 20.0);
}

#[test]
fn record_page_serializes_camel_case() {
    let store = Store::open_in_memory().unwrap();
    store
        .insert(&NewRecord::new(2024, 6, "Harbor", "Burglary", 4, 1))
        .unwrap();

    let page = store.list(&RecordFilter::new(), 1, 10).unwrap();
    let json = serde_json::to_value(&page).unwrap();

    assert_eq!(json["pageCount"], 1);
    assert_eq!(json["pageSize"], 10);
    assert_eq!(json["records"][0]["underInvestigation"], 4);
    assert!(json["records"][0]["createdAt"].is_string());
}
