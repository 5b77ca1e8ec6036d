use pyref_cache::{CacheCategory, CacheConfig, RecordStore, RECORD_SCHEMA_VERSION};
use std::collections::BTreeSet;
use tempfile::TempDir;

fn store() -> (TempDir, RecordStore) {
    let tmp = TempDir::new().unwrap();
    let store = RecordStore::open(CacheConfig::at(tmp.path())).unwrap();
    (tmp, store)
}

#[test]
fn truncated_record_is_a_miss_and_is_removed() {
    let (_tmp, store) = store();
    let path = store.record_path(&CacheCategory::InstalledIndex);
    std::fs::write(&path, br#"{"schema_version":1,"category":{"kind":"installed_in"#).unwrap();

    assert!(store
        .load::<BTreeSet<String>>(&CacheCategory::InstalledIndex)
        .is_none());
    assert!(!path.exists(), "corrupt record should be deleted");
}

#[test]
fn schema_mismatch_is_treated_as_corruption() {
    let (_tmp, store) = store();
    let path = store.record_path(&CacheCategory::Builtins);
    let body = serde_json::json!({
        "schema_version": RECORD_SCHEMA_VERSION + 1,
        "category": { "kind": "builtins" },
        "written_at_millis": 1,
        "payload": ["abs"],
    });
    std::fs::write(&path, serde_json::to_vec(&body).unwrap()).unwrap();

    assert!(store.load::<BTreeSet<String>>(&CacheCategory::Builtins).is_none());
    assert!(!path.exists());
}

#[test]
fn wrong_category_in_slot_is_treated_as_corruption() {
    let (_tmp, store) = store();
    let path = store.record_path(&CacheCategory::Builtins);
    let body = serde_json::json!({
        "schema_version": RECORD_SCHEMA_VERSION,
        "category": { "kind": "remote_index" },
        "written_at_millis": 1,
        "payload": ["abs"],
    });
    std::fs::write(&path, serde_json::to_vec(&body).unwrap()).unwrap();

    assert!(store.load::<BTreeSet<String>>(&CacheCategory::Builtins).is_none());
    assert!(!path.exists());
}

#[test]
fn payload_of_wrong_shape_is_removed() {
    let (_tmp, store) = store();
    store
        .save(&CacheCategory::RemoteIndex, &"not a set", 1)
        .unwrap();

    assert!(store
        .load::<BTreeSet<String>>(&CacheCategory::RemoteIndex)
        .is_none());
    assert!(!store.record_path(&CacheCategory::RemoteIndex).exists());
}

#[test]
fn colliding_detail_names_do_not_evict_each_other() {
    let (_tmp, store) = store();
    // Both names escape to `a_b.json`.
    store
        .save(&CacheCategory::remote_detail("a.b"), &"dotted", 1)
        .unwrap();

    assert!(store
        .load::<String>(&CacheCategory::remote_detail("a_b"))
        .is_none());
    let kept = store
        .load::<String>(&CacheCategory::remote_detail("a.b"))
        .expect("original record must survive a colliding lookup");
    assert_eq!(kept.payload, "dotted");
}

#[test]
fn corrupt_record_can_be_rewritten() {
    let (_tmp, store) = store();
    let path = store.record_path(&CacheCategory::Builtins);
    std::fs::write(&path, b"\0\0garbage").unwrap();
    assert!(store.load::<Vec<String>>(&CacheCategory::Builtins).is_none());

    store
        .save(&CacheCategory::Builtins, &vec!["len".to_string()], 5)
        .unwrap();
    let record = store.load::<Vec<String>>(&CacheCategory::Builtins).unwrap();
    assert_eq!(record.payload, vec!["len".to_string()]);
}
