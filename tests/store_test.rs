use serde_json::json;
use stagetrack::runtime::lock::StoreLock;
use stagetrack::{ParameterStore, StageId, TrackError};
use std::fs;
use std::time::Duration;

#[test]
fn test_load_missing_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = ParameterStore::new(dir.path().join("params.json"));

    let document = store.load().expect("Missing store should load");
    assert!(document.is_empty());
    assert!(store.stages("Foo").unwrap().is_empty());
}

#[test]
fn test_load_malformed_json_is_store_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("params.json");
    fs::write(&path, "{ not json").unwrap();

    let store = ParameterStore::new(&path);
    let err = store.load().unwrap_err();
    assert!(matches!(err, TrackError::StoreCorrupt { .. }), "got {err:?}");

    // Mutations must not repair the file either
    let err = store.merge_and_save("Foo", StageId(0), &json!({"x": 1})).unwrap_err();
    assert!(matches!(err, TrackError::StoreCorrupt { .. }));
    assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
}

#[test]
fn test_merge_preserves_other_node_types_and_ids() {
    let dir = tempfile::tempdir().unwrap();
    let store = ParameterStore::new(dir.path().join("config").join("params.json"));

    // 1. Seed two node types
    store.merge_and_save("A", StageId(0), &json!({"a": 0})).unwrap();
    store.merge_and_save("A", StageId(1), &json!({"a": 1})).unwrap();
    store.merge_and_save("B", StageId(0), &json!({"b": [1, 2, 3]})).unwrap();

    // 2. Overwrite one entry of A
    store.merge_and_save("A", StageId(1), &json!({"a": 42})).unwrap();

    // 3. Everything else is unchanged
    let document = store.load().unwrap();
    assert_eq!(document.get("A", StageId(0)), Some(json!({"a": 0}).as_object().unwrap()));
    assert_eq!(document.get("A", StageId(1)), Some(json!({"a": 42}).as_object().unwrap()));
    assert_eq!(document.get("B", StageId(0)), Some(json!({"b": [1, 2, 3]}).as_object().unwrap()));
    assert_eq!(document.node_types().collect::<Vec<_>>(), vec!["A", "B"]);
}

#[test]
fn test_store_file_layout() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("params.json");
    let store = ParameterStore::new(&path);

    store.merge_and_save("Foo", StageId(3), &json!({"x": 1})).unwrap();

    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw, json!({"Foo": {"3": {"x": 1}}}));
}

#[test]
fn test_merge_rejects_non_object() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("params.json");
    let store = ParameterStore::new(&path);

    for value in [json!([1, 2]), json!("name"), json!(null), json!(3)] {
        let err = store.merge_and_save("Foo", StageId(0), &value).unwrap_err();
        assert!(matches!(err, TrackError::InvalidParameterSet { .. }), "got {err:?}");
    }
    assert!(!path.exists(), "Nothing should be written for rejected values");
}

#[test]
fn test_failed_update_leaves_store_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("params.json");
    let store = ParameterStore::new(&path);
    store.merge_and_save("Foo", StageId(0), &json!({"x": 1})).unwrap();
    let before = fs::read_to_string(&path).unwrap();

    let result: stagetrack::Result<()> = store.update(|document| {
        document.insert("Foo", StageId(1), json!({"x": 2}).as_object().unwrap().clone());
        Err(TrackError::NoResultsFile("Foo".to_string()))
    });

    assert!(result.is_err());
    assert_eq!(fs::read_to_string(&path).unwrap(), before);
    StoreLock::acquire(&path, Duration::from_millis(50)).expect("Lock must be released");
}

#[test]
fn test_non_numeric_stage_key_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("params.json");
    fs::write(&path, r#"{"Foo": {"first": {"x": 1}}}"#).unwrap();

    let err = ParameterStore::new(&path).load().unwrap_err();
    assert!(matches!(err, TrackError::StoreCorrupt { .. }));
}

#[test]
fn test_lock_timeout_when_held() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("params.json");
    let store = ParameterStore::new(&path).with_lock_timeout(Duration::from_millis(50));

    let held = StoreLock::acquire(&path, Duration::from_secs(1)).unwrap();
    let err = store.merge_and_save("Foo", StageId(0), &json!({"x": 1})).unwrap_err();
    assert!(matches!(err, TrackError::LockTimeout { .. }), "got {err:?}");

    drop(held);
    store
        .merge_and_save("Foo", StageId(0), &json!({"x": 1}))
        .expect("Store should be writable once the lock is released");
}

#[test]
fn test_leftover_lock_file_does_not_block_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("params.json");
    // 1. A lock file left behind by a process that no longer exists
    fs::write(StoreLock::lock_path(&path), "999999\n").unwrap();

    // 2. Nobody holds the lock, so the write goes through well within the timeout
    let store = ParameterStore::new(&path).with_lock_timeout(Duration::from_millis(100));
    store
        .merge_and_save("Foo", StageId(0), &json!({"x": 1}))
        .expect("Leftover lock file must not block the store");
    assert_eq!(store.get("Foo", StageId(0)).unwrap(), json!({"x": 1}).as_object().cloned());

    // 3. The file now records this process as the last owner
    let owner = fs::read_to_string(StoreLock::lock_path(&path)).unwrap();
    assert_eq!(owner.trim(), std::process::id().to_string());
}
