mod common;

use common::connection;
use mailout_core::{ConnectionStore, MailoutError};
use tempfile::TempDir;

#[test]
fn test_store_persists_across_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("state").join("connections.json");

    let store = ConnectionStore::open(&path).unwrap();
    assert!(store.is_empty());

    store.upsert(connection("zeta", &[("900", "Last")])).unwrap();
    store.upsert(connection("alpha", &[("100", "First")])).unwrap();
    assert!(path.exists(), "store file and parent directory should be created");

    let reopened = ConnectionStore::open(&path).unwrap();
    let ids: Vec<String> = reopened.all().into_iter().map(|c| c.id).collect();
    assert_eq!(ids, vec!["alpha".to_string(), "zeta".to_string()]);
    assert_eq!(reopened.get("zeta").unwrap().lists[0].name, "Last");
}

#[test]
fn test_remove_rewrites_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("connections.json");

    let store = ConnectionStore::open(&path).unwrap();
    store.upsert(connection("main", &[])).unwrap();
    store.upsert(connection("other", &[])).unwrap();

    assert!(store.remove("main").unwrap().is_some());
    assert!(store.remove("main").unwrap().is_none());

    let reopened = ConnectionStore::open(&path).unwrap();
    assert_eq!(reopened.len(), 1);
    assert!(reopened.contains("other"));
}

#[test]
fn test_corrupt_store_is_a_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("connections.json");
    std::fs::write(&path, "{not json").unwrap();

    let err = ConnectionStore::open(&path).err().unwrap();
    assert!(matches!(err, MailoutError::Config(_)));
}
