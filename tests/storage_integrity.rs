//! Storage Integrity Tests
//!
//! - Collections and indices survive reopening the data directory
//! - Corrupted collection units are reported, never silently read
//! - Index units are verified against their collection and rebuilt
//! - Interrupted writes never replace a good unit

use std::fs;
use std::path::{Path, PathBuf};

use digitooldb::{Engine, EngineErrorCode};
use serde_json::json;
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

fn create_temp_data_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

fn collection_file(data_dir: &Path) -> PathBuf {
    data_dir.join("shop").join("items.digitool")
}

fn index_file(data_dir: &Path, field: &str) -> PathBuf {
    data_dir.join("shop").join("items.indices").join(format!("{}.idx", field))
}

/// Populate `shop.items` with three documents and an index on `sku`.
fn populate(data_dir: &Path) {
    let engine = Engine::open(data_dir).unwrap();
    engine.create_database("shop").unwrap();
    engine.create_collection("shop", "items").unwrap();
    engine
        .insert_many(
            "shop",
            "items",
            vec![
                json!({"sku": "a-1", "qty": 3}),
                json!({"sku": "b-2", "qty": 7}),
                json!({"sku": "c-3", "qty": 0}),
            ],
        )
        .unwrap();
    engine.create_index("shop", "items", "sku").unwrap();
}

// =============================================================================
// Persistence
// =============================================================================

/// Everything written by one engine is visible to the next.
#[test]
fn test_state_survives_reopen() {
    let temp_dir = create_temp_data_dir();
    populate(temp_dir.path());

    let engine = Engine::open(temp_dir.path()).unwrap();
    assert_eq!(engine.list_databases().unwrap(), vec!["shop"]);
    assert_eq!(engine.list_collections("shop").unwrap(), vec!["items"]);
    assert_eq!(engine.list_indices("shop", "items").unwrap(), vec!["sku"]);

    let found = engine
        .find("shop", "items", Some(&json!({"sku": "b-2"})))
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["qty"], 7);
}

/// Updates and deletes are durable once the call returns.
#[test]
fn test_mutations_survive_reopen() {
    let temp_dir = create_temp_data_dir();
    populate(temp_dir.path());
    {
        let engine = Engine::open(temp_dir.path()).unwrap();
        engine
            .update("shop", "items", &json!({"sku": "a-1"}), &json!({"$inc": {"qty": 2}}))
            .unwrap();
        engine.delete("shop", "items", &json!({"qty": 0})).unwrap();
    }

    let engine = Engine::open(temp_dir.path()).unwrap();
    let all = engine.find("shop", "items", None).unwrap();
    assert_eq!(all.len(), 2);
    let a = engine
        .find_one("shop", "items", Some(&json!({"sku": "a-1"})))
        .unwrap()
        .unwrap();
    assert_eq!(a["qty"], 5);
}

/// Dropping a database removes its directory.
#[test]
fn test_drop_database_removes_files() {
    let temp_dir = create_temp_data_dir();
    populate(temp_dir.path());

    let engine = Engine::open(temp_dir.path()).unwrap();
    engine.drop_database("shop").unwrap();
    assert!(!temp_dir.path().join("shop").exists());
    assert!(engine.list_databases().unwrap().is_empty());
}

// =============================================================================
// Corruption Is Never Ignored
// =============================================================================

/// A changed byte inside the document array fails the checksum.
#[test]
fn test_tampered_collection_is_reported() {
    let temp_dir = create_temp_data_dir();
    populate(temp_dir.path());

    let path = collection_file(temp_dir.path());
    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains(r#""qty":7"#));
    fs::write(&path, content.replace(r#""qty":7"#, r#""qty":8"#)).unwrap();

    let engine = Engine::open(temp_dir.path()).unwrap();
    let err = engine.find("shop", "items", None).unwrap_err();
    assert_eq!(err.code(), EngineErrorCode::StorageFailure);
    assert!(
        err.message().to_lowercase().contains("checksum"),
        "error should mention checksum, got: {}",
        err
    );
}

/// A truncated unit is reported and writes to it are refused.
#[test]
fn test_truncated_collection_is_reported() {
    let temp_dir = create_temp_data_dir();
    populate(temp_dir.path());

    let path = collection_file(temp_dir.path());
    let content = fs::read(&path).unwrap();
    fs::write(&path, &content[..content.len() / 2]).unwrap();

    let engine = Engine::open(temp_dir.path()).unwrap();
    let err = engine.insert("shop", "items", json!({"sku": "d-4"})).unwrap_err();
    assert_eq!(err.code(), EngineErrorCode::StorageFailure);

    // The damaged file was not overwritten.
    assert_eq!(fs::read(&path).unwrap(), &content[..content.len() / 2]);
}

/// Leftover temp files from an interrupted write are ignored.
#[test]
fn test_leftover_temp_file_is_ignored() {
    let temp_dir = create_temp_data_dir();
    populate(temp_dir.path());
    fs::write(temp_dir.path().join("shop").join(".items.digitool.tmp"), "partial").unwrap();

    let engine = Engine::open(temp_dir.path()).unwrap();
    assert_eq!(engine.list_collections("shop").unwrap(), vec!["items"]);
    assert_eq!(engine.find("shop", "items", None).unwrap().len(), 3);
}

// =============================================================================
// Index Verification
// =============================================================================

/// An unreadable index unit is rebuilt on first use.
#[test]
fn test_corrupt_index_is_rebuilt_on_open() {
    let temp_dir = create_temp_data_dir();
    populate(temp_dir.path());
    fs::write(index_file(temp_dir.path(), "sku"), "garbage").unwrap();

    let engine = Engine::open(temp_dir.path()).unwrap();
    let found = engine
        .find("shop", "items", Some(&json!({"sku": "c-3"})))
        .unwrap();
    assert_eq!(found.len(), 1);

    let reports = engine.verify_indices("shop", "items").unwrap();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].consistent);
}

/// verify_indices reports and repairs a stale index unit.
#[test]
fn test_verify_repairs_stale_index() {
    let temp_dir = create_temp_data_dir();
    populate(temp_dir.path());

    let path = index_file(temp_dir.path(), "sku");
    fs::write(&path, r#"{"field":"sku","entries":[]}"#).unwrap();

    let engine = Engine::open(temp_dir.path()).unwrap();
    let reports = engine.verify_indices("shop", "items").unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].field, "sku");
    assert!(!reports[0].consistent);
    assert!(reports[0].rebuilt);

    let again = engine.verify_indices("shop", "items").unwrap();
    assert!(again[0].consistent);
    assert!(!again[0].rebuilt);

    let found = engine
        .find("shop", "items", Some(&json!({"sku": "a-1"})))
        .unwrap();
    assert_eq!(found.len(), 1);
}

/// An index unit holding another field is treated as corrupt.
#[test]
fn test_index_unit_for_wrong_field_is_rebuilt() {
    let temp_dir = create_temp_data_dir();
    populate(temp_dir.path());
    fs::write(
        index_file(temp_dir.path(), "sku"),
        r#"{"field":"qty","entries":[]}"#,
    )
    .unwrap();

    let engine = Engine::open(temp_dir.path()).unwrap();
    let reports = engine.verify_indices("shop", "items").unwrap();
    assert!(reports[0].rebuilt);
    assert_eq!(
        engine.find("shop", "items", Some(&json!({"sku": "b-2"}))).unwrap().len(),
        1
    );
}
