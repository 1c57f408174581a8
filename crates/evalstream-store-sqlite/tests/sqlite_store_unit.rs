// crates/evalstream-store-sqlite/tests/sqlite_store_unit.rs
// ============================================================================
// Module: SQLite Session Store Unit Tests
// Description: Targeted integrity tests for the SQLite session store.
// Purpose: Validate path safety, schema versioning, size limits, ownership,
//          and corruption detection.
// ============================================================================

//! ## Overview
//! Unit-level tests for `SQLite` store invariants:
//! - Path safety checks (empty/component/directory rejection)
//! - Schema version validation
//! - Hash verification and size limits on read
//! - Overwrite and ownership semantics for absent streams
//! - Failed overwrites leave the prior row untouched
//! - Durability across reopen and concurrent access

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::path::Path;
use std::sync::Arc;
use std::thread;

use evalstream_core::OwnershipMap;
use evalstream_core::SessionStore;
use evalstream_core::StateBlob;
use evalstream_core::StoreError;
use evalstream_core::StreamId;
use evalstream_core::UserId;
use evalstream_store_sqlite::MAX_STATE_BYTES;
use evalstream_store_sqlite::SqliteSessionStore;
use evalstream_store_sqlite::SqliteStoreConfig;
use evalstream_store_sqlite::SqliteStoreError;
use evalstream_store_sqlite::SqliteStoreMode;
use rusqlite::Connection;
use rusqlite::params;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn store_for(path: &Path) -> SqliteSessionStore {
    SqliteSessionStore::new(&SqliteStoreConfig::for_path(path)).expect("open store")
}

fn blob(text: &str) -> StateBlob {
    StateBlob::from_bytes(text.as_bytes().to_vec())
}

fn user(name: &str) -> UserId {
    UserId::new(name).expect("user id")
}

// ============================================================================
// SECTION: Path Safety
// ============================================================================

#[test]
fn sqlite_store_rejects_directory_path() {
    let temp = TempDir::new().unwrap();
    let result = SqliteSessionStore::new(&SqliteStoreConfig::for_path(temp.path()));
    assert!(matches!(result, Err(SqliteStoreError::Invalid(_))));
}

#[test]
fn sqlite_store_rejects_empty_path() {
    let result = SqliteSessionStore::new(&SqliteStoreConfig::for_path(""));
    assert!(matches!(result, Err(SqliteStoreError::Invalid(_))));
}

#[test]
fn sqlite_store_rejects_overlong_component() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("a".repeat(300)).join("store.db");
    let result = SqliteSessionStore::new(&SqliteStoreConfig::for_path(path));
    assert!(matches!(result, Err(SqliteStoreError::Invalid(_))));
}

#[test]
fn sqlite_store_creates_missing_parent_dirs() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("deeper").join("store.db");
    let mut config = SqliteStoreConfig::for_path(&path);
    config.journal_mode = SqliteStoreMode::Delete;
    SqliteSessionStore::new(&config).unwrap();
    assert!(path.exists());
}

// ============================================================================
// SECTION: Schema
// ============================================================================

#[test]
fn sqlite_store_rejects_unknown_schema_version() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.db");
    drop(store_for(&path));
    let connection = Connection::open(&path).unwrap();
    connection.execute("UPDATE store_meta SET version = ?1", params![99]).unwrap();
    drop(connection);
    let result = SqliteSessionStore::new(&SqliteStoreConfig::for_path(&path));
    assert!(matches!(result, Err(SqliteStoreError::VersionMismatch(_))));
}

// ============================================================================
// SECTION: Sessions
// ============================================================================

#[test]
fn sqlite_store_round_trips_blob_and_metadata() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.db"));
    let owner = user("alice");
    let id = store.create(&blob("one"), Some(&owner), "amazon_music").unwrap();
    let stored = store.read(&id).unwrap();
    assert_eq!(stored.blob, blob("one"));
    assert_eq!(stored.dataset_id, "amazon_music");
    assert_eq!(stored.owner_id, Some(owner));

    store.overwrite(&id, &blob("two")).unwrap();
    assert_eq!(store.read(&id).unwrap().blob, blob("two"));
    store.readiness().unwrap();
}

#[test]
fn sqlite_store_missing_stream_is_not_found() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.db"));
    let id = StreamId::new_v4();
    assert_eq!(store.read(&id).unwrap_err(), StoreError::NotFound(id));
    assert_eq!(store.overwrite(&id, &blob("x")).unwrap_err(), StoreError::NotFound(id));
}

#[test]
fn sqlite_store_persists_across_reopen() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.db");
    let id = store_for(&path).create(&blob("durable"), None, "movielens100k").unwrap();
    let reopened = store_for(&path);
    let stored = reopened.read(&id).unwrap();
    assert_eq!(stored.blob, blob("durable"));
    assert_eq!(stored.owner_id, None);
}

#[test]
fn sqlite_store_detects_hash_mismatch() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.db");
    let store = store_for(&path);
    let id = store.create(&blob("original"), None, "yelp").unwrap();
    let connection = Connection::open(&path).unwrap();
    connection
        .execute(
            "UPDATE streams SET state_blob = ?1 WHERE stream_id = ?2",
            params![b"tampered".to_vec(), id.to_string()],
        )
        .unwrap();
    assert!(matches!(store.read(&id), Err(StoreError::Corrupt(_))));
}

#[test]
fn sqlite_store_rejects_unknown_hash_algorithm() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.db");
    let store = store_for(&path);
    let id = store.create(&blob("original"), None, "yelp").unwrap();
    let connection = Connection::open(&path).unwrap();
    connection
        .execute(
            "UPDATE streams SET hash_algorithm = 'md5' WHERE stream_id = ?1",
            params![id.to_string()],
        )
        .unwrap();
    assert!(matches!(store.read(&id), Err(StoreError::Invalid(_))));
}

#[test]
fn sqlite_store_rejects_oversized_payload_on_load() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.db");
    let store = store_for(&path);
    let id = store.create(&blob("small"), None, "yelp").unwrap();
    let connection = Connection::open(&path).unwrap();
    connection
        .execute(
            "UPDATE streams SET state_blob = zeroblob(?1) WHERE stream_id = ?2",
            params![i64::try_from(MAX_STATE_BYTES + 1).unwrap(), id.to_string()],
        )
        .unwrap();
    let err = store.read(&id).unwrap_err();
    assert!(matches!(err, StoreError::Invalid(ref message) if message.contains("size limit")));
}

/// Reads the stored hash and update stamp straight from the table.
fn stored_row(path: &Path, id: &StreamId) -> (String, i64) {
    let connection = Connection::open(path).unwrap();
    connection
        .query_row(
            "SELECT state_hash, updated_at FROM streams WHERE stream_id = ?1",
            params![id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap()
}

#[test]
fn sqlite_failed_overwrite_keeps_prior_row() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.db");
    let store = store_for(&path);
    let id = store.create(&blob("before"), None, "yelp").unwrap();
    let row_before = stored_row(&path, &id);

    let connection = Connection::open(&path).unwrap();
    connection
        .execute_batch(
            "CREATE TRIGGER reject_blob_update BEFORE UPDATE ON streams \
             BEGIN SELECT RAISE(ABORT, 'blob update rejected'); END;",
        )
        .unwrap();

    let err = store.overwrite(&id, &blob("after")).unwrap_err();
    assert!(
        matches!(err, StoreError::Store(ref message) if message.contains("blob update rejected"))
    );
    assert_eq!(store.read(&id).unwrap().blob, blob("before"));
    assert_eq!(stored_row(&path, &id), row_before);

    connection.execute_batch("DROP TRIGGER reject_blob_update;").unwrap();
    store.overwrite(&id, &blob("after")).unwrap();
    assert_eq!(store.read(&id).unwrap().blob, blob("after"));
}

#[test]
fn sqlite_oversized_overwrite_keeps_prior_row() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.db");
    let store = store_for(&path);
    let id = store.create(&blob("before"), None, "yelp").unwrap();
    let row_before = stored_row(&path, &id);

    let oversized = StateBlob::from_bytes(vec![0_u8; MAX_STATE_BYTES + 1]);
    let err = store.overwrite(&id, &oversized).unwrap_err();
    assert!(matches!(err, StoreError::Invalid(ref message) if message.contains("size limit")));
    assert_eq!(store.read(&id).unwrap().blob, blob("before"));
    assert_eq!(stored_row(&path, &id), row_before);
}

#[test]
fn sqlite_create_reports_non_key_constraint_failures() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.db");
    let store = store_for(&path);
    let connection = Connection::open(&path).unwrap();
    connection
        .execute_batch(
            "CREATE TRIGGER reject_stream_insert BEFORE INSERT ON streams \
             BEGIN SELECT RAISE(ABORT, 'stream insert rejected'); END;",
        )
        .unwrap();

    let err = store.create(&blob("one"), None, "yelp").unwrap_err();
    let StoreError::Store(message) = &err else {
        panic!("expected a store error, got {err:?}");
    };
    assert!(message.contains("stream insert rejected"), "{message}");
    assert!(!message.contains("unique stream id"), "{message}");
    assert!(store.list_by_owner(&user("alice")).unwrap().is_empty());
}

// ============================================================================
// SECTION: Ownership
// ============================================================================

#[test]
fn sqlite_ownership_is_isolated_per_user() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.db"));
    let alice = user("alice");
    let bob = user("bob");
    let first = store.create(&blob("a1"), Some(&alice), "yelp").unwrap();
    let second = store.create(&blob("b1"), Some(&bob), "yelp").unwrap();
    let third = store.create(&blob("a2"), Some(&alice), "yelp").unwrap();
    for (owner, id) in [(&alice, &first), (&bob, &second), (&alice, &third)] {
        store.record(owner, id).unwrap();
    }
    store.record(&alice, &first).unwrap();

    assert_eq!(store.list_sessions(&alice).unwrap(), vec![first, third]);
    assert_eq!(store.list_sessions(&bob).unwrap(), vec![second]);
    assert_eq!(store.list_by_owner(&alice).unwrap(), vec![first, third]);
    assert!(store.is_owner(&first, &alice).unwrap());
    assert!(!store.is_owner(&first, &bob).unwrap());
    assert!(store.list_sessions(&user("carol")).unwrap().is_empty());
}

#[test]
fn sqlite_ownership_of_missing_stream_is_not_found() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.db"));
    let id = StreamId::new_v4();
    let alice = user("alice");
    assert_eq!(store.record(&alice, &id).unwrap_err(), StoreError::NotFound(id));
    assert_eq!(store.is_owner(&id, &alice).unwrap_err(), StoreError::NotFound(id));
}

// ============================================================================
// SECTION: Concurrency
// ============================================================================

#[test]
fn sqlite_store_handles_concurrent_writers() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(store_for(&temp.path().join("store.db")));
    let handles: Vec<_> = (0 .. 8)
        .map(|index| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let id = store.create(&blob(&format!("v{index}")), None, "yelp").unwrap();
                store.overwrite(&id, &blob(&format!("w{index}"))).unwrap();
                (index, id)
            })
        })
        .collect();
    for handle in handles {
        let (index, id) = handle.join().unwrap();
        assert_eq!(store.read(&id).unwrap().blob, blob(&format!("w{index}")));
    }
}
