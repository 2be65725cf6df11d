//! Tests for on-disk persistence
//!
//! These tests verify:
//! - Path constructors create, refuse and reopen files
//! - Data survives closing and reopening a real file
//! - Caller-owned streams are handed back untouched

use std::io::Cursor;

use atlasdb::{Config, Database, SyncStrategy, Value};
use tempfile::TempDir;

use crate::{config, player, players};

fn path_config(dir: &TempDir) -> Config {
    Config::builder().path(dir.path().join("atlas.db")).build()
}

#[test]
fn test_create_path_then_open_path() {
    let dir = TempDir::new().unwrap();
    {
        let mut db = Database::create_path(path_config(&dir)).unwrap();
        db.create_table(players()).unwrap();
        db.insert("players", &player("ann", 7)).unwrap();
        db.insert("players", &player("bob", 8)).unwrap();
    }

    let mut db = Database::open_path(path_config(&dir)).unwrap();
    assert_eq!(db.table_names().unwrap(), vec!["players"]);
    let found = db.find("players", 2i64).unwrap().unwrap();
    assert_eq!(found.get("name"), Some(&Value::from("bob")));
    assert_eq!(db.insert("players", &player("cid", 9)).unwrap(), Value::Int(3));
}

#[test]
fn test_create_path_refuses_existing_file() {
    let dir = TempDir::new().unwrap();
    Database::create_path(path_config(&dir)).unwrap();

    let err = Database::create_path(path_config(&dir)).err().unwrap();
    assert_eq!(err.kind(), atlasdb::ErrorKind::Io);
}

#[test]
fn test_open_path_creates_when_missing() {
    let dir = TempDir::new().unwrap();
    let db = Database::open_path(path_config(&dir)).unwrap();
    assert_eq!(db.header().next_segment_address, 34);
    assert!(dir.path().join("atlas.db").exists());
}

#[test]
fn test_open_path_without_create() {
    let dir = TempDir::new().unwrap();
    let config = Config::builder()
        .path(dir.path().join("missing.db"))
        .create_if_missing(false)
        .build();

    assert!(Database::open_path(config).is_err());
}

#[test]
fn test_verify_on_open() {
    let dir = TempDir::new().unwrap();
    {
        let mut db = Database::create_path(path_config(&dir)).unwrap();
        db.create_table(players()).unwrap();
        for i in 0..20 {
            db.insert("players", &player("p", i)).unwrap();
        }
        for key in [3i64, 9, 15] {
            db.delete("players", key).unwrap();
        }
    }

    let config = Config::builder()
        .path(dir.path().join("atlas.db"))
        .verify_on_open(true)
        .build();
    let mut db = Database::open_path(config).unwrap();
    assert_eq!(db.row_count("players").unwrap(), 17);
}

#[test]
fn test_many_rows_with_small_cache() {
    let dir = TempDir::new().unwrap();
    let config = Config::builder()
        .path(dir.path().join("atlas.db"))
        .sync_strategy(SyncStrategy::Manual)
        .node_cache_limit(8)
        .build();
    let mut db = Database::create_path(config.clone()).unwrap();
    db.create_table(players()).unwrap();
    for i in 0..200 {
        db.insert("players", &player("p", i)).unwrap();
    }
    db.sync().unwrap();
    drop(db);

    let mut db = Database::open_path(config).unwrap();
    for key in [1i64, 100, 200] {
        let found = db.find("players", key).unwrap().unwrap();
        assert_eq!(found.get("score"), Some(&Value::Int(key - 1)));
    }
    let report = db.verify().unwrap();
    assert_eq!(report.tables[0].rows, 200);
    assert!(report.tables[0].height <= 10);
}

#[test]
fn test_borrowed_stream_stays_with_caller() {
    let mut bytes = Vec::new();
    {
        let mut db = Database::create(Cursor::new(&mut bytes), config()).unwrap();
        db.create_table(players()).unwrap();
        db.insert("players", &player("ann", 1)).unwrap();
    }
    assert!(bytes.len() > 34);

    let mut db = Database::open(Cursor::new(&mut bytes), config()).unwrap();
    assert_eq!(db.row_count("players").unwrap(), 1);
}

#[test]
fn test_io_stats_count_commit_writes() {
    let mut db = crate::memory_db();
    let before = db.stats();
    db.create_table(players()).unwrap();
    let after = db.stats();

    assert!(after.writes > before.writes);
    assert!(after.bytes_written > before.bytes_written);
}
