//! Tests for error reporting at the database boundary
//!
//! These tests verify:
//! - Corrupt signature, version and reserved fields are file-format errors
//! - Logical misuse maps to the matching typed error
//! - Failed operations leave committed state untouched

use std::io::Cursor;

use atlasdb::{AtlasError, Column, Database, ErrorKind, Record, TableSpec};

use crate::{config, memory_db, player, players, reopen};

fn populated_bytes() -> Vec<u8> {
    let mut db = memory_db();
    db.create_table(players()).unwrap();
    db.insert("players", &player("ann", 1)).unwrap();
    db.into_inner().into_inner()
}

#[test]
fn test_every_signature_byte_is_checked() {
    let bytes = populated_bytes();
    for i in 0..16 {
        let mut corrupt = bytes.clone();
        corrupt[i] ^= 0xFF;
        let err = Database::open(Cursor::new(corrupt), config()).err().unwrap();
        assert!(matches!(err, AtlasError::BadSignature), "byte {}", i);
    }
}

#[test]
fn test_unsupported_version() {
    let mut bytes = populated_bytes();
    bytes[16..18].copy_from_slice(&2u16.to_be_bytes());

    let err = Database::open(Cursor::new(bytes), config()).err().unwrap();
    assert!(matches!(err, AtlasError::UnsupportedVersion { found: 2, supported: 1 }));
    assert_eq!(err.kind(), ErrorKind::FileFormat);
}

#[test]
fn test_nonzero_reserved_field() {
    let mut bytes = populated_bytes();
    bytes[22..26].copy_from_slice(&1i32.to_be_bytes());

    let err = Database::open(Cursor::new(bytes), config()).err().unwrap();
    assert!(err.is_file_format());
}

#[test]
fn test_corrupt_record_node_found_by_verify() {
    let mut db = memory_db();
    db.create_table(players()).unwrap();
    db.insert("players", &player("ann", 1)).unwrap();
    db.insert("players", &player("bob", 2)).unwrap();
    let root = db.table_spec("players").unwrap().root() as usize;
    let mut bytes = db.into_inner().into_inner();

    // root node height byte sits after the length prefix and both children
    bytes[root + 4 + 8] = 7;
    let mut db = Database::open(Cursor::new(bytes), config()).unwrap();
    assert!(db.verify().unwrap_err().is_file_format());
}

#[test]
fn test_unknown_table() {
    let mut db = memory_db();
    assert!(matches!(db.find("nope", 1i64), Err(AtlasError::TableNotFound(_))));
    assert!(matches!(db.insert("nope", &Record::new()), Err(AtlasError::TableNotFound(_))));
    assert!(matches!(db.drop_table("nope"), Err(AtlasError::TableNotFound(_))));
}

#[test]
fn test_duplicate_table() {
    let mut db = memory_db();
    db.create_table(players()).unwrap();
    let err = db.create_table(players()).unwrap_err();
    assert!(matches!(err, AtlasError::TableExists(_)));
    assert_eq!(db.table_names().unwrap().len(), 1);
}

#[test]
fn test_key_errors() {
    let mut db = memory_db();
    db.create_table(players()).unwrap();
    db.insert("players", &player("ann", 1)).unwrap();

    let err = db.find("players", "1").unwrap_err();
    assert!(matches!(err, AtlasError::KeyTypeMismatch { .. }));

    let err = db.delete("players", 5i64).unwrap_err();
    assert!(matches!(err, AtlasError::KeyNotFound(_)));
    assert_eq!(err.kind(), ErrorKind::Logical);

    let err = db.insert("players", &player("x", 1).with("id", 1i64)).unwrap_err();
    assert!(matches!(err, AtlasError::KeyTypeMismatch { .. }));
}

#[test]
fn test_duplicate_key_leaves_table_unchanged() {
    let mut db = memory_db();
    let spec = TableSpec::builder("tags")
        .key(Column::short_string("tag"))
        .build()
        .unwrap();
    db.create_table(spec).unwrap();
    db.insert("tags", &Record::new().with("tag", "rust")).unwrap();

    let err = db.insert("tags", &Record::new().with("tag", "rust")).unwrap_err();
    assert!(matches!(err, AtlasError::DuplicateKey(_)));

    let mut db = reopen(db);
    assert_eq!(db.row_count("tags").unwrap(), 1);
    db.verify().unwrap();
}

#[test]
fn test_value_out_of_range_rejected() {
    let mut db = memory_db();
    let spec = TableSpec::builder("small")
        .key(Column::uint8("id"))
        .build()
        .unwrap();
    db.create_table(spec).unwrap();

    let err = db.insert("small", &Record::new().with("id", 300u32)).unwrap_err();
    assert!(matches!(err, AtlasError::ValueOutOfRange { .. }));
    assert_eq!(db.row_count("small").unwrap(), 0);
}

#[test]
fn test_schema_errors() {
    let err = TableSpec::builder("t").key(Column::float64("f")).build().unwrap_err();
    assert!(matches!(err, AtlasError::Schema(_)));

    let err = TableSpec::builder("t")
        .key(Column::int32("a"))
        .column(Column::short_string("a"))
        .build()
        .unwrap_err();
    assert!(matches!(err, AtlasError::Schema(_)));

    let err = TableSpec::builder("x".repeat(256)).key(Column::int32("a")).build().unwrap_err();
    assert!(matches!(err, AtlasError::Schema(_)));
}
