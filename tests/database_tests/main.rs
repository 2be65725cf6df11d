//! Database-level tests

mod error_tests;
mod persistence_tests;

use std::io::Cursor;

use atlasdb::{Column, Config, Database, Record, SyncStrategy, TableSpec};

pub type MemDatabase = Database<Cursor<Vec<u8>>>;

pub fn config() -> Config {
    Config::builder().sync_strategy(SyncStrategy::Manual).build()
}

pub fn memory_db() -> MemDatabase {
    Database::create(Cursor::new(Vec::new()), config()).unwrap()
}

/// Close `db` and open its bytes again
pub fn reopen(db: MemDatabase) -> MemDatabase {
    let bytes = db.into_inner().into_inner();
    Database::open(Cursor::new(bytes), config()).unwrap()
}

/// Counter-keyed table: id, name (short string), score (int32)
pub fn players() -> TableSpec {
    TableSpec::builder("players")
        .key(Column::counter("id"))
        .column(Column::short_string("name"))
        .column(Column::int32("score"))
        .build()
        .unwrap()
}

pub fn player(name: &str, score: i32) -> Record {
    Record::new().with("name", name).with("score", score)
}
