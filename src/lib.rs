//! # AtlasDB
//!
//! An embeddable, single-file table store with:
//! - A segment heap: one file, variable-length length-prefixed segments
//! - Free-space reuse through a size-keyed tree of idle segments
//! - AVL trees persisted in place, linked by file offsets
//! - A typed, big-endian column codec for record payloads
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Database                              │
//! │            (open tables, record ops, commit)                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  Directory  │          │ Table Index │──── Column codec
//!   │ (name→spec) │          │ (key→record)│
//!   └──────┬──────┘          └──────┬──────┘
//!          └────────────┬────────────┘
//!                       ▼
//!               ┌───────────────┐        ┌──────────────────┐
//!               │ PersistentTree│◄───────│ SegmentAllocator │
//!               │  (AVL engine) │        │  (idle tree)     │
//!               └───────┬───────┘        └────────┬─────────┘
//!                       └────────────┬────────────┘
//!                                    ▼
//!                           ┌─────────────────┐
//!                           │  FileAccessor   │
//!                           │ (header, I/O)   │
//!                           └─────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::io::Cursor;
//! use atlasdb::{Column, Config, Database, Record, TableSpec};
//!
//! # fn main() -> atlasdb::Result<()> {
//! let mut db = Database::create(Cursor::new(Vec::new()), Config::default())?;
//! db.create_table(
//!     TableSpec::builder("people")
//!         .key(Column::counter("id"))
//!         .column(Column::short_string("name"))
//!         .build()?,
//! )?;
//! let id = db.insert("people", &Record::new().with("name", "Ada"))?;
//! assert!(db.find("people", id)?.is_some());
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod codec;
pub mod storage;
pub mod tree;
pub mod column;
pub mod table;
pub mod database;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{guard_internal, AtlasError, ErrorKind, Result};
pub use config::{Config, SyncStrategy};
pub use column::{Column, ColumnType, Value};
pub use table::{Record, TableSpec, TableSpecBuilder};
pub use database::{Database, TableReport, VerifyReport};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of AtlasDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
