//! Table Module
//!
//! Tables on top of the tree engine.
//!
//! ```text
//!   header.directory_root
//!            │
//!            ▼
//!   ┌──────────────────┐   name → TableSpec (record root, rows, counter, columns)
//!   │ Table Directory  │──────────────────────┐
//!   └──────────────────┘                      ▼
//!                                   ┌──────────────────┐
//!                                   │ Table Index      │  key → non-key columns
//!                                   └──────────────────┘
//! ```
//!
//! Both trees reject duplicate keys. Row count, counter and record root live
//! in the spec and are rewritten in place whenever they change.

mod directory;
mod index;
mod record;
mod spec;

pub use directory::{TableDirectory, TableNameKeys};
pub use index::{RecordKeys, TableIndex};
pub use record::Record;
pub use spec::{TableSpec, TableSpecBuilder, FIRST_COUNTER};
