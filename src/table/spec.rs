//! Table Spec
//!
//! ## Encoding (directory node value)
//! ```text
//! ┌──────────────┬───────────┬────────────┬───────────────┬───────────┬───────────────┐
//! │ Key column   │ Root (4)  │ Rows (4)   │ NextCounter(8)│ Count (2) │ Column specs  │
//! └──────────────┴───────────┴────────────┴───────────────┴───────────┴───────────────┘
//! ```
//! The encoding has a fixed size for a given schema, so directory updates are
//! always written in place.

use std::collections::HashSet;

use bytes::BufMut;

use crate::codec::{ByteReader, SHORT_MAX};
use crate::column::{Column, ColumnType};
use crate::error::{AtlasError, Result};
use crate::storage::{Address, NULL_ADDRESS};

/// First key handed out by a counter table
pub const FIRST_COUNTER: i64 = 1;

/// Schema and bookkeeping of one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    name: String,
    key: Column,
    columns: Vec<Column>,
    root: Address,
    row_count: u32,
    next_counter: i64,
}

impl TableSpec {
    /// Start building a table called `name`
    pub fn builder(name: impl Into<String>) -> TableSpecBuilder {
        TableSpecBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Primary-key column
    pub fn key_column(&self) -> &Column {
        &self.key
    }

    /// Non-key columns in schema order
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Any column (key included) by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        if self.key.name() == name {
            return Some(&self.key);
        }
        self.columns.iter().find(|c| c.name() == name)
    }

    /// Root of the record tree (0 = no records)
    pub fn root(&self) -> Address {
        self.root
    }

    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    /// Key the next counter insert receives
    pub fn next_counter(&self) -> i64 {
        self.next_counter
    }

    pub fn is_counter_keyed(&self) -> bool {
        self.key.column_type() == ColumnType::Counter
    }

    pub(crate) fn set_root(&mut self, root: Address) {
        self.root = root;
    }

    pub(crate) fn set_row_count(&mut self, rows: u32) {
        self.row_count = rows;
    }

    pub(crate) fn set_next_counter(&mut self, next: i64) {
        self.next_counter = next;
    }

    // =========================================================================
    // Encoding
    // =========================================================================

    /// Bytes taken by [`encode`](Self::encode)
    pub fn encoded_len(&self) -> usize {
        self.key.spec_len()
            + 4
            + 4
            + 8
            + 2
            + self.columns.iter().map(Column::spec_len).sum::<usize>()
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        self.key.encode_spec(buf);
        buf.put_i32(self.root as i32);
        buf.put_u32(self.row_count);
        buf.put_i64(self.next_counter);
        buf.put_u16(self.columns.len() as u16);
        for column in &self.columns {
            column.encode_spec(buf);
        }
    }

    pub fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf
    }

    /// Decode the spec of table `name` from a directory value
    pub fn decode(name: impl Into<String>, reader: &mut ByteReader<'_>) -> Result<Self> {
        let name = name.into();
        let key = Column::decode_spec(reader)?;
        let root = reader.read_i32()?;
        if root < 0 {
            return Err(AtlasError::format(format!(
                "table {} has negative record root {}",
                name, root
            )));
        }
        let row_count = reader.read_u32()?;
        let next_counter = reader.read_i64()?;
        let count = reader.read_u16()? as usize;
        let mut columns = Vec::with_capacity(count);
        for _ in 0..count {
            columns.push(Column::decode_spec(reader)?);
        }

        Ok(Self {
            name,
            key,
            columns,
            root: root as Address,
            row_count,
            next_counter,
        })
    }
}

/// Builder for [`TableSpec`]
///
/// Consumed by `build`, so a finished spec can no longer be changed through it.
#[derive(Debug)]
pub struct TableSpecBuilder {
    name: String,
    key: Option<Column>,
    columns: Vec<Column>,
}

impl TableSpecBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: None,
            columns: Vec::new(),
        }
    }

    /// Set the primary-key column
    pub fn key(mut self, column: Column) -> Self {
        self.key = Some(column);
        self
    }

    /// Append a non-key column
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Validate and produce the spec
    pub fn build(self) -> Result<TableSpec> {
        check_name("table", &self.name)?;
        let key = self
            .key
            .ok_or_else(|| AtlasError::Schema(format!("table {} has no key column", self.name)))?;
        if !key.column_type().is_key_capable() {
            return Err(AtlasError::Schema(format!(
                "column {} of type {:?} cannot be a key",
                key.name(),
                key.column_type()
            )));
        }
        if self.columns.len() > u16::MAX as usize {
            return Err(AtlasError::Schema(format!(
                "table {} has {} columns, at most {} allowed",
                self.name,
                self.columns.len(),
                u16::MAX
            )));
        }

        let mut seen = HashSet::new();
        for column in std::iter::once(&key).chain(&self.columns) {
            check_name("column", column.name())?;
            if !seen.insert(column.name()) {
                return Err(AtlasError::Schema(format!(
                    "duplicate column {} in table {}",
                    column.name(),
                    self.name
                )));
            }
        }
        if let Some(counter) = self
            .columns
            .iter()
            .find(|c| c.column_type() == ColumnType::Counter)
        {
            return Err(AtlasError::Schema(format!(
                "counter column {} must be the key",
                counter.name()
            )));
        }

        Ok(TableSpec {
            name: self.name,
            key,
            columns: self.columns,
            root: NULL_ADDRESS,
            row_count: 0,
            next_counter: FIRST_COUNTER,
        })
    }
}

fn check_name(what: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(AtlasError::Schema(format!("empty {} name", what)));
    }
    if name.len() > SHORT_MAX {
        return Err(AtlasError::Schema(format!(
            "{} name of {} bytes exceeds {}",
            what,
            name.len(),
            SHORT_MAX
        )));
    }
    Ok(())
}
