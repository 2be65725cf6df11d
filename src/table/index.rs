//! Table Index
//!
//! Record tree of one table, keyed by its primary-key column. Node loads read
//! only the header and key; record values are read on demand.

use std::cmp::Ordering;
use std::ops::ControlFlow;

use crate::codec::ByteReader;
use crate::column::{Column, Value};
use crate::error::{AtlasError, Result};
use crate::storage::{Address, FileAccessor, SegmentAllocator, StorageFile};
use crate::tree::{PersistentTree, TreeCheck, TreeStrategy, NODE_HEADER_SIZE};

use super::record::{self, Record};
use super::spec::TableSpec;

/// Key strategy of a record tree: the table's key column
#[derive(Debug, Clone)]
pub struct RecordKeys {
    key: Column,
}

impl RecordKeys {
    pub fn new(key: Column) -> Self {
        Self { key }
    }
}

impl TreeStrategy for RecordKeys {
    type Key = Value;

    fn name(&self) -> &str {
        "records"
    }

    fn allow_duplicate_keys(&self) -> bool {
        false
    }

    fn key_bytes_hint(&self) -> usize {
        self.key.size_hint()
    }

    fn decode_key(&self, _payload_len: usize, bytes: &[u8]) -> Result<(Value, usize)> {
        let mut reader = ByteReader::new(bytes);
        let key = self.key.decode(&mut reader)?;
        Ok((key, reader.position()))
    }

    fn compare(&self, a: &Value, b: &Value) -> Ordering {
        a.key_cmp(b)
    }
}

/// An open table: its spec plus its record tree
pub struct TableIndex {
    spec: TableSpec,
    directory_address: Address,
    tree: PersistentTree<RecordKeys>,
    spec_dirty: bool,
}

impl TableIndex {
    /// Open the table whose spec lives at directory node `directory_address`
    pub fn new(spec: TableSpec, directory_address: Address) -> Self {
        let tree = PersistentTree::new(RecordKeys::new(spec.key_column().clone()), spec.root());
        Self {
            spec,
            directory_address,
            tree,
            spec_dirty: false,
        }
    }

    pub fn spec(&self) -> &TableSpec {
        &self.spec
    }

    pub fn directory_address(&self) -> Address {
        self.directory_address
    }

    pub fn tree(&self) -> &PersistentTree<RecordKeys> {
        &self.tree
    }

    /// Root, row count or counter changed since the spec was last stored
    pub fn spec_dirty(&self) -> bool {
        self.spec_dirty
    }

    pub(crate) fn mark_spec_clean(&mut self) {
        self.spec_dirty = false;
    }

    // =========================================================================
    // Keys
    // =========================================================================

    /// Check `key` against the key column and bring it to its stored form
    ///
    /// Over-long string keys are truncated exactly as the encoding would.
    fn normalize_key(&self, key: &Value) -> Result<Value> {
        let column = self.spec.key_column();
        column.normalize(key).map_err(|e| match e {
            AtlasError::TypeMismatch { column, expected, found } => {
                AtlasError::KeyTypeMismatch { column, expected, found }
            }
            other => other,
        })
    }

    fn key_of_new_record(&self, record: &Record) -> Result<Value> {
        let column = self.spec.key_column();
        if self.spec.is_counter_keyed() {
            if let Some(supplied) = record.get(column.name()) {
                return Err(AtlasError::KeyTypeMismatch {
                    column: column.name().to_string(),
                    expected: "generated counter",
                    found: supplied.kind_name(),
                });
            }
            return Ok(Value::Int(self.spec.next_counter()));
        }
        let key = record
            .get(column.name())
            .ok_or_else(|| {
                AtlasError::MissingColumn(format!("{}.{}", self.spec.name(), column.name()))
            })?;
        self.normalize_key(key)
    }

    fn describe(&self, key: &Value) -> String {
        format!("{}[{}]", self.spec.name(), key)
    }

    /// Write a node for `key` into a newly acquired segment
    ///
    /// Returns (address, key length, payload length); the node header is
    /// written once the node is linked and flushed.
    fn write_node<F: StorageFile>(
        &self,
        file: &mut FileAccessor<F>,
        allocator: &mut SegmentAllocator,
        key: &Value,
        columns: &[u8],
    ) -> Result<(Address, usize, usize)> {
        let key_bytes = self.spec.key_column().encode_to_vec(key)?;
        let size = NODE_HEADER_SIZE + key_bytes.len() + columns.len();
        let mut segment = allocator.acquire(file, size)?;
        segment.put(NODE_HEADER_SIZE, &key_bytes)?;
        segment.put(NODE_HEADER_SIZE + key_bytes.len(), columns)?;
        file.write_segment(&segment)?;
        Ok((segment.address(), key_bytes.len(), segment.payload_len()))
    }

    // =========================================================================
    // Record Operations
    // =========================================================================

    /// Insert `record`; returns its key
    ///
    /// Counter tables assign the key themselves; every other table takes it
    /// from the record's key column.
    pub fn insert<F: StorageFile>(
        &mut self,
        file: &mut FileAccessor<F>,
        allocator: &mut SegmentAllocator,
        record: &Record,
    ) -> Result<Value> {
        let key = self.key_of_new_record(record)?;
        let columns = record::encode_columns(&self.spec, record)?;
        let rows = self
            .spec
            .row_count()
            .checked_add(1)
            .ok_or(AtlasError::CapacityExceeded {
                what: "table row count",
                size: u32::MAX as u64 + 1,
                max: u32::MAX as u64,
            })?;
        let counter = if self.spec.is_counter_keyed() {
            let next = self
                .spec
                .next_counter()
                .checked_add(1)
                .ok_or(AtlasError::CapacityExceeded {
                    what: "table counter",
                    size: i64::MAX as u64 + 1,
                    max: i64::MAX as u64,
                })?;
            Some(next)
        } else {
            None
        };
        if self.tree.find(file, &key)?.is_some() {
            return Err(AtlasError::DuplicateKey(self.describe(&key)));
        }

        let (address, key_len, payload_len) = self.write_node(file, allocator, &key, &columns)?;
        self.tree.insert(file, address, key.clone(), key_len, payload_len)?;
        if let Some(counter) = counter {
            self.spec.set_next_counter(counter);
        }
        self.spec.set_row_count(rows);
        self.spec_dirty = true;

        tracing::trace!("{}: inserted at node {}", self.describe(&key), address);
        Ok(key)
    }

    /// Record stored under `key`
    pub fn find<F: StorageFile>(
        &mut self,
        file: &mut FileAccessor<F>,
        key: &Value,
    ) -> Result<Option<Record>> {
        let key = self.normalize_key(key)?;
        let Some(address) = self.tree.find(file, &key)? else {
            return Ok(None);
        };
        let value = self.tree.value(file, address)?;
        record::decode_record(&self.spec, key, &value).map(Some)
    }

    /// Remove the record under `key` and release its segment
    pub fn delete<F: StorageFile>(
        &mut self,
        file: &mut FileAccessor<F>,
        allocator: &mut SegmentAllocator,
        key: &Value,
    ) -> Result<()> {
        let key = self.normalize_key(key)?;
        let address = self
            .tree
            .remove(file, &key)?
            .ok_or_else(|| AtlasError::KeyNotFound(self.describe(&key)))?;
        allocator.release(file, address)?;

        self.spec.set_row_count(self.spec.row_count().saturating_sub(1));
        self.spec_dirty = true;
        tracing::trace!("{}: deleted node {}", self.describe(&key), address);
        Ok(())
    }

    /// Overwrite columns of the record under `key`
    ///
    /// Columns missing from `record` keep their stored values. The record is
    /// rewritten in place when it still fits its segment, otherwise it moves
    /// to a new segment and the old one is released.
    pub fn replace<F: StorageFile>(
        &mut self,
        file: &mut FileAccessor<F>,
        allocator: &mut SegmentAllocator,
        key: &Value,
        record: &Record,
    ) -> Result<()> {
        let key = self.normalize_key(key)?;
        record::check_columns(&self.spec, record)?;
        let key_name = self.spec.key_column().name().to_string();
        if let Some(new_key) = record.get(&key_name) {
            if self.normalize_key(new_key)?.key_cmp(&key) != Ordering::Equal {
                return Err(AtlasError::Schema(format!(
                    "replace cannot change key of {} to {}",
                    self.describe(&key),
                    new_key
                )));
            }
        }

        let address = self
            .tree
            .find(file, &key)?
            .ok_or_else(|| AtlasError::KeyNotFound(self.describe(&key)))?;
        let stored = self.tree.value(file, address)?;
        let mut merged = record::decode_record(&self.spec, key.clone(), &stored)?;
        for (column, value) in record {
            merged.set(column.clone(), value.clone());
        }
        let columns = record::encode_columns(&self.spec, &merged)?;

        let node = self.tree.load(file, address)?;
        if node.value_offset() + columns.len() <= node.payload_len() {
            self.tree.set_value(address, columns)?;
            tracing::trace!("{}: replaced in place at node {}", self.describe(&key), address);
            return Ok(());
        }

        // the new segment is acquired before the old one is released
        let moved_to = self.insert_moved(file, allocator, &key, &columns, address)?;
        tracing::trace!(
            "{}: moved from node {} to {}",
            self.describe(&key),
            address,
            moved_to
        );
        Ok(())
    }

    fn insert_moved<F: StorageFile>(
        &mut self,
        file: &mut FileAccessor<F>,
        allocator: &mut SegmentAllocator,
        key: &Value,
        columns: &[u8],
        old: Address,
    ) -> Result<Address> {
        let (address, key_len, payload_len) = self.write_node(file, allocator, key, columns)?;
        let removed = self.tree.remove(file, key)?;
        debug_assert_eq!(removed, Some(old));
        allocator.release(file, old)?;
        self.tree.insert(file, address, key.clone(), key_len, payload_len)?;
        Ok(address)
    }

    /// Visit records in ascending key order until the visitor breaks
    ///
    /// Returns `true` when every record was visited.
    pub fn iterate<F, V>(&mut self, file: &mut FileAccessor<F>, mut visit: V) -> Result<bool>
    where
        F: StorageFile,
        V: FnMut(Record) -> ControlFlow<()>,
    {
        let spec = &self.spec;
        self.tree.walk(file, |file, node| {
            let record = match node.cached_value() {
                Some(value) => record::decode_record(spec, node.key().clone(), value)?,
                None => {
                    let segment = file.read_segment(node.address())?;
                    let value = segment.payload().get(node.value_offset()..).ok_or_else(|| {
                        AtlasError::format(format!(
                            "record node {} value offset {} past payload",
                            node.address(),
                            node.value_offset()
                        ))
                    })?;
                    record::decode_record(spec, node.key().clone(), value)?
                }
            };
            Ok(visit(record))
        })
    }

    /// Every record segment address, in key order
    pub(crate) fn node_addresses<F: StorageFile>(
        &mut self,
        file: &mut FileAccessor<F>,
    ) -> Result<Vec<Address>> {
        let mut addresses = Vec::with_capacity(self.spec.row_count() as usize);
        self.tree.walk(file, |_, node| {
            addresses.push(node.address());
            Ok(ControlFlow::Continue(()))
        })?;
        Ok(addresses)
    }

    /// Write record-tree changes; a moved root is folded into the spec
    ///
    /// Returns the number of nodes written. Check [`spec_dirty`](Self::spec_dirty)
    /// afterwards to see whether the directory entry needs rewriting.
    pub fn flush<F: StorageFile>(&mut self, file: &mut FileAccessor<F>) -> Result<usize> {
        let outcome = self.tree.flush(file)?;
        if let Some(root) = outcome.new_root {
            self.spec.set_root(root);
            self.spec_dirty = true;
        }
        Ok(outcome.nodes_written)
    }

    /// Structural check plus row-count agreement
    pub fn check<F: StorageFile>(&mut self, file: &mut FileAccessor<F>) -> Result<TreeCheck> {
        let check = self.tree.check(file)?;
        if check.nodes != self.spec.row_count() as u64 {
            return Err(AtlasError::format(format!(
                "table {} records {} rows but its tree holds {}",
                self.spec.name(),
                self.spec.row_count(),
                check.nodes
            )));
        }
        Ok(check)
    }

    pub(crate) fn trim_cache(&mut self, limit: usize) {
        if self.tree.cached_count() > limit && self.tree.dirty_count() == 0 {
            self.tree.clear_cache();
        }
    }
}
