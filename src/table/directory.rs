//! Table Directory
//!
//! Name-keyed tree of table specs. Node key = table name as a short string,
//! node value = the encoded [`TableSpec`]. Values are small and read on every
//! lookup, so they are loaded together with the keys.

use std::cmp::Ordering;
use std::ops::ControlFlow;

use crate::codec::{put_short_bytes, ByteReader};
use crate::error::{AtlasError, Result};
use crate::storage::{Address, FileAccessor, RootSlot, SegmentAllocator, StorageFile};
use crate::tree::{PersistentTree, TreeCheck, TreeStrategy, NODE_HEADER_SIZE};

use super::spec::TableSpec;

/// Key strategy of the directory tree
#[derive(Debug, Clone, Copy, Default)]
pub struct TableNameKeys;

impl TreeStrategy for TableNameKeys {
    type Key = String;

    fn name(&self) -> &str {
        "table-directory"
    }

    fn allow_duplicate_keys(&self) -> bool {
        false
    }

    fn key_bytes_hint(&self) -> usize {
        1 + crate::codec::SHORT_MAX
    }

    fn eager_value(&self) -> bool {
        true
    }

    fn decode_key(&self, _payload_len: usize, bytes: &[u8]) -> Result<(String, usize)> {
        let mut reader = ByteReader::new(bytes);
        let name = reader.read_short_str()?.to_string();
        Ok((name, reader.position()))
    }

    fn compare(&self, a: &String, b: &String) -> Ordering {
        a.as_bytes().cmp(b.as_bytes())
    }
}

/// Persisted name → table spec index
pub struct TableDirectory {
    tree: PersistentTree<TableNameKeys>,
}

impl TableDirectory {
    pub fn new(root: Address) -> Self {
        Self {
            tree: PersistentTree::new(TableNameKeys, root),
        }
    }

    pub fn tree(&self) -> &PersistentTree<TableNameKeys> {
        &self.tree
    }

    /// Directory node address and spec of table `name`
    pub fn lookup<F: StorageFile>(
        &mut self,
        file: &mut FileAccessor<F>,
        name: &str,
    ) -> Result<Option<(Address, TableSpec)>> {
        let Some(address) = self.tree.find(file, &name.to_string())? else {
            return Ok(None);
        };
        let value = self.tree.value(file, address)?;
        let spec = TableSpec::decode(name, &mut ByteReader::new(&value))?;
        Ok(Some((address, spec)))
    }

    /// Store a new table spec; returns its directory node address
    pub fn create<F: StorageFile>(
        &mut self,
        file: &mut FileAccessor<F>,
        allocator: &mut SegmentAllocator,
        spec: &TableSpec,
    ) -> Result<Address> {
        let name = spec.name().to_string();
        if self.tree.find(file, &name)?.is_some() {
            return Err(AtlasError::TableExists(name));
        }

        let mut key = Vec::with_capacity(1 + name.len());
        put_short_bytes(&mut key, name.as_bytes());
        let value = spec.encode_to_vec();

        let mut segment = allocator.acquire(file, NODE_HEADER_SIZE + key.len() + value.len())?;
        segment.put(NODE_HEADER_SIZE, &key)?;
        segment.put(NODE_HEADER_SIZE + key.len(), &value)?;
        file.write_segment(&segment)?;
        self.tree
            .insert(file, segment.address(), name, key.len(), segment.payload_len())?;

        tracing::debug!(
            "created table {} ({} columns) at directory node {}",
            spec.name(),
            spec.columns().len() + 1,
            segment.address()
        );
        Ok(segment.address())
    }

    /// Rewrite the spec stored at `address`
    pub fn update<F: StorageFile>(
        &mut self,
        file: &mut FileAccessor<F>,
        address: Address,
        spec: &TableSpec,
    ) -> Result<()> {
        self.tree.load(file, address)?;
        self.tree.set_value(address, spec.encode_to_vec())
    }

    /// Unlink table `name` and release its directory node
    pub fn remove<F: StorageFile>(
        &mut self,
        file: &mut FileAccessor<F>,
        allocator: &mut SegmentAllocator,
        name: &str,
    ) -> Result<()> {
        let address = self
            .tree
            .remove(file, &name.to_string())?
            .ok_or_else(|| AtlasError::TableNotFound(name.to_string()))?;
        allocator.release(file, address)?;
        tracing::debug!("dropped table {} (directory node {})", name, address);
        Ok(())
    }

    /// Table names in byte order
    pub fn names<F: StorageFile>(&mut self, file: &mut FileAccessor<F>) -> Result<Vec<String>> {
        let mut names = Vec::new();
        self.tree.walk(file, |_, node| {
            names.push(node.key().clone());
            Ok(ControlFlow::Continue(()))
        })?;
        Ok(names)
    }

    /// Write directory changes and record a moved root in the header
    pub fn flush<F: StorageFile>(&mut self, file: &mut FileAccessor<F>) -> Result<usize> {
        let outcome = self.tree.flush(file)?;
        if let Some(root) = outcome.new_root {
            file.set_root(RootSlot::TableDirectory, root);
        }
        Ok(outcome.nodes_written)
    }

    pub fn check<F: StorageFile>(&mut self, file: &mut FileAccessor<F>) -> Result<TreeCheck> {
        self.tree.check(file)
    }

    pub(crate) fn trim_cache(&mut self, limit: usize) {
        if self.tree.cached_count() > limit && self.tree.dirty_count() == 0 {
            self.tree.clear_cache();
        }
    }
}
