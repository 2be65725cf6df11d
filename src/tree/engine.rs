//! Persistent Tree Engine
//!
//! AVL insert/remove/search over file-offset links with a per-session node
//! cache. The cache owns every in-memory node; parents only hold addresses.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::ops::ControlFlow;

use crate::codec::ByteReader;
use crate::error::{AtlasError, Result};
use crate::storage::{Address, FileAccessor, StorageFile, NULL_ADDRESS};

use super::node::{NodeHeader, TreeNode, NODE_HEADER_SIZE};
use super::TreeStrategy;

/// Deeper than any balanced tree that fits in a 2 GiB file
const MAX_DEPTH: usize = 64;

/// What a flush wrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    /// Nodes whose header and/or value went to the file
    pub nodes_written: usize,
    /// The root address, if it moved since the previous flush
    pub new_root: Option<Address>,
}

/// Result of a structural check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeCheck {
    pub nodes: u64,
    pub height: u8,
}

/// An AVL tree stored in segments, parameterised by a [`TreeStrategy`]
pub struct PersistentTree<S: TreeStrategy> {
    strategy: S,
    root: Address,
    flushed_root: Address,
    nodes: BTreeMap<Address, TreeNode<S::Key>>,
}

impl<S: TreeStrategy> PersistentTree<S> {
    /// Attach to a tree whose persisted root is `root` (0 = empty)
    pub fn new(strategy: S, root: Address) -> Self {
        Self {
            strategy,
            root,
            flushed_root: root,
            nodes: BTreeMap::new(),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn root(&self) -> Address {
        self.root
    }

    /// Point the tree at a new root; persisted by the next flush
    pub fn set_root(&mut self, root: Address) {
        self.root = root;
    }

    pub fn is_empty(&self) -> bool {
        self.root == NULL_ADDRESS
    }

    pub fn allow_duplicate_keys(&self) -> bool {
        self.strategy.allow_duplicate_keys()
    }

    /// Number of cached nodes with unwritten changes
    pub fn dirty_count(&self) -> usize {
        self.nodes.values().filter(|n| n.is_dirty()).count()
    }

    pub fn cached_count(&self) -> usize {
        self.nodes.len()
    }

    /// Dirty nodes or an unreported root move
    pub fn has_pending_changes(&self) -> bool {
        self.root != self.flushed_root || self.dirty_count() > 0
    }

    /// Drop every cached node
    ///
    /// # Panics
    /// If any node is still dirty: discarding it would lose tree structure.
    pub fn clear_cache(&mut self) {
        let dirty = self.dirty_count();
        assert!(
            dirty == 0,
            "cannot clear {} cache with {} unflushed nodes",
            self.strategy.name(),
            dirty
        );
        self.nodes.clear();
    }

    /// Cached node at `address`, if loaded
    pub fn node(&self, address: Address) -> Option<&TreeNode<S::Key>> {
        self.nodes.get(&address)
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Cached node at `address`, reading it from the file on first use
    pub fn load<F: StorageFile>(
        &mut self,
        file: &mut FileAccessor<F>,
        address: Address,
    ) -> Result<&TreeNode<S::Key>> {
        self.ensure(file, address)?;
        Ok(self.cached(address))
    }

    fn ensure<F: StorageFile>(
        &mut self,
        file: &mut FileAccessor<F>,
        address: Address,
    ) -> Result<()> {
        if self.nodes.contains_key(&address) {
            return Ok(());
        }
        if address == NULL_ADDRESS {
            return Err(AtlasError::format(format!(
                "{} tree dereferenced the null address",
                self.strategy.name()
            )));
        }

        let segment = if self.strategy.eager_value() {
            file.read_segment(address)?
        } else {
            file.read_segment_head(address, NODE_HEADER_SIZE + self.strategy.key_bytes_hint())?
        };
        let payload_len = segment.payload_len();
        if payload_len < NODE_HEADER_SIZE {
            return Err(AtlasError::format(format!(
                "segment {} has {} payload bytes, too small for a tree node",
                address, payload_len
            )));
        }

        let payload = segment.payload();
        let header = NodeHeader::decode(&mut ByteReader::new(payload), address)?;
        let (key, key_len) = self
            .strategy
            .decode_key(payload_len, &payload[NODE_HEADER_SIZE..])?;
        let value = if self.strategy.eager_value() {
            Some(payload[NODE_HEADER_SIZE + key_len..].to_vec())
        } else {
            None
        };

        tracing::trace!(
            "{}: loaded node {} (left {}, right {}, height {})",
            self.strategy.name(),
            address,
            header.left,
            header.right,
            header.height
        );
        self.nodes.insert(
            address,
            TreeNode::loaded(address, header, key, key_len, payload_len, value),
        );
        Ok(())
    }

    fn cached(&self, address: Address) -> &TreeNode<S::Key> {
        match self.nodes.get(&address) {
            Some(node) => node,
            None => panic!("tree node {} used before it was loaded", address),
        }
    }

    fn cached_mut(&mut self, address: Address) -> &mut TreeNode<S::Key> {
        match self.nodes.get_mut(&address) {
            Some(node) => node,
            None => panic!("tree node {} used before it was loaded", address),
        }
    }

    fn children<F: StorageFile>(
        &mut self,
        file: &mut FileAccessor<F>,
        address: Address,
    ) -> Result<(Address, Address)> {
        self.ensure(file, address)?;
        let node = self.cached(address);
        Ok((node.left_child(), node.right_child()))
    }

    fn height_of<F: StorageFile>(
        &mut self,
        file: &mut FileAccessor<F>,
        address: Address,
    ) -> Result<u8> {
        if address == NULL_ADDRESS {
            return Ok(0);
        }
        self.ensure(file, address)?;
        Ok(self.cached(address).height())
    }

    fn compare_at(&self, key: &S::Key, address: Address) -> Ordering {
        self.strategy.compare(key, self.cached(address).key())
    }

    // =========================================================================
    // Values
    // =========================================================================

    /// Value bytes of the node at `address` (everything after its key)
    ///
    /// Lazily loaded trees read the full segment; the value is not cached.
    /// Reused segments may carry trailing slack after the encoded value.
    pub fn value<F: StorageFile>(
        &mut self,
        file: &mut FileAccessor<F>,
        address: Address,
    ) -> Result<Vec<u8>> {
        self.ensure(file, address)?;
        let node = self.cached(address);
        if let Some(value) = node.cached_value() {
            return Ok(value.to_vec());
        }
        let offset = node.value_offset();
        let segment = file.read_segment(address)?;
        segment
            .payload()
            .get(offset..)
            .map(|v| v.to_vec())
            .ok_or_else(|| {
                AtlasError::format(format!("node {} value offset {} past payload", address, offset))
            })
    }

    /// Replace the value of a loaded node; written on flush
    pub fn set_value(&mut self, address: Address, value: Vec<u8>) -> Result<()> {
        let node = self.cached_mut(address);
        let end = node.value_offset() + value.len();
        if end > node.payload_len() {
            return Err(AtlasError::CapacityExceeded {
                what: "node value",
                size: end as u64,
                max: node.payload_len() as u64,
            });
        }
        node.replace_value(value);
        Ok(())
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Address of a node whose key equals `key`
    pub fn find<F: StorageFile>(
        &mut self,
        file: &mut FileAccessor<F>,
        key: &S::Key,
    ) -> Result<Option<Address>> {
        let mut at = self.root;
        let mut depth = 0;
        while at != NULL_ADDRESS {
            self.ensure(file, at)?;
            let node = self.cached(at);
            at = match self.strategy.compare(key, node.key()) {
                Ordering::Less => node.left_child(),
                Ordering::Greater => node.right_child(),
                Ordering::Equal => return Ok(Some(at)),
            };
            depth += 1;
            self.check_depth(depth)?;
        }
        Ok(None)
    }

    /// In-order traversal; the visitor may stop early with `ControlFlow::Break`
    ///
    /// Returns `true` when every node was visited.
    pub fn walk<F, V>(&mut self, file: &mut FileAccessor<F>, mut visit: V) -> Result<bool>
    where
        F: StorageFile,
        V: FnMut(&mut FileAccessor<F>, &TreeNode<S::Key>) -> Result<ControlFlow<()>>,
    {
        let mut stack: Vec<Address> = Vec::new();
        let mut at = self.root;
        loop {
            while at != NULL_ADDRESS {
                self.ensure(file, at)?;
                stack.push(at);
                self.check_depth(stack.len())?;
                at = self.cached(at).left_child();
            }
            let Some(top) = stack.pop() else {
                return Ok(true);
            };
            let node = self.cached(top);
            if visit(file, node)?.is_break() {
                return Ok(false);
            }
            at = node.right_child();
        }
    }

    // =========================================================================
    // Insert
    // =========================================================================

    /// Link the node stored in segment `address` into the tree
    ///
    /// The segment must already hold the key bytes (and value) after an
    /// unwritten node header; the header is written on flush.
    pub fn insert<F: StorageFile>(
        &mut self,
        file: &mut FileAccessor<F>,
        address: Address,
        key: S::Key,
        key_len: usize,
        payload_len: usize,
    ) -> Result<()> {
        assert!(
            !self.nodes.contains_key(&address),
            "{} tree already holds node {}",
            self.strategy.name(),
            address
        );
        assert!(
            payload_len >= NODE_HEADER_SIZE + key_len,
            "segment {} too small for its node",
            address
        );

        self.nodes
            .insert(address, TreeNode::fresh(address, key.clone(), key_len, payload_len));
        match self.insert_below(file, self.root, address, &key, 0) {
            Ok(root) => {
                self.root = root;
                Ok(())
            }
            Err(e) => {
                self.nodes.remove(&address);
                Err(e)
            }
        }
    }

    fn insert_below<F: StorageFile>(
        &mut self,
        file: &mut FileAccessor<F>,
        at: Address,
        new: Address,
        key: &S::Key,
        depth: usize,
    ) -> Result<Address> {
        if at == NULL_ADDRESS {
            return Ok(new);
        }
        self.check_depth(depth)?;
        let (left, right) = self.children(file, at)?;
        let (left, right) = match self.compare_at(key, at) {
            Ordering::Equal if !self.strategy.allow_duplicate_keys() => {
                return Err(AtlasError::DuplicateKey(format!("{:?}", key)))
            }
            Ordering::Less => (self.insert_below(file, left, new, key, depth + 1)?, right),
            _ => (left, self.insert_below(file, right, new, key, depth + 1)?),
        };
        self.relink(file, at, left, right)?;
        self.rebalance(file, at)
    }

    // =========================================================================
    // Remove
    // =========================================================================

    /// Unlink a node whose key equals `key`; returns its address
    pub fn remove<F: StorageFile>(
        &mut self,
        file: &mut FileAccessor<F>,
        key: &S::Key,
    ) -> Result<Option<Address>> {
        let (root, removed) = self.remove_below(file, self.root, key, 0)?;
        if let Some(address) = removed {
            self.root = root;
            self.nodes.remove(&address);
        }
        Ok(removed)
    }

    /// Unlink the in-order first node whose key is `>= bound`
    pub fn remove_first_at_least<F: StorageFile>(
        &mut self,
        file: &mut FileAccessor<F>,
        bound: &S::Key,
    ) -> Result<Option<(Address, S::Key)>> {
        let (root, removed) = self.remove_ceiling(file, self.root, bound, 0)?;
        let Some(address) = removed else {
            return Ok(None);
        };
        self.root = root;
        let key = self.cached(address).key().clone();
        self.nodes.remove(&address);
        Ok(Some((address, key)))
    }

    fn remove_below<F: StorageFile>(
        &mut self,
        file: &mut FileAccessor<F>,
        at: Address,
        key: &S::Key,
        depth: usize,
    ) -> Result<(Address, Option<Address>)> {
        if at == NULL_ADDRESS {
            return Ok((NULL_ADDRESS, None));
        }
        self.check_depth(depth)?;
        let (left, right) = self.children(file, at)?;
        match self.compare_at(key, at) {
            Ordering::Less => {
                let (left, removed) = self.remove_below(file, left, key, depth + 1)?;
                if removed.is_none() {
                    return Ok((at, None));
                }
                self.relink(file, at, left, right)?;
                Ok((self.rebalance(file, at)?, removed))
            }
            Ordering::Greater => {
                let (right, removed) = self.remove_below(file, right, key, depth + 1)?;
                if removed.is_none() {
                    return Ok((at, None));
                }
                self.relink(file, at, left, right)?;
                Ok((self.rebalance(file, at)?, removed))
            }
            Ordering::Equal => Ok((self.unlink(file, at)?, Some(at))),
        }
    }

    fn remove_ceiling<F: StorageFile>(
        &mut self,
        file: &mut FileAccessor<F>,
        at: Address,
        bound: &S::Key,
        depth: usize,
    ) -> Result<(Address, Option<Address>)> {
        if at == NULL_ADDRESS {
            return Ok((NULL_ADDRESS, None));
        }
        self.check_depth(depth)?;
        let (left, right) = self.children(file, at)?;
        let too_small = self.strategy.compare(self.cached(at).key(), bound) == Ordering::Less;

        if too_small {
            let (right, removed) = self.remove_ceiling(file, right, bound, depth + 1)?;
            if removed.is_none() {
                return Ok((at, None));
            }
            self.relink(file, at, left, right)?;
            return Ok((self.rebalance(file, at)?, removed));
        }

        let (left, removed) = self.remove_ceiling(file, left, bound, depth + 1)?;
        if removed.is_some() {
            self.relink(file, at, left, right)?;
            return Ok((self.rebalance(file, at)?, removed));
        }
        Ok((self.unlink(file, at)?, Some(at)))
    }

    /// Subtree root that replaces `at` once `at` is taken out
    fn unlink<F: StorageFile>(
        &mut self,
        file: &mut FileAccessor<F>,
        at: Address,
    ) -> Result<Address> {
        let (left, right) = self.children(file, at)?;
        if left == NULL_ADDRESS {
            return Ok(right);
        }
        if right == NULL_ADDRESS {
            return Ok(left);
        }
        let (right, successor) = self.detach_min(file, right, 0)?;
        self.relink(file, successor, left, right)?;
        self.rebalance(file, successor)
    }

    /// Take the leftmost node out of the subtree at `at`
    ///
    /// Returns (new subtree root, detached node).
    fn detach_min<F: StorageFile>(
        &mut self,
        file: &mut FileAccessor<F>,
        at: Address,
        depth: usize,
    ) -> Result<(Address, Address)> {
        self.check_depth(depth)?;
        let (left, right) = self.children(file, at)?;
        if left == NULL_ADDRESS {
            return Ok((right, at));
        }
        let (left, min) = self.detach_min(file, left, depth + 1)?;
        self.relink(file, at, left, right)?;
        Ok((self.rebalance(file, at)?, min))
    }

    // =========================================================================
    // Balancing
    // =========================================================================

    fn relink<F: StorageFile>(
        &mut self,
        file: &mut FileAccessor<F>,
        at: Address,
        left: Address,
        right: Address,
    ) -> Result<()> {
        let height = 1 + self.height_of(file, left)?.max(self.height_of(file, right)?);
        self.cached_mut(at).set_children(left, right, height);
        Ok(())
    }

    fn rebalance<F: StorageFile>(
        &mut self,
        file: &mut FileAccessor<F>,
        at: Address,
    ) -> Result<Address> {
        let (left, right) = self.children(file, at)?;
        let balance = self.height_of(file, left)? as i32 - self.height_of(file, right)? as i32;

        if balance > 1 {
            let (outer, inner) = self.children(file, left)?;
            if self.height_of(file, outer)? < self.height_of(file, inner)? {
                let left = self.rotate_left(file, left)?;
                self.relink(file, at, left, right)?;
            }
            return self.rotate_right(file, at);
        }
        if balance < -1 {
            let (inner, outer) = self.children(file, right)?;
            if self.height_of(file, outer)? < self.height_of(file, inner)? {
                let right = self.rotate_right(file, right)?;
                self.relink(file, at, left, right)?;
            }
            return self.rotate_left(file, at);
        }
        Ok(at)
    }

    fn rotate_right<F: StorageFile>(
        &mut self,
        file: &mut FileAccessor<F>,
        at: Address,
    ) -> Result<Address> {
        let (pivot, right) = self.children(file, at)?;
        let (pivot_left, pivot_right) = self.children(file, pivot)?;
        self.relink(file, at, pivot_right, right)?;
        self.relink(file, pivot, pivot_left, at)?;
        Ok(pivot)
    }

    fn rotate_left<F: StorageFile>(
        &mut self,
        file: &mut FileAccessor<F>,
        at: Address,
    ) -> Result<Address> {
        let (left, pivot) = self.children(file, at)?;
        let (pivot_left, pivot_right) = self.children(file, pivot)?;
        self.relink(file, at, left, pivot_left)?;
        self.relink(file, pivot, at, pivot_right)?;
        Ok(pivot)
    }

    fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(AtlasError::format(format!(
                "{} tree deeper than {} levels (cycle or corrupt links)",
                self.strategy.name(),
                MAX_DEPTH
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Flush
    // =========================================================================

    /// Write every dirty node back and report whether the root moved
    ///
    /// Each node is marked clean as soon as its own writes succeed, so a
    /// failure part way leaves the remaining nodes dirty.
    pub fn flush<F: StorageFile>(&mut self, file: &mut FileAccessor<F>) -> Result<FlushOutcome> {
        let mut nodes_written = 0;
        for node in self.nodes.values_mut() {
            if !node.is_dirty() {
                continue;
            }
            if node.header_dirty() {
                file.write_payload(node.address(), node.payload_len(), 0, &node.header().encode())?;
            }
            if node.value_dirty() {
                if let Some(value) = node.cached_value() {
                    file.write_payload(
                        node.address(),
                        node.payload_len(),
                        node.value_offset(),
                        value,
                    )?;
                }
            }
            node.mark_clean();
            nodes_written += 1;
        }

        let new_root = (self.root != self.flushed_root).then_some(self.root);
        self.flushed_root = self.root;

        if nodes_written > 0 || new_root.is_some() {
            tracing::debug!(
                "{}: flushed {} nodes, root {}{}",
                self.strategy.name(),
                nodes_written,
                self.root,
                if new_root.is_some() { " (moved)" } else { "" }
            );
        }
        Ok(FlushOutcome {
            nodes_written,
            new_root,
        })
    }

    // =========================================================================
    // Verification
    // =========================================================================

    /// Verify stored heights, AVL balance, key order and link sanity
    pub fn check<F: StorageFile>(&mut self, file: &mut FileAccessor<F>) -> Result<TreeCheck> {
        let mut seen = HashSet::new();
        let (height, nodes) = self.check_below(file, self.root, None, None, &mut seen, 0)?;
        Ok(TreeCheck { nodes, height })
    }

    fn check_below<F: StorageFile>(
        &mut self,
        file: &mut FileAccessor<F>,
        at: Address,
        lower: Option<S::Key>,
        upper: Option<S::Key>,
        seen: &mut HashSet<Address>,
        depth: usize,
    ) -> Result<(u8, u64)> {
        if at == NULL_ADDRESS {
            return Ok((0, 0));
        }
        self.check_depth(depth)?;
        if !seen.insert(at) {
            return Err(AtlasError::format(format!(
                "{} node {} is linked more than once",
                self.strategy.name(),
                at
            )));
        }

        self.ensure(file, at)?;
        let node = self.cached(at);
        let key = node.key().clone();
        let (left, right, stored) = (node.left_child(), node.right_child(), node.height());

        let dup = self.strategy.allow_duplicate_keys();
        let below = lower
            .as_ref()
            .map(|lo| self.strategy.compare(&key, lo))
            .is_some_and(|ord| ord == Ordering::Less || (!dup && ord == Ordering::Equal));
        let above = upper
            .as_ref()
            .map(|hi| self.strategy.compare(&key, hi))
            .is_some_and(|ord| ord == Ordering::Greater || (!dup && ord == Ordering::Equal));
        if below || above {
            return Err(AtlasError::format(format!(
                "{} node {} key {:?} out of order",
                self.strategy.name(),
                at,
                key
            )));
        }

        let (left_height, left_count) =
            self.check_below(file, left, lower, Some(key.clone()), seen, depth + 1)?;
        let (right_height, right_count) =
            self.check_below(file, right, Some(key), upper, seen, depth + 1)?;

        let height = 1 + left_height.max(right_height);
        if stored != height {
            return Err(AtlasError::format(format!(
                "{} node {} stores height {} but has height {}",
                self.strategy.name(),
                at,
                stored,
                height
            )));
        }
        if (left_height as i32 - right_height as i32).abs() > 1 {
            return Err(AtlasError::format(format!(
                "{} node {} unbalanced: left {} right {}",
                self.strategy.name(),
                at,
                left_height,
                right_height
            )));
        }
        Ok((height, left_count + right_count + 1))
    }
}
