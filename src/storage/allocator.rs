//! Segment Allocator
//!
//! Free space is a size-keyed AVL tree of idle segments. A node's key is the
//! segment's own payload length (read from its length prefix), so an idle
//! node payload is just the 9-byte node header.
//!
//! ## Policy
//! - `acquire(size)` takes the in-order first idle segment with payload
//!   `>= size` (smallest fitting size, oldest among equals), else grows the file
//! - `release` re-inserts a segment at its full size
//! - Neighbouring idle segments are never merged and segments are never split

use std::cmp::Ordering;
use std::ops::ControlFlow;

use crate::error::{AtlasError, Result};
use crate::tree::{PersistentTree, TreeCheck, TreeStrategy, NODE_HEADER_SIZE};

use super::file::{FileAccessor, StorageFile};
use super::header::RootSlot;
use super::segment::Segment;
use super::{Address, MAX_ADDRESS};

/// Key strategy of the idle-segment tree: payload size, duplicates allowed
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleSegmentKeys;

impl TreeStrategy for IdleSegmentKeys {
    type Key = u32;

    fn name(&self) -> &str {
        "idle-segments"
    }

    fn allow_duplicate_keys(&self) -> bool {
        true
    }

    fn key_bytes_hint(&self) -> usize {
        0
    }

    fn decode_key(&self, payload_len: usize, _bytes: &[u8]) -> Result<(u32, usize)> {
        Ok((payload_len as u32, 0))
    }

    fn compare(&self, a: &u32, b: &u32) -> Ordering {
        a.cmp(b)
    }
}

/// Hands out and takes back segments
pub struct SegmentAllocator {
    tree: PersistentTree<IdleSegmentKeys>,
}

impl SegmentAllocator {
    /// Attach to the idle tree rooted at `root`
    pub fn new(root: Address) -> Self {
        Self {
            tree: PersistentTree::new(IdleSegmentKeys, root),
        }
    }

    pub fn tree(&self) -> &PersistentTree<IdleSegmentKeys> {
        &self.tree
    }

    /// A zero-filled segment with at least `size` payload bytes
    ///
    /// Requests below the node header size are rounded up so every segment
    /// can later rejoin the idle tree.
    pub fn acquire<F: StorageFile>(
        &mut self,
        file: &mut FileAccessor<F>,
        size: usize,
    ) -> Result<Segment> {
        let size = size.max(NODE_HEADER_SIZE);
        if size > MAX_ADDRESS as usize {
            return Err(AtlasError::CapacityExceeded {
                what: "segment",
                size: size as u64,
                max: MAX_ADDRESS as u64,
            });
        }

        let reused = self.tree.remove_first_at_least(file, &(size as u32))?;
        if let Some((address, payload_len)) = reused {
            tracing::debug!(
                "reused idle segment {} ({} bytes) for {} byte request",
                address,
                payload_len,
                size
            );
            return Ok(Segment::zeroed(address, payload_len as usize));
        }
        file.create_segment(size)
    }

    /// Return the segment at `address` to the idle tree at its full size
    pub fn release<F: StorageFile>(
        &mut self,
        file: &mut FileAccessor<F>,
        address: Address,
    ) -> Result<()> {
        let payload_len = file.read_segment_len(address)?;
        self.tree
            .insert(file, address, payload_len as u32, 0, payload_len)?;
        tracing::debug!("released segment {} ({} bytes)", address, payload_len);
        Ok(())
    }

    /// Write idle-tree changes and record a moved root in the header
    pub fn flush<F: StorageFile>(&mut self, file: &mut FileAccessor<F>) -> Result<usize> {
        let outcome = self.tree.flush(file)?;
        if let Some(root) = outcome.new_root {
            file.set_root(RootSlot::IdleSegments, root);
        }
        Ok(outcome.nodes_written)
    }

    /// Idle segments in ascending size order as (address, payload size)
    pub fn idle_segments<F: StorageFile>(
        &mut self,
        file: &mut FileAccessor<F>,
    ) -> Result<Vec<(Address, u32)>> {
        let mut out = Vec::new();
        self.tree.walk(file, |_, node| {
            out.push((node.address(), *node.key()));
            Ok(ControlFlow::Continue(()))
        })?;
        Ok(out)
    }

    /// Structural check of the idle tree
    pub fn check<F: StorageFile>(&mut self, file: &mut FileAccessor<F>) -> Result<TreeCheck> {
        self.tree.check(file)
    }

    /// Drop cached idle nodes when above `limit` and all clean
    pub(crate) fn trim_cache(&mut self, limit: usize) {
        if self.tree.cached_count() > limit && self.tree.dirty_count() == 0 {
            self.tree.clear_cache();
        }
    }
}
