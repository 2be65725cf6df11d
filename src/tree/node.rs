//! Tree Node
//!
//! On-disk node header and the cached in-memory node built from it.

use bytes::BufMut;

use crate::codec::ByteReader;
use crate::error::{AtlasError, Result};
use crate::storage::{Address, NULL_ADDRESS};

/// Node header size: Left (4) + Right (4) + Height (1) = 9 bytes
pub const NODE_HEADER_SIZE: usize = 9;

/// The fixed fields at the start of every node payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHeader {
    pub left: Address,
    pub right: Address,
    pub height: u8,
}

impl NodeHeader {
    /// Header of a node with no children
    pub const LEAF: NodeHeader = NodeHeader {
        left: NULL_ADDRESS,
        right: NULL_ADDRESS,
        height: 1,
    };

    pub fn encode(&self) -> [u8; NODE_HEADER_SIZE] {
        let mut out = [0u8; NODE_HEADER_SIZE];
        let mut buf = &mut out[..];
        buf.put_i32(self.left as i32);
        buf.put_i32(self.right as i32);
        buf.put_u8(self.height);
        out
    }

    pub fn decode(reader: &mut ByteReader<'_>, address: Address) -> Result<Self> {
        let left = reader.read_i32()?;
        let right = reader.read_i32()?;
        let height = reader.read_u8()?;
        if left < 0 || right < 0 {
            return Err(AtlasError::format(format!(
                "node {} has negative child address ({}, {})",
                address, left, right
            )));
        }
        if height == 0 {
            return Err(AtlasError::format(format!("node {} has height 0", address)));
        }
        Ok(Self {
            left: left as Address,
            right: right as Address,
            height,
        })
    }
}

/// A node held in a tree's cache
///
/// Mutations only touch these fields and raise dirty flags; the owning tree
/// writes them back on flush.
#[derive(Debug, Clone)]
pub struct TreeNode<K> {
    address: Address,
    header: NodeHeader,
    key: K,
    key_len: usize,
    payload_len: usize,
    value: Option<Vec<u8>>,
    header_dirty: bool,
    value_dirty: bool,
}

impl<K> TreeNode<K> {
    pub(crate) fn loaded(
        address: Address,
        header: NodeHeader,
        key: K,
        key_len: usize,
        payload_len: usize,
        value: Option<Vec<u8>>,
    ) -> Self {
        Self {
            address,
            header,
            key,
            key_len,
            payload_len,
            value,
            header_dirty: false,
            value_dirty: false,
        }
    }

    /// A node just linked into the tree; its header has never been written
    pub(crate) fn fresh(address: Address, key: K, key_len: usize, payload_len: usize) -> Self {
        Self {
            address,
            header: NodeHeader::LEAF,
            key,
            key_len,
            payload_len,
            value: None,
            header_dirty: true,
            value_dirty: false,
        }
    }

    /// Address of the backing segment
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn left_child(&self) -> Address {
        self.header.left
    }

    pub fn right_child(&self) -> Address {
        self.header.right
    }

    pub fn height(&self) -> u8 {
        self.header.height
    }

    /// Replace the child links; marks the node dirty only on change
    pub fn set_children(&mut self, left: Address, right: Address, height: u8) {
        let header = NodeHeader {
            left,
            right,
            height,
        };
        if header != self.header {
            self.header = header;
            self.header_dirty = true;
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.header_dirty || self.value_dirty
    }

    /// Declared payload length of the backing segment
    pub fn payload_len(&self) -> usize {
        self.payload_len
    }

    /// Payload offset where the value bytes start
    pub fn value_offset(&self) -> usize {
        NODE_HEADER_SIZE + self.key_len
    }

    /// Value bytes, if held in memory
    pub fn cached_value(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }

    pub(crate) fn header(&self) -> NodeHeader {
        self.header
    }

    pub(crate) fn replace_value(&mut self, value: Vec<u8>) {
        self.value = Some(value);
        self.value_dirty = true;
    }

    pub(crate) fn header_dirty(&self) -> bool {
        self.header_dirty
    }

    pub(crate) fn value_dirty(&self) -> bool {
        self.value_dirty
    }

    pub(crate) fn mark_clean(&mut self) {
        self.header_dirty = false;
        self.value_dirty = false;
    }
}
