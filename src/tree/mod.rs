//! Persistent Tree Module
//!
//! A generic AVL tree whose nodes live in file segments.
//!
//! ## Node Layout
//! ```text
//! ┌───────────┬────────────┬────────────┬───────────┬─────────────┐
//! │ Len (4)   │ Left (4)   │ Right (4)  │ Height(1) │ Key | Value │
//! └───────────┴────────────┴────────────┴───────────┴─────────────┘
//!   segment     ────────── node header ──────────    per-tree bytes
//! ```
//!
//! ## Mechanics
//! - A node's address is its segment's file offset; children are addresses
//! - `PersistentTree` keeps a per-session cache: address → node
//! - Loads read only the node header and key unless the tree wants values
//! - Rotations update cached nodes and raise dirty flags; nothing is written
//!   until `flush()`, which writes dirty nodes and reports a moved root
//!
//! Each concrete tree (idle segments, table directory, table records)
//! supplies a small [`TreeStrategy`] with its key decoding and ordering.

mod engine;
mod node;

use std::cmp::Ordering;
use std::fmt;

use crate::error::Result;

pub use engine::{FlushOutcome, PersistentTree, TreeCheck};
pub use node::{NodeHeader, TreeNode, NODE_HEADER_SIZE};

/// Per-tree key handling plugged into [`PersistentTree`]
pub trait TreeStrategy {
    /// Decoded key type
    type Key: Clone + fmt::Debug;

    /// Name used in log lines
    fn name(&self) -> &str;

    /// Whether several nodes may carry equal keys
    fn allow_duplicate_keys(&self) -> bool;

    /// Upper bound on payload bytes after the node header needed to decode a key
    fn key_bytes_hint(&self) -> usize;

    /// Load full values together with keys
    fn eager_value(&self) -> bool {
        false
    }

    /// Decode a key from the bytes following the node header.
    ///
    /// Returns the key and the number of bytes it occupied. `payload_len` is
    /// the segment's declared payload length.
    fn decode_key(&self, payload_len: usize, bytes: &[u8]) -> Result<(Self::Key, usize)>;

    fn compare(&self, a: &Self::Key, b: &Self::Key) -> Ordering;
}
