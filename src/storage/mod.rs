//! Storage Module
//!
//! The file as a heap of variable-length segments.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │ Header (34 bytes)                                               │
//! │   Signature (16) | Version: u16 (2) | NextFree: i32 (4)         │
//! │   Reserved: i32 (4) | DirectoryRoot: i32 (4) | IdleRoot: i32 (4)│
//! ├─────────────────────────────────────────────────────────────────┤
//! │ Segment                                                         │
//! │   [TotalLen: u32][Payload ...]                                  │
//! │   ... repeated up to NextFree ...                               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are big-endian. Address 0 means "no segment"; it can never
//! be a segment because the header occupies it.

mod allocator;
mod file;
mod header;
mod segment;

pub use allocator::{IdleSegmentKeys, SegmentAllocator};
pub use file::{FileAccessor, IoStats, StorageFile};
pub use header::{FileHeader, RootSlot, FORMAT_VERSION, HEADER_SIZE, SIGNATURE};
pub use segment::{Segment, SEGMENT_HEADER_SIZE};

/// File offset of a segment; doubles as a tree node pointer
pub type Address = u32;

/// "No segment"
pub const NULL_ADDRESS: Address = 0;

/// Addresses are stored as non-negative `i32`
pub const MAX_ADDRESS: Address = i32::MAX as Address;
