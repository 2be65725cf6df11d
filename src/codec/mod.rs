//! Byte Codec Module
//!
//! Fixed byte order (big-endian) primitives shared by every on-disk structure.
//!
//! ## Length-prefixed forms
//! ```text
//! short:  ┌─────────┬───────────────┐   max 255 bytes
//!         │ Len (1) │ Bytes         │
//!         └─────────┴───────────────┘
//! long:   ┌─────────┬───────────────┐   max 65 535 bytes
//!         │ Len (2) │ Bytes         │
//!         └─────────┴───────────────┘
//! huge:   ┌─────────┬───────────────┐   max 2^30 - 1 bytes
//!         │ Len (4) │ Bytes         │
//!         └─────────┴───────────────┘
//! ```
//!
//! Writers truncate input longer than the form's maximum. Readers treat a
//! declared length running past the available bytes as file corruption.

mod reader;
mod writer;

pub use reader::ByteReader;
pub use writer::{put_huge_bytes, put_long_bytes, put_short_bytes, truncate_bytes, truncate_str};

// =============================================================================
// Shared Constants
// =============================================================================

/// Largest payload of a 1-byte length prefix
pub const SHORT_MAX: usize = u8::MAX as usize;

/// Largest payload of a 2-byte length prefix
pub const LONG_MAX: usize = u16::MAX as usize;

/// Largest payload of a 4-byte length prefix
pub const HUGE_MAX: usize = (1 << 30) - 1;

/// Width of each length-prefix form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthPrefix {
    Short,
    Long,
    Huge,
}

impl LengthPrefix {
    /// Bytes taken by the prefix itself
    pub const fn width(self) -> usize {
        match self {
            LengthPrefix::Short => 1,
            LengthPrefix::Long => 2,
            LengthPrefix::Huge => 4,
        }
    }

    /// Largest payload the prefix can describe
    pub const fn max_len(self) -> usize {
        match self {
            LengthPrefix::Short => SHORT_MAX,
            LengthPrefix::Long => LONG_MAX,
            LengthPrefix::Huge => HUGE_MAX,
        }
    }
}
