//! Column Module
//!
//! Typed columns and their byte encodings.
//!
//! ## Encodings
//! ```text
//! ┌──────────────────────────────┬────────────────┬───────────────┐
//! │ Variant                      │ Length prefix  │ Max payload   │
//! ├──────────────────────────────┼────────────────┼───────────────┤
//! │ short string / short bytes   │ 1 byte         │ 255           │
//! │ long string / long bytes     │ 2 bytes        │ 65 535        │
//! │ text / blob                  │ 4 bytes        │ 2^30 - 1      │
//! │ fixed string / fixed bytes   │ none           │ schema size   │
//! │ integers / floats / counter  │ none           │ 1/2/4/8 bytes │
//! └──────────────────────────────┴────────────────┴───────────────┘
//! ```
//!
//! Over-long strings and byte strings are truncated to the variant maximum.
//!
//! ## Column Spec
//! `[NameLen: u8][Name][Tag: u8]`, followed by `[Size: u16]` for the fixed
//! variants.

mod codec;
mod value;

pub use value::Value;

use crate::codec::{HUGE_MAX, LONG_MAX, SHORT_MAX};
use crate::error::{AtlasError, Result};

/// Type of a column, with its on-disk tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    /// Auto-increment key, stored as `i64`
    Counter,
    ShortString,
    LongString,
    FixedString(u16),
    Text,
    ShortBytes,
    LongBytes,
    FixedBytes(u16),
    Blob,
}

impl ColumnType {
    /// On-disk type tag
    pub fn tag(self) -> u8 {
        match self {
            ColumnType::Int8 => 0x01,
            ColumnType::Int16 => 0x02,
            ColumnType::Int32 => 0x03,
            ColumnType::Int64 => 0x04,
            ColumnType::UInt8 => 0x05,
            ColumnType::UInt16 => 0x06,
            ColumnType::UInt32 => 0x07,
            ColumnType::UInt64 => 0x08,
            ColumnType::Float32 => 0x09,
            ColumnType::Float64 => 0x0A,
            ColumnType::Counter => 0x0B,
            ColumnType::ShortString => 0x10,
            ColumnType::LongString => 0x11,
            ColumnType::FixedString(_) => 0x12,
            ColumnType::Text => 0x13,
            ColumnType::ShortBytes => 0x20,
            ColumnType::LongBytes => 0x21,
            ColumnType::FixedBytes(_) => 0x22,
            ColumnType::Blob => 0x23,
        }
    }

    /// Type for `tag`; fixed variants take their size separately
    pub fn from_tag(tag: u8, fixed_size: impl FnOnce() -> Result<u16>) -> Result<Self> {
        Ok(match tag {
            0x01 => ColumnType::Int8,
            0x02 => ColumnType::Int16,
            0x03 => ColumnType::Int32,
            0x04 => ColumnType::Int64,
            0x05 => ColumnType::UInt8,
            0x06 => ColumnType::UInt16,
            0x07 => ColumnType::UInt32,
            0x08 => ColumnType::UInt64,
            0x09 => ColumnType::Float32,
            0x0A => ColumnType::Float64,
            0x0B => ColumnType::Counter,
            0x10 => ColumnType::ShortString,
            0x11 => ColumnType::LongString,
            0x12 => ColumnType::FixedString(fixed_size()?),
            0x13 => ColumnType::Text,
            0x20 => ColumnType::ShortBytes,
            0x21 => ColumnType::LongBytes,
            0x22 => ColumnType::FixedBytes(fixed_size()?),
            0x23 => ColumnType::Blob,
            other => {
                return Err(AtlasError::format(format!("unknown column type tag 0x{:02x}", other)))
            }
        })
    }

    /// Schema-defined size of the fixed variants
    pub fn fixed_size(self) -> Option<u16> {
        match self {
            ColumnType::FixedString(n) | ColumnType::FixedBytes(n) => Some(n),
            _ => None,
        }
    }

    /// Largest number of bytes an encoded value can take
    pub fn size_hint(self) -> usize {
        match self {
            ColumnType::Int8 | ColumnType::UInt8 => 1,
            ColumnType::Int16 | ColumnType::UInt16 => 2,
            ColumnType::Int32 | ColumnType::UInt32 | ColumnType::Float32 => 4,
            ColumnType::Int64 | ColumnType::UInt64 | ColumnType::Float64 | ColumnType::Counter => 8,
            ColumnType::ShortString | ColumnType::ShortBytes => 1 + SHORT_MAX,
            ColumnType::LongString | ColumnType::LongBytes => 2 + LONG_MAX,
            ColumnType::Text | ColumnType::Blob => 4 + HUGE_MAX,
            ColumnType::FixedString(n) | ColumnType::FixedBytes(n) => n as usize,
        }
    }

    /// Whether the type can serve as a primary key
    pub fn is_key_capable(self) -> bool {
        !matches!(
            self,
            ColumnType::Float32 | ColumnType::Float64 | ColumnType::Text | ColumnType::Blob
        )
    }

    /// Name of the value variant this type accepts
    pub fn expected_value(self) -> &'static str {
        match self {
            ColumnType::Int8
            | ColumnType::Int16
            | ColumnType::Int32
            | ColumnType::Int64
            | ColumnType::Counter => "signed integer",
            ColumnType::UInt8 | ColumnType::UInt16 | ColumnType::UInt32 | ColumnType::UInt64 => {
                "unsigned integer"
            }
            ColumnType::Float32 | ColumnType::Float64 => "float",
            ColumnType::ShortString
            | ColumnType::LongString
            | ColumnType::FixedString(_)
            | ColumnType::Text => "text",
            ColumnType::ShortBytes
            | ColumnType::LongBytes
            | ColumnType::FixedBytes(_)
            | ColumnType::Blob => "bytes",
        }
    }
}

/// A named, typed column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    column_type: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }

    pub fn int8(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Int8)
    }

    pub fn int16(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Int16)
    }

    pub fn int32(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Int32)
    }

    pub fn int64(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Int64)
    }

    pub fn uint8(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::UInt8)
    }

    pub fn uint16(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::UInt16)
    }

    pub fn uint32(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::UInt32)
    }

    pub fn uint64(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::UInt64)
    }

    pub fn float32(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Float32)
    }

    pub fn float64(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Float64)
    }

    pub fn counter(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Counter)
    }

    pub fn short_string(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::ShortString)
    }

    pub fn long_string(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::LongString)
    }

    pub fn fixed_string(name: impl Into<String>, size: u16) -> Self {
        Self::new(name, ColumnType::FixedString(size))
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Text)
    }

    pub fn short_bytes(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::ShortBytes)
    }

    pub fn long_bytes(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::LongBytes)
    }

    pub fn fixed_bytes(name: impl Into<String>, size: u16) -> Self {
        Self::new(name, ColumnType::FixedBytes(size))
    }

    pub fn blob(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Blob)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn type_tag(&self) -> u8 {
        self.column_type.tag()
    }

    pub fn size_hint(&self) -> usize {
        self.column_type.size_hint()
    }
}
