//! File Header
//!
//! Fixed 34-byte block at offset 0, always written as one unit.

use bytes::BufMut;
use serde::Serialize;

use crate::codec::ByteReader;
use crate::error::{AtlasError, Result};

use super::{Address, NULL_ADDRESS};

/// Magic bytes identifying an AtlasDB file
pub const SIGNATURE: &[u8; 16] = b"AtlasDB segments";

/// Current file format version
pub const FORMAT_VERSION: u16 = 1;

/// Header size: Signature (16) + Version (2) + NextFree (4) + Reserved (4)
/// + DirectoryRoot (4) + IdleRoot (4) = 34 bytes
pub const HEADER_SIZE: usize = 34;

/// Tree roots kept in the header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootSlot {
    /// Root of the table directory tree
    TableDirectory,
    /// Root of the idle-segment tree
    IdleSegments,
}

/// Decoded file header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FileHeader {
    /// Format version found on disk
    pub version: u16,
    /// Where the next brand-new segment will be appended
    pub next_segment_address: Address,
    /// Must be zero
    pub reserved: u32,
    /// Table directory root (0 = no tables)
    pub table_directory_root: Address,
    /// Idle-segment tree root (0 = no idle segments)
    pub idle_segment_root: Address,
}

impl FileHeader {
    /// Header of a freshly created file
    pub fn new() -> Self {
        Self {
            version: FORMAT_VERSION,
            next_segment_address: HEADER_SIZE as Address,
            reserved: 0,
            table_directory_root: NULL_ADDRESS,
            idle_segment_root: NULL_ADDRESS,
        }
    }

    pub fn root(&self, slot: RootSlot) -> Address {
        match slot {
            RootSlot::TableDirectory => self.table_directory_root,
            RootSlot::IdleSegments => self.idle_segment_root,
        }
    }

    pub fn set_root(&mut self, slot: RootSlot, address: Address) {
        match slot {
            RootSlot::TableDirectory => self.table_directory_root = address,
            RootSlot::IdleSegments => self.idle_segment_root = address,
        }
    }

    /// Serialize to the on-disk block
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        let mut buf = &mut out[..];
        buf.put_slice(SIGNATURE);
        buf.put_u16(self.version);
        buf.put_i32(self.next_segment_address as i32);
        buf.put_i32(self.reserved as i32);
        buf.put_i32(self.table_directory_root as i32);
        buf.put_i32(self.idle_segment_root as i32);
        out
    }

    /// Parse and validate the on-disk block
    pub fn decode(block: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(block);
        if reader.read_bytes(SIGNATURE.len())? != SIGNATURE {
            return Err(AtlasError::BadSignature);
        }

        let version = reader.read_u16()?;
        if version != FORMAT_VERSION {
            return Err(AtlasError::UnsupportedVersion {
                found: version,
                supported: FORMAT_VERSION,
            });
        }

        let next = read_address(&mut reader, "next segment address")?;
        let reserved = reader.read_i32()?;
        if reserved != 0 {
            return Err(AtlasError::format(format!(
                "reserved header field is {} (must be 0)",
                reserved
            )));
        }
        let table_directory_root = read_address(&mut reader, "table directory root")?;
        let idle_segment_root = read_address(&mut reader, "idle segment root")?;

        if (next as usize) < HEADER_SIZE {
            return Err(AtlasError::format(format!(
                "next segment address {} lies inside the header",
                next
            )));
        }
        for (name, root) in [
            ("table directory root", table_directory_root),
            ("idle segment root", idle_segment_root),
        ] {
            if root != NULL_ADDRESS && ((root as usize) < HEADER_SIZE || root >= next) {
                return Err(AtlasError::format(format!(
                    "{} {} outside segment area {}..{}",
                    name, root, HEADER_SIZE, next
                )));
            }
        }

        Ok(Self {
            version,
            next_segment_address: next,
            reserved: 0,
            table_directory_root,
            idle_segment_root,
        })
    }
}

impl Default for FileHeader {
    fn default() -> Self {
        Self::new()
    }
}

fn read_address(reader: &mut ByteReader<'_>, what: &str) -> Result<Address> {
    let raw = reader.read_i32()?;
    if raw < 0 {
        return Err(AtlasError::format(format!("negative {}: {}", what, raw)));
    }
    Ok(raw as Address)
}
