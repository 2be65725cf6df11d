//! File Accessor
//!
//! Owns the byte stream for the lifetime of a database session: reads and
//! writes the header, appends new segments at the end of the segment area
//! and reads segments back fully or partially.
//!
//! Every short read, failed seek or failed write is returned with the
//! operation and offset attached. Nothing is retried here.

use std::fs::File;
use std::io::{self, Cursor, ErrorKind, Read, Seek, SeekFrom, Write};

use bytes::{BufMut, BytesMut};
use serde::Serialize;

use crate::error::{AtlasError, Result};

use super::header::{FileHeader, RootSlot, HEADER_SIZE};
use super::segment::{Segment, SEGMENT_HEADER_SIZE};
use super::{Address, MAX_ADDRESS, NULL_ADDRESS};

// =============================================================================
// Backing Stream
// =============================================================================

/// A random-access byte stream the engine can run on
///
/// The caller opens and closes it; the engine only seeks, reads and writes.
pub trait StorageFile: Read + Write + Seek {
    /// Push written data down to durable storage
    fn sync(&mut self) -> io::Result<()> {
        self.flush()
    }
}

impl StorageFile for File {
    fn sync(&mut self) -> io::Result<()> {
        self.flush()?;
        self.sync_data()
    }
}

impl StorageFile for Cursor<Vec<u8>> {}

impl StorageFile for Cursor<&mut Vec<u8>> {}

impl<T: StorageFile + ?Sized> StorageFile for &mut T {
    fn sync(&mut self) -> io::Result<()> {
        (**self).sync()
    }
}

/// Counters for the I/O issued through one accessor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IoStats {
    pub reads: u64,
    pub writes: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
}

// =============================================================================
// File Accessor
// =============================================================================

/// Header and segment access over a [`StorageFile`]
pub struct FileAccessor<F> {
    file: F,
    header: FileHeader,
    header_dirty: bool,
    stats: IoStats,
}

impl<F: StorageFile> FileAccessor<F> {
    /// Initialise `file` as an empty database by writing a fresh header
    pub fn create(file: F) -> Result<Self> {
        let mut accessor = Self {
            file,
            header: FileHeader::new(),
            header_dirty: true,
            stats: IoStats::default(),
        };
        accessor.write_header()?;
        tracing::debug!("created database file, header {} bytes", HEADER_SIZE);
        Ok(accessor)
    }

    /// Attach to an existing database, validating its header
    pub fn open(file: F) -> Result<Self> {
        let mut accessor = Self {
            file,
            header: FileHeader::new(),
            header_dirty: false,
            stats: IoStats::default(),
        };
        accessor.header = match accessor.read_header() {
            Err(AtlasError::ShortIo { actual, .. }) => {
                return Err(AtlasError::format(format!(
                    "file too short for header: {} of {} bytes",
                    actual, HEADER_SIZE
                )))
            }
            other => other?,
        };

        let end = accessor
            .file
            .seek(SeekFrom::End(0))
            .map_err(AtlasError::io_at("seek", 0))?;
        let next = accessor.header.next_segment_address as u64;
        if end < next {
            return Err(AtlasError::format(format!(
                "file ends at {} but segments extend to {}",
                end, next
            )));
        }

        tracing::debug!(
            "opened database file: next segment at {}, directory root {}, idle root {}",
            accessor.header.next_segment_address,
            accessor.header.table_directory_root,
            accessor.header.idle_segment_root
        );
        Ok(accessor)
    }

    // =========================================================================
    // Header
    // =========================================================================

    /// Current in-memory header
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Read and validate the on-disk header (does not replace the cached one)
    pub fn read_header(&mut self) -> Result<FileHeader> {
        let mut block = [0u8; HEADER_SIZE];
        self.read_at("header read", 0, &mut block)?;
        FileHeader::decode(&block)
    }

    /// Write the cached header as one block
    pub fn write_header(&mut self) -> Result<()> {
        let block = self.header.encode();
        self.write_at("header write", 0, &block)?;
        self.header_dirty = false;
        Ok(())
    }

    /// Point a header root slot at `address`; persisted by `commit_header`
    pub fn set_root(&mut self, slot: RootSlot, address: Address) {
        if self.header.root(slot) != address {
            tracing::debug!("{:?} root moved to {}", slot, address);
            self.header.set_root(slot, address);
            self.header_dirty = true;
        }
    }

    /// Write the header if a root changed since the last write
    pub fn commit_header(&mut self) -> Result<bool> {
        if !self.header_dirty {
            return Ok(false);
        }
        self.write_header()?;
        Ok(true)
    }

    // =========================================================================
    // Segments
    // =========================================================================

    /// Append a zero-filled segment with room for `payload_size` bytes
    ///
    /// The whole segment is written so later reads never run past the end of
    /// the stream, then the advanced next-segment address is persisted.
    pub fn create_segment(&mut self, payload_size: usize) -> Result<Segment> {
        let total = payload_size as u64 + SEGMENT_HEADER_SIZE as u64;
        let address = self.header.next_segment_address;
        let end = address as u64 + total;
        if end > MAX_ADDRESS as u64 {
            return Err(AtlasError::CapacityExceeded {
                what: "file size",
                size: end,
                max: MAX_ADDRESS as u64,
            });
        }

        let segment = Segment::zeroed(address, payload_size);
        self.write_segment(&segment)?;

        self.header.next_segment_address = end as Address;
        self.write_header()?;

        tracing::debug!("grew file: segment at {} with {} payload bytes", address, payload_size);
        Ok(segment)
    }

    /// Declared payload length of the segment at `address`
    pub fn read_segment_len(&mut self, address: Address) -> Result<usize> {
        let total = self.read_length_prefix(address)?;
        Ok(total as usize - SEGMENT_HEADER_SIZE)
    }

    /// Read the full segment at `address`
    pub fn read_segment(&mut self, address: Address) -> Result<Segment> {
        let total = self.read_length_prefix(address)?;
        let payload_len = total as usize - SEGMENT_HEADER_SIZE;
        self.read_payload(address, total, payload_len)
    }

    /// Read the length prefix plus exactly `extra_bytes` payload bytes
    pub fn read_partial_segment(
        &mut self,
        address: Address,
        extra_bytes: usize,
    ) -> Result<Segment> {
        let total = self.read_length_prefix(address)?;
        let payload_len = total as usize - SEGMENT_HEADER_SIZE;
        if extra_bytes > payload_len {
            return Err(AtlasError::format(format!(
                "partial read of {} bytes exceeds segment {} payload of {} bytes",
                extra_bytes, address, payload_len
            )));
        }
        self.read_payload(address, total, extra_bytes)
    }

    /// Read the length prefix plus at most `max_bytes` payload bytes
    pub fn read_segment_head(&mut self, address: Address, max_bytes: usize) -> Result<Segment> {
        let total = self.read_length_prefix(address)?;
        let payload_len = total as usize - SEGMENT_HEADER_SIZE;
        self.read_payload(address, total, payload_len.min(max_bytes))
    }

    /// Write a fully loaded segment (prefix + payload) back at its address
    pub fn write_segment(&mut self, segment: &Segment) -> Result<()> {
        assert!(
            !segment.is_partial(),
            "segment {} was partially loaded and cannot be written back whole",
            segment.address()
        );
        let mut buf = BytesMut::with_capacity(segment.total_len() as usize);
        buf.put_u32(segment.total_len());
        buf.put_slice(segment.payload());
        self.write_at("segment write", segment.address() as u64, &buf)
    }

    /// Overwrite payload bytes of the segment at `address` starting at `offset`
    ///
    /// `payload_len` is the caller's knowledge of the segment size and bounds
    /// the write.
    pub fn write_payload(
        &mut self,
        address: Address,
        payload_len: usize,
        offset: usize,
        bytes: &[u8],
    ) -> Result<()> {
        if offset + bytes.len() > payload_len {
            return Err(AtlasError::CapacityExceeded {
                what: "segment payload write",
                size: (offset + bytes.len()) as u64,
                max: payload_len as u64,
            });
        }
        let position = address as u64 + (SEGMENT_HEADER_SIZE + offset) as u64;
        self.write_at("payload write", position, bytes)
    }

    // =========================================================================
    // Stream Management
    // =========================================================================

    /// Sync the underlying stream
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync().map_err(AtlasError::io_at("sync", 0))
    }

    pub fn stats(&self) -> IoStats {
        self.stats
    }

    pub fn get_ref(&self) -> &F {
        &self.file
    }

    /// Give the stream back to the caller
    pub fn into_inner(self) -> F {
        self.file
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn read_length_prefix(&mut self, address: Address) -> Result<u32> {
        let next = self.header.next_segment_address;
        if address == NULL_ADDRESS
            || (address as usize) < HEADER_SIZE
            || address as u64 + SEGMENT_HEADER_SIZE as u64 > next as u64
        {
            return Err(AtlasError::format(format!(
                "segment address {} outside segment area {}..{}",
                address, HEADER_SIZE, next
            )));
        }

        let mut prefix = [0u8; SEGMENT_HEADER_SIZE];
        self.read_at("segment header read", address as u64, &mut prefix)?;
        let total = u32::from_be_bytes(prefix);

        if (total as usize) < SEGMENT_HEADER_SIZE {
            return Err(AtlasError::format(format!(
                "segment {} declares length {} below header size",
                address, total
            )));
        }
        if address as u64 + total as u64 > next as u64 {
            return Err(AtlasError::format(format!(
                "segment {} of length {} runs past segment area end {}",
                address, total, next
            )));
        }
        Ok(total)
    }

    fn read_payload(&mut self, address: Address, total: u32, len: usize) -> Result<Segment> {
        let mut payload = BytesMut::zeroed(len);
        let position = address as u64 + SEGMENT_HEADER_SIZE as u64;
        self.read_at("segment read", position, &mut payload)?;
        Ok(Segment::from_parts(address, total, payload))
    }

    fn read_at(&mut self, op: &'static str, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(AtlasError::io_at(op, offset))?;

        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(AtlasError::ShortIo {
                        op,
                        offset,
                        expected: buf.len(),
                        actual: filled,
                    })
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(AtlasError::IoAt { op, offset, source: e }),
            }
        }

        self.stats.reads += 1;
        self.stats.bytes_read += buf.len() as u64;
        Ok(())
    }

    fn write_at(&mut self, op: &'static str, offset: u64, bytes: &[u8]) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(AtlasError::io_at(op, offset))?;
        self.file
            .write_all(bytes)
            .map_err(AtlasError::io_at(op, offset))?;

        self.stats.writes += 1;
        self.stats.bytes_written += bytes.len() as u64;
        tracing::trace!("{}: {} bytes at {}", op, bytes.len(), offset);
        Ok(())
    }
}
