//! Segment handle
//!
//! A segment is a length-prefixed byte range: `[TotalLen: u32][Payload]`.
//! The handle carries the address, the declared length and a payload buffer
//! that may cover only the first part of the payload after a partial read.

use bytes::BytesMut;

use crate::error::{AtlasError, Result};

use super::Address;

/// Size of the length prefix in front of every payload
pub const SEGMENT_HEADER_SIZE: usize = 4;

/// An in-memory view of one segment
#[derive(Debug, Clone)]
pub struct Segment {
    address: Address,
    total_len: u32,
    payload: BytesMut,
}

impl Segment {
    /// Zero-filled segment covering a full payload of `payload_len` bytes
    pub(crate) fn zeroed(address: Address, payload_len: usize) -> Self {
        Self {
            address,
            total_len: (payload_len + SEGMENT_HEADER_SIZE) as u32,
            payload: BytesMut::zeroed(payload_len),
        }
    }

    /// Segment whose buffer holds the first `payload.len()` payload bytes
    pub(crate) fn from_parts(address: Address, total_len: u32, payload: BytesMut) -> Self {
        debug_assert!(payload.len() + SEGMENT_HEADER_SIZE <= total_len as usize);
        Self {
            address,
            total_len,
            payload,
        }
    }

    /// File offset of the length prefix
    pub fn address(&self) -> Address {
        self.address
    }

    /// Declared length, prefix included
    pub fn total_len(&self) -> u32 {
        self.total_len
    }

    /// Declared payload length
    pub fn payload_len(&self) -> usize {
        self.total_len as usize - SEGMENT_HEADER_SIZE
    }

    /// Loaded payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.payload
    }

    /// True when only a prefix of the payload was read
    pub fn is_partial(&self) -> bool {
        self.payload.len() < self.payload_len()
    }

    /// Copy `bytes` into the payload buffer at `offset`
    pub fn put(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        let end = offset + bytes.len();
        if end > self.payload.len() {
            return Err(AtlasError::CapacityExceeded {
                what: "segment payload write",
                size: end as u64,
                max: self.payload.len() as u64,
            });
        }
        self.payload[offset..end].copy_from_slice(bytes);
        Ok(())
    }
}
