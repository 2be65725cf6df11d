//! Encoding helpers
//!
//! Fixed-width integers go straight through `BufMut::put_*` (big-endian by
//! default); these helpers cover the length-prefixed forms.

use bytes::BufMut;

use super::LengthPrefix;

/// Longest prefix of `s` that fits in `max` bytes without splitting a character
pub fn truncate_str(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// First `max` bytes of `bytes`
pub fn truncate_bytes(bytes: &[u8], max: usize) -> &[u8] {
    &bytes[..bytes.len().min(max)]
}

fn put_prefixed(buf: &mut impl BufMut, prefix: LengthPrefix, bytes: &[u8]) -> usize {
    let bytes = truncate_bytes(bytes, prefix.max_len());
    match prefix {
        LengthPrefix::Short => buf.put_u8(bytes.len() as u8),
        LengthPrefix::Long => buf.put_u16(bytes.len() as u16),
        LengthPrefix::Huge => buf.put_u32(bytes.len() as u32),
    }
    buf.put_slice(bytes);
    bytes.len()
}

/// Write a 1-byte length prefix and up to 255 bytes; returns bytes kept
pub fn put_short_bytes(buf: &mut impl BufMut, bytes: &[u8]) -> usize {
    put_prefixed(buf, LengthPrefix::Short, bytes)
}

/// Write a 2-byte length prefix and up to 65 535 bytes; returns bytes kept
pub fn put_long_bytes(buf: &mut impl BufMut, bytes: &[u8]) -> usize {
    put_prefixed(buf, LengthPrefix::Long, bytes)
}

/// Write a 4-byte length prefix and up to 2^30 - 1 bytes; returns bytes kept
pub fn put_huge_bytes(buf: &mut impl BufMut, bytes: &[u8]) -> usize {
    put_prefixed(buf, LengthPrefix::Huge, bytes)
}
