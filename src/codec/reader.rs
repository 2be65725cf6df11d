//! Checked big-endian reader
//!
//! `bytes::Buf` panics when asked for more than it holds; `ByteReader` checks
//! first and reports a short buffer as a file-format error.

use bytes::Buf;

use crate::error::{AtlasError, Result};

use super::LengthPrefix;

/// Cursor over a borrowed byte slice
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    consumed: usize,
}

macro_rules! read_fixed {
    ($name:ident, $ty:ty, $get:ident) => {
        pub fn $name(&mut self) -> Result<$ty> {
            self.need(std::mem::size_of::<$ty>(), stringify!($ty))?;
            self.consumed += std::mem::size_of::<$ty>();
            Ok(self.buf.$get())
        }
    };
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, consumed: 0 }
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    /// Bytes consumed so far
    pub fn position(&self) -> usize {
        self.consumed
    }

    fn need(&self, len: usize, what: &str) -> Result<()> {
        if self.buf.remaining() < len {
            return Err(AtlasError::format(format!(
                "truncated {}: need {} bytes, {} remain",
                what,
                len,
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    read_fixed!(read_u8, u8, get_u8);
    read_fixed!(read_u16, u16, get_u16);
    read_fixed!(read_u32, u32, get_u32);
    read_fixed!(read_u64, u64, get_u64);
    read_fixed!(read_i8, i8, get_i8);
    read_fixed!(read_i16, i16, get_i16);
    read_fixed!(read_i32, i32, get_i32);
    read_fixed!(read_i64, i64, get_i64);
    read_fixed!(read_f32, f32, get_f32);
    read_fixed!(read_f64, f64, get_f64);

    /// Take exactly `len` raw bytes
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.need(len, "byte range")?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        self.consumed += len;
        Ok(head)
    }

    /// Read a length prefix of the given width, then that many bytes
    pub fn read_prefixed(&mut self, prefix: LengthPrefix) -> Result<&'a [u8]> {
        let len = match prefix {
            LengthPrefix::Short => self.read_u8()? as usize,
            LengthPrefix::Long => self.read_u16()? as usize,
            LengthPrefix::Huge => self.read_u32()? as usize,
        };
        if len > prefix.max_len() {
            return Err(AtlasError::format(format!(
                "declared length {} exceeds maximum {}",
                len,
                prefix.max_len()
            )));
        }
        self.read_bytes(len)
    }

    pub fn read_short_bytes(&mut self) -> Result<&'a [u8]> {
        self.read_prefixed(LengthPrefix::Short)
    }

    pub fn read_long_bytes(&mut self) -> Result<&'a [u8]> {
        self.read_prefixed(LengthPrefix::Long)
    }

    pub fn read_huge_bytes(&mut self) -> Result<&'a [u8]> {
        self.read_prefixed(LengthPrefix::Huge)
    }

    /// Short byte string decoded as UTF-8
    pub fn read_short_str(&mut self) -> Result<&'a str> {
        let bytes = self.read_short_bytes()?;
        std::str::from_utf8(bytes).map_err(|e| AtlasError::format(format!("invalid UTF-8: {}", e)))
    }
}
