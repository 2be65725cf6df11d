//! Value and column-spec encoding

use bytes::BufMut;

use crate::codec::{
    put_huge_bytes, put_long_bytes, put_short_bytes, truncate_bytes, truncate_str, ByteReader,
    HUGE_MAX, LONG_MAX, SHORT_MAX,
};
use crate::error::{AtlasError, Result};

use super::{Column, ColumnType, Value};

impl Column {
    // =========================================================================
    // Values
    // =========================================================================

    /// Append the encoding of `value` to `buf`
    ///
    /// Strings and byte strings longer than the variant maximum are cut.
    /// Integer columns take `Int` and `UInt` alike and reject values outside
    /// the column's width.
    pub fn encode(&self, value: &Value, buf: &mut impl BufMut) -> Result<()> {
        match (self.column_type, value) {
            (ColumnType::Int8, Value::Int(_) | Value::UInt(_)) => buf.put_i8(self.narrow(value)?),
            (ColumnType::Int16, Value::Int(_) | Value::UInt(_)) => buf.put_i16(self.narrow(value)?),
            (ColumnType::Int32, Value::Int(_) | Value::UInt(_)) => buf.put_i32(self.narrow(value)?),
            (ColumnType::Int64 | ColumnType::Counter, Value::Int(_) | Value::UInt(_)) => {
                buf.put_i64(self.narrow(value)?)
            }
            (ColumnType::UInt8, Value::Int(_) | Value::UInt(_)) => buf.put_u8(self.narrow(value)?),
            (ColumnType::UInt16, Value::Int(_) | Value::UInt(_)) => {
                buf.put_u16(self.narrow(value)?)
            }
            (ColumnType::UInt32, Value::Int(_) | Value::UInt(_)) => {
                buf.put_u32(self.narrow(value)?)
            }
            (ColumnType::UInt64, Value::Int(_) | Value::UInt(_)) => {
                buf.put_u64(self.narrow(value)?)
            }
            (ColumnType::Float32, Value::Float(v)) => buf.put_f32(*v as f32),
            (ColumnType::Float64, Value::Float(v)) => buf.put_f64(*v),

            (ColumnType::ShortString, Value::Text(s)) => {
                put_short_bytes(buf, truncate_str(s, SHORT_MAX).as_bytes());
            }
            (ColumnType::LongString, Value::Text(s)) => {
                put_long_bytes(buf, truncate_str(s, LONG_MAX).as_bytes());
            }
            (ColumnType::Text, Value::Text(s)) => {
                put_huge_bytes(buf, truncate_str(s, HUGE_MAX).as_bytes());
            }
            (ColumnType::FixedString(n), Value::Text(s)) => {
                put_padded(buf, truncate_str(s, n as usize).as_bytes(), n as usize);
            }

            (ColumnType::ShortBytes, Value::Bytes(b)) => {
                put_short_bytes(buf, b);
            }
            (ColumnType::LongBytes, Value::Bytes(b)) => {
                put_long_bytes(buf, b);
            }
            (ColumnType::Blob, Value::Bytes(b)) => {
                put_huge_bytes(buf, b);
            }
            (ColumnType::FixedBytes(n), Value::Bytes(b)) => {
                put_padded(buf, truncate_bytes(b, n as usize), n as usize);
            }

            (_, value) => return Err(self.mismatch(value)),
        }
        Ok(())
    }

    /// Encoded bytes of `value`
    pub fn encode_to_vec(&self, value: &Value) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.encode(value, &mut buf)?;
        Ok(buf)
    }

    /// Decode one value of this column
    pub fn decode(&self, reader: &mut ByteReader<'_>) -> Result<Value> {
        Ok(match self.column_type {
            ColumnType::Int8 => Value::Int(reader.read_i8()? as i64),
            ColumnType::Int16 => Value::Int(reader.read_i16()? as i64),
            ColumnType::Int32 => Value::Int(reader.read_i32()? as i64),
            ColumnType::Int64 | ColumnType::Counter => Value::Int(reader.read_i64()?),
            ColumnType::UInt8 => Value::UInt(reader.read_u8()? as u64),
            ColumnType::UInt16 => Value::UInt(reader.read_u16()? as u64),
            ColumnType::UInt32 => Value::UInt(reader.read_u32()? as u64),
            ColumnType::UInt64 => Value::UInt(reader.read_u64()?),
            ColumnType::Float32 => Value::Float(reader.read_f32()? as f64),
            ColumnType::Float64 => Value::Float(reader.read_f64()?),

            ColumnType::ShortString => Value::Text(self.utf8(reader.read_short_bytes()?)?),
            ColumnType::LongString => Value::Text(self.utf8(reader.read_long_bytes()?)?),
            ColumnType::Text => Value::Text(self.utf8(reader.read_huge_bytes()?)?),
            ColumnType::FixedString(n) => {
                let raw = reader.read_bytes(n as usize)?;
                let end = raw.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
                Value::Text(self.utf8(&raw[..end])?)
            }

            ColumnType::ShortBytes => Value::Bytes(reader.read_short_bytes()?.to_vec()),
            ColumnType::LongBytes => Value::Bytes(reader.read_long_bytes()?.to_vec()),
            ColumnType::Blob => Value::Bytes(reader.read_huge_bytes()?.to_vec()),
            ColumnType::FixedBytes(n) => Value::Bytes(reader.read_bytes(n as usize)?.to_vec()),
        })
    }

    /// Encode then decode: the value as it will read back after truncation
    pub fn normalize(&self, value: &Value) -> Result<Value> {
        let bytes = self.encode_to_vec(value)?;
        self.decode(&mut ByteReader::new(&bytes))
    }

    /// Fit an integer value into the column's width
    fn narrow<U: TryFrom<i128>>(&self, value: &Value) -> Result<U> {
        let wide = match value {
            Value::Int(v) => *v as i128,
            Value::UInt(v) => *v as i128,
            other => return Err(self.mismatch(other)),
        };
        U::try_from(wide).map_err(|_| AtlasError::ValueOutOfRange {
            column: self.name.clone(),
            value: wide.to_string(),
        })
    }

    fn mismatch(&self, value: &Value) -> AtlasError {
        AtlasError::TypeMismatch {
            column: self.name.clone(),
            expected: self.column_type.expected_value(),
            found: value.kind_name(),
        }
    }

    fn utf8(&self, bytes: &[u8]) -> Result<String> {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| AtlasError::format(format!("column {}: invalid UTF-8: {}", self.name, e)))
    }

    // =========================================================================
    // Column Spec
    // =========================================================================

    /// Bytes taken by this column's spec
    pub fn spec_len(&self) -> usize {
        let name = truncate_str(&self.name, SHORT_MAX).len();
        let size = if self.column_type.fixed_size().is_some() { 2 } else { 0 };
        1 + name + 1 + size
    }

    /// Append `[NameLen][Name][Tag]` (plus `[Size: u16]` for fixed variants)
    pub fn encode_spec(&self, buf: &mut impl BufMut) {
        put_short_bytes(buf, truncate_str(&self.name, SHORT_MAX).as_bytes());
        buf.put_u8(self.column_type.tag());
        if let Some(size) = self.column_type.fixed_size() {
            buf.put_u16(size);
        }
    }

    pub fn decode_spec(reader: &mut ByteReader<'_>) -> Result<Column> {
        let name = reader.read_short_str()?.to_string();
        let tag = reader.read_u8()?;
        let column_type = ColumnType::from_tag(tag, || reader.read_u16())?;
        Ok(Column { name, column_type })
    }
}

fn put_padded(buf: &mut impl BufMut, bytes: &[u8], size: usize) {
    buf.put_slice(bytes);
    buf.put_bytes(0, size - bytes.len());
}
