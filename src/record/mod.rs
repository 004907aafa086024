//! Row, schema and column serialization.
//!
//! These types are the payload contract moved around by the table heap and
//! the B+tree:
//! - [`TypeId`] / [`Field`] - Typed values
//! - [`Column`] / [`Schema`] - Table and key layouts
//! - [`Row`] - An ordered list of fields, serialized against a schema
//!
//! All integers are little-endian. Decoding never trusts lengths read from
//! the buffer; a short buffer is reported as [`Error::Corruption`].

mod column;
mod field;
mod row;
mod schema;

pub use column::Column;
pub use field::{Field, TypeId};
pub use row::Row;
pub use schema::Schema;

use crate::common::{Error, Result};

/// Sequential little-endian decoder over a byte slice.
pub(crate) struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes consumed so far.
    #[inline]
    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| {
                Error::Corruption(format!(
                    "need {} bytes at offset {}, buffer holds {}",
                    len,
                    self.pos,
                    self.buf.len()
                ))
            })?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub(crate) fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    pub(crate) fn u32(&mut self) -> Result<u32> {
        let b = self.bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn bool(&mut self) -> Result<bool> {
        Ok(self.u8()? != 0)
    }

    /// Read a 4-byte length followed by that many UTF-8 bytes.
    pub(crate) fn string(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        let bytes = self.bytes(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::Corruption(format!("invalid UTF-8 in string: {}", e)))
    }
}

#[inline]
pub(crate) fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

#[inline]
pub(crate) fn put_string(buf: &mut Vec<u8>, value: &str) {
    put_u32(buf, value.len() as u32);
    buf.extend_from_slice(value.as_bytes());
}
