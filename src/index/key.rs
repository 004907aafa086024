//! Index keys and their ordering.

use std::cmp::Ordering;

use crate::common::{Error, Result};
use crate::record::{Decoder, Row, Schema, TypeId};

/// Total order over the fixed-size key blobs stored in tree pages.
///
/// # Errors
/// Implementations return `Error::Corruption` for a blob they cannot
/// interpret; the tree surfaces it from the operation that compared.
pub trait KeyComparator: Send + Sync {
    fn compare(&self, a: &[u8], b: &[u8]) -> Result<Ordering>;
}

/// Lexicographic byte order, for keys with an order-preserving encoding
/// (big-endian integers, padded strings).
#[derive(Debug, Clone, Copy, Default)]
pub struct BytewiseComparator;

impl KeyComparator for BytewiseComparator {
    #[inline]
    fn compare(&self, a: &[u8], b: &[u8]) -> Result<Ordering> {
        Ok(a.cmp(b))
    }
}

/// Serializes key rows into fixed-size blobs and orders them by field.
///
/// A key blob is the row encoding of the key fields, zero-padded to
/// `key_size`.
#[derive(Debug, Clone)]
pub struct KeyManager {
    key_schema: Schema,
    key_size: usize,
}

impl KeyManager {
    pub fn new(key_schema: Schema, key_size: usize) -> Self {
        Self {
            key_schema,
            key_size,
        }
    }

    /// Size a key blob to hold any row of `key_schema`.
    pub fn for_schema(key_schema: Schema) -> Self {
        let n = key_schema.column_count();
        let fields: usize = key_schema
            .columns()
            .iter()
            .map(|c| match c.type_id() {
                TypeId::Char => 4 + c.len() as usize,
                _ => c.len() as usize,
            })
            .sum();
        let key_size = 4 + n.div_ceil(8) + fields;
        Self::new(key_schema, key_size)
    }

    #[inline]
    pub fn key_schema(&self) -> &Schema {
        &self.key_schema
    }

    #[inline]
    pub fn key_size(&self) -> usize {
        self.key_size
    }

    /// Encode a key row.
    ///
    /// # Errors
    /// Returns `Error::KeyTooLarge` if the encoding exceeds the key size, or
    /// the row's serialization error if it does not match the key schema.
    pub fn serialize_key(&self, key: &Row) -> Result<Vec<u8>> {
        let mut buf = key.to_bytes(&self.key_schema)?;
        if buf.len() > self.key_size {
            return Err(Error::KeyTooLarge {
                size: buf.len(),
                max: self.key_size,
            });
        }
        buf.resize(self.key_size, 0);
        Ok(buf)
    }

    pub fn deserialize_key(&self, key: &[u8]) -> Result<Row> {
        Row::deserialize_from(key, &self.key_schema).map(|(row, _)| row)
    }
}

/// Compares field by field straight off the encoded blobs, in the same
/// order as [`Field::compare`](crate::record::Field::compare).
impl KeyComparator for KeyManager {
    fn compare(&self, a: &[u8], b: &[u8]) -> Result<Ordering> {
        let mut a = EncodedKey::open(a, &self.key_schema)?;
        let mut b = EncodedKey::open(b, &self.key_schema)?;
        for (i, column) in self.key_schema.columns().iter().enumerate() {
            let x = a.next_field(i, column.type_id())?;
            let y = b.next_field(i, column.type_id())?;
            let ord = match (x, y) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(EncodedField::Int(x)), Some(EncodedField::Int(y))) => x.cmp(&y),
                (Some(EncodedField::Float(x)), Some(EncodedField::Float(y))) => x.total_cmp(&y),
                (Some(EncodedField::Char(x)), Some(EncodedField::Char(y))) => x.cmp(y),
                _ => {
                    return Err(Error::Corruption(format!(
                        "key field {} decoded as two different types",
                        i
                    )))
                }
            };
            if ord.is_ne() {
                return Ok(ord);
            }
        }
        Ok(Ordering::Equal)
    }
}

/// A non-null key field borrowed from its blob. `Char` holds the UTF-8
/// bytes, whose order matches `str` order.
enum EncodedField<'a> {
    Int(i32),
    Float(f32),
    Char(&'a [u8]),
}

/// Reads the fields of a key blob in column order without allocating.
struct EncodedKey<'a> {
    null_bitmap: &'a [u8],
    dec: Decoder<'a>,
}

impl<'a> EncodedKey<'a> {
    fn open(blob: &'a [u8], schema: &Schema) -> Result<Self> {
        let mut dec = Decoder::new(blob);
        let count = dec.u32()? as usize;
        if count != schema.column_count() {
            return Err(Error::Corruption(format!(
                "index key holds {} fields, key schema has {}",
                count,
                schema.column_count()
            )));
        }
        let null_bitmap = dec.bytes(count.div_ceil(8))?;
        Ok(Self { null_bitmap, dec })
    }

    fn next_field(&mut self, index: usize, type_id: TypeId) -> Result<Option<EncodedField<'a>>> {
        if self.null_bitmap[index / 8] & (1 << (index % 8)) != 0 {
            return Ok(None);
        }
        Ok(Some(match type_id {
            TypeId::Int => EncodedField::Int(self.dec.u32()? as i32),
            TypeId::Float => EncodedField::Float(f32::from_bits(self.dec.u32()?)),
            TypeId::Char => {
                let len = self.dec.u32()? as usize;
                EncodedField::Char(self.dec.bytes(len)?)
            }
        }))
    }
}
