//! Typed column values.

use std::cmp::Ordering;
use std::fmt;

use crate::common::{Error, Result};

use super::{put_string, Decoder};

/// Column type tag, stored as a `u32` in serialized columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum TypeId {
    Int = 1,
    Float = 2,
    Char = 3,
}

impl TypeId {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(TypeId::Int),
            2 => Some(TypeId::Float),
            3 => Some(TypeId::Char),
            _ => None,
        }
    }

    /// Byte length of fixed-size types.
    pub fn fixed_len(&self) -> Option<u32> {
        match self {
            TypeId::Int | TypeId::Float => Some(4),
            TypeId::Char => None,
        }
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeId::Int => "INT",
            TypeId::Float => "FLOAT",
            TypeId::Char => "CHAR",
        };
        f.write_str(name)
    }
}

/// A single value in a row.
///
/// Nulls carry no payload; their type comes from the schema and their
/// presence from the row's null bitmap.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Null,
    Int(i32),
    Float(f32),
    Char(String),
}

impl Field {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Field::Null)
    }

    /// Type of a non-null field.
    pub fn type_id(&self) -> Option<TypeId> {
        match self {
            Field::Null => None,
            Field::Int(_) => Some(TypeId::Int),
            Field::Float(_) => Some(TypeId::Float),
            Field::Char(_) => Some(TypeId::Char),
        }
    }

    /// Bytes written by [`Field::serialize_to`]; zero for null.
    pub fn serialized_size(&self) -> usize {
        match self {
            Field::Null => 0,
            Field::Int(_) | Field::Float(_) => 4,
            Field::Char(s) => 4 + s.len(),
        }
    }

    pub fn serialize_to(&self, buf: &mut Vec<u8>) {
        match self {
            Field::Null => {}
            Field::Int(v) => buf.extend_from_slice(&v.to_le_bytes()),
            Field::Float(v) => buf.extend_from_slice(&v.to_le_bytes()),
            Field::Char(s) => put_string(buf, s),
        }
    }

    pub(crate) fn decode(dec: &mut Decoder<'_>, type_id: TypeId, is_null: bool) -> Result<Self> {
        if is_null {
            return Ok(Field::Null);
        }
        Ok(match type_id {
            TypeId::Int => Field::Int(dec.u32()? as i32),
            TypeId::Float => Field::Float(f32::from_bits(dec.u32()?)),
            TypeId::Char => Field::Char(dec.string()?),
        })
    }

    /// Decode a field of the given type. Returns the field and the bytes consumed.
    ///
    /// # Errors
    /// Returns `Error::Corruption` if `buf` is too short.
    pub fn deserialize_from(buf: &[u8], type_id: TypeId, is_null: bool) -> Result<(Self, usize)> {
        let mut dec = Decoder::new(buf);
        let field = Self::decode(&mut dec, type_id, is_null)?;
        Ok((field, dec.position()))
    }

    /// Total order used by index keys.
    ///
    /// Null sorts before every value; floats use IEEE total ordering.
    /// Values of different types order by type tag.
    pub fn compare(&self, other: &Field) -> Ordering {
        match (self, other) {
            (Field::Null, Field::Null) => Ordering::Equal,
            (Field::Null, _) => Ordering::Less,
            (_, Field::Null) => Ordering::Greater,
            (Field::Int(a), Field::Int(b)) => a.cmp(b),
            (Field::Float(a), Field::Float(b)) => a.total_cmp(b),
            (Field::Char(a), Field::Char(b)) => a.cmp(b),
            (a, b) => {
                let tag = |f: &Field| f.type_id().map_or(0, |t| t as u32);
                tag(a).cmp(&tag(b))
            }
        }
    }

    /// Check that this field may be stored in a column of `type_id`.
    pub(crate) fn check_type(&self, type_id: TypeId) -> Result<()> {
        match self.type_id() {
            Some(t) if t != type_id => Err(Error::Corruption(format!(
                "{} value in {} column",
                t, type_id
            ))),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Null => f.write_str("NULL"),
            Field::Int(v) => write!(f, "{}", v),
            Field::Float(v) => write!(f, "{}", v),
            Field::Char(s) => write!(f, "'{}'", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_encoding() {
        let mut buf = Vec::new();
        Field::Int(-2).serialize_to(&mut buf);
        Field::Null.serialize_to(&mut buf);
        Field::Char("hi".into()).serialize_to(&mut buf);
        assert_eq!(buf, [0xFE, 0xFF, 0xFF, 0xFF, 2, 0, 0, 0, b'h', b'i']);

        let (field, used) = Field::deserialize_from(&buf[4..], TypeId::Char, false).unwrap();
        assert_eq!(field, Field::Char("hi".into()));
        assert_eq!(used, 6);
        assert_eq!(used, field.serialized_size());
    }

    #[test]
    fn test_field_null_consumes_nothing() {
        let (field, used) = Field::deserialize_from(&[], TypeId::Int, true).unwrap();
        assert!(field.is_null());
        assert_eq!(used, 0);
    }

    #[test]
    fn test_field_compare() {
        assert_eq!(Field::Int(1).compare(&Field::Int(2)), Ordering::Less);
        assert_eq!(Field::Null.compare(&Field::Int(i32::MIN)), Ordering::Less);
        assert_eq!(
            Field::Float(-0.5).compare(&Field::Float(0.25)),
            Ordering::Less
        );
        assert_eq!(
            Field::Char("b".into()).compare(&Field::Char("ab".into())),
            Ordering::Greater
        );
    }

    #[test]
    fn test_field_check_type() {
        assert!(Field::Int(3).check_type(TypeId::Int).is_ok());
        assert!(Field::Null.check_type(TypeId::Char).is_ok());
        assert!(Field::Float(1.0).check_type(TypeId::Int).is_err());
    }

    #[test]
    fn test_type_id_tags() {
        for t in [TypeId::Int, TypeId::Float, TypeId::Char] {
            assert_eq!(TypeId::from_u32(t as u32), Some(t));
        }
        assert_eq!(TypeId::from_u32(0), None);
        assert_eq!(TypeId::Char.fixed_len(), None);
    }
}
