//! Column definitions.

use crate::common::{Error, Result};

use super::{put_string, put_u32, Decoder, TypeId};

const COLUMN_MAGIC_NUM: u32 = 210928;

/// One column of a table or key schema.
///
/// # Serialized Layout
/// ```text
/// magic u32 | name_len u32 | name | type u32 | len u32 | table_ind u32 | nullable u8 | unique u8
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    type_id: TypeId,
    /// Byte length for fixed types, maximum length for `CHAR`.
    len: u32,
    /// Position of the column in its table.
    table_ind: u32,
    nullable: bool,
    unique: bool,
}

impl Column {
    pub fn int(name: impl Into<String>, table_ind: u32) -> Self {
        Self::fixed(name.into(), TypeId::Int, table_ind)
    }

    pub fn float(name: impl Into<String>, table_ind: u32) -> Self {
        Self::fixed(name.into(), TypeId::Float, table_ind)
    }

    /// A `CHAR(max_len)` column.
    pub fn char(name: impl Into<String>, max_len: u32, table_ind: u32) -> Self {
        Self {
            name: name.into(),
            type_id: TypeId::Char,
            len: max_len,
            table_ind,
            nullable: false,
            unique: false,
        }
    }

    fn fixed(name: String, type_id: TypeId, table_ind: u32) -> Self {
        Self {
            name,
            type_id,
            len: type_id.fixed_len().unwrap_or(0),
            table_ind,
            nullable: false,
            unique: false,
        }
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn with_unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.len
    }

    #[inline]
    pub fn table_ind(&self) -> u32 {
        self.table_ind
    }

    #[inline]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    #[inline]
    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn serialized_size(&self) -> usize {
        4 + 4 + self.name.len() + 4 + 4 + 4 + 1 + 1
    }

    pub fn serialize_to(&self, buf: &mut Vec<u8>) {
        put_u32(buf, COLUMN_MAGIC_NUM);
        put_string(buf, &self.name);
        put_u32(buf, self.type_id as u32);
        put_u32(buf, self.len);
        put_u32(buf, self.table_ind);
        buf.push(self.nullable as u8);
        buf.push(self.unique as u8);
    }

    pub(crate) fn decode(dec: &mut Decoder<'_>) -> Result<Self> {
        let magic = dec.u32()?;
        if magic != COLUMN_MAGIC_NUM {
            return Err(Error::Corruption(format!(
                "column magic number {} (expected {})",
                magic, COLUMN_MAGIC_NUM
            )));
        }
        let name = dec.string()?;
        let raw_type = dec.u32()?;
        let type_id = TypeId::from_u32(raw_type)
            .ok_or_else(|| Error::Corruption(format!("unknown column type {}", raw_type)))?;
        Ok(Self {
            name,
            type_id,
            len: dec.u32()?,
            table_ind: dec.u32()?,
            nullable: dec.bool()?,
            unique: dec.bool()?,
        })
    }

    /// Decode a column. Returns the column and the bytes consumed.
    ///
    /// # Errors
    /// Returns `Error::Corruption` on a magic number mismatch, an unknown
    /// type tag, or a short buffer.
    pub fn deserialize_from(buf: &[u8]) -> Result<(Self, usize)> {
        let mut dec = Decoder::new(buf);
        let column = Self::decode(&mut dec)?;
        Ok((column, dec.position()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_constructors() {
        let id = Column::int("id", 0).with_unique(true);
        assert_eq!(id.len(), 4);
        assert!(id.is_unique());
        assert!(!id.is_nullable());

        let name = Column::char("name", 32, 1).with_nullable(true);
        assert_eq!(name.type_id(), TypeId::Char);
        assert_eq!(name.len(), 32);
        assert!(name.is_nullable());
    }

    #[test]
    fn test_column_serialization() {
        let column = Column::char("name", 64, 2).with_nullable(true);
        let mut buf = Vec::new();
        column.serialize_to(&mut buf);
        assert_eq!(buf.len(), column.serialized_size());

        let (decoded, used) = Column::deserialize_from(&buf).unwrap();
        assert_eq!(decoded, column);
        assert_eq!(used, buf.len());
    }

    #[test]
    fn test_column_bad_magic() {
        let mut buf = Vec::new();
        Column::float("x", 0).serialize_to(&mut buf);
        buf[0] ^= 0xFF;
        assert!(matches!(
            Column::deserialize_from(&buf),
            Err(Error::Corruption(_))
        ));
    }
}
