//! Rows: ordered field lists serialized against a schema.

use crate::common::{Error, Result, RowId};

use super::{put_u32, Decoder, Field, Schema};

/// A tuple of fields, optionally tagged with where it is stored.
///
/// # Serialized Layout
/// ```text
/// field_count u32 | null bitmap ceil(n/8) bytes | non-null fields...
/// ```
/// Bit `i % 8` of bitmap byte `i / 8` is set when field `i` is null.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    fields: Vec<Field>,
    rid: RowId,
}

impl Row {
    pub fn new(fields: Vec<Field>) -> Self {
        Self {
            fields,
            rid: RowId::INVALID,
        }
    }

    #[inline]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    #[inline]
    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    #[inline]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Storage address, `RowId::INVALID` until the row is stored or read.
    #[inline]
    pub fn rid(&self) -> RowId {
        self.rid
    }

    #[inline]
    pub fn set_rid(&mut self, rid: RowId) {
        self.rid = rid;
    }

    fn check_schema(&self, schema: &Schema) -> Result<()> {
        if self.fields.len() != schema.column_count() {
            return Err(Error::SchemaMismatch {
                expected: schema.column_count(),
                actual: self.fields.len(),
            });
        }
        Ok(())
    }

    /// # Errors
    /// Returns `Error::SchemaMismatch` if the field count differs from the
    /// schema's column count.
    pub fn serialized_size(&self, schema: &Schema) -> Result<usize> {
        self.check_schema(schema)?;
        let n = self.fields.len();
        Ok(4 + n.div_ceil(8) + self.fields.iter().map(Field::serialized_size).sum::<usize>())
    }

    /// Append the row's encoding to `buf`.
    ///
    /// # Errors
    /// Returns `Error::SchemaMismatch` if the field count differs from the
    /// schema's column count, and `Error::Corruption` if a field's type
    /// does not match its column.
    pub fn serialize_to(&self, buf: &mut Vec<u8>, schema: &Schema) -> Result<()> {
        self.check_schema(schema)?;
        for (field, column) in self.fields.iter().zip(schema.columns()) {
            field.check_type(column.type_id())?;
        }

        let n = self.fields.len();
        put_u32(buf, n as u32);
        let bitmap_start = buf.len();
        buf.resize(bitmap_start + n.div_ceil(8), 0);
        for (i, field) in self.fields.iter().enumerate() {
            if field.is_null() {
                buf[bitmap_start + i / 8] |= 1 << (i % 8);
            }
        }
        for field in &self.fields {
            field.serialize_to(buf);
        }
        Ok(())
    }

    /// Encode into a fresh buffer.
    pub fn to_bytes(&self, schema: &Schema) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.serialized_size(schema)?);
        self.serialize_to(&mut buf, schema)?;
        Ok(buf)
    }

    /// Decode a row. Returns the row and the bytes consumed.
    ///
    /// # Errors
    /// Returns `Error::SchemaMismatch` if the stored field count differs
    /// from the schema, and `Error::Corruption` on a short buffer.
    pub fn deserialize_from(buf: &[u8], schema: &Schema) -> Result<(Self, usize)> {
        let mut dec = Decoder::new(buf);
        let n = dec.u32()? as usize;
        if n != schema.column_count() {
            return Err(Error::SchemaMismatch {
                expected: schema.column_count(),
                actual: n,
            });
        }
        let bitmap = dec.bytes(n.div_ceil(8))?;
        let mut fields = Vec::with_capacity(n);
        for (i, column) in schema.columns().iter().enumerate() {
            let is_null = bitmap[i / 8] & (1 << (i % 8)) != 0;
            fields.push(Field::decode(&mut dec, column.type_id(), is_null)?);
        }
        Ok((Self::new(fields), dec.position()))
    }

    /// Extract the fields named by `key_schema` from a row of `schema`.
    ///
    /// # Errors
    /// Returns `Error::ColumnNotFound` if a key column is not in `schema`.
    pub fn key_from_row(&self, schema: &Schema, key_schema: &Schema) -> Result<Row> {
        let fields = key_schema
            .columns()
            .iter()
            .map(|column| {
                schema
                    .column_index(column.name())
                    .and_then(|i| self.fields.get(i))
                    .cloned()
                    .ok_or_else(|| Error::ColumnNotFound(column.name().to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Row::new(fields))
    }
}
