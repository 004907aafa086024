//! Ordered column lists.

use crate::common::{Error, Result};

use super::{put_u32, Column, Decoder};

const SCHEMA_MAGIC_NUM: u32 = 200715;

/// Layout of a table or an index key.
///
/// # Serialized Layout
/// ```text
/// magic u32 | column_count u32 | column 0 | column 1 | ...
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    #[inline]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[inline]
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    #[inline]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Position of the column called `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    /// Build a key schema from the named columns of this schema.
    ///
    /// # Errors
    /// Returns `Error::ColumnNotFound` for an unknown name.
    pub fn project(&self, names: &[&str]) -> Result<Schema> {
        let columns = names
            .iter()
            .map(|name| {
                self.column_index(name)
                    .map(|i| self.columns[i].clone())
                    .ok_or_else(|| Error::ColumnNotFound((*name).to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Schema::new(columns))
    }

    pub fn serialized_size(&self) -> usize {
        8 + self
            .columns
            .iter()
            .map(Column::serialized_size)
            .sum::<usize>()
    }

    pub fn serialize_to(&self, buf: &mut Vec<u8>) {
        put_u32(buf, SCHEMA_MAGIC_NUM);
        put_u32(buf, self.columns.len() as u32);
        for column in &self.columns {
            column.serialize_to(buf);
        }
    }

    /// Decode a schema. Returns the schema and the bytes consumed.
    ///
    /// # Errors
    /// Returns `Error::Corruption` on a magic number mismatch in the schema
    /// or any of its columns, or on a short buffer.
    pub fn deserialize_from(buf: &[u8]) -> Result<(Self, usize)> {
        let mut dec = Decoder::new(buf);
        let magic = dec.u32()?;
        if magic != SCHEMA_MAGIC_NUM {
            return Err(Error::Corruption(format!(
                "schema magic number {} (expected {})",
                magic, SCHEMA_MAGIC_NUM
            )));
        }
        let count = dec.u32()? as usize;
        let mut columns = Vec::with_capacity(count.min(256));
        for _ in 0..count {
            columns.push(Column::decode(&mut dec)?);
        }
        Ok((Self { columns }, dec.position()))
    }
}
