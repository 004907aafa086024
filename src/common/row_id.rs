//! Row and index identifiers.

use std::fmt;

use super::page_id::PageId;

/// Address of a stored row: the table page it lives on and its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId {
    pub page_id: PageId,
    pub slot: u32,
}

impl RowId {
    /// Size of a serialized row ID in bytes.
    pub const SIZE: usize = 8;

    pub const INVALID: RowId = RowId {
        page_id: PageId::INVALID,
        slot: 0,
    };

    #[inline]
    pub fn new(page_id: PageId, slot: u32) -> Self {
        Self { page_id, slot }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.page_id.is_valid()
    }

    /// Decode from the first eight bytes of `buf`.
    pub fn from_le_slice(buf: &[u8]) -> Self {
        let page_id = PageId::from_le_slice(&buf[0..4]);
        let slot = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        Self { page_id, slot }
    }

    /// Encode into the first eight bytes of `buf`.
    pub fn write_le(&self, buf: &mut [u8]) {
        self.page_id.write_le(&mut buf[0..4]);
        buf[4..8].copy_from_slice(&self.slot.to_le_bytes());
    }
}

impl Default for RowId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Row({}, {})", self.page_id.0, self.slot)
    }
}

/// Identifies an index in the index-roots page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexId(pub u32);

impl fmt::Display for IndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Index({})", self.0)
    }
}
