//! Sequential scan over a [`TableHeap`].

use crate::common::{Error, Result, RowId};
use crate::record::Row;
use crate::storage::page::TablePage;

use super::TableHeap;

/// Iterator over the live rows of a heap, in page-list then slot order.
///
/// Pins a page only while reading one row, so a scan never holds a frame
/// between calls to `next`.
pub struct TableIterator<'a> {
    heap: &'a TableHeap,
    rid: RowId,
}

impl<'a> TableIterator<'a> {
    pub(crate) fn new(heap: &'a TableHeap, rid: RowId) -> Self {
        Self { heap, rid }
    }

    /// Id of the row the next call to `next` returns, invalid at the end.
    #[inline]
    pub fn rid(&self) -> RowId {
        self.rid
    }

    fn read_and_advance(&mut self) -> Result<Row> {
        let rid = self.rid;
        let bpm = self.heap.buffer_pool();
        let (row, next_slot, next_page) = {
            let guard = bpm.fetch_page_read(rid.page_id)?;
            let page = TablePage::open(guard.as_slice())?;
            let bytes = page
                .get_tuple(rid.slot)
                .ok_or_else(|| Error::Corruption(format!("{} vanished during scan", rid)))?;
            let (mut row, _) = Row::deserialize_from(bytes, self.heap.schema())?;
            row.set_rid(rid);
            (row, page.next_tuple_slot(rid.slot), page.next_page_id())
        };

        self.rid = match next_slot {
            Some(slot) => RowId::new(rid.page_id, slot),
            None => self.heap.first_rid_from(next_page)?,
        };
        Ok(row)
    }
}

impl Iterator for TableIterator<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.rid.is_valid() {
            return None;
        }
        let item = self.read_and_advance();
        if item.is_err() {
            self.rid = RowId::INVALID;
        }
        Some(item)
    }
}

impl PartialEq for TableIterator<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.heap, other.heap) && self.rid == other.rid
    }
}
