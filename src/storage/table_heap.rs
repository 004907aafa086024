//! Table heap: a doubly linked list of slotted table pages.
//!
//! Rows are addressed by [`RowId`] (page id + slot). Deletion is two-phase:
//! [`TableHeap::mark_delete`] hides a row and can be undone with
//! [`TableHeap::rollback_delete`]; [`TableHeap::apply_delete`] reclaims it.

use std::sync::Arc;

use log::debug;

use crate::buffer::BufferPoolManager;
use crate::common::{Error, PageId, Result, RowId};
use crate::record::{Row, Schema};
use crate::storage::page::{TablePage, UpdateResult, MAX_TUPLE_SIZE};

use super::TableIterator;

pub struct TableHeap {
    bpm: Arc<BufferPoolManager>,
    schema: Arc<Schema>,
    first_page_id: PageId,
}

impl TableHeap {
    /// Allocate the first page of a new, empty heap.
    ///
    /// # Errors
    /// Returns the buffer pool's error if no page can be allocated.
    pub fn create(bpm: Arc<BufferPoolManager>, schema: Arc<Schema>) -> Result<Self> {
        let first_page_id = {
            let mut guard = bpm.new_page()?;
            let page_id = guard.page_id();
            TablePage::new(guard.as_mut_slice()).init(page_id, PageId::INVALID);
            page_id
        };
        debug!("created table heap at {}", first_page_id);
        Ok(Self {
            bpm,
            schema,
            first_page_id,
        })
    }

    /// Attach to a heap created earlier.
    ///
    /// # Errors
    /// Returns `Error::InvalidPageId` for the sentinel page id, or the
    /// buffer pool's error if the first page cannot be read.
    pub fn open(
        bpm: Arc<BufferPoolManager>,
        first_page_id: PageId,
        schema: Arc<Schema>,
    ) -> Result<Self> {
        if !first_page_id.is_valid() {
            return Err(Error::InvalidPageId(first_page_id));
        }
        {
            let guard = bpm.fetch_page_read(first_page_id)?;
            let stored = TablePage::open(guard.as_slice())?.page_id();
            if stored != first_page_id {
                return Err(Error::Corruption(format!(
                    "{} is not a table page (header says {})",
                    first_page_id, stored
                )));
            }
        }
        Ok(Self {
            bpm,
            schema,
            first_page_id,
        })
    }

    #[inline]
    pub fn first_page_id(&self) -> PageId {
        self.first_page_id
    }

    #[inline]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    #[inline]
    pub fn buffer_pool(&self) -> &Arc<BufferPoolManager> {
        &self.bpm
    }

    /// Store `row` in the first page with room for it, appending a page to
    /// the list when none has. On success the row's id is set and returned.
    ///
    /// # Errors
    /// - `Error::TupleTooLarge` if the row cannot fit in an empty page
    /// - the row's serialization error if it does not match the schema
    pub fn insert_tuple(&mut self, row: &mut Row) -> Result<RowId> {
        let tuple = row.to_bytes(&self.schema)?;
        if tuple.len() > MAX_TUPLE_SIZE {
            return Err(Error::TupleTooLarge(tuple.len()));
        }

        let mut page_id = self.first_page_id;
        loop {
            let mut guard = self.bpm.fetch_page_write(page_id)?;
            let (fits, next) = {
                let page = TablePage::open(guard.as_slice())?;
                (page.fits(tuple.len()), page.next_page_id())
            };

            if fits {
                let slot = TablePage::new(guard.as_mut_slice())
                    .insert_tuple(&tuple)
                    .ok_or_else(|| {
                        Error::Corruption(format!("{} rejected a fitting tuple", page_id))
                    })?;
                let rid = RowId::new(page_id, slot);
                row.set_rid(rid);
                return Ok(rid);
            }
            if next.is_valid() {
                page_id = next;
                continue;
            }

            // Last page is full: link a fresh one after it.
            let mut new_guard = self.bpm.new_page()?;
            let new_id = new_guard.page_id();
            let mut new_page = TablePage::new(new_guard.as_mut_slice());
            new_page.init(new_id, page_id);
            let slot = new_page
                .insert_tuple(&tuple)
                .ok_or(Error::TupleTooLarge(tuple.len()))?;
            TablePage::new(guard.as_mut_slice()).set_next_page_id(new_id);
            debug!("table heap {}: appended {}", self.first_page_id, new_id);

            let rid = RowId::new(new_id, slot);
            row.set_rid(rid);
            return Ok(rid);
        }
    }

    /// Hide the row at `rid` from reads. Returns `Ok(false)` if there is no
    /// live row there.
    pub fn mark_delete(&mut self, rid: RowId) -> Result<bool> {
        let mut guard = self.bpm.fetch_page_write(rid.page_id)?;
        if TablePage::open(guard.as_slice())?.get_tuple(rid.slot).is_none() {
            return Ok(false);
        }
        Ok(TablePage::new(guard.as_mut_slice()).mark_delete(rid.slot))
    }

    /// Undo [`TableHeap::mark_delete`].
    pub fn rollback_delete(&mut self, rid: RowId) -> Result<bool> {
        let mut guard = self.bpm.fetch_page_write(rid.page_id)?;
        if !TablePage::open(guard.as_slice())?.is_deleted(rid.slot) {
            return Ok(false);
        }
        Ok(TablePage::new(guard.as_mut_slice()).rollback_delete(rid.slot))
    }

    /// Remove the row at `rid` for good, whether or not it was marked.
    pub fn apply_delete(&mut self, rid: RowId) -> Result<bool> {
        let mut guard = self.bpm.fetch_page_write(rid.page_id)?;
        Ok(TablePage::open(guard.as_mut_slice())?.apply_delete(rid.slot))
    }

    /// Overwrite the row at `rid` in place.
    ///
    /// Returns `Ok(false)` if there is no live row at `rid` or the new
    /// encoding does not fit in the page; the old row is kept in both cases.
    pub fn update_tuple(&mut self, row: &Row, rid: RowId) -> Result<bool> {
        let tuple = row.to_bytes(&self.schema)?;
        let mut guard = self.bpm.fetch_page_write(rid.page_id)?;
        if TablePage::open(guard.as_slice())?.get_tuple(rid.slot).is_none() {
            return Ok(false);
        }
        match TablePage::new(guard.as_mut_slice()).update_tuple(rid.slot, &tuple) {
            UpdateResult::Updated => Ok(true),
            UpdateResult::NoTuple => Ok(false),
            UpdateResult::NoSpace => {
                debug!("{}: no room to grow to {} bytes", rid, tuple.len());
                Ok(false)
            }
        }
    }

    /// Read the live row at `rid`.
    pub fn get_tuple(&self, rid: RowId) -> Result<Option<Row>> {
        let guard = self.bpm.fetch_page_read(rid.page_id)?;
        let page = TablePage::open(guard.as_slice())?;
        match page.get_tuple(rid.slot) {
            Some(bytes) => {
                let (mut row, _) = Row::deserialize_from(bytes, &self.schema)?;
                row.set_rid(rid);
                Ok(Some(row))
            }
            None => Ok(None),
        }
    }

    /// Delete every page of the heap.
    pub fn delete_table(self) -> Result<()> {
        let mut page_id = self.first_page_id;
        while page_id.is_valid() {
            let next = {
                let guard = self.bpm.fetch_page_read(page_id)?;
                TablePage::open(guard.as_slice())?.next_page_id()
            };
            self.bpm.delete_page(page_id)?;
            page_id = next;
        }
        debug!("deleted table heap {}", self.first_page_id);
        Ok(())
    }

    /// Scan the live rows in page-list order.
    pub fn iter(&self) -> Result<TableIterator<'_>> {
        let first = self.first_rid_from(self.first_page_id)?;
        Ok(TableIterator::new(self, first))
    }

    /// First live row on `page_id` or any page after it.
    pub(crate) fn first_rid_from(&self, page_id: PageId) -> Result<RowId> {
        let mut page_id = page_id;
        while page_id.is_valid() {
            let guard = self.bpm.fetch_page_read(page_id)?;
            let page = TablePage::open(guard.as_slice())?;
            if let Some(slot) = page.first_tuple_slot() {
                return Ok(RowId::new(page_id, slot));
            }
            page_id = page.next_page_id();
        }
        Ok(RowId::INVALID)
    }
}
