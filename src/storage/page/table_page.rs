//! Slotted table page holding serialized rows.
//!
//! # Layout
//! ```text
//! Offset  Size        Field
//! ------  ----        -----
//! 0       4           page id
//! 4       4           lsn
//! 8       4           previous page id
//! 12      4           next page id
//! 16      4           free space pointer (start of tuple data)
//! 20      4           slot count
//! 24      8 * count   (tuple offset, tuple size) slots
//! ...                 free space
//! fsp     ...         tuple data, growing down from PAGE_SIZE
//! ```
//! A slot with size 0 is empty and may be reused. The high bit of a slot
//! size marks a tuple as deleted but not yet reclaimed.

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result};

const OFFSET_PAGE_ID: usize = 0;
const OFFSET_LSN: usize = 4;
const OFFSET_PREV_PAGE_ID: usize = 8;
const OFFSET_NEXT_PAGE_ID: usize = 12;
const OFFSET_FREE_SPACE: usize = 16;
const OFFSET_TUPLE_COUNT: usize = 20;

pub const TABLE_PAGE_HEADER_SIZE: usize = 24;
const SLOT_SIZE: usize = 8;

const DELETE_MASK: u32 = 1 << 31;

/// Largest tuple that fits in an empty table page.
pub const MAX_TUPLE_SIZE: usize = PAGE_SIZE - TABLE_PAGE_HEADER_SIZE - SLOT_SIZE;

/// Outcome of an in-place update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateResult {
    Updated,
    /// The slot is empty, out of range or marked deleted.
    NoTuple,
    /// The new tuple does not fit in the page's free space.
    NoSpace,
}

pub struct TablePage<B> {
    data: B,
}

impl<B: AsRef<[u8]>> TablePage<B> {
    /// View over page bytes without checking them, for formatting a fresh
    /// page with [`TablePage::init`].
    pub fn new(data: B) -> Self {
        Self { data }
    }

    /// View over a page read from disk.
    ///
    /// # Errors
    /// Returns `Error::Corruption` if the free space pointer, the slot
    /// directory or any slot points outside the page.
    pub fn open(data: B) -> Result<Self> {
        let page = Self { data };
        page.check_layout()?;
        Ok(page)
    }

    fn check_layout(&self) -> Result<()> {
        let fsp = self.free_space_pointer();
        let slots_end = TABLE_PAGE_HEADER_SIZE + self.tuple_count() as usize * SLOT_SIZE;
        if fsp > PAGE_SIZE || slots_end > fsp {
            return Err(Error::Corruption(format!(
                "table page {}: free space pointer {} with {} slots",
                self.page_id(),
                fsp,
                self.tuple_count()
            )));
        }
        for slot in 0..self.tuple_count() {
            let size = (self.slot_size_raw(slot) & !DELETE_MASK) as usize;
            if size == 0 {
                continue;
            }
            let offset = self.slot_offset(slot);
            if offset < fsp || offset + size > PAGE_SIZE {
                return Err(Error::Corruption(format!(
                    "table page {}: slot {} spans {}..{}",
                    self.page_id(),
                    slot,
                    offset,
                    offset + size
                )));
            }
        }
        Ok(())
    }

    #[inline]
    fn u32_at(&self, offset: usize) -> u32 {
        let d = self.data.as_ref();
        u32::from_le_bytes([d[offset], d[offset + 1], d[offset + 2], d[offset + 3]])
    }

    pub fn page_id(&self) -> PageId {
        PageId::from_le_slice(&self.data.as_ref()[OFFSET_PAGE_ID..])
    }

    pub fn prev_page_id(&self) -> PageId {
        PageId::from_le_slice(&self.data.as_ref()[OFFSET_PREV_PAGE_ID..])
    }

    pub fn next_page_id(&self) -> PageId {
        PageId::from_le_slice(&self.data.as_ref()[OFFSET_NEXT_PAGE_ID..])
    }

    pub fn lsn(&self) -> u32 {
        self.u32_at(OFFSET_LSN)
    }

    fn free_space_pointer(&self) -> usize {
        self.u32_at(OFFSET_FREE_SPACE) as usize
    }

    /// Number of slots, including empty and deleted ones.
    pub fn tuple_count(&self) -> u32 {
        self.u32_at(OFFSET_TUPLE_COUNT)
    }

    pub fn free_space(&self) -> usize {
        self.free_space_pointer()
            .saturating_sub(TABLE_PAGE_HEADER_SIZE + self.tuple_count() as usize * SLOT_SIZE)
    }

    fn slot_offset(&self, slot: u32) -> usize {
        self.u32_at(TABLE_PAGE_HEADER_SIZE + slot as usize * SLOT_SIZE) as usize
    }

    fn slot_size_raw(&self, slot: u32) -> u32 {
        self.u32_at(TABLE_PAGE_HEADER_SIZE + slot as usize * SLOT_SIZE + 4)
    }

    fn is_live(&self, slot: u32) -> bool {
        slot < self.tuple_count() && {
            let raw = self.slot_size_raw(slot);
            raw != 0 && raw & DELETE_MASK == 0
        }
    }

    /// Whether `slot` holds a tuple marked deleted but not yet reclaimed.
    pub fn is_deleted(&self, slot: u32) -> bool {
        slot < self.tuple_count() && self.slot_size_raw(slot) & DELETE_MASK != 0
    }

    /// Bytes of the live tuple in `slot`.
    pub fn get_tuple(&self, slot: u32) -> Option<&[u8]> {
        if !self.is_live(slot) {
            return None;
        }
        let offset = self.slot_offset(slot);
        let size = self.slot_size_raw(slot) as usize;
        Some(&self.data.as_ref()[offset..offset + size])
    }

    pub fn first_tuple_slot(&self) -> Option<u32> {
        (0..self.tuple_count()).find(|&slot| self.is_live(slot))
    }

    pub fn next_tuple_slot(&self, current: u32) -> Option<u32> {
        (current + 1..self.tuple_count()).find(|&slot| self.is_live(slot))
    }

    fn empty_slot(&self) -> Option<u32> {
        (0..self.tuple_count()).find(|&slot| self.slot_size_raw(slot) == 0)
    }

    /// Whether [`TablePage::insert_tuple`] would accept `len` bytes.
    pub fn fits(&self, len: usize) -> bool {
        let needed = len + if self.empty_slot().is_some() { 0 } else { SLOT_SIZE };
        len > 0 && self.free_space() >= needed
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> TablePage<B> {
    fn set_u32(&mut self, offset: usize, value: u32) {
        self.data.as_mut()[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Format an empty page linked after `prev`.
    pub fn init(&mut self, page_id: PageId, prev: PageId) {
        page_id.write_le(&mut self.data.as_mut()[OFFSET_PAGE_ID..]);
        self.set_u32(OFFSET_LSN, 0);
        self.set_prev_page_id(prev);
        self.set_next_page_id(PageId::INVALID);
        self.set_u32(OFFSET_FREE_SPACE, PAGE_SIZE as u32);
        self.set_u32(OFFSET_TUPLE_COUNT, 0);
    }

    pub fn set_prev_page_id(&mut self, prev: PageId) {
        prev.write_le(&mut self.data.as_mut()[OFFSET_PREV_PAGE_ID..]);
    }

    pub fn set_next_page_id(&mut self, next: PageId) {
        next.write_le(&mut self.data.as_mut()[OFFSET_NEXT_PAGE_ID..]);
    }

    fn set_slot(&mut self, slot: u32, offset: usize, size: u32) {
        let base = TABLE_PAGE_HEADER_SIZE + slot as usize * SLOT_SIZE;
        self.set_u32(base, offset as u32);
        self.set_u32(base + 4, size);
    }

    /// Store `tuple`, reusing an empty slot when one exists.
    ///
    /// Returns the slot, or `None` if the page lacks space.
    pub fn insert_tuple(&mut self, tuple: &[u8]) -> Option<u32> {
        if !self.fits(tuple.len()) {
            return None;
        }
        let count = self.tuple_count();
        let reuse = self.empty_slot();

        let offset = self.free_space_pointer() - tuple.len();
        self.data.as_mut()[offset..offset + tuple.len()].copy_from_slice(tuple);
        self.set_u32(OFFSET_FREE_SPACE, offset as u32);

        let slot = match reuse {
            Some(slot) => slot,
            None => {
                self.set_u32(OFFSET_TUPLE_COUNT, count + 1);
                count
            }
        };
        self.set_slot(slot, offset, tuple.len() as u32);
        Some(slot)
    }

    /// Flag a live tuple as deleted. Returns `false` if there is none.
    pub fn mark_delete(&mut self, slot: u32) -> bool {
        if !self.is_live(slot) {
            return false;
        }
        let raw = self.slot_size_raw(slot);
        let offset = self.slot_offset(slot);
        self.set_slot(slot, offset, raw | DELETE_MASK);
        true
    }

    /// Clear the delete flag set by [`TablePage::mark_delete`].
    pub fn rollback_delete(&mut self, slot: u32) -> bool {
        if !self.is_deleted(slot) {
            return false;
        }
        let raw = self.slot_size_raw(slot);
        let offset = self.slot_offset(slot);
        self.set_slot(slot, offset, raw & !DELETE_MASK);
        true
    }

    /// Reclaim the space of a tuple and empty its slot.
    ///
    /// Works on live and delete-marked tuples alike. Returns `false` if the
    /// slot is already empty.
    pub fn apply_delete(&mut self, slot: u32) -> bool {
        if slot >= self.tuple_count() || self.slot_size_raw(slot) == 0 {
            return false;
        }
        let offset = self.slot_offset(slot);
        let size = (self.slot_size_raw(slot) & !DELETE_MASK) as usize;
        self.shift_tuples(offset, size as isize);
        self.set_slot(slot, 0, 0);
        true
    }

    /// Replace the tuple in `slot` with `tuple`, in place.
    pub fn update_tuple(&mut self, slot: u32, tuple: &[u8]) -> UpdateResult {
        if !self.is_live(slot) || tuple.is_empty() {
            return UpdateResult::NoTuple;
        }
        let offset = self.slot_offset(slot);
        let old_size = self.slot_size_raw(slot) as usize;
        if tuple.len() > old_size && self.free_space() < tuple.len() - old_size {
            return UpdateResult::NoSpace;
        }

        // Positive delta frees space, negative delta claims it.
        let delta = old_size as isize - tuple.len() as isize;
        self.shift_tuples(offset, delta);
        let new_offset = (offset as isize + delta) as usize;
        self.data.as_mut()[new_offset..new_offset + tuple.len()].copy_from_slice(tuple);
        self.set_slot(slot, new_offset, tuple.len() as u32);
        UpdateResult::Updated
    }

    /// Move tuple data stored below `boundary` up by `delta` bytes (down when
    /// negative) and fix the offsets of every affected slot.
    fn shift_tuples(&mut self, boundary: usize, delta: isize) {
        let fsp = self.free_space_pointer();
        let new_fsp = (fsp as isize + delta) as usize;
        self.data.as_mut().copy_within(fsp..boundary, new_fsp);
        self.set_u32(OFFSET_FREE_SPACE, new_fsp as u32);

        for other in 0..self.tuple_count() {
            let other_offset = self.slot_offset(other);
            if self.slot_size_raw(other) != 0 && other_offset < boundary {
                let raw = self.slot_size_raw(other);
                self.set_slot(other, (other_offset as isize + delta) as usize, raw);
            }
        }
    }
}
