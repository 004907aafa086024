//! Bitmap page - free-space tracking for one extent of data pages.
//!
//! # Layout
//! ```text
//! Offset  Size              Field
//! ------  ----              -----
//! 0       4                 allocated page count
//! 4       4                 next free offset (lowest clear bit, or BITMAP_SIZE if full)
//! 8       PAGE_SIZE - 8     bit vector, bit i of byte j tracks page j * 8 + i
//! ```

use crate::common::config::{BITMAP_HEADER_SIZE, BITMAP_SIZE};

const OFFSET_ALLOCATED: usize = 0;
const OFFSET_NEXT_FREE: usize = 4;

/// View over the bytes of a bitmap page.
///
/// An all-zero page is a valid empty bitmap, so freshly extended extents
/// need no initialization.
pub struct BitmapPage<B> {
    data: B,
}

impl<B: AsRef<[u8]>> BitmapPage<B> {
    pub fn new(data: B) -> Self {
        Self { data }
    }

    /// Number of pages currently allocated in this extent.
    #[inline]
    pub fn allocated_count(&self) -> u32 {
        read_u32(self.data.as_ref(), OFFSET_ALLOCATED)
    }

    /// Lowest free offset, or `BITMAP_SIZE` when the extent is full.
    #[inline]
    pub fn next_free(&self) -> u32 {
        read_u32(self.data.as_ref(), OFFSET_NEXT_FREE)
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.allocated_count() as usize >= BITMAP_SIZE
    }

    /// Check whether the page at `offset` is free. Out-of-range offsets are
    /// reported as not free.
    pub fn is_free(&self, offset: u32) -> bool {
        let offset = offset as usize;
        if offset >= BITMAP_SIZE {
            return false;
        }
        let byte = self.data.as_ref()[BITMAP_HEADER_SIZE + offset / 8];
        byte & (1 << (offset % 8)) == 0
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> BitmapPage<B> {
    /// Allocate the lowest free page of the extent.
    ///
    /// Returns the page's offset inside the extent, or `None` when the
    /// extent is full.
    pub fn allocate(&mut self) -> Option<u32> {
        if self.is_full() {
            return None;
        }
        let offset = self.next_free();
        self.set_bit(offset as usize, true);
        let allocated = self.allocated_count() + 1;
        write_u32(self.data.as_mut(), OFFSET_ALLOCATED, allocated);

        let next = self.scan_free_from(offset as usize + 1);
        write_u32(self.data.as_mut(), OFFSET_NEXT_FREE, next as u32);
        Some(offset)
    }

    /// Free the page at `offset`.
    ///
    /// Returns `false` if the page was not allocated.
    pub fn deallocate(&mut self, offset: u32) -> bool {
        if offset as usize >= BITMAP_SIZE || self.is_free(offset) {
            return false;
        }
        self.set_bit(offset as usize, false);
        let allocated = self.allocated_count() - 1;
        write_u32(self.data.as_mut(), OFFSET_ALLOCATED, allocated);
        if offset < self.next_free() {
            write_u32(self.data.as_mut(), OFFSET_NEXT_FREE, offset);
        }
        true
    }

    fn set_bit(&mut self, offset: usize, value: bool) {
        let byte = &mut self.data.as_mut()[BITMAP_HEADER_SIZE + offset / 8];
        if value {
            *byte |= 1 << (offset % 8);
        } else {
            *byte &= !(1 << (offset % 8));
        }
    }

    /// Find the first clear bit at or after `start`, skipping full bytes.
    fn scan_free_from(&self, start: usize) -> usize {
        let bits = &self.data.as_ref()[BITMAP_HEADER_SIZE..];
        let mut offset = start;
        while offset < BITMAP_SIZE {
            if offset % 8 == 0 && bits[offset / 8] == 0xFF {
                offset += 8;
                continue;
            }
            if bits[offset / 8] & (1 << (offset % 8)) == 0 {
                return offset;
            }
            offset += 1;
        }
        BITMAP_SIZE
    }
}

#[inline]
fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

#[inline]
fn write_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}
