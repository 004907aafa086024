//! Disk meta page - physical page 0 of every database file.
//!
//! # Layout
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       4     CRC32 of bytes 4..PAGE_SIZE
//! 4       4     allocated page count (all extents)
//! 8       4     extent count
//! 12      4*N   allocated pages per extent
//! ```

use crate::common::config::{DISK_META_HEADER_SIZE, MAX_EXTENTS};

const OFFSET_CHECKSUM: usize = 0;
const OFFSET_ALLOCATED: usize = 4;
const OFFSET_EXTENTS: usize = 8;

pub struct DiskMetaPage<B> {
    data: B,
}

impl<B: AsRef<[u8]>> DiskMetaPage<B> {
    pub fn new(data: B) -> Self {
        Self { data }
    }

    pub fn allocated_pages(&self) -> u32 {
        self.u32_at(OFFSET_ALLOCATED)
    }

    pub fn num_extents(&self) -> u32 {
        self.u32_at(OFFSET_EXTENTS)
    }

    /// Pages allocated in `extent`; zero for extents not yet created.
    pub fn extent_used_pages(&self, extent: usize) -> u32 {
        if extent >= MAX_EXTENTS {
            return 0;
        }
        self.u32_at(DISK_META_HEADER_SIZE + extent * 4)
    }

    pub fn stored_checksum(&self) -> u32 {
        self.u32_at(OFFSET_CHECKSUM)
    }

    pub fn compute_checksum(&self) -> u32 {
        crc32fast::hash(&self.data.as_ref()[OFFSET_ALLOCATED..])
    }

    /// A freshly zeroed file has no checksum yet; treat it as valid.
    pub fn verify_checksum(&self) -> bool {
        let stored = self.stored_checksum();
        let empty = self.allocated_pages() == 0 && self.num_extents() == 0;
        (stored == 0 && empty) || stored == self.compute_checksum()
    }

    fn u32_at(&self, offset: usize) -> u32 {
        let d = self.data.as_ref();
        u32::from_le_bytes([d[offset], d[offset + 1], d[offset + 2], d[offset + 3]])
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> DiskMetaPage<B> {
    pub fn set_allocated_pages(&mut self, count: u32) {
        self.set_u32(OFFSET_ALLOCATED, count);
    }

    pub fn set_num_extents(&mut self, count: u32) {
        self.set_u32(OFFSET_EXTENTS, count);
    }

    pub fn set_extent_used_pages(&mut self, extent: usize, count: u32) {
        self.set_u32(DISK_META_HEADER_SIZE + extent * 4, count);
    }

    /// Recompute and store the checksum. Call after the last mutation.
    pub fn update_checksum(&mut self) {
        let checksum = self.compute_checksum();
        self.set_u32(OFFSET_CHECKSUM, checksum);
    }

    fn set_u32(&mut self, offset: usize, value: u32) {
        self.data.as_mut()[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::page::Page;

    #[test]
    fn test_meta_checksum_detects_corruption() {
        let mut page = Page::new();
        {
            let mut meta = DiskMetaPage::new(page.as_mut_slice());
            meta.set_allocated_pages(3);
            meta.set_num_extents(1);
            meta.set_extent_used_pages(0, 3);
            meta.update_checksum();
            assert!(meta.verify_checksum());
        }

        page.as_mut_slice()[12] ^= 0xFF;
        assert!(!DiskMetaPage::new(page.as_slice()).verify_checksum());
    }

    #[test]
    fn test_zeroed_meta_is_valid() {
        let page = Page::new();
        let meta = DiskMetaPage::new(page.as_slice());
        assert!(meta.verify_checksum());
        assert_eq!(meta.num_extents(), 0);
        assert_eq!(meta.extent_used_pages(MAX_EXTENTS), 0);
    }
}
