//! Disk Manager - low-level file I/O and page allocation.
//!
//! The [`DiskManager`] handles all direct file operations:
//! - Reading and writing logical pages
//! - Allocating and freeing pages through per-extent bitmaps
//! - Persisting the allocation metadata

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::debug;

use crate::common::config::{BITMAP_SIZE, MAX_EXTENTS, PAGE_SIZE};
use crate::common::{Error, PageId, Result};
use crate::storage::page::{BitmapPage, DiskMetaPage, Page};

/// Manages disk I/O for a single database file.
///
/// # File Layout
/// ```text
/// ┌────────┬──────────┬────────┬────────┬─────┬──────────┬────────┬─────┐
/// │  Meta  │ Bitmap 0 │ Data 0 │ Data 1 │ ... │ Bitmap 1 │ Data B │ ... │
/// └────────┴──────────┴────────┴────────┴─────┴──────────┴────────┴─────┘
/// physical 0    1          2        3                1+(B+1)   2+(B+1)
/// ```
/// `B` is [`BITMAP_SIZE`]. Logical page `n` belongs to extent `n / B` and
/// is stored at physical page `2 + (n / B) * (B + 1) + n % B`. Callers only
/// ever see logical page IDs.
///
/// # Thread Safety
/// `DiskManager` is **single-threaded**. The `BufferPoolManager` is responsible
/// for serializing access to the disk manager.
///
/// # Durability
/// Writes go to the OS page cache; [`DiskManager::sync`] forces them to
/// stable storage. The meta page and bitmaps are rewritten on every
/// allocation change.
pub struct DiskManager {
    file: File,
    /// In-memory copy of physical page 0.
    meta: Page,
    /// In-memory copies of every extent's bitmap page.
    bitmaps: Vec<Page>,
    /// Current file length in bytes.
    file_len: u64,
}

impl DiskManager {
    /// Create a new database file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        let mut dm = Self {
            file,
            meta: Page::new(),
            bitmaps: Vec::new(),
            file_len: 0,
        };
        dm.write_meta()?;
        Ok(dm)
    }

    /// Open an existing database file.
    ///
    /// # Errors
    /// - I/O errors if the file doesn't exist or cannot be read
    /// - `Error::Corruption` if the meta page checksum does not match
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let file_len = file.metadata()?.len();

        let mut dm = Self {
            file,
            meta: Page::new(),
            bitmaps: Vec::new(),
            file_len,
        };

        let mut meta = Page::new();
        dm.read_physical(0, &mut meta)?;
        let view = DiskMetaPage::new(meta.as_slice());
        if !view.verify_checksum() {
            return Err(Error::Corruption(format!(
                "disk meta page checksum mismatch (stored {:#010x}, computed {:#010x})",
                view.stored_checksum(),
                view.compute_checksum()
            )));
        }
        let num_extents = view.num_extents() as usize;
        if num_extents > MAX_EXTENTS {
            return Err(Error::Corruption(format!(
                "disk meta page records {} extents",
                num_extents
            )));
        }
        dm.meta = meta;

        for extent in 0..num_extents {
            let mut bitmap = Page::new();
            dm.read_physical(Self::bitmap_physical(extent), &mut bitmap)?;
            dm.bitmaps.push(bitmap);
        }

        debug!(
            "opened database: {} allocated pages in {} extents",
            dm.allocated_page_count(),
            num_extents
        );
        Ok(dm)
    }

    /// Open an existing database file, or create if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    // ========================================================================
    // Page I/O
    // ========================================================================

    /// Read a logical page into `page`.
    ///
    /// An allocated page that has never been written reads as zeroes.
    ///
    /// # Errors
    /// - `Error::InvalidPageId` if the ID is the sentinel or out of range
    /// - `Error::PageNotFound` if the page is not allocated
    pub fn read_page(&mut self, page_id: PageId, page: &mut Page) -> Result<()> {
        self.check_allocated(page_id)?;
        self.read_physical(Self::logical_to_physical(page_id), page)
    }

    /// Write a logical page.
    ///
    /// # Errors
    /// - `Error::InvalidPageId` if the ID is the sentinel or out of range
    /// - `Error::PageNotFound` if the page is not allocated
    pub fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        self.check_allocated(page_id)?;
        self.write_physical(Self::logical_to_physical(page_id), page.as_slice())
    }

    // ========================================================================
    // Allocation
    // ========================================================================

    /// Allocate a page, preferring the lowest extent with free space.
    ///
    /// # Errors
    /// Returns `Error::OutOfSpace` when every extent is full.
    pub fn allocate_page(&mut self) -> Result<PageId> {
        let meta = DiskMetaPage::new(self.meta.as_slice());
        let num_extents = meta.num_extents() as usize;
        let extent = match (0..num_extents)
            .find(|&e| (meta.extent_used_pages(e) as usize) < BITMAP_SIZE)
        {
            Some(extent) => extent,
            None if num_extents < MAX_EXTENTS => {
                self.bitmaps.push(Page::new());
                num_extents
            }
            None => return Err(Error::OutOfSpace),
        };

        let offset = BitmapPage::new(self.bitmaps[extent].as_mut_slice())
            .allocate()
            .ok_or_else(|| {
                Error::Corruption(format!("extent {} bitmap full but meta disagrees", extent))
            })?;

        let mut meta = DiskMetaPage::new(self.meta.as_mut_slice());
        let used = meta.extent_used_pages(extent);
        let allocated = meta.allocated_pages();
        meta.set_extent_used_pages(extent, used + 1);
        meta.set_allocated_pages(allocated + 1);
        if extent == num_extents {
            meta.set_num_extents(num_extents as u32 + 1);
        }

        self.write_bitmap(extent)?;
        self.write_meta()?;

        let page_id = PageId::new((extent * BITMAP_SIZE) as i32 + offset as i32);
        debug!("allocated {}", page_id);
        Ok(page_id)
    }

    /// Free a page. Freeing a page that is not allocated does nothing.
    ///
    /// # Errors
    /// Returns `Error::InvalidPageId` if the ID is the sentinel or out of range.
    pub fn deallocate_page(&mut self, page_id: PageId) -> Result<()> {
        if !page_id.is_in_range() {
            return Err(Error::InvalidPageId(page_id));
        }
        let (extent, offset) = Self::split_id(page_id);
        if extent >= self.bitmaps.len() {
            return Ok(());
        }
        if !BitmapPage::new(self.bitmaps[extent].as_mut_slice()).deallocate(offset) {
            debug!("deallocate of free {} ignored", page_id);
            return Ok(());
        }

        let mut meta = DiskMetaPage::new(self.meta.as_mut_slice());
        let used = meta.extent_used_pages(extent);
        let allocated = meta.allocated_pages();
        meta.set_extent_used_pages(extent, used - 1);
        meta.set_allocated_pages(allocated - 1);

        self.write_bitmap(extent)?;
        self.write_meta()?;
        debug!("deallocated {}", page_id);
        Ok(())
    }

    /// Check whether a page is free. Out-of-range IDs are never allocated.
    pub fn is_page_free(&self, page_id: PageId) -> bool {
        if !page_id.is_in_range() {
            return true;
        }
        let (extent, offset) = Self::split_id(page_id);
        match self.bitmaps.get(extent) {
            Some(bitmap) => BitmapPage::new(bitmap.as_slice()).is_free(offset),
            None => true,
        }
    }

    /// Number of pages currently allocated.
    #[inline]
    pub fn allocated_page_count(&self) -> u32 {
        DiskMetaPage::new(self.meta.as_slice()).allocated_pages()
    }

    /// Number of extents created so far.
    #[inline]
    pub fn extent_count(&self) -> usize {
        self.bitmaps.len()
    }

    /// Get the total size of the database file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        self.file_len
    }

    /// Flush all written data to stable storage.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Persist the allocation metadata and sync the file.
    pub fn close(mut self) -> Result<()> {
        self.write_meta()?;
        self.sync()
    }

    // ========================================================================
    // Internal: address translation
    // ========================================================================

    #[inline]
    fn split_id(page_id: PageId) -> (usize, u32) {
        let n = page_id.0 as usize;
        (n / BITMAP_SIZE, (n % BITMAP_SIZE) as u32)
    }

    #[inline]
    fn bitmap_physical(extent: usize) -> u64 {
        1 + (extent * (BITMAP_SIZE + 1)) as u64
    }

    #[inline]
    fn logical_to_physical(page_id: PageId) -> u64 {
        let (extent, offset) = Self::split_id(page_id);
        Self::bitmap_physical(extent) + 1 + offset as u64
    }

    fn check_allocated(&self, page_id: PageId) -> Result<()> {
        if !page_id.is_in_range() {
            return Err(Error::InvalidPageId(page_id));
        }
        if self.is_page_free(page_id) {
            return Err(Error::PageNotFound(page_id));
        }
        Ok(())
    }

    // ========================================================================
    // Internal: physical I/O
    // ========================================================================

    fn read_physical(&mut self, physical: u64, page: &mut Page) -> Result<()> {
        let offset = physical * PAGE_SIZE as u64;
        if offset >= self.file_len {
            page.reset();
            return Ok(());
        }
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(page.as_mut_slice())?;
        Ok(())
    }

    fn write_physical(&mut self, physical: u64, data: &[u8]) -> Result<()> {
        let offset = physical * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        self.file_len = self.file_len.max(offset + PAGE_SIZE as u64);
        Ok(())
    }

    fn write_bitmap(&mut self, extent: usize) -> Result<()> {
        let mut buf = [0u8; PAGE_SIZE];
        buf.copy_from_slice(self.bitmaps[extent].as_slice());
        self.write_physical(Self::bitmap_physical(extent), &buf)
    }

    fn write_meta(&mut self) -> Result<()> {
        DiskMetaPage::new(self.meta.as_mut_slice()).update_checksum();
        let mut buf = [0u8; PAGE_SIZE];
        buf.copy_from_slice(self.meta.as_slice());
        self.write_physical(0, &buf)
    }
}
