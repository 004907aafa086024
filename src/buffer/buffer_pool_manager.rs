//! Buffer Pool Manager - the core page caching layer.
//!
//! The [`BufferPoolManager`] provides:
//! - Page caching between disk and memory
//! - Pin-based reference counting through RAII guards
//! - Automatic dirty page write-back on eviction
//! - Pluggable eviction policies

use std::collections::HashMap;

use log::{debug, error, warn};
use parking_lot::Mutex;

use crate::buffer::replacer::{LruReplacer, Replacer};
use crate::buffer::{BasicPageGuard, BufferPoolStats, Frame, PageReadGuard, PageWriteGuard};
use crate::common::{Error, FrameId, PageId, Result};
use crate::storage::DiskManager;

/// Bookkeeping guarded by the pool latch.
struct PoolState {
    /// Maps cached page IDs to the frames holding them.
    page_table: HashMap<PageId, FrameId>,
    /// Frames holding no page (LIFO: the most recently freed frame is reused first).
    free_list: Vec<FrameId>,
    /// Eviction policy over frames with pin count zero.
    replacer: Box<dyn Replacer>,
}

/// Manages a pool of buffer frames for caching disk pages.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                    BufferPoolManager                        │
/// │  ┌──────────────────────────────┐  ┌────────────────────┐   │
/// │  │  latch: Mutex<PoolState>     │  │ frames: Vec<Frame> │   │
/// │  │   page_table PageId → Fid    │─▶│ [F0] [F1] [F2] ... │   │
/// │  │   free_list  Vec<FrameId>    │  └────────────────────┘   │
/// │  │   replacer   dyn Replacer    │  ┌────────────────────┐   │
/// │  └──────────────────────────────┘  │disk: Mutex<DiskMgr>│   │
/// │                                    └────────────────────┘   │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// - One latch serializes page-table, free-list, replacer and pin-count
///   changes.
/// - Page bytes are protected by each frame's own `RwLock`, taken by the
///   guards after the latch is released.
/// - Lock order is latch, then disk. The latch never waits on the page
///   lock of a pinned frame.
/// - A thread must not flush a page it currently holds a write guard on.
///
/// # Usage
/// ```ignore
/// let dm = DiskManager::create("test.db")?;
/// let bpm = BufferPoolManager::new(10, dm);
///
/// let mut guard = bpm.new_page()?;
/// guard.as_mut_slice()[0] = 0xAB;
/// let page_id = guard.page_id();
/// drop(guard); // dirty, unpinned
///
/// let guard = bpm.fetch_page_read(page_id)?;
/// assert_eq!(guard.as_slice()[0], 0xAB);
/// ```
pub struct BufferPoolManager {
    frames: Vec<Frame>,
    latch: Mutex<PoolState>,
    disk_manager: Mutex<DiskManager>,
    stats: BufferPoolStats,
}

impl BufferPoolManager {
    /// Create a buffer pool with an LRU replacer.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize, disk_manager: DiskManager) -> Self {
        Self::with_replacer(pool_size, disk_manager, Box::new(LruReplacer::new(pool_size)))
    }

    /// Create a buffer pool with a caller-supplied eviction policy.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn with_replacer(
        pool_size: usize,
        disk_manager: DiskManager,
        replacer: Box<dyn Replacer>,
    ) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        let frames: Vec<Frame> = (0..pool_size).map(|_| Frame::new()).collect();
        // Reversed so that frame 0 is handed out first.
        let free_list: Vec<FrameId> = (0..pool_size).rev().map(FrameId::new).collect();

        Self {
            frames,
            latch: Mutex::new(PoolState {
                page_table: HashMap::with_capacity(pool_size),
                free_list,
                replacer,
            }),
            disk_manager: Mutex::new(disk_manager),
            stats: BufferPoolStats::new(),
        }
    }

    // ========================================================================
    // Public API: Fetch pages
    // ========================================================================

    /// Fetch a page for reading (shared latch).
    ///
    /// # Errors
    /// - `Error::InvalidPageId` for the sentinel or an out-of-range ID
    /// - `Error::PageNotFound` if the page is not allocated on disk
    /// - `Error::NoFreeFrames` if all frames are pinned
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<PageReadGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        let lock = self.frames[frame_id.0].page();
        Ok(PageReadGuard::new(self, frame_id, page_id, lock))
    }

    /// Fetch a page for writing (exclusive latch).
    ///
    /// # Errors
    /// Same as [`BufferPoolManager::fetch_page_read`].
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<PageWriteGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        let lock = self.frames[frame_id.0].page_mut();
        Ok(PageWriteGuard::new(self, frame_id, page_id, lock))
    }

    /// Fetch a page and pin it without latching.
    ///
    /// # Errors
    /// Same as [`BufferPoolManager::fetch_page_read`].
    pub fn fetch_page_basic(&self, page_id: PageId) -> Result<BasicPageGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        Ok(BasicPageGuard::new(self, frame_id, page_id))
    }

    // ========================================================================
    // Public API: Create and delete pages
    // ========================================================================

    /// Allocate a new page on disk and pin it in a zeroed, clean frame.
    ///
    /// The new page's ID is available through [`PageWriteGuard::page_id`].
    ///
    /// # Errors
    /// - `Error::NoFreeFrames` if both the free list and the replacer are exhausted
    /// - `Error::OutOfSpace` if the disk has no free page
    pub fn new_page(&self) -> Result<PageWriteGuard<'_>> {
        let mut state = self.latch.lock();
        let frame_id = self.acquire_frame(&mut state)?;

        let allocated = self.disk_manager.lock().allocate_page();
        let page_id = match allocated {
            Ok(page_id) => page_id,
            Err(e) => {
                state.free_list.push(frame_id);
                return Err(e);
            }
        };

        let frame = &self.frames[frame_id.0];
        frame.set_page_id(page_id);
        frame.pin();
        state.page_table.insert(page_id, frame_id);
        drop(state);

        BufferPoolStats::bump(&self.stats.pages_allocated);
        debug!("new {} in {}", page_id, frame_id);

        let lock = frame.page_mut();
        Ok(PageWriteGuard::new(self, frame_id, page_id, lock))
    }

    /// Delete a page from the pool and free it on disk.
    ///
    /// Deleting a page that is not cached succeeds; it is still freed on
    /// disk if it was allocated.
    ///
    /// # Errors
    /// - `Error::PageInUse` if the page is pinned
    /// - `Error::InvalidPageId` for the sentinel or an out-of-range ID
    pub fn delete_page(&self, page_id: PageId) -> Result<()> {
        if !page_id.is_in_range() {
            return Err(Error::InvalidPageId(page_id));
        }
        let mut state = self.latch.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let frame = &self.frames[frame_id.0];
            let pins = frame.pin_count();
            if pins > 0 {
                return Err(Error::PageInUse(page_id, pins));
            }
            state.page_table.remove(&page_id);
            state.replacer.pin(frame_id);
            frame.reset();
            state.free_list.push(frame_id);
        }

        let mut disk = self.disk_manager.lock();
        if !disk.is_page_free(page_id) {
            disk.deallocate_page(page_id)?;
            BufferPoolStats::bump(&self.stats.pages_deleted);
            debug!("deleted {}", page_id);
        }
        Ok(())
    }

    /// Release one pin on a cached page.
    ///
    /// `is_dirty = true` marks the page for write-back; `false` never
    /// clears an earlier mark. Returns `false` if the page is not cached or
    /// not pinned.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let mut state = self.latch.lock();
        match state.page_table.get(&page_id) {
            Some(&frame_id) => self.release_pin(&mut state, frame_id, is_dirty),
            None => false,
        }
    }

    // ========================================================================
    // Public API: Flush pages
    // ========================================================================

    /// Write a cached page to disk, dirty or not.
    ///
    /// # Errors
    /// - `Error::PageNotCached` if the page is not in the pool
    /// - I/O errors from disk write
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let frame_id = {
            let mut state = self.latch.lock();
            let frame_id = *state
                .page_table
                .get(&page_id)
                .ok_or(Error::PageNotCached(page_id))?;
            // Hold a pin so the frame is not recycled while unlatched.
            self.frames[frame_id.0].pin();
            state.replacer.pin(frame_id);
            frame_id
        };

        let result = self.write_frame(frame_id, page_id);
        self.unpin_page_internal(frame_id, false);
        result
    }

    /// Flush every cached page to disk.
    ///
    /// # Errors
    /// Returns the first I/O error; later pages are still attempted.
    pub fn flush_all_pages(&self) -> Result<()> {
        let pages: Vec<PageId> = self.latch.lock().page_table.keys().copied().collect();

        let mut first_error = None;
        for page_id in pages {
            match self.flush_page(page_id) {
                // Deleted or evicted in the meantime.
                Ok(()) | Err(Error::PageNotCached(_)) => {}
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Flush every cached page and force the file to stable storage.
    pub fn sync(&self) -> Result<()> {
        self.flush_all_pages()?;
        self.disk_manager.lock().sync()
    }

    // ========================================================================
    // Public API: Introspection
    // ========================================================================

    /// Whether the disk manager considers `page_id` unallocated.
    pub fn is_page_free(&self, page_id: PageId) -> bool {
        self.disk_manager.lock().is_page_free(page_id)
    }

    /// Check that no frame is pinned, logging every offender.
    pub fn check_all_unpinned(&self) -> bool {
        let _state = self.latch.lock();
        let mut all_unpinned = true;
        for (i, frame) in self.frames.iter().enumerate() {
            if frame.is_pinned() {
                all_unpinned = false;
                error!(
                    "{} in {} still pinned (pin count {})",
                    frame.page_id(),
                    FrameId::new(i),
                    frame.pin_count()
                );
            }
        }
        all_unpinned
    }

    /// Pin count of a cached page.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.latch.lock();
        state
            .page_table
            .get(&page_id)
            .map(|fid| self.frames[fid.0].pin_count())
    }

    /// Frame currently caching `page_id`.
    pub fn frame_of(&self, page_id: PageId) -> Option<FrameId> {
        self.latch.lock().page_table.get(&page_id).copied()
    }

    pub fn contains_page(&self, page_id: PageId) -> bool {
        self.latch.lock().page_table.contains_key(&page_id)
    }

    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    pub fn pool_size(&self) -> usize {
        self.frames.len()
    }

    pub fn free_frame_count(&self) -> usize {
        self.latch.lock().free_list.len()
    }

    /// Number of frames the replacer could evict right now.
    pub fn evictable_count(&self) -> usize {
        self.latch.lock().replacer.size()
    }

    /// Number of pages currently cached.
    pub fn page_count(&self) -> usize {
        self.latch.lock().page_table.len()
    }

    /// Number of pages allocated on disk.
    pub fn allocated_page_count(&self) -> u32 {
        self.disk_manager.lock().allocated_page_count()
    }

    // ========================================================================
    // Internal: Called by guards
    // ========================================================================

    #[inline]
    pub(crate) fn frame(&self, frame_id: FrameId) -> &Frame {
        &self.frames[frame_id.0]
    }

    /// Release the pin owned by a guard.
    pub(crate) fn unpin_page_internal(&self, frame_id: FrameId, is_dirty: bool) {
        let mut state = self.latch.lock();
        if !self.release_pin(&mut state, frame_id, is_dirty) {
            warn!("{} released without a pin", frame_id);
        }
    }

    fn release_pin(&self, state: &mut PoolState, frame_id: FrameId, is_dirty: bool) -> bool {
        let frame = &self.frames[frame_id.0];
        if is_dirty {
            frame.mark_dirty();
        }
        match frame.unpin() {
            Some(0) => {
                state.replacer.unpin(frame_id);
                true
            }
            Some(_) => true,
            None => false,
        }
    }

    // ========================================================================
    // Internal: Core fetch logic
    // ========================================================================

    fn fetch_page_internal(&self, page_id: PageId) -> Result<FrameId> {
        if !page_id.is_in_range() {
            return Err(Error::InvalidPageId(page_id));
        }
        let mut state = self.latch.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            self.frames[frame_id.0].pin();
            state.replacer.pin(frame_id);
            BufferPoolStats::bump(&self.stats.cache_hits);
            return Ok(frame_id);
        }

        BufferPoolStats::bump(&self.stats.cache_misses);
        let frame_id = self.acquire_frame(&mut state)?;
        let frame = &self.frames[frame_id.0];

        // The frame is unpinned and unmapped, so nobody else holds its latch.
        let read = {
            let mut page = frame.page_mut();
            self.disk_manager.lock().read_page(page_id, &mut page)
        };
        if let Err(e) = read {
            frame.reset();
            state.free_list.push(frame_id);
            return Err(e);
        }
        BufferPoolStats::bump(&self.stats.pages_read);

        frame.set_page_id(page_id);
        frame.pin();
        state.page_table.insert(page_id, frame_id);
        Ok(frame_id)
    }

    // ========================================================================
    // Internal: Frame allocation and eviction
    // ========================================================================

    /// Take a frame from the free list, or evict one.
    ///
    /// The returned frame is zeroed, unmapped and unpinned.
    fn acquire_frame(&self, state: &mut PoolState) -> Result<FrameId> {
        if let Some(frame_id) = state.free_list.pop() {
            return Ok(frame_id);
        }

        let frame_id = state.replacer.victim().ok_or(Error::NoFreeFrames)?;
        let frame = &self.frames[frame_id.0];
        let old_page_id = frame.page_id();

        if frame.is_dirty() {
            if let Err(e) = self.write_frame(frame_id, old_page_id) {
                state.replacer.unpin(frame_id);
                return Err(e);
            }
        }

        state.page_table.remove(&old_page_id);
        frame.reset();
        BufferPoolStats::bump(&self.stats.evictions);
        debug!("evicted {} from {}", old_page_id, frame_id);
        Ok(frame_id)
    }

    /// Write a frame's bytes to disk and clear its dirty flag.
    fn write_frame(&self, frame_id: FrameId, page_id: PageId) -> Result<()> {
        let frame = &self.frames[frame_id.0];
        let page = frame.page();
        self.disk_manager.lock().write_page(page_id, &page)?;
        frame.clear_dirty();
        BufferPoolStats::bump(&self.stats.pages_written);
        Ok(())
    }
}

impl Drop for BufferPoolManager {
    fn drop(&mut self) {
        if let Err(e) = self.flush_all_pages() {
            warn!("failed to flush buffer pool on shutdown: {}", e);
        }
    }
}
