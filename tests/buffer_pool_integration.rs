//! Integration tests for the buffer pool over a real database file.
//!
//! These exercise the pool together with the disk manager's allocator
//! and persistence, which the unit tests only touch one side of.

use ministore::buffer::replacer::{LruReplacer, Replacer};
use ministore::buffer::BufferPoolManager;
use ministore::common::{FrameId, PageId};
use ministore::storage::DiskManager;
use ministore::Error;
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

fn create_bpm(pool_size: usize) -> (BufferPoolManager, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");
    let dm = DiskManager::create(&path).unwrap();
    (BufferPoolManager::new(pool_size, dm), dir)
}

/// Pages written through a pool much smaller than the working set come
/// back intact after being evicted.
#[test]
fn test_data_survives_eviction_cycles() {
    let (bpm, _dir) = create_bpm(3);

    let mut page_ids = vec![];
    for i in 0u8..12 {
        let mut guard = bpm.new_page().unwrap();
        guard.as_mut_slice()[0] = i;
        guard.as_mut_slice()[4095] = i.wrapping_mul(7);
        page_ids.push(guard.page_id());
    }

    for _ in 0..2 {
        for (i, &pid) in page_ids.iter().enumerate().rev() {
            let guard = bpm.fetch_page_read(pid).unwrap();
            assert_eq!(guard.as_slice()[0], i as u8);
            assert_eq!(guard.as_slice()[4095], (i as u8).wrapping_mul(7));
        }
    }
    assert!(bpm.stats().snapshot().evictions >= 9);
    assert!(bpm.check_all_unpinned());
}

/// Allocation state and page contents persist across pool instances.
#[test]
fn test_reopen_preserves_pages_and_allocation() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");
    let data = b"persistent!";

    let (kept, deleted) = {
        let bpm = BufferPoolManager::new(4, DiskManager::create(&path).unwrap());
        let kept = {
            let mut guard = bpm.new_page().unwrap();
            guard.as_mut_slice()[..data.len()].copy_from_slice(data);
            guard.page_id()
        };
        let deleted = bpm.new_page().unwrap().page_id();
        bpm.delete_page(deleted).unwrap();
        // Dropping the pool writes the dirty page back.
        (kept, deleted)
    };

    let bpm = BufferPoolManager::new(4, DiskManager::open(&path).unwrap());
    assert_eq!(bpm.allocated_page_count(), 1);
    assert!(bpm.is_page_free(deleted));
    {
        let guard = bpm.fetch_page_read(kept).unwrap();
        assert_eq!(&guard.as_slice()[..data.len()], data);
    }
    assert!(matches!(
        bpm.fetch_page_read(deleted),
        Err(Error::PageNotFound(_))
    ));

    // The freed page id is handed out again.
    assert_eq!(bpm.new_page().unwrap().page_id(), deleted);
}

/// Threads writing disjoint pages through a contended pool.
#[test]
fn test_concurrent_writers() {
    let (bpm, _dir) = create_bpm(4);
    let bpm = Arc::new(bpm);

    let page_ids: Vec<PageId> = (0..8)
        .map(|_| bpm.new_page().unwrap().page_id())
        .collect();

    let handles: Vec<_> = page_ids
        .iter()
        .enumerate()
        .map(|(i, &pid)| {
            let bpm = Arc::clone(&bpm);
            thread::spawn(move || {
                for j in 0..40u32 {
                    // The pool has fewer frames than threads; back off on exhaustion.
                    let mut guard = loop {
                        match bpm.fetch_page_write(pid) {
                            Ok(guard) => break guard,
                            Err(Error::NoFreeFrames) => thread::yield_now(),
                            Err(e) => panic!("fetch failed: {}", e),
                        }
                    };
                    let value = i as u32 * 1000 + j;
                    guard.as_mut_slice()[..4].copy_from_slice(&value.to_le_bytes());
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    for (i, &pid) in page_ids.iter().enumerate() {
        let guard = bpm.fetch_page_read(pid).unwrap();
        let value = u32::from_le_bytes(guard.as_slice()[..4].try_into().unwrap());
        assert_eq!(value, i as u32 * 1000 + 39);
    }
    assert!(bpm.check_all_unpinned());
}

/// Hit, miss and eviction counters track a known access pattern.
#[test]
fn test_stats_accuracy() {
    let (bpm, _dir) = create_bpm(2);

    let pid = bpm.new_page().unwrap().page_id();
    for _ in 0..5 {
        drop(bpm.fetch_page_read(pid).unwrap());
    }
    let stats = bpm.stats().snapshot();
    assert_eq!(stats.cache_hits, 5);
    assert_eq!(stats.cache_misses, 0);
    assert_eq!(stats.pages_allocated, 1);

    // Two more pages in a two-frame pool push `pid` out.
    drop(bpm.new_page().unwrap());
    drop(bpm.new_page().unwrap());
    assert!(!bpm.contains_page(pid));

    drop(bpm.fetch_page_read(pid).unwrap());
    let stats = bpm.stats().snapshot();
    assert_eq!(stats.evictions, 2);
    assert_eq!(stats.cache_misses, 1);
    assert_eq!(stats.pages_read, 1);
}

/// A replacer that refuses to evict anything.
struct NeverEvict {
    inner: LruReplacer,
}

impl Replacer for NeverEvict {
    fn victim(&mut self) -> Option<FrameId> {
        None
    }

    fn pin(&mut self, frame_id: FrameId) {
        self.inner.pin(frame_id);
    }

    fn unpin(&mut self, frame_id: FrameId) {
        self.inner.unpin(frame_id);
    }

    fn size(&self) -> usize {
        self.inner.size()
    }
}

/// The pool defers every eviction decision to the injected replacer.
#[test]
fn test_custom_replacer() {
    let dir = tempdir().unwrap();
    let dm = DiskManager::create(dir.path().join("test.db")).unwrap();
    let replacer = NeverEvict {
        inner: LruReplacer::new(2),
    };
    let bpm = BufferPoolManager::with_replacer(2, dm, Box::new(replacer));

    drop(bpm.new_page().unwrap());
    drop(bpm.new_page().unwrap());
    assert_eq!(bpm.evictable_count(), 2);
    assert!(matches!(bpm.new_page(), Err(Error::NoFreeFrames)));
    assert_eq!(bpm.allocated_page_count(), 2);
}
