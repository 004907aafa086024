//! Eviction policy implementations (replacers).
//!
//! A replacer only tracks frames whose pin count is zero. The buffer pool
//! calls [`Replacer::unpin`] when a frame's last pin is released,
//! [`Replacer::pin`] when a cached frame is pinned again, and
//! [`Replacer::victim`] when it needs a frame and the free list is empty.
//!
//! Currently implements:
//! - [`LruReplacer`] - Least Recently Unpinned, O(1) for every operation

mod lru;

pub use lru::LruReplacer;

use crate::common::FrameId;

/// Page replacement policy.
///
/// Implementations are driven under the buffer pool latch and need no
/// internal synchronization.
pub trait Replacer: Send {
    /// Remove and return the frame to evict, or `None` if nothing is evictable.
    fn victim(&mut self) -> Option<FrameId>;

    /// The frame was pinned and must not be evicted.
    fn pin(&mut self, frame_id: FrameId);

    /// The frame's pin count dropped to zero; it may be evicted.
    fn unpin(&mut self, frame_id: FrameId);

    /// Number of evictable frames.
    fn size(&self) -> usize;
}
