//! LRU (Least Recently Used) replacement policy.
//!
//! Evictable frames sit in a doubly linked list threaded through a vector
//! indexed by frame id, so `pin`, `unpin` and `victim` never search.

use crate::common::FrameId;

use super::Replacer;

#[derive(Debug, Clone, Copy, Default)]
struct Node {
    /// Neighbor towards the most recently unpinned end.
    prev: Option<usize>,
    /// Neighbor towards the least recently unpinned end.
    next: Option<usize>,
    linked: bool,
}

/// Evicts the frame that was unpinned longest ago.
///
/// # Example
/// ```
/// use ministore::buffer::replacer::{LruReplacer, Replacer};
/// use ministore::FrameId;
///
/// let mut replacer = LruReplacer::new(4);
/// replacer.unpin(FrameId::new(1));
/// replacer.unpin(FrameId::new(2));
/// assert_eq!(replacer.victim(), Some(FrameId::new(1)));
/// ```
#[derive(Debug)]
pub struct LruReplacer {
    nodes: Vec<Node>,
    /// Most recently unpinned frame.
    head: Option<usize>,
    /// Least recently unpinned frame, the next victim.
    tail: Option<usize>,
    len: usize,
}

impl LruReplacer {
    /// Create a replacer able to track frames `0..capacity`.
    pub fn new(capacity: usize) -> Self {
        Self {
            nodes: vec![Node::default(); capacity],
            head: None,
            tail: None,
            len: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    fn push_front(&mut self, idx: usize) {
        self.nodes[idx] = Node {
            prev: None,
            next: self.head,
            linked: true,
        };
        match self.head {
            Some(old_head) => self.nodes[old_head].prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
        self.len += 1;
    }

    fn unlink(&mut self, idx: usize) {
        let Node { prev, next, .. } = self.nodes[idx];
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
        self.nodes[idx] = Node::default();
        self.len -= 1;
    }
}

impl Replacer for LruReplacer {
    fn victim(&mut self) -> Option<FrameId> {
        let idx = self.tail?;
        self.unlink(idx);
        Some(FrameId::new(idx))
    }

    fn pin(&mut self, frame_id: FrameId) {
        if self.nodes.get(frame_id.0).is_some_and(|node| node.linked) {
            self.unlink(frame_id.0);
        }
    }

    fn unpin(&mut self, frame_id: FrameId) {
        let idx = frame_id.0;
        if idx >= self.capacity() || self.nodes[idx].linked || self.len >= self.capacity() {
            return;
        }
        self.push_front(idx);
    }

    fn size(&self) -> usize {
        self.len
    }
}
