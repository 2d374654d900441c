//! Buffered sequential priority queue.
//!
//! [`BufferedPq`] fronts a [`Heap`] with two small buffers:
//!
//! - a sorted *deletion buffer* holding the overall best elements, so
//!   `top` and `pop` touch only a short array, and
//! - an unsorted *insertion buffer* absorbing pushes that do not beat the
//!   deletion buffer, flushed into the heap in batches.
//!
//! Most operations under the queue lock therefore complete without a heap
//! sift. The queue is a strict sequential priority queue: pops come out in
//! exact order for the configured [`KeyOrder`].
//!
//! # Invariant
//!
//! Whenever the deletion buffer is non-empty, its worst element orders at
//! or before every element in the insertion buffer and the heap. The
//! deletion buffer is empty iff the whole queue is empty.

use crate::heap::Heap;
use crate::key::{KeyOrder, Keyed};

/// Pushes held back before a batch flush into the heap.
pub const INSERTION_BUFFER_CAPACITY: usize = 16;

/// Best elements kept sorted for O(1) top/pop.
pub const DELETION_BUFFER_CAPACITY: usize = 16;

/// A sequential priority queue with insertion and deletion buffers.
#[derive(Clone, Debug)]
pub struct BufferedPq<V, O> {
    /// Unsorted overflow for pushes; flushed into `heap` when full.
    insertion: Vec<V>,
    /// Sorted by priority: worst at the front, top at the back.
    deletion: Vec<V>,
    heap: Heap<V, O>,
    order: O,
}

impl<V, O> BufferedPq<V, O>
where
    V: Keyed,
    O: KeyOrder<V::Key>,
{
    /// Create an empty queue.
    pub fn new(order: O) -> Self {
        Self {
            insertion: Vec::with_capacity(INSERTION_BUFFER_CAPACITY),
            deletion: Vec::with_capacity(DELETION_BUFFER_CAPACITY),
            heap: Heap::new(order.clone()),
            order,
        }
    }

    /// Total number of stored elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.deletion.len() + self.insertion.len() + self.heap.len()
    }

    /// Whether the queue holds no elements.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        // The deletion buffer is refilled on every pop that drains it,
        // so it is empty exactly when the queue is.
        self.deletion.is_empty()
    }

    /// The element that pops next, if any.
    #[inline]
    #[must_use]
    pub fn top(&self) -> Option<&V> {
        self.deletion.last()
    }

    /// Insert `value`.
    pub fn push(&mut self, value: V) {
        if self.deletion.is_empty() {
            self.deletion.push(value);
            return;
        }
        let key = value.key();
        if self.order.less(&key, &self.deletion[0].key()) {
            // Beats the worst buffered element: it belongs in the
            // deletion buffer to keep the buffer invariant.
            if self.deletion.len() == DELETION_BUFFER_CAPACITY {
                let worst = self.deletion.remove(0);
                self.stash(worst);
            }
            let pos = self
                .deletion
                .partition_point(|v| self.order.less(&key, &v.key()));
            self.deletion.insert(pos, value);
        } else {
            self.stash(value);
        }
    }

    /// Remove and return the top element.
    pub fn pop(&mut self) -> Option<V> {
        let top = self.deletion.pop()?;
        if self.deletion.is_empty() {
            self.refill();
        }
        Some(top)
    }

    /// Drop all elements.
    pub fn clear(&mut self) {
        self.insertion.clear();
        self.deletion.clear();
        self.heap.clear();
    }

    fn stash(&mut self, value: V) {
        if self.insertion.len() == INSERTION_BUFFER_CAPACITY {
            self.flush_insertion();
        }
        self.insertion.push(value);
    }

    fn flush_insertion(&mut self) {
        let heap = &mut self.heap;
        for value in self.insertion.drain(..) {
            heap.push(value);
        }
    }

    /// Move the best remaining elements back into the deletion buffer.
    fn refill(&mut self) {
        self.flush_insertion();
        for _ in 0..DELETION_BUFFER_CAPACITY {
            match self.heap.pop() {
                Some(value) => self.deletion.push(value),
                None => break,
            }
        }
        // Popped best-first; the buffer keeps its top at the back.
        self.deletion.reverse();
    }
}
