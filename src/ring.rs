//! Fixed-capacity ring buffer with overwrite-on-full semantics.
//!
//! Backs the decision log: once the buffer is full, each push overwrites
//! the oldest surviving element. Eviction order is purely write order;
//! reads and sorts never influence which slot is overwritten next.

/// A fixed-capacity circular container.
///
/// Storage grows lazily up to `capacity` on first fill and is reused
/// afterwards. `reset` only rewinds the bookkeeping; stale elements past
/// the logical length stay in memory until overwritten.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: Vec<T>,
    capacity: usize,
    cursor: usize,
    full: bool,
}

impl<T: Clone> RingBuffer<T> {
    /// Create an empty buffer holding at most `capacity` elements.
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
            cursor: 0,
            full: false,
        }
    }

    /// Maximum number of elements the buffer can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of logically valid elements.
    pub fn len(&self) -> usize {
        if self.full {
            self.capacity
        } else {
            self.cursor
        }
    }

    /// True if no elements are logically present.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once the buffer has wrapped at least once since the last reset.
    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Append an element, overwriting the oldest one when full.
    ///
    /// A zero-capacity buffer silently drops every push.
    pub fn push(&mut self, elem: T) {
        if self.capacity == 0 {
            return;
        }
        if self.cursor < self.items.len() {
            self.items[self.cursor] = elem;
        } else {
            self.items.push(elem);
        }
        self.cursor += 1;
        if self.cursor >= self.capacity {
            self.full = true;
            self.cursor = 0;
        }
    }

    /// Copy out all logically valid elements, oldest first.
    ///
    /// When full, the oldest element sits at the write cursor; otherwise
    /// the buffer has never wrapped and index 0 is the oldest.
    pub fn snapshot(&self) -> Vec<T> {
        if self.full {
            let mut out = Vec::with_capacity(self.capacity);
            out.extend_from_slice(&self.items[self.cursor..]);
            out.extend_from_slice(&self.items[..self.cursor]);
            out
        } else {
            self.items[..self.cursor].to_vec()
        }
    }

    /// Rewind to empty. Contents are not zeroed; they become unreachable
    /// beyond the new logical length.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.full = false;
    }

    /// The valid elements in raw storage order (no rotation).
    ///
    /// Useful for whole-buffer scans where write order is irrelevant.
    pub fn as_slice(&self) -> &[T] {
        if self.full {
            &self.items
        } else {
            &self.items[..self.cursor]
        }
    }

    /// Mutable view of the valid elements in raw storage order.
    ///
    /// Reordering this slice (e.g. sorting) destroys the write-order
    /// bookkeeping `push` relies on; callers must `reset` before pushing
    /// again.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        if self.full {
            &mut self.items
        } else {
            &mut self.items[..self.cursor]
        }
    }
}
