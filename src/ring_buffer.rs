use std::collections::VecDeque;
use tracing::trace;

/// Fixed-capacity ordered buffer; pushing onto a full buffer evicts the oldest entry.
///
/// Single-owner by construction: the worker loop is the only writer, so no
/// interior locking is needed.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
    stats: RingBufferStats,
}

/// Counters for buffer activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RingBufferStats {
    /// Total items pushed
    pub pushed: u64,
    /// Items evicted to make room
    pub evicted: u64,
    /// Times the buffer was cleared
    pub clears: u64,
}

impl<T> RingBuffer<T> {
    /// Create a new ring buffer with the given capacity (at least one slot)
    ///
    /// # Example
    /// ```
    /// use gesture_remote::ring_buffer::RingBuffer;
    ///
    /// let mut buffer = RingBuffer::new(2);
    /// buffer.push(1);
    /// buffer.push(2);
    /// assert_eq!(buffer.push(3), Some(1));
    /// ```
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            stats: RingBufferStats::default(),
        }
    }

    /// Push an item, returning the evicted oldest item when the buffer was full
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.stats.evicted += 1;
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        self.stats.pushed += 1;
        trace!("Ring buffer at {}/{}", self.items.len(), self.capacity);
        evicted
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.stats.clears += 1;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate oldest to newest
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.items.iter()
    }

    pub fn stats(&self) -> RingBufferStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_holds_one() {
        let mut buffer = RingBuffer::new(0);
        assert_eq!(buffer.capacity(), 1);
        buffer.push(7u8);
        assert!(buffer.is_full());
    }

    #[test]
    fn test_buffer_wraparound() {
        let mut buffer = RingBuffer::new(3);
        for i in 0..3 {
            assert_eq!(buffer.push(i), None);
        }
        assert!(buffer.is_full());

        assert_eq!(buffer.push(3), Some(0));
        assert_eq!(buffer.push(4), Some(1));
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);

        let stats = buffer.stats();
        assert_eq!(stats.pushed, 5);
        assert_eq!(stats.evicted, 2);
    }

    #[test]
    fn test_clear_buffer() {
        let mut buffer = RingBuffer::new(2);
        buffer.push('a');
        buffer.push('b');
        buffer.clear();

        assert!(buffer.is_empty());
        assert!(!buffer.is_full());
        assert_eq!(buffer.stats().clears, 1);
        assert_eq!(buffer.push('c'), None);
    }
}
