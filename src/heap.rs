//! Binary min-heap keyed by `(timeout_at, op_id)`, used to order
//! per-operation timeout expiry (spec.md §4.A).
//!
//! Grounded on the teacher's general preference for direct std-library data
//! structures over an external priority-queue crate (the teacher pulls in
//! no such dependency anywhere in the pack); `std::collections::BinaryHeap`
//! wrapped in `Reverse` gives a min-heap with a total order on the
//! composite key, deduplicating equal timestamps by `op_id` as spec.md §9
//! requires.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// A min-heap over `(timeout_at_millis, op_id)` pairs.
#[derive(Debug, Default, Clone)]
pub struct TimeoutHeap {
    inner: BinaryHeap<Reverse<(u64, u64)>>,
}

impl TimeoutHeap {
    pub fn new() -> Self {
        TimeoutHeap {
            inner: BinaryHeap::new(),
        }
    }

    pub fn push(&mut self, timeout_at: u64, op_id: u64) {
        self.inner.push(Reverse((timeout_at, op_id)));
    }

    pub fn peek(&self) -> Option<(u64, u64)> {
        self.inner.peek().map(|Reverse(pair)| *pair)
    }

    /// Pop the smallest entry. Fails (returns `None`) if the heap is empty.
    pub fn pop(&mut self) -> Option<(u64, u64)> {
        self.inner.pop().map(|Reverse(pair)| pair)
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_timeout_then_op_id_order() {
        let mut heap = TimeoutHeap::new();
        for (t, id) in [(10, 1), (5, 2), (5, 3), (1, 4)] {
            heap.push(t, id);
        }
        let mut popped = Vec::new();
        while let Some(entry) = heap.pop() {
            popped.push(entry);
        }
        assert_eq!(popped, vec![(1, 4), (5, 2), (5, 3), (10, 1)]);
    }

    #[test]
    fn empty_heap_pop_is_none() {
        let mut heap = TimeoutHeap::new();
        assert_eq!(heap.pop(), None);
        assert!(heap.is_empty());
    }

    #[test]
    fn clear_empties_heap() {
        let mut heap = TimeoutHeap::new();
        heap.push(1, 1);
        heap.push(2, 2);
        heap.clear();
        assert!(heap.is_empty());
        assert_eq!(heap.len(), 0);
    }
}
