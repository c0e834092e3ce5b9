//! Growable circular queue.

use std::{
    mem::take,
    iter::from_fn,
    fmt::{self, Formatter, Debug},
};


// capacity to allocate when constructed with a requested capacity of 0
const MIN_CAP: usize = 1;


/// Growable circular queue.
///
/// Backs channel buffers, the wait-queues of parked handlers and the dispatcher task queue. Pushing
/// onto a full queue doubles its capacity, copying existing elements over in logical order.
pub struct RingBuffer<T> {
    // memory layout:
    //
    // - a "logical index" (exposed to the user) exists if it's in [0, len)
    // - a logical index N maps to the storage index (start + N) % slots.len()
    // - a slot is Some iff a logical index maps to it
    start: usize,
    len: usize,
    slots: Box<[Option<T>]>,
}

impl<T> RingBuffer<T> {
    /// Construct empty with room for `cap` elements before the first resize.
    pub fn new(cap: usize) -> Self {
        RingBuffer {
            start: 0,
            len: 0,
            slots: (0..cap.max(MIN_CAP)).map(|_| None).collect(),
        }
    }

    /// Current length in elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether there are no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Currently allocated capacity.
    pub fn cap(&self) -> usize {
        self.slots.len()
    }

    // convert from logical index to storage index.
    fn storage_idx(&self, idx: usize) -> usize {
        debug_assert!(self.len <= self.cap(), "RingBuffer len > cap (internal bug)");
        (self.start + idx) % self.cap()
    }

    // double capacity, moving elements so that logical index 0 lands on storage index 0.
    fn grow(&mut self) {
        let new_cap = self.cap() * 2;
        let mut slots: Box<[Option<T>]> = (0..new_cap).map(|_| None).collect();
        for i in 0..self.len {
            let idx = self.storage_idx(i);
            slots[i] = self.slots[idx].take();
        }
        self.slots = slots;
        self.start = 0;
    }

    /// Push to back of queue, growing if full.
    pub fn push_back(&mut self, elem: T) {
        if self.len == self.cap() {
            self.grow();
        }
        let idx = self.storage_idx(self.len);
        debug_assert!(self.slots[idx].is_none());
        self.slots[idx] = Some(elem);
        self.len += 1;
    }

    /// Pop from front of queue.
    pub fn pop_front(&mut self) -> Option<T> {
        if self.len == 0 { return None; }

        let elem = self.slots[self.start].take();
        debug_assert!(elem.is_some());
        self.start = (self.start + 1) % self.cap();
        self.len -= 1;
        elem
    }

    /// Reference to the front element.
    #[cfg(test)]
    pub fn front(&self) -> Option<&T> {
        if self.len == 0 {
            None
        } else {
            self.slots[self.start].as_ref()
        }
    }

    /// Retain only the elements for which `keep` returns true, preserving their order.
    ///
    /// Never reallocates.
    pub fn cleanup<F>(&mut self, mut keep: F)
    where
        F: FnMut(&T) -> bool,
    {
        for _ in 0..self.len {
            let Some(elem) = self.pop_front() else { break };
            if keep(&elem) {
                // can't grow: we just popped, so there's at least one free slot
                self.push_back(elem);
            }
        }
    }

    /// Create iterator from front to back by reference.
    pub fn iter(&self) -> impl Iterator<Item=&T> {
        (0..self.len).filter_map(move |i| self.slots[self.storage_idx(i)].as_ref())
    }

    /// Remove all elements from front to back, leaving the queue empty.
    pub fn drain(&mut self) -> impl Iterator<Item=T> {
        let mut drained = take(self);
        from_fn(move || drained.pop_front())
    }
}

impl<T> Default for RingBuffer<T> {
    fn default() -> Self {
        Self::new(MIN_CAP)
    }
}

impl<T: Debug> Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;
    use rand_pcg::Pcg32;
    use std::collections::VecDeque;

    fn new_rng() -> impl Rng {
        Pcg32::from_seed(0xdeadbeefdeadbeefdeadbeefdeadbeefu128.to_le_bytes())
    }

    #[test]
    fn matches_vec_deque() {
        let mut rng = new_rng();
        for outer in 0..20 {
            let mut model = VecDeque::new();
            let mut queue = RingBuffer::new(outer % 4);
            for i in 0u32..2_000 {
                match rng.gen_range(0..100) {
                    0..=51 => {
                        model.push_back(i);
                        queue.push_back(i);
                    }
                    52..=97 => assert_eq!(queue.pop_front(), model.pop_front()),
                    _ => {
                        model.retain(|n| n % 3 != 0);
                        queue.cleanup(|n| n % 3 != 0);
                    }
                }
                assert_eq!(queue.len(), model.len());
                assert_eq!(queue.front(), model.front());
                assert!(queue.iter().eq(model.iter()));
            }
        }
    }

    #[test]
    fn grows_in_logical_order() {
        let mut queue = RingBuffer::new(4);
        for i in 0..3 {
            queue.push_back(i);
        }
        // wrap the start around before growing
        assert_eq!(queue.pop_front(), Some(0));
        assert_eq!(queue.pop_front(), Some(1));
        for i in 3..7 {
            queue.push_back(i);
        }
        assert_eq!(queue.cap(), 8);
        assert_eq!(queue.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4, 5, 6]);
    }

    #[test]
    fn cleanup_does_not_reallocate() {
        let mut queue = RingBuffer::new(4);
        for i in 0..4 {
            queue.push_back(i);
        }
        queue.cleanup(|&n| n != 1);
        assert_eq!(queue.cap(), 4);
        assert_eq!(queue.iter().copied().collect::<Vec<_>>(), vec![0, 2, 3]);
    }

    #[test]
    fn drain_empties() {
        let mut queue = RingBuffer::new(2);
        for i in 0..5 {
            queue.push_back(i);
        }
        assert_eq!(queue.drain().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());
        assert_eq!(queue.pop_front(), None);
    }
}
