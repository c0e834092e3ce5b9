//! Channel buffer policies.

use crate::util::RingBuffer;


/// Storage for values held by a buffered channel.
///
/// The policy decides what "full" means and what happens when a value is added to a buffer at
/// capacity. A channel only consults `is_full` before accepting a put; adding past capacity (which
/// a transform may do when one input expands to several outputs) must not lose values unless the
/// policy is explicitly lossy.
pub trait Buffer<T> {
    /// Whether a put should park rather than be accepted.
    fn is_full(&self) -> bool;

    /// Add a value.
    fn add(&mut self, value: T);

    /// Remove the oldest value, or return `None` if there are none.
    fn remove(&mut self) -> Option<T>;

    /// Number of values held.
    fn count(&self) -> usize;

    /// Whether there are no values held.
    fn is_empty(&self) -> bool {
        self.count() == 0
    }
}


// ==== fixed ====


/// Buffer which reports full at capacity but still accepts values past it.
#[derive(Debug)]
pub struct Fixed<T> {
    queue: RingBuffer<T>,
    n: usize,
}

/// Construct a [`Fixed`] buffer of capacity `n`.
pub fn fixed<T>(n: usize) -> Fixed<T> {
    Fixed {
        queue: RingBuffer::new(n),
        n,
    }
}

impl<T> Buffer<T> for Fixed<T> {
    fn is_full(&self) -> bool {
        self.queue.len() >= self.n
    }

    fn add(&mut self, value: T) {
        self.queue.push_back(value);
    }

    fn remove(&mut self) -> Option<T> {
        self.queue.pop_front()
    }

    fn count(&self) -> usize {
        self.queue.len()
    }
}


// ==== dropping ====


/// Buffer which never reports full and discards new values once at capacity.
#[derive(Debug)]
pub struct Dropping<T> {
    queue: RingBuffer<T>,
    n: usize,
}

/// Construct a [`Dropping`] buffer of capacity `n`.
pub fn dropping<T>(n: usize) -> Dropping<T> {
    Dropping {
        queue: RingBuffer::new(n),
        n,
    }
}

impl<T> Buffer<T> for Dropping<T> {
    fn is_full(&self) -> bool {
        false
    }

    fn add(&mut self, value: T) {
        if self.queue.len() < self.n {
            self.queue.push_back(value);
        }
    }

    fn remove(&mut self) -> Option<T> {
        self.queue.pop_front()
    }

    fn count(&self) -> usize {
        self.queue.len()
    }
}


// ==== sliding ====


/// Buffer which never reports full and evicts the oldest value once at capacity.
#[derive(Debug)]
pub struct Sliding<T> {
    queue: RingBuffer<T>,
    n: usize,
}

/// Construct a [`Sliding`] buffer of capacity `n`.
pub fn sliding<T>(n: usize) -> Sliding<T> {
    Sliding {
        queue: RingBuffer::new(n),
        n,
    }
}

impl<T> Buffer<T> for Sliding<T> {
    fn is_full(&self) -> bool {
        false
    }

    fn add(&mut self, value: T) {
        if self.n == 0 {
            return;
        }
        if self.queue.len() >= self.n {
            self.queue.pop_front();
        }
        self.queue.push_back(value);
    }

    fn remove(&mut self) -> Option<T> {
        self.queue.pop_front()
    }

    fn count(&self) -> usize {
        self.queue.len()
    }
}


// ==== promise ====


/// Buffer holding at most one value, which every take receives a clone of.
///
/// The first value added is kept forever. Later adds are ignored.
#[derive(Debug)]
pub struct Promise<T> {
    value: Option<T>,
}

/// Construct an empty [`Promise`] buffer.
pub fn promise<T: Clone>() -> Promise<T> {
    Promise { value: None }
}

impl<T: Clone> Buffer<T> for Promise<T> {
    fn is_full(&self) -> bool {
        false
    }

    fn add(&mut self, value: T) {
        if self.value.is_none() {
            self.value = Some(value);
        }
    }

    fn remove(&mut self) -> Option<T> {
        self.value.clone()
    }

    fn count(&self) -> usize {
        self.value.is_some() as usize
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn drain<T>(buf: &mut dyn Buffer<T>) -> Vec<T> {
        let mut out = Vec::new();
        while let Some(v) = buf.remove() {
            out.push(v);
        }
        out
    }

    #[test]
    fn fixed_is_soft_bounded() {
        let mut buf = fixed(2);
        assert!(!buf.is_full());
        buf.add(1);
        buf.add(2);
        assert!(buf.is_full());
        // past capacity still stored
        buf.add(3);
        assert_eq!(buf.count(), 3);
        assert_eq!(drain(&mut buf), vec![1, 2, 3]);
        assert!(!buf.is_full());
    }

    #[test]
    fn dropping_keeps_oldest() {
        let mut buf = dropping(2);
        for i in 0..5 {
            buf.add(i);
            assert!(!buf.is_full());
        }
        assert_eq!(drain(&mut buf), vec![0, 1]);
    }

    #[test]
    fn sliding_keeps_newest() {
        let mut buf = sliding(2);
        for i in 0..5 {
            buf.add(i);
            assert!(!buf.is_full());
        }
        assert_eq!(drain(&mut buf), vec![3, 4]);
    }

    #[test]
    fn zero_capacity_lossy_buffers_hold_nothing() {
        let mut d = dropping(0);
        let mut s = sliding(0);
        d.add(1);
        s.add(1);
        assert_eq!(d.count(), 0);
        assert_eq!(s.count(), 0);
    }

    #[test]
    fn promise_keeps_first_value() {
        let mut buf = promise();
        assert_eq!(buf.remove(), None);
        assert!(buf.is_empty());
        buf.add("first");
        buf.add("second");
        assert_eq!(buf.count(), 1);
        assert_eq!(buf.remove(), Some("first"));
        assert_eq!(buf.remove(), Some("first"));
        assert_eq!(buf.count(), 1);
        assert!(!buf.is_full());
    }
}
