//! Single-threaded take-once cell.

use std::cell::Cell;

/// Like an `Option<T>` that can be `take`n once through a shared reference.
///
/// Continuations that may be reached from more than one path (synchronous completion or a later
/// handler commit) are stored in one of these behind an `Rc`, so whichever path gets there first
/// claims the right to call it.
pub struct TakeCell<T>(Cell<Option<T>>);

impl<T> TakeCell<T> {
    /// Construct with a value.
    pub const fn some(val: T) -> Self {
        TakeCell(Cell::new(Some(val)))
    }

    /// Try to take the value.
    pub fn take(&self) -> Option<T> {
        self.0.take()
    }
}
