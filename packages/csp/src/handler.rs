//! Handlers: one side of a pending channel operation.

use std::{
    rc::Rc,
    cell::Cell,
};


/// Continuation delivered when a handler commits.
pub type Callback<V> = Box<dyn FnOnce(V)>;

/// One side of a pending channel operation.
///
/// A channel calls `commit` at most once per handler, and only after checking `is_active`. A
/// handler whose `is_active` has become false is stale: the channel discards it without ever
/// invoking its continuation.
pub trait Handler<V> {
    /// Whether this handler may still be committed.
    fn is_active(&self) -> bool;

    /// Whether the operation may park if it can't complete immediately.
    fn is_blockable(&self) -> bool;

    /// Claim this handler, deactivating any handlers it races against, and return its
    /// continuation.
    fn commit(self: Box<Self>) -> Callback<V>;
}


// ==== fn handler ====


/// Handler for a single operation, always active.
pub struct FnHandler<V> {
    callback: Callback<V>,
    blockable: bool,
}

impl<V: 'static> FnHandler<V> {
    /// Construct a handler which may park.
    pub fn new<F: FnOnce(V) + 'static>(callback: F) -> Self {
        FnHandler {
            callback: Box::new(callback),
            blockable: true,
        }
    }

    /// Construct a handler for an operation which must complete immediately or not at all.
    ///
    /// Its continuation is never reached: a non-blocking operation's result is returned directly.
    pub fn non_blocking() -> Self {
        FnHandler {
            callback: Box::new(|_| ()),
            blockable: false,
        }
    }
}

impl<V> Handler<V> for FnHandler<V> {
    fn is_active(&self) -> bool {
        true
    }

    fn is_blockable(&self) -> bool {
        self.blockable
    }

    fn commit(self: Box<Self>) -> Callback<V> {
        self.callback
    }
}


// ==== alt handler ====


/// Flag shared by every handler registered by one alts call.
///
/// Starts active. Committing any one handler clears it, which makes all of its siblings stale.
#[derive(Debug, Clone)]
pub struct AltFlag(Rc<Cell<bool>>);

impl AltFlag {
    /// Construct active.
    pub fn new() -> Self {
        AltFlag(Rc::new(Cell::new(true)))
    }

    /// Whether no handler sharing this flag has committed yet.
    pub fn is_active(&self) -> bool {
        self.0.get()
    }

    /// Clear the flag.
    pub fn commit(&self) {
        self.0.set(false);
    }
}

impl Default for AltFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Handler for one operation of an alts call.
pub struct AltHandler<V> {
    flag: AltFlag,
    callback: Callback<V>,
}

impl<V> AltHandler<V> {
    /// Construct sharing `flag`.
    pub fn new<F: FnOnce(V) + 'static>(flag: AltFlag, callback: F) -> Self {
        AltHandler {
            flag,
            callback: Box::new(callback),
        }
    }
}

impl<V> Handler<V> for AltHandler<V> {
    fn is_active(&self) -> bool {
        self.flag.is_active()
    }

    fn is_blockable(&self) -> bool {
        true
    }

    fn commit(self: Box<Self>) -> Callback<V> {
        self.flag.commit();
        self.callback
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alt_siblings_commit_at_most_once() {
        let flag = AltFlag::new();
        let fired = Rc::new(Cell::new(0u32));
        let handlers: Vec<Box<dyn Handler<u32>>> = (0..3)
            .map(|_| {
                let fired = Rc::clone(&fired);
                Box::new(AltHandler::new(flag.clone(), move |n: u32| fired.set(fired.get() + n)))
                    as Box<dyn Handler<u32>>
            })
            .collect();

        let mut commits = 0;
        for handler in handlers {
            if handler.is_active() {
                commits += 1;
                handler.commit()(1);
            }
        }
        assert_eq!(commits, 1);
        assert_eq!(fired.get(), 1);
        assert!(!flag.is_active());
    }

    #[test]
    fn fn_handler_blockability() {
        assert!(FnHandler::<()>::new(|_| ()).is_blockable());
        assert!(!FnHandler::<()>::non_blocking().is_blockable());
        assert!(FnHandler::<()>::non_blocking().is_active());
    }
}
