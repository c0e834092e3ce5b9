//! Trampoline for scheduled continuations.

use crate::util::RingBuffer;
use std::{
    rc::Rc,
    cell::{Cell, RefCell},
    time::Duration,
};


// capacity of the task queue before its first resize.
const INITIAL_QUEUE_CAP: usize = 32;

type Task = Box<dyn FnOnce()>;


/// Runs scheduled continuations on the host event loop in bounded batches.
///
/// Handle is cheap to clone. Must be used from within a tokio `LocalSet`.
#[derive(Clone)]
pub(crate) struct Dispatcher(Rc<Inner>);

struct Inner {
    batch_size: usize,
    tasks: RefCell<RingBuffer<Task>>,
    // whether a round has been spawned but has not yet finished.
    pending: Cell<bool>,
    // number of rounds started, for diagnostics.
    rounds: Cell<u64>,
}

// clears the pending flag when a round ends, even by unwinding, and spawns another round if tasks
// remain.
struct RoundGuard(Rc<Inner>);

impl Drop for RoundGuard {
    fn drop(&mut self) {
        self.0.pending.set(false);
        if !self.0.tasks.borrow().is_empty() {
            spawn_round(&self.0);
        }
    }
}

fn spawn_round(inner: &Rc<Inner>) {
    inner.pending.set(true);
    let inner = Rc::clone(inner);
    tokio::task::spawn_local(async move {
        let guard = RoundGuard(inner);
        let inner = &guard.0;
        let round = inner.rounds.get() + 1;
        inner.rounds.set(round);

        let mut ran = 0;
        while ran < inner.batch_size {
            // queue borrow must end before the task runs, as it may schedule more
            let task = inner.tasks.borrow_mut().pop_front();
            let Some(task) = task else { break };
            task();
            ran += 1;
        }
        trace!(round, ran, remaining = inner.tasks.borrow().len(), "dispatch round");
    });
}

impl Dispatcher {
    /// Construct with the given maximum number of tasks per round.
    pub(crate) fn new(batch_size: usize) -> Self {
        Dispatcher(Rc::new(Inner {
            batch_size: batch_size.max(1),
            tasks: RefCell::new(RingBuffer::new(INITIAL_QUEUE_CAP)),
            pending: Cell::new(false),
            rounds: Cell::new(0),
        }))
    }

    /// Run `f` in a later round.
    pub(crate) fn schedule<F: FnOnce() + 'static>(&self, f: F) {
        self.0.tasks.borrow_mut().push_back(Box::new(f));
        if !self.0.pending.get() {
            spawn_round(&self.0);
        }
    }

    /// Run `f` in a round after `delay` has elapsed.
    pub(crate) fn schedule_delay<F: FnOnce() + 'static>(&self, f: F, delay: Duration) {
        let dispatcher = self.clone();
        tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            dispatcher.schedule(f);
        });
    }

    /// Number of rounds started so far.
    #[cfg(test)]
    pub(crate) fn rounds(&self) -> u64 {
        self.0.rounds.get()
    }
}
