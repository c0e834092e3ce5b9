// rendezvous engine. the exposed API is a convenience wrapper around this.

use crate::{
    buffer::Buffer,
    config::Limits,
    dispatch::Dispatcher,
    error::{Error, PendingOp, QueueOverflowError, UnbufferedTransformError},
    handler::Handler,
    transform::{Step, Transform},
    util::RingBuffer,
};
use std::{
    cell::{RefCell, RefMut},
    sync::atomic::{AtomicU64, Ordering::Relaxed},
};


// capacity of each wait-queue before its first resize.
const INITIAL_QUEUE_CAP: usize = 32;

// source of channel ids. unique per process, not per runtime.
static NEXT_ID: AtomicU64 = AtomicU64::new(0);


/// Handler for failures raised by a channel's transform.
///
/// Returns a value to add to the buffer in place of the failed step, or `None` to drop it.
pub type ExHandler<T> = Box<dyn FnMut(anyhow::Error) -> Option<T>>;

pub(crate) fn default_ex_handler<T>() -> ExHandler<T> {
    Box::new(|err| {
        error!(%err, "error in channel transform");
        None
    })
}

// channel state shared between handles.
pub(crate) struct Core<T> {
    id: u64,
    dispatcher: Dispatcher,
    limits: Limits,
    // never borrowed across a continuation or the ex-handler. transforms run while it's borrowed.
    state: RefCell<State<T>>,
    // kept out of state so it can run with the state borrow released.
    ex_handler: RefCell<ExHandler<T>>,
}

// channel mutable state.
struct State<T> {
    // None for unbuffered channels.
    buffer: Option<Box<dyn Buffer<T>>>,
    // only Some if buffer is Some.
    transform: Option<Box<dyn Transform<T>>>,
    // parked takers. may contain stale handlers until popped or cleaned up.
    takes: RingBuffer<Box<dyn Handler<Option<T>>>>,
    // parked putters with their values. may contain stale handlers until popped or cleaned up.
    puts: RingBuffer<PutBox<T>>,
    // parkings since the takes queue was last compacted.
    dirty_takes: usize,
    // parkings since the puts queue was last compacted.
    dirty_puts: usize,
    // once true, never becomes false again.
    closed: bool,
}

// parked put.
struct PutBox<T> {
    handler: Box<dyn Handler<bool>>,
    value: T,
}

impl<T: 'static> Core<T> {
    // construct open, with empty wait-queues. errors if given a transform without a buffer.
    pub(crate) fn new(
        dispatcher: Dispatcher,
        limits: Limits,
        buffer: Option<Box<dyn Buffer<T>>>,
        transform: Option<Box<dyn Transform<T>>>,
        ex_handler: ExHandler<T>,
    ) -> Result<Self, UnbufferedTransformError> {
        if buffer.is_none() && transform.is_some() {
            return Err(UnbufferedTransformError);
        }
        Ok(Self::new_unchecked(dispatcher, limits, buffer, transform, ex_handler))
    }

    // construct open without a transform.
    pub(crate) fn without_transform(
        dispatcher: Dispatcher,
        limits: Limits,
        buffer: Option<Box<dyn Buffer<T>>>,
    ) -> Self {
        Self::new_unchecked(dispatcher, limits, buffer, None, default_ex_handler())
    }

    fn new_unchecked(
        dispatcher: Dispatcher,
        limits: Limits,
        buffer: Option<Box<dyn Buffer<T>>>,
        transform: Option<Box<dyn Transform<T>>>,
        ex_handler: ExHandler<T>,
    ) -> Self {
        Core {
            id: NEXT_ID.fetch_add(1, Relaxed),
            dispatcher,
            limits,
            state: RefCell::new(State {
                buffer,
                transform,
                takes: RingBuffer::new(INITIAL_QUEUE_CAP),
                puts: RingBuffer::new(INITIAL_QUEUE_CAP),
                dirty_takes: 0,
                dirty_puts: 0,
                closed: false,
            }),
            ex_handler: RefCell::new(ex_handler),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }

    // attempt to put a value.
    //
    // - returns Ok(Some(delivered)) if the put completed immediately, in which case the handler
    //   was committed but its continuation will never be called.
    // - returns Ok(None) if the handler was inactive, or if the put was parked, in which case the
    //   continuation will be scheduled once it completes.
    pub(crate) fn put(
        &self,
        value: T,
        handler: Box<dyn Handler<bool>>,
    ) -> Result<Option<bool>, Error> {
        if !handler.is_active() {
            return Ok(None);
        }

        let mut state = self.state.borrow_mut();

        if state.closed {
            drop(handler.commit());
            return Ok(Some(false));
        }

        // room in the buffer
        if state.buffer.as_ref().is_some_and(|buffer| !buffer.is_full()) {
            drop(handler.commit());
            let (mut state, step) = self.feed(state, value);
            state.flush_takers(&self.dispatcher);
            if step == Step::Terminate {
                self.close_locked(state);
            }
            return Ok(Some(true));
        }

        // hand off directly to a parked taker
        while let Some(taker) = state.takes.pop_front() {
            if taker.is_active() {
                drop(handler.commit());
                let callback = taker.commit();
                self.dispatcher.schedule(move || callback(Some(value)));
                return Ok(Some(true));
            }
        }

        if !handler.is_blockable() {
            return Ok(None);
        }

        if state.dirty_puts > self.limits.max_dirty {
            state.puts.cleanup(|putter| putter.handler.is_active());
            state.dirty_puts = 0;
        } else {
            state.dirty_puts += 1;
        }
        if state.puts.len() >= self.limits.max_queue_size {
            return Err(self.overflow(PendingOp::Put));
        }
        state.puts.push_back(PutBox { handler, value });
        trace!(chan = self.id, pending = state.puts.len(), "parked put");
        Ok(None)
    }

    // attempt to take a value.
    //
    // - returns Ok(Some(value)) if the take completed immediately, where a value of None means
    //   the channel is closed and drained. the handler was committed but its continuation will
    //   never be called.
    // - returns Ok(None) if the handler was inactive, or if the take was parked, in which case
    //   the continuation will be scheduled once it completes.
    pub(crate) fn take(
        &self,
        handler: Box<dyn Handler<Option<T>>>,
    ) -> Result<Option<Option<T>>, Error> {
        if !handler.is_active() {
            return Ok(None);
        }

        let mut state = self.state.borrow_mut();

        // buffered value available
        let buffered = state.buffer
            .as_mut()
            .filter(|buffer| !buffer.is_empty())
            .and_then(|buffer| buffer.remove());
        if let Some(value) = buffered {
            drop(handler.commit());
            // backfill from parked putters, now that there may be room
            let mut terminated = false;
            while !terminated && state.buffer.as_ref().is_some_and(|buffer| !buffer.is_full()) {
                let Some(putter) = state.puts.pop_front() else { break };
                if !putter.handler.is_active() {
                    continue;
                }
                let callback = putter.handler.commit();
                self.dispatcher.schedule(move || callback(true));
                let (fed, step) = self.feed(state, putter.value);
                state = fed;
                terminated = step == Step::Terminate;
            }
            if terminated {
                self.close_locked(state);
            }
            return Ok(Some(Some(value)));
        }

        // take directly from a parked putter
        while let Some(putter) = state.puts.pop_front() {
            if !putter.handler.is_active() {
                continue;
            }
            let callback = putter.handler.commit();
            self.dispatcher.schedule(move || callback(true));

            if state.buffer.is_none() {
                drop(handler.commit());
                return Ok(Some(Some(putter.value)));
            }

            // buffered channel which was full: the value still passes through the transform
            let (fed, step) = self.feed(state, putter.value);
            state = fed;
            let value = state.buffer.as_mut().and_then(|buffer| buffer.remove());
            if step == Step::Terminate {
                state = self.close_locked(state);
            }
            if let Some(value) = value {
                drop(handler.commit());
                return Ok(Some(Some(value)));
            }
            if state.closed {
                break;
            }
        }

        if state.closed {
            drop(handler.commit());
            return Ok(Some(None));
        }

        if !handler.is_blockable() {
            return Ok(None);
        }

        if state.dirty_takes > self.limits.max_dirty {
            state.takes.cleanup(|taker| taker.is_active());
            state.dirty_takes = 0;
        } else {
            state.dirty_takes += 1;
        }
        if state.takes.len() >= self.limits.max_queue_size {
            return Err(self.overflow(PendingOp::Take));
        }
        state.takes.push_back(handler);
        trace!(chan = self.id, pending = state.takes.len(), "parked take");
        Ok(None)
    }

    // close the channel. idempotent.
    pub(crate) fn close(&self) {
        self.close_locked(self.state.borrow_mut());
    }

    fn close_locked<'a>(&'a self, mut state: RefMut<'a, State<T>>) -> RefMut<'a, State<T>> {
        if state.closed {
            return state;
        }
        state.closed = true;

        // give the transform a chance to flush into the buffer
        let fields = &mut *state;
        let finished = match (fields.buffer.as_deref_mut(), fields.transform.as_deref_mut()) {
            (Some(buffer), Some(transform)) => transform.finish(buffer),
            _ => Ok(()),
        };
        if let Err(err) = finished {
            state = self.recover(state, err);
        }
        state.flush_takers(&self.dispatcher);

        let mut takers = 0;
        for taker in state.takes.drain() {
            if taker.is_active() {
                let callback = taker.commit();
                self.dispatcher.schedule(move || callback(None));
                takers += 1;
            }
        }
        let mut putters = 0;
        for putter in state.puts.drain() {
            if putter.handler.is_active() {
                let callback = putter.handler.commit();
                self.dispatcher.schedule(move || callback(false));
                putters += 1;
            }
        }
        debug!(chan = self.id, takers, putters, "closed channel");
        state
    }

    // feed a value into the buffer through the transform, if any. does nothing for unbuffered
    // channels.
    fn feed<'a>(
        &'a self,
        mut state: RefMut<'a, State<T>>,
        value: T,
    ) -> (RefMut<'a, State<T>>, Step) {
        let fields = &mut *state;
        let stepped = match (fields.buffer.as_deref_mut(), fields.transform.as_deref_mut()) {
            (None, _) => Ok(Step::Continue),
            (Some(buffer), None) => {
                buffer.add(value);
                Ok(Step::Continue)
            }
            (Some(buffer), Some(transform)) => transform.step(buffer, value),
        };
        match stepped {
            Ok(step) => (state, step),
            Err(err) => (self.recover(state, err), Step::Continue),
        }
    }

    // pass a transform failure to the ex-handler with the state borrow released, so that it may
    // use this channel, then buffer its replacement value if any.
    fn recover<'a>(
        &'a self,
        state: RefMut<'a, State<T>>,
        err: anyhow::Error,
    ) -> RefMut<'a, State<T>> {
        drop(state);
        let value = match self.ex_handler.try_borrow_mut() {
            Ok(mut ex_handler) => (&mut **ex_handler)(err),
            Err(_) => {
                // the ex-handler itself fed a failing value into this channel
                error!(chan = self.id, %err, "error in channel transform within its ex-handler");
                None
            }
        };
        let mut state = self.state.borrow_mut();
        if let Some(value) = value {
            if let Some(buffer) = state.buffer.as_deref_mut() {
                buffer.add(value);
            }
        }
        state
    }

    fn overflow(&self, op: PendingOp) -> Error {
        let err = QueueOverflowError {
            op,
            limit: self.limits.max_queue_size,
        };
        warn!(chan = self.id, %err, "channel queue overflow");
        err.into()
    }
}

impl<T: 'static> State<T> {
    // deliver buffered values to parked takers until either runs out.
    fn flush_takers(&mut self, dispatcher: &Dispatcher) {
        let Some(buffer) = self.buffer.as_deref_mut() else { return };
        while !buffer.is_empty() {
            let Some(taker) = self.takes.pop_front() else { break };
            if !taker.is_active() {
                continue;
            }
            let value = buffer.remove();
            let callback = taker.commit();
            dispatcher.schedule(move || callback(value));
        }
    }
}
