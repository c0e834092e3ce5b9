// exposed API of channels

use super::core::{Core, ExHandler, default_ex_handler};
use crate::{
    buffer::{self, Buffer},
    config::Limits,
    dispatch::Dispatcher,
    error::Error,
    handler::{Callback, FnHandler, Handler},
    transform::Transform,
    util::TakeCell,
};
use std::{
    any::Any,
    rc::Rc,
    hash::{Hash, Hasher},
    fmt::{self, Formatter, Debug},
};
use tokio::sync::oneshot;


/// Handle to a channel.
///
/// Cheap to clone. All clones refer to the same channel, and handles compare equal iff they refer
/// to the same channel.
pub struct Chan<T>(Rc<Core<T>>);

impl<T> Clone for Chan<T> {
    fn clone(&self) -> Self {
        Chan(Rc::clone(&self.0))
    }
}

impl<T: 'static> Chan<T> {
    pub(crate) fn unbuffered(dispatcher: Dispatcher, limits: Limits) -> Self {
        Chan::buffered(dispatcher, limits, None)
    }

    pub(crate) fn buffered(
        dispatcher: Dispatcher,
        limits: Limits,
        buffer: Option<Box<dyn Buffer<T>>>,
    ) -> Self {
        Chan(Rc::new(Core::without_transform(dispatcher, limits, buffer)))
    }

    /// Numeric id, for diagnostics.
    pub fn id(&self) -> u64 {
        self.0.id()
    }

    /// Attempt to put a value, parking `handler` if it can't complete immediately.
    ///
    /// Returns `Some(delivered)` if the put completed immediately, in which case `handler`'s
    /// continuation will never be called. `delivered` is false iff the channel was closed.
    /// Returns `None` if `handler` was already inactive, if it was parked, or if it isn't
    /// blockable and the put couldn't complete.
    ///
    /// Errors with [`QueueOverflowError`](crate::error::QueueOverflowError) if too many puts are
    /// already parked.
    pub fn put<H>(&self, value: T, handler: H) -> Result<Option<bool>, Error>
    where
        H: Handler<bool> + 'static,
    {
        self.0.put(value, Box::new(handler))
    }

    /// Attempt to take a value, parking `handler` if it can't complete immediately.
    ///
    /// Returns `Some(value)` if the take completed immediately, in which case `handler`'s
    /// continuation will never be called. `value` is `None` iff the channel is closed and has no
    /// buffered values left. Returns `None` if `handler` was already inactive, if it was parked,
    /// or if it isn't blockable and the take couldn't complete.
    ///
    /// Errors with [`QueueOverflowError`](crate::error::QueueOverflowError) if too many takes are
    /// already parked.
    pub fn take<H>(&self, handler: H) -> Result<Option<Option<T>>, Error>
    where
        H: Handler<Option<T>> + 'static,
    {
        self.0.take(Box::new(handler))
    }

    /// Close the channel.
    ///
    /// Parked takers receive whatever is buffered, then `None`. Parked putters receive `false`.
    /// Closing an already-closed channel does nothing.
    pub fn close(&self) {
        self.0.close()
    }

    /// Whether the channel has been closed.
    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }

    /// Put a value only if that can complete immediately. Returns whether it did.
    pub fn offer(&self, value: T) -> bool {
        // a non-blockable handler never parks, so can't overflow
        matches!(self.put(value, FnHandler::non_blocking()), Ok(Some(true)))
    }

    /// Take a value only if one is available immediately.
    ///
    /// Returns `None` both when nothing is available and when the channel is closed and drained.
    pub fn poll(&self) -> Option<T> {
        match self.take(FnHandler::non_blocking()) {
            Ok(Some(value)) => value,
            _ => None,
        }
    }

    /// Put a value, calling `callback` with whether it was delivered once the put completes.
    ///
    /// `callback` always runs on the dispatcher, never before this returns.
    pub fn put_async<F>(&self, value: T, callback: F) -> Result<(), Error>
    where
        F: FnOnce(bool) + 'static,
    {
        let cell = Rc::new(TakeCell::some(callback));
        let handler_cell = Rc::clone(&cell);
        let handler = FnHandler::new(move |delivered| {
            if let Some(callback) = handler_cell.take() {
                callback(delivered);
            }
        });
        if let Some(delivered) = self.put(value, handler)? {
            if let Some(callback) = cell.take() {
                self.0.dispatcher().schedule(move || callback(delivered));
            }
        }
        Ok(())
    }

    /// Take a value, calling `callback` with it (or with `None` if the channel is closed) once the
    /// take completes.
    ///
    /// `callback` always runs on the dispatcher, never before this returns.
    pub fn take_async<F>(&self, callback: F) -> Result<(), Error>
    where
        F: FnOnce(Option<T>) + 'static,
    {
        let cell = Rc::new(TakeCell::some(callback));
        let handler_cell = Rc::clone(&cell);
        let handler = FnHandler::new(move |value| {
            if let Some(callback) = handler_cell.take() {
                callback(value);
            }
        });
        if let Some(value) = self.take(handler)? {
            if let Some(callback) = cell.take() {
                self.0.dispatcher().schedule(move || callback(value));
            }
        }
        Ok(())
    }

    /// Put a value from outside a process, resolving to whether it was delivered.
    ///
    /// Resolves to `false` if every handle to the channel is dropped while the put is parked.
    /// Dropping the future withdraws a parked put.
    pub async fn send(&self, value: T) -> Result<bool, Error> {
        let (send, recv) = oneshot::channel();
        match self.put(value, OneshotHandler(send))? {
            Some(delivered) => Ok(delivered),
            None => Ok(recv.await.unwrap_or(false)),
        }
    }

    /// Take a value from outside a process, resolving to `None` if the channel is closed.
    ///
    /// Also resolves to `None` if every handle to the channel is dropped while the take is
    /// parked. Dropping the future withdraws a parked take, so no value is lost.
    pub async fn recv(&self) -> Result<Option<T>, Error> {
        let (send, recv) = oneshot::channel();
        match self.take(OneshotHandler(send))? {
            Some(value) => Ok(value),
            None => Ok(recv.await.unwrap_or(None)),
        }
    }
}

// handler which resolves a oneshot. goes stale once the receiving future is dropped.
struct OneshotHandler<V>(oneshot::Sender<V>);

impl<V: 'static> Handler<V> for OneshotHandler<V> {
    fn is_active(&self) -> bool {
        !self.0.is_closed()
    }

    fn is_blockable(&self) -> bool {
        true
    }

    fn commit(self: Box<Self>) -> Callback<V> {
        let send = self.0;
        Box::new(move |value| {
            let _ = send.send(value);
        })
    }
}

impl<T> PartialEq for Chan<T> {
    fn eq(&self, rhs: &Self) -> bool {
        Rc::ptr_eq(&self.0, &rhs.0)
    }
}

impl<T> Eq for Chan<T> {}

impl<T> Hash for Chan<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.0).hash(state)
    }
}

impl<T: 'static> Debug for Chan<T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("Chan")
            .field("id", &self.id())
            .field("closed", &self.is_closed())
            .finish()
    }
}


/// Put a value on a channel only if that can complete immediately. Returns whether it did.
pub fn offer<T: 'static>(chan: &Chan<T>, value: T) -> bool {
    chan.offer(value)
}

/// Take a value from a channel only if one is available immediately.
pub fn poll<T: 'static>(chan: &Chan<T>) -> Option<T> {
    chan.poll()
}


// ==== type-erased handle for timers ====


// channel handle whose value type has been erased, so channels of different types can share a
// timer entry.
pub(crate) trait TimeoutChan {
    fn close(&self);

    fn as_any(&self) -> &dyn Any;
}

impl<T: 'static> TimeoutChan for Chan<T> {
    fn close(&self) {
        Chan::close(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}


// ==== builder ====


/// Builder for a channel with a custom buffer, transform, or exception handler.
///
/// Obtained from [`Runtime::chan_builder`](crate::Runtime::chan_builder).
pub struct ChanBuilder<T> {
    dispatcher: Dispatcher,
    limits: Limits,
    buffer: Option<Box<dyn Buffer<T>>>,
    transform: Option<Box<dyn Transform<T>>>,
    ex_handler: Option<ExHandler<T>>,
}

impl<T: 'static> ChanBuilder<T> {
    pub(crate) fn new(dispatcher: Dispatcher, limits: Limits) -> Self {
        ChanBuilder {
            dispatcher,
            limits,
            buffer: None,
            transform: None,
            ex_handler: None,
        }
    }

    /// Use the given buffer.
    pub fn buffer<B: Buffer<T> + 'static>(mut self, buffer: B) -> Self {
        self.buffer = Some(Box::new(buffer));
        self
    }

    /// Use a [`fixed`](buffer::fixed) buffer of size `n`, or no buffer if `n` is 0.
    pub fn buffer_size(mut self, n: usize) -> Self {
        self.buffer = if n > 0 {
            Some(Box::new(buffer::fixed(n)))
        } else {
            None
        };
        self
    }

    /// Feed put values through the given transform. Requires a buffer.
    pub fn transform<X: Transform<T> + 'static>(mut self, transform: X) -> Self {
        self.transform = Some(Box::new(transform));
        self
    }

    /// Handle transform failures with `f` rather than logging and dropping them.
    pub fn ex_handler<F>(mut self, f: F) -> Self
    where
        F: FnMut(anyhow::Error) -> Option<T> + 'static,
    {
        self.ex_handler = Some(Box::new(f));
        self
    }

    /// Construct the channel.
    ///
    /// Errors with [`UnbufferedTransformError`](crate::error::UnbufferedTransformError) if a
    /// transform was given without a buffer.
    pub fn build(self) -> Result<Chan<T>, Error> {
        let core = Core::new(
            self.dispatcher,
            self.limits,
            self.buffer,
            self.transform,
            self.ex_handler.unwrap_or_else(default_ex_handler),
        )?;
        Ok(Chan(Rc::new(core)))
    }
}
