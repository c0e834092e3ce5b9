//! The runtime handle.

use crate::{
    buffer::{self, Buffer},
    channel::api::{Chan, ChanBuilder},
    config::Config,
    dispatch::Dispatcher,
    error::Error,
    process::{Co, ProcessBuilder},
    select::{self, AltOp, AltResult, AltsOptions},
    timers::Timers,
};
use std::{
    rc::Rc,
    cell::RefCell,
    future::Future,
    time::Duration,
};
use rand::{Rng, SeedableRng, seq::SliceRandom};
use rand_pcg::Pcg32;
use tokio::task::LocalSet;


type ExceptionHandler = Rc<dyn Fn(Error)>;

fn default_exception_handler() -> ExceptionHandler {
    Rc::new(|err| error!(%err, "uncaught error in process"))
}


/// Handle to a CSP runtime: a dispatcher, a timer service, and everything else channels and
/// processes share.
///
/// Cheap to clone. Several runtimes may coexist on one thread, but a channel only ever schedules
/// work on the runtime that created it.
///
/// All operations which may schedule work must be called from within a tokio `LocalSet` running on
/// a runtime with time enabled, such as inside [`Runtime::block_on`].
#[derive(Clone)]
pub struct Runtime(Rc<Inner>);

struct Inner {
    config: Config,
    dispatcher: Dispatcher,
    timers: Timers,
    // orders non-priority alts
    rng: RefCell<Pcg32>,
    exception_handler: RefCell<ExceptionHandler>,
}

impl Runtime {
    /// Construct with the default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Construct with the given configuration.
    pub fn with_config(config: Config) -> Self {
        let seed = config.seed.unwrap_or_else(|| rand::thread_rng().gen());
        let mut rng = Pcg32::seed_from_u64(seed);
        let dispatcher = Dispatcher::new(config.dispatch_batch_size);
        let timers = Timers::new(
            dispatcher.clone(),
            config.limits(),
            config.timeout_resolution,
            Pcg32::seed_from_u64(rng.gen()),
        );
        debug!(seed, "created runtime");
        Runtime(Rc::new(Inner {
            config,
            dispatcher,
            timers,
            rng: RefCell::new(rng),
            exception_handler: RefCell::new(default_exception_handler()),
        }))
    }

    /// The configuration this runtime was constructed with.
    pub fn config(&self) -> &Config {
        &self.0.config
    }

    pub(crate) fn dispatcher(&self) -> &Dispatcher {
        &self.0.dispatcher
    }

    #[cfg(test)]
    pub(crate) fn timers(&self) -> &Timers {
        &self.0.timers
    }

    /// Run a future to completion on a new single-threaded tokio runtime, within a `LocalSet`.
    ///
    /// Errors if the tokio runtime can't be built.
    pub fn block_on<F: Future>(&self, future: F) -> Result<F::Output, Error> {
        let host = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;
        Ok(LocalSet::new().block_on(&host, future))
    }

    // ==== channels ====

    /// Construct an unbuffered channel.
    pub fn chan<T: 'static>(&self) -> Chan<T> {
        Chan::unbuffered(self.0.dispatcher.clone(), self.0.config.limits())
    }

    /// Construct a channel with a [`fixed`](buffer::fixed) buffer of size `n`, or an unbuffered
    /// channel if `n` is 0.
    pub fn buffered_chan<T: 'static>(&self, n: usize) -> Chan<T> {
        if n == 0 {
            self.chan()
        } else {
            self.chan_with(buffer::fixed(n))
        }
    }

    /// Construct a channel with the given buffer.
    pub fn chan_with<T: 'static, B: Buffer<T> + 'static>(&self, buffer: B) -> Chan<T> {
        Chan::buffered(
            self.0.dispatcher.clone(),
            self.0.config.limits(),
            Some(Box::new(buffer)),
        )
    }

    /// Construct a channel with a [`promise`](buffer::promise) buffer.
    ///
    /// The first value put is delivered to every take, past and future, and later puts are
    /// accepted and ignored.
    pub fn promise_chan<T: Clone + 'static>(&self) -> Chan<T> {
        self.chan_with(buffer::promise())
    }

    /// Start building a channel with a custom buffer, transform, or exception handler.
    pub fn chan_builder<T: 'static>(&self) -> ChanBuilder<T> {
        ChanBuilder::new(self.0.dispatcher.clone(), self.0.config.limits())
    }

    /// Get a channel which closes once `duration` has elapsed.
    ///
    /// Timeouts created close together in time may share a channel, so the channel may close up
    /// to the configured resolution later than requested.
    pub fn timeout<T: 'static>(&self, duration: Duration) -> Chan<T> {
        self.0.timers.timeout(duration)
    }

    // ==== alts ====

    /// Complete exactly one of several channel operations, calling `callback` with the outcome.
    ///
    /// `callback` may be called before this returns, if an operation can complete immediately or
    /// the default is chosen.
    ///
    /// Errors if `ops` is empty, or if an operation would overflow its channel's wait-queue. In
    /// either case `callback` is never called.
    pub fn do_alts<T, F>(
        &self,
        mut ops: Vec<AltOp<T>>,
        callback: F,
        options: AltsOptions<T>,
    ) -> Result<(), Error>
    where
        T: 'static,
        F: FnOnce(AltResult<T>) + 'static,
    {
        if !options.priority {
            ops.shuffle(&mut *self.0.rng.borrow_mut());
        }
        select::do_alts(ops, callback, options.default)
    }

    // ==== processes ====

    /// Start building a process with options.
    pub fn process(&self) -> ProcessBuilder {
        ProcessBuilder::new(self.clone())
    }

    /// Spawn a process, calling `on_finish` with its output once it finishes.
    pub fn spawn<R, F, Fut, C>(&self, f: F, on_finish: C)
    where
        R: 'static,
        F: FnOnce(Co) -> Fut,
        Fut: Future<Output=Result<Option<R>, Error>> + 'static,
        C: FnOnce(Result<Option<R>, Error>) + 'static,
    {
        self.process().spawn(f, on_finish)
    }

    /// Spawn a process, returning a channel which yields its value, if any, and then closes.
    ///
    /// See [`ProcessBuilder::go`].
    pub fn go<R, F, Fut>(&self, f: F) -> Chan<R>
    where
        R: 'static,
        F: FnOnce(Co) -> Fut,
        Fut: Future<Output=Result<Option<R>, Error>> + 'static,
    {
        self.process().go(f)
    }

    /// Spawn a process, returning a channel which yields its value or its error, if any, and
    /// then closes.
    ///
    /// See [`ProcessBuilder::go_propagating`].
    pub fn go_propagating<R, F, Fut>(&self, f: F) -> Chan<Result<R, Error>>
    where
        R: 'static,
        F: FnOnce(Co) -> Fut,
        Fut: Future<Output=Result<Option<R>, Error>> + 'static,
    {
        self.process().go_propagating(f)
    }

    /// Replace the handler for errors of processes spawned with [`go`](Self::go).
    ///
    /// The default logs them.
    pub fn set_default_exception_handler<F: Fn(Error) + 'static>(&self, f: F) {
        *self.0.exception_handler.borrow_mut() = Rc::new(f);
    }

    pub(crate) fn handle_uncaught(&self, err: Error) {
        // the handler may replace itself
        let handler = Rc::clone(&self.0.exception_handler.borrow());
        handler(err);
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
