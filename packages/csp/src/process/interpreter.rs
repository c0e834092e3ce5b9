// the process interpreter.
//
// a process computation is an async block. each channel operation it awaits stores a type-erased
// instruction in the exchange it shares with its process, and returns Pending. the interpreter,
// which polls the computation with a no-op waker, then finds the instruction in the exchange,
// performs it, and arranges for the process to be polled again once it completes, with the
// result placed in the exchange for the awaiting operation to pick up.
//
// the computation is only ever polled from a dispatcher round, so however many operations a
// process performs, the stack never grows.

use super::instruction::Resumed;
use crate::{
    error::{Error, ForeignAwaitError},
    dispatch::Dispatcher,
    runtime::Runtime,
    util::TakeCell,
};
use std::{
    any::Any,
    rc::Rc,
    cell::{Cell, RefCell},
    pin::Pin,
    future::Future,
    task::{Context, Poll},
};
use futures::task::noop_waker_ref;


pub(crate) type Output<R> = Result<Option<R>, Error>;

type Computation<R> = Pin<Box<dyn Future<Output=Output<R>>>>;

// type-erased resume value. on success, holds a Resumed<T> for the T of the instruction.
type ResumeValue = Result<Box<dyn Any>, Error>;


// ==== exchange ====


// slots through which a suspended computation and its interpreter pass instructions and resume
// values.
#[derive(Default)]
pub(crate) struct Exchange {
    yielded: RefCell<Option<Box<dyn Operation>>>,
    resumed: RefCell<Option<ResumeValue>>,
}

// an instruction, with its value type erased.
pub(crate) trait Operation {
    // perform the operation. must eventually call exactly one of resume's methods, exactly once.
    fn start(self: Box<Self>, runtime: &Runtime, resume: Resume);
}

// future which yields an instruction to the interpreter and resolves to what the process is
// resumed with.
pub(crate) struct Suspend<T> {
    exchange: Rc<Exchange>,
    instruction: Option<super::Instruction<T>>,
}

impl<T> Suspend<T> {
    pub(crate) fn new(exchange: Rc<Exchange>, instruction: super::Instruction<T>) -> Self {
        Suspend {
            exchange,
            instruction: Some(instruction),
        }
    }
}

// never pin-projected
impl<T> Unpin for Suspend<T> {}

impl<T: 'static> Future for Suspend<T> {
    type Output = Result<Resumed<T>, Error>;

    fn poll(self: Pin<&mut Self>, _: &mut Context) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(instruction) = this.instruction.take() {
            let mut yielded = this.exchange.yielded.borrow_mut();
            if yielded.is_some() {
                // another operation of the same process suspended in the same poll, such as
                // within a join. only one can be in flight.
                return Poll::Ready(Err(ForeignAwaitError.into()));
            }
            *yielded = Some(Box::new(instruction));
            return Poll::Pending;
        }
        match this.exchange.resumed.borrow_mut().take() {
            Some(Ok(value)) => Poll::Ready(value
                .downcast::<Resumed<T>>()
                .map(|value| *value)
                .map_err(|_| ForeignAwaitError.into())),
            Some(Err(err)) => Poll::Ready(Err(err)),
            // polled by something other than the interpreter
            None => Poll::Pending,
        }
    }
}


// ==== resume ====


// polled by the interpreter.
pub(crate) trait Resumable {
    fn run(self: Rc<Self>, resumed: ResumeValue);
}

// capability to resume a suspended process.
#[derive(Clone)]
pub(crate) struct Resume {
    process: Rc<dyn Resumable>,
    dispatcher: Dispatcher,
}

impl Resume {
    // resume immediately. only for use from within a dispatcher round.
    pub(crate) fn now<T: 'static>(&self, resumed: Resumed<T>) {
        Rc::clone(&self.process).run(Ok(Box::new(resumed)));
    }

    // resume in a later dispatcher round.
    pub(crate) fn later<T: 'static>(&self, resumed: Resumed<T>) {
        let process = Rc::clone(&self.process);
        self.dispatcher.schedule(move || process.run(Ok(Box::new(resumed))));
    }

    // resume with an error in a later dispatcher round.
    pub(crate) fn fail_later(&self, err: Error) {
        let process = Rc::clone(&self.process);
        self.dispatcher.schedule(move || process.run(Err(err)));
    }
}


// ==== process ====


// a running process.
pub(crate) struct Process<R> {
    runtime: Runtime,
    name: Option<Rc<str>>,
    exchange: Rc<Exchange>,
    // None once finished.
    computation: RefCell<Option<Computation<R>>>,
    on_finish: TakeCell<Box<dyn FnOnce(Output<R>)>>,
    finished: Cell<bool>,
}

impl<R: 'static> Process<R> {
    // construct and schedule the first poll.
    pub(crate) fn start<F, Fut, C>(
        runtime: Runtime,
        name: Option<Rc<str>>,
        f: F,
        on_finish: C,
    )
    where
        F: FnOnce(super::Co) -> Fut,
        Fut: Future<Output=Output<R>> + 'static,
        C: FnOnce(Output<R>) + 'static,
    {
        let exchange = Rc::new(Exchange::default());
        let co = super::Co::new(Rc::clone(&exchange), runtime.clone());
        let process = Rc::new(Process {
            runtime: runtime.clone(),
            name,
            exchange,
            computation: RefCell::new(Some(Box::pin(f(co)))),
            on_finish: TakeCell::some(Box::new(on_finish)),
            finished: Cell::new(false),
        });
        trace!(process = process.name(), "spawned process");
        runtime.dispatcher().schedule(move || process.step());
    }

    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }

    // poll the computation once and act on the result.
    fn step(self: Rc<Self>) {
        let mut cx = Context::from_waker(noop_waker_ref());
        let poll = match self.computation.borrow_mut().as_mut() {
            Some(computation) => computation.as_mut().poll(&mut cx),
            None => return,
        };
        // a resume value the computation didn't consume is stale
        self.exchange.resumed.borrow_mut().take();

        match poll {
            Poll::Ready(output) => self.finish(output),
            Poll::Pending => {
                let yielded = self.exchange.yielded.borrow_mut().take();
                match yielded {
                    Some(operation) => {
                        let resume = Resume {
                            dispatcher: self.runtime.dispatcher().clone(),
                            process: self.clone(),
                        };
                        operation.start(&self.runtime, resume);
                    }
                    None => {
                        let err = ForeignAwaitError;
                        error!(process = self.name(), %err, "process suspended without a channel operation");
                        self.finish(Err(err.into()));
                    }
                }
            }
        }
    }

    fn finish(&self, output: Output<R>) {
        self.finished.set(true);
        self.computation.borrow_mut().take();
        debug!(process = self.name(), ok = output.is_ok(), "process finished");
        if let Some(on_finish) = self.on_finish.take() {
            self.runtime.dispatcher().schedule(move || on_finish(output));
        }
    }
}

impl<R: 'static> Resumable for Process<R> {
    fn run(self: Rc<Self>, resumed: ResumeValue) {
        if self.finished.get() {
            return;
        }
        *self.exchange.resumed.borrow_mut() = Some(resumed);
        self.step();
    }
}
