//! Handle through which a process computation performs channel operations.

use super::{
    instruction::{Instruction, Resumed},
    interpreter::{Exchange, Suspend},
};
use crate::{
    channel::api::Chan,
    error::Error,
    runtime::Runtime,
    select::{AltOp, AltResult, AltsOptions},
};
use std::{
    rc::Rc,
    time::Duration,
};


/// Handle passed to a process computation, through which it suspends on channel operations.
///
/// The computation must only await futures obtained from its own `Co`. Awaiting anything else
/// (a tokio sleep, another process's `Co`, a `Chan::recv`) finishes the process with
/// [`ForeignAwaitError`](crate::error::ForeignAwaitError), as does awaiting two of its
/// operations concurrently.
#[derive(Clone)]
pub struct Co {
    exchange: Rc<Exchange>,
    runtime: Runtime,
}

// resumed with a variant that doesn't match the instruction.
fn mismatch(op: &str) -> ! {
    unreachable!("{} resumed with mismatched result (internal bug)", op)
}

impl Co {
    pub(crate) fn new(exchange: Rc<Exchange>, runtime: Runtime) -> Self {
        Co { exchange, runtime }
    }

    /// The runtime this process runs on.
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Suspend on an arbitrary instruction.
    pub async fn yield_<T: 'static>(&self, instruction: Instruction<T>) -> Result<Resumed<T>, Error> {
        Suspend::new(Rc::clone(&self.exchange), instruction).await
    }

    /// Take from a channel. Resolves to `None` if the channel is closed.
    pub async fn take<T: 'static>(&self, chan: &Chan<T>) -> Result<Option<T>, Error> {
        match self.yield_(Instruction::Take(chan.clone())).await? {
            Resumed::Taken(value) => Ok(value),
            _ => mismatch("take"),
        }
    }

    /// Put a value on a channel. Resolves to false if the channel is closed.
    pub async fn put<T: 'static>(&self, chan: &Chan<T>, value: T) -> Result<bool, Error> {
        match self.yield_(Instruction::Put(chan.clone(), value)).await? {
            Resumed::Put(delivered) => Ok(delivered),
            _ => mismatch("put"),
        }
    }

    /// Wait for a duration.
    pub async fn sleep(&self, duration: Duration) -> Result<(), Error> {
        match self.yield_(Instruction::<()>::Sleep(duration)).await? {
            Resumed::Slept => Ok(()),
            _ => mismatch("sleep"),
        }
    }

    /// Complete exactly one of several channel operations.
    pub async fn alts<T: 'static>(
        &self,
        ops: Vec<AltOp<T>>,
        options: AltsOptions<T>,
    ) -> Result<AltResult<T>, Error> {
        match self.yield_(Instruction::Alts(ops, options)).await? {
            Resumed::Alts(result) => Ok(result),
            _ => mismatch("alts"),
        }
    }

    /// Let other work run, then resolve to `value`.
    pub async fn pass<T: 'static>(&self, value: T) -> Result<T, Error> {
        match self.yield_(Instruction::Pass(value)).await? {
            Resumed::Passed(value) => Ok(value),
            _ => mismatch("pass"),
        }
    }

    /// Take from the result channel of a propagating process, raising its error if it failed.
    ///
    /// Resolves to `None` if the channel is closed.
    pub async fn take_propagate<R: 'static>(
        &self,
        chan: &Chan<Result<R, Error>>,
    ) -> Result<Option<R>, Error> {
        self.take(chan).await?.transpose()
    }
}
