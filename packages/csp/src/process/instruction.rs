//! Instructions a process suspends on, and what it's resumed with.

use super::interpreter::{Operation, Resume};
use crate::{
    channel::api::Chan,
    select::{AltOp, AltResult, AltsOptions},
    runtime::Runtime,
};
use std::time::Duration;


/// Something a process computation suspends on.
///
/// Carries no behavior itself. The interpreter performs it and resumes the computation with the
/// corresponding [`Resumed`] variant.
pub enum Instruction<T> {
    /// Take from the channel. Resumes with [`Resumed::Taken`].
    Take(Chan<T>),
    /// Put the value on the channel. Resumes with [`Resumed::Put`].
    Put(Chan<T>, T),
    /// Wait for a duration. Resumes with [`Resumed::Slept`].
    Sleep(Duration),
    /// Complete exactly one of the operations. Resumes with [`Resumed::Alts`].
    Alts(Vec<AltOp<T>>, AltsOptions<T>),
    /// Don't wait on anything, just go through the dispatcher. Resumes with [`Resumed::Passed`].
    Pass(T),
}

impl<T> From<Chan<T>> for Instruction<T> {
    fn from(chan: Chan<T>) -> Self {
        Instruction::Take(chan)
    }
}

/// Value a process computation is resumed with after an [`Instruction`].
pub enum Resumed<T> {
    /// Value taken, or `None` if the channel was closed.
    Taken(Option<T>),
    /// Whether the value put was delivered.
    Put(bool),
    /// Sleep elapsed.
    Slept,
    /// Alts outcome.
    Alts(AltResult<T>),
    /// Value passed through.
    Passed(T),
}

/// Take from a channel.
pub fn take<T>(chan: &Chan<T>) -> Instruction<T> {
    Instruction::Take(chan.clone())
}

/// Put a value on a channel.
pub fn put<T>(chan: &Chan<T>, value: T) -> Instruction<T> {
    Instruction::Put(chan.clone(), value)
}

/// Wait for a duration.
pub fn sleep(duration: Duration) -> Instruction<()> {
    Instruction::Sleep(duration)
}

/// Complete exactly one of several channel operations.
pub fn alts<T>(ops: Vec<AltOp<T>>, options: AltsOptions<T>) -> Instruction<T> {
    Instruction::Alts(ops, options)
}

/// Resume with a value through the dispatcher.
pub fn pass<T>(value: T) -> Instruction<T> {
    Instruction::Pass(value)
}


impl<T: 'static> Operation for Instruction<T> {
    fn start(self: Box<Self>, runtime: &Runtime, resume: Resume) {
        let result = match *self {
            Instruction::Take(chan) => {
                let resume = resume.clone();
                chan.take_async(move |value| resume.now(Resumed::Taken(value)))
            }
            Instruction::Put(chan, value) => {
                let resume = resume.clone();
                chan.put_async(value, move |delivered| resume.now(Resumed::<T>::Put(delivered)))
            }
            Instruction::Sleep(duration) => {
                let resume = resume.clone();
                runtime.dispatcher().schedule_delay(
                    move || resume.now(Resumed::<T>::Slept),
                    duration,
                );
                Ok(())
            }
            Instruction::Alts(ops, options) => {
                let resume = resume.clone();
                // may complete before returning, so resume later rather than re-entering
                runtime.do_alts(ops, move |result| resume.later(Resumed::Alts(result)), options)
            }
            Instruction::Pass(value) => {
                resume.later(Resumed::Passed(value));
                Ok(())
            }
        };
        if let Err(err) = result {
            resume.fail_later(err);
        }
    }
}
