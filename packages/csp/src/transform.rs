//! Value transforms for buffered channels.
//!
//! A transform sits between a channel's putters and its buffer. Each value put is fed to
//! [`Transform::step`], which may add any number of values to the buffer (including none) and may
//! ask for the channel to be closed. When the channel closes, [`Transform::finish`] gets one last
//! chance to flush state into the buffer.

use crate::buffer::Buffer;
use std::marker::PhantomData;


/// Whether a transform wants more input.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Step {
    /// Keep feeding values.
    Continue,
    /// Close the channel once the values already added are delivered.
    Terminate,
}

/// Stateful value transform attached to a buffered channel.
///
/// Runs while its channel is locked, so it must not operate on that channel. Doing so panics.
/// A failure returned from either method goes to the channel's ex-handler, which is free to use
/// the channel.
pub trait Transform<T> {
    /// Process one put value, adding outputs to `buf`.
    fn step(&mut self, buf: &mut dyn Buffer<T>, input: T) -> anyhow::Result<Step>;

    /// Flush any held state into `buf`. Called once, when the channel closes.
    fn finish(&mut self, buf: &mut dyn Buffer<T>) -> anyhow::Result<()> {
        let _ = buf;
        Ok(())
    }
}


// ==== provided transforms ====


/// Transform that applies a function to each value.
pub fn map<T, F: FnMut(T) -> T>(f: F) -> Map<F> {
    Map(f)
}

/// See [`map`].
pub struct Map<F>(F);

impl<T, F: FnMut(T) -> T> Transform<T> for Map<F> {
    fn step(&mut self, buf: &mut dyn Buffer<T>, input: T) -> anyhow::Result<Step> {
        buf.add((self.0)(input));
        Ok(Step::Continue)
    }
}

/// Transform that drops values for which the predicate is false.
pub fn filter<T, F: FnMut(&T) -> bool>(f: F) -> Filter<F> {
    Filter(f)
}

/// See [`filter`].
pub struct Filter<F>(F);

impl<T, F: FnMut(&T) -> bool> Transform<T> for Filter<F> {
    fn step(&mut self, buf: &mut dyn Buffer<T>, input: T) -> anyhow::Result<Step> {
        if (self.0)(&input) {
            buf.add(input);
        }
        Ok(Step::Continue)
    }
}

/// Transform that expands each value into any number of values.
pub fn flat_map<T, I, F>(f: F) -> FlatMap<F, I>
where
    I: IntoIterator<Item=T>,
    F: FnMut(T) -> I,
{
    FlatMap(f, PhantomData)
}

/// See [`flat_map`].
pub struct FlatMap<F, I>(F, PhantomData<fn() -> I>);

impl<T, I, F> Transform<T> for FlatMap<F, I>
where
    I: IntoIterator<Item=T>,
    F: FnMut(T) -> I,
{
    fn step(&mut self, buf: &mut dyn Buffer<T>, input: T) -> anyhow::Result<Step> {
        for output in (self.0)(input) {
            buf.add(output);
        }
        Ok(Step::Continue)
    }
}

/// Transform that passes the first `n` values and then closes the channel.
pub fn take_n(n: usize) -> TakeN {
    TakeN { remaining: n }
}

/// See [`take_n`].
pub struct TakeN {
    remaining: usize,
}

impl<T> Transform<T> for TakeN {
    fn step(&mut self, buf: &mut dyn Buffer<T>, input: T) -> anyhow::Result<Step> {
        if self.remaining > 0 {
            buf.add(input);
            self.remaining -= 1;
        }
        Ok(if self.remaining == 0 { Step::Terminate } else { Step::Continue })
    }
}

/// Transform that applies a fallible function to each value.
///
/// Failures go to the channel's exception handler.
pub fn try_map<T, F: FnMut(T) -> anyhow::Result<T>>(f: F) -> TryMap<F> {
    TryMap(f)
}

/// See [`try_map`].
pub struct TryMap<F>(F);

impl<T, F: FnMut(T) -> anyhow::Result<T>> Transform<T> for TryMap<F> {
    fn step(&mut self, buf: &mut dyn Buffer<T>, input: T) -> anyhow::Result<Step> {
        buf.add((self.0)(input)?);
        Ok(Step::Continue)
    }
}
