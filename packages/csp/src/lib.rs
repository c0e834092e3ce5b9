//! Communicating sequential processes on a single thread.
//!
//! Lightweight processes communicate only through channels. A put and a take on an unbuffered
//! channel rendezvous: whichever arrives first parks until the other arrives. Buffered channels
//! let puts complete early, under a pluggable [buffer policy](buffer), and can pass values
//! through a [transform]. [Alts](Runtime::do_alts) completes exactly one of several operations,
//! choosing fairly among those ready. [Timeouts](Runtime::timeout) are channels which close after
//! a delay.
//!
//! Everything runs on one thread, within a tokio `LocalSet`. Continuations are never called
//! directly from a channel operation: they go through the runtime's dispatcher, which runs them
//! in bounded batches on the event loop.
//!
//! ```no_run
//! use csp::Runtime;
//!
//! let rt = Runtime::new();
//! let answer = rt.block_on(async {
//!     let ch = rt.chan::<u32>();
//!     let out = ch.clone();
//!     rt.go::<(), _, _>(move |co| async move {
//!         co.put(&out, 42).await?;
//!         Ok(None)
//!     });
//!     ch.recv().await
//! });
//! ```

#[macro_use]
extern crate tracing;

mod channel;
mod config;
mod dispatch;
mod handler;
mod process;
mod runtime;
mod select;
mod timers;
mod util;
pub mod buffer;
pub mod error;
pub mod transform;

#[cfg(test)]
mod test_util;

pub use crate::{
    channel::{
        ExHandler,
        api::{Chan, ChanBuilder, offer, poll},
    },
    config::Config,
    handler::{AltFlag, AltHandler, Callback, FnHandler, Handler},
    process::{Co, Instruction, ProcessBuilder, Resumed, take, put, sleep, alts, pass},
    runtime::Runtime,
    select::{AltOp, AltResult, AltsOptions},
};
