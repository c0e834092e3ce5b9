//! Error types

use std::fmt::{self, Formatter, Display};
use thiserror::Error;


// ==== base error types ====


/// Kind of parked operation on a channel
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum PendingOp {
    /// A put waiting for a taker or for buffer space
    Put,
    /// A take waiting for a putter or a buffered value
    Take,
}

impl Display for PendingOp {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(match self {
            PendingOp::Put => "put",
            PendingOp::Take => "take",
        })
    }
}

/// Error for parking an operation on a channel whose wait-queue for that kind of operation is
/// already at its hard limit
///
/// This signals unbounded fan-in (a design bug) rather than a recoverable condition.
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[error("no more than {limit} pending {op}s are allowed on a single channel")]
pub struct QueueOverflowError {
    /// Which wait-queue overflowed
    pub op: PendingOp,
    /// The configured limit
    pub limit: usize,
}

/// Error for calling alts with no operations
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[error("empty alt list")]
pub struct EmptyAltsError;

/// Error for attaching a transform to a channel without a buffer
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[error("only buffered channels can use transforms")]
pub struct UnbufferedTransformError;

/// Error for a process computation suspending on something other than a channel operation
///
/// Process computations are driven by the runtime's interpreter, not by a waker, so awaiting a
/// foreign future would suspend them forever.
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[error("process suspended on a future that is not a channel operation")]
pub struct ForeignAwaitError;


// ==== compound error types ====


/// Error type for the runtime and for process computations
#[derive(Error, Debug)]
pub enum Error {
    /// A channel wait-queue hit its hard limit
    #[error(transparent)]
    QueueOverflow(#[from] QueueOverflowError),
    /// Alts was called with no operations
    #[error(transparent)]
    EmptyAlts(#[from] EmptyAltsError),
    /// A transform was attached to an unbuffered channel
    #[error(transparent)]
    UnbufferedTransform(#[from] UnbufferedTransformError),
    /// A process awaited a foreign future
    #[error(transparent)]
    ForeignAwait(#[from] ForeignAwaitError),
    /// The host event loop could not be started
    #[error("failed to start host event loop: {0}")]
    Host(#[from] std::io::Error),
    /// Failure raised by a process computation itself
    #[error(transparent)]
    Computation(#[from] anyhow::Error),
}

impl Error {
    /// Whether this is a usage error: misuse of the API which fails synchronously at the call site
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            Error::QueueOverflow(_)
                | Error::EmptyAlts(_)
                | Error::UnbufferedTransform(_)
                | Error::ForeignAwait(_)
        )
    }
}
