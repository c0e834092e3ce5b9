//! Alts: complete exactly one of several channel operations.

use crate::{
    channel::api::Chan,
    error::{EmptyAltsError, Error},
    handler::{AltFlag, AltHandler},
    util::TakeCell,
};
use std::{
    rc::Rc,
    fmt::{self, Formatter, Debug},
};


/// One operation offered to an alts call.
pub enum AltOp<T> {
    /// Take from the channel.
    Take(Chan<T>),
    /// Put the value on the channel.
    Put(Chan<T>, T),
}

impl<T> From<Chan<T>> for AltOp<T> {
    fn from(chan: Chan<T>) -> Self {
        AltOp::Take(chan)
    }
}

impl<T> From<(Chan<T>, T)> for AltOp<T> {
    fn from((chan, value): (Chan<T>, T)) -> Self {
        AltOp::Put(chan, value)
    }
}

/// Outcome of an alts call.
pub enum AltResult<T> {
    /// A take completed. `value` is `None` if the channel was closed.
    Take {
        chan: Chan<T>,
        value: Option<T>,
    },
    /// A put completed. `delivered` is false if the channel was closed.
    Put {
        chan: Chan<T>,
        delivered: bool,
    },
    /// No operation could complete immediately, so the default value was chosen.
    Default(T),
}

impl<T> AltResult<T> {
    /// The channel whose operation completed, or `None` if the default was chosen.
    pub fn channel(&self) -> Option<&Chan<T>> {
        match self {
            AltResult::Take { chan, .. } | AltResult::Put { chan, .. } => Some(chan),
            AltResult::Default(_) => None,
        }
    }
}

impl<T: Debug + 'static> Debug for AltResult<T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            AltResult::Take { chan, value } => f
                .debug_struct("Take")
                .field("chan", &chan.id())
                .field("value", value)
                .finish(),
            AltResult::Put { chan, delivered } => f
                .debug_struct("Put")
                .field("chan", &chan.id())
                .field("delivered", delivered)
                .finish(),
            AltResult::Default(value) => f.debug_tuple("Default").field(value).finish(),
        }
    }
}

/// Options for an alts call.
pub struct AltsOptions<T> {
    /// Try operations in the order given rather than a random order.
    pub priority: bool,
    /// If no operation can complete immediately, complete with this rather than waiting.
    pub default: Option<T>,
}

impl<T> Default for AltsOptions<T> {
    fn default() -> Self {
        AltsOptions {
            priority: false,
            default: None,
        }
    }
}

impl<T> AltsOptions<T> {
    /// Ownership-chaining setter for `priority`
    pub fn with_priority(mut self) -> Self {
        self.priority = true;
        self
    }

    /// Ownership-chaining setter for `default`
    pub fn with_default(mut self, value: T) -> Self {
        self.default = Some(value);
        self
    }
}


// attempt each op in the given order until one completes, parking the rest behind one shared
// flag.
//
// the callback is called before returning if an op completes immediately or the default is
// chosen. otherwise, exactly one parked op eventually commits and its continuation calls it.
pub(crate) fn do_alts<T, F>(
    ops: Vec<AltOp<T>>,
    callback: F,
    default: Option<T>,
) -> Result<(), Error>
where
    T: 'static,
    F: FnOnce(AltResult<T>) + 'static,
{
    if ops.is_empty() {
        return Err(EmptyAltsError.into());
    }

    let flag = AltFlag::new();
    let callback = Rc::new(TakeCell::some(callback));

    for op in ops {
        let result = match op {
            AltOp::Take(chan) => {
                let handler_callback = Rc::clone(&callback);
                let handler_chan = chan.clone();
                let handler = AltHandler::new(flag.clone(), move |value| {
                    if let Some(callback) = handler_callback.take() {
                        callback(AltResult::Take { chan: handler_chan, value });
                    }
                });
                chan.take(handler)
                    .map(|done| done.map(|value| AltResult::Take { chan, value }))
            }
            AltOp::Put(chan, value) => {
                let handler_callback = Rc::clone(&callback);
                let handler_chan = chan.clone();
                let handler = AltHandler::new(flag.clone(), move |delivered| {
                    if let Some(callback) = handler_callback.take() {
                        callback(AltResult::Put { chan: handler_chan, delivered });
                    }
                });
                chan.put(value, handler)
                    .map(|done| done.map(|delivered| AltResult::Put { chan, delivered }))
            }
        };
        match result {
            Ok(Some(result)) => {
                if let Some(callback) = callback.take() {
                    callback(result);
                }
                return Ok(());
            }
            Ok(None) => (),
            Err(err) => {
                // handlers already parked must never fire
                flag.commit();
                return Err(err);
            }
        }
    }

    if let Some(value) = default {
        if flag.is_active() {
            flag.commit();
            if let Some(callback) = callback.take() {
                callback(AltResult::Default(value));
            }
        }
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test_util::{run_local, settle},
        Runtime,
    };
    use std::cell::RefCell;

    fn recorder<T: 'static>() -> (Rc<RefCell<Vec<AltResult<T>>>>, impl FnOnce(AltResult<T>)) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log2 = Rc::clone(&log);
        (log, move |result| log2.borrow_mut().push(result))
    }

    #[test]
    fn empty_alts_errors() {
        let (log, callback) = recorder::<u32>();
        let err = do_alts(Vec::new(), callback, Some(1)).unwrap_err();
        assert!(matches!(err, Error::EmptyAlts(_)));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn immediate_op_wins() {
        run_local(async {
            let rt = Runtime::new();
            let a = rt.buffered_chan::<u32>(1);
            let b = rt.buffered_chan::<u32>(1);
            assert!(b.offer(7));

            let (log, callback) = recorder();
            do_alts(vec![a.clone().into(), b.clone().into()], callback, None).unwrap();
            let log = log.borrow();
            assert_eq!(log.len(), 1);
            match &log[0] {
                AltResult::Take { chan, value } => {
                    assert_eq!(chan, &b);
                    assert_eq!(*value, Some(7));
                }
                other => panic!("unexpected {:?}", other),
            }
        });
    }

    #[test]
    fn default_when_nothing_ready() {
        run_local(async {
            let rt = Runtime::new();
            let a = rt.chan::<u32>();
            let (log, callback) = recorder();
            do_alts(vec![a.clone().into()], callback, Some(99)).unwrap();
            assert!(matches!(log.borrow()[0], AltResult::Default(99)));
            assert!(log.borrow()[0].channel().is_none());

            // the take registered for the alts is stale, so a put doesn't go to it
            assert!(!a.offer(1));
        });
    }

    #[test]
    fn parked_ops_commit_once() {
        run_local(async {
            let rt = Runtime::new();
            let a = rt.chan::<u32>();
            let b = rt.chan::<u32>();
            let (log, callback) = recorder();
            do_alts(vec![a.clone().into(), b.clone().into()], callback, None).unwrap();
            assert!(log.borrow().is_empty());

            assert!(a.offer(1));
            // b's handler went stale when a's committed
            assert!(!b.offer(2));
            settle().await;

            let log = log.borrow();
            assert_eq!(log.len(), 1);
            assert_eq!(log[0].channel(), Some(&a));
        });
    }

    #[test]
    fn put_op_completes() {
        run_local(async {
            let rt = Runtime::new();
            let a = rt.chan::<&'static str>();
            let (log, callback) = recorder();
            do_alts(vec![(a.clone(), "hi").into()], callback, None).unwrap();
            assert_eq!(a.poll(), Some("hi"));
            settle().await;
            assert!(matches!(log.borrow()[0], AltResult::Put { delivered: true, .. }));
        });
    }

    #[test]
    fn overflow_deactivates_parked_ops() {
        run_local(async {
            let rt = Runtime::with_config(crate::Config::default().with_max_queue_size(1));
            let a = rt.chan::<u32>();
            let full = rt.chan::<u32>();
            full.take_async(|_| ()).unwrap();

            let (log, callback) = recorder();
            let err = do_alts(vec![a.clone().into(), full.clone().into()], callback, None)
                .unwrap_err();
            assert!(matches!(err, Error::QueueOverflow(_)));

            // a's parked handler is stale
            assert!(!a.offer(1));
            settle().await;
            assert!(log.borrow().is_empty());
        });
    }
}
