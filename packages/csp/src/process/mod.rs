//! Lightweight processes.
//!
//! A process runs a computation, written as an async block over a [`Co`], which communicates with
//! other processes only through channels. Its output is `Result<Option<R>, Error>`: `Ok(Some(r))`
//! is a value, `Ok(None)` is no value, and `Err` is a failure.

mod co;
mod instruction;
mod interpreter;

pub use self::{
    co::Co,
    instruction::{Instruction, Resumed, take, put, sleep, alts, pass},
};

use self::interpreter::Process;
use crate::{
    buffer,
    channel::api::Chan,
    error::Error,
    runtime::Runtime,
};
use std::{
    rc::Rc,
    future::Future,
};


/// Builder for spawning a process with options.
///
/// Obtained from [`Runtime::process`].
pub struct ProcessBuilder {
    runtime: Runtime,
    name: Option<Rc<str>>,
}

impl ProcessBuilder {
    pub(crate) fn new(runtime: Runtime) -> Self {
        ProcessBuilder {
            runtime,
            name: None,
        }
    }

    /// Tag the process with a name, which appears in its log output.
    pub fn name<S: Into<Rc<str>>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Spawn the process, calling `on_finish` with its output once it finishes.
    pub fn spawn<R, F, Fut, C>(self, f: F, on_finish: C)
    where
        R: 'static,
        F: FnOnce(Co) -> Fut,
        Fut: Future<Output=Result<Option<R>, Error>> + 'static,
        C: FnOnce(Result<Option<R>, Error>) + 'static,
    {
        Process::start(self.runtime, self.name, f, on_finish);
    }

    /// Spawn the process, returning a channel which yields its value, if any, and then closes.
    ///
    /// If the process fails, its error goes to the runtime's default exception handler and the
    /// channel just closes.
    pub fn go<R, F, Fut>(self, f: F) -> Chan<R>
    where
        R: 'static,
        F: FnOnce(Co) -> Fut,
        Fut: Future<Output=Result<Option<R>, Error>> + 'static,
    {
        let runtime = self.runtime.clone();
        let chan = result_chan(&runtime);
        let result = chan.clone();
        self.spawn(f, move |output| match output {
            Ok(Some(value)) => put_then_close(&result, value),
            Ok(None) => result.close(),
            Err(err) => {
                runtime.handle_uncaught(err);
                result.close();
            }
        });
        chan
    }

    /// Spawn the process, returning a channel which yields its value or its error, if any, and
    /// then closes.
    ///
    /// Take from the channel with [`Co::take_propagate`] to raise the error in the taker.
    pub fn go_propagating<R, F, Fut>(self, f: F) -> Chan<Result<R, Error>>
    where
        R: 'static,
        F: FnOnce(Co) -> Fut,
        Fut: Future<Output=Result<Option<R>, Error>> + 'static,
    {
        let chan = result_chan(&self.runtime);
        let result = chan.clone();
        self.spawn(f, move |output| match output.transpose() {
            Some(value) => put_then_close(&result, value),
            None => result.close(),
        });
        chan
    }
}

fn result_chan<T: 'static>(runtime: &Runtime) -> Chan<T> {
    runtime.chan_with(buffer::fixed(1))
}

fn put_then_close<T: 'static>(chan: &Chan<T>, value: T) {
    let closer = chan.clone();
    if let Err(err) = chan.put_async(value, move |_| closer.close()) {
        // only reachable if something else has flooded the result channel with puts
        warn!(chan = chan.id(), %err, "could not deliver process output");
        chan.close();
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ForeignAwaitError,
        select::{AltResult, AltsOptions},
        test_util::{run_local, settle},
    };
    use std::{
        cell::{Cell, RefCell},
        time::Duration,
    };
    use tokio::time::Instant;

    #[test]
    fn go_round_trip() {
        run_local(async {
            let rt = Runtime::new();
            let out = rt.go(|_| async { Ok(Some(42)) });
            assert_eq!(out.recv().await.unwrap(), Some(42));
            assert_eq!(out.recv().await.unwrap(), None);

            let nothing = rt.go::<u32, _, _>(|_| async { Ok(None) });
            assert_eq!(nothing.recv().await.unwrap(), None);
        });
    }

    #[test]
    fn ping_pong() {
        run_local(async {
            let rt = Runtime::new();
            let ping = rt.chan::<u32>();
            let pong = rt.chan::<u32>();

            let (ping2, pong2) = (ping.clone(), pong.clone());
            rt.go::<(), _, _>(move |co| async move {
                while let Some(n) = co.take(&ping2).await? {
                    co.put(&pong2, n + 1).await?;
                }
                pong2.close();
                Ok(None)
            });

            let (ping3, pong3) = (ping.clone(), pong.clone());
            let total = rt.go(move |co| async move {
                let mut n = 0;
                for _ in 0..100 {
                    co.put(&ping3, n).await?;
                    n = co.take(&pong3).await?.unwrap_or(0);
                }
                ping3.close();
                Ok(Some(n))
            });

            assert_eq!(total.recv().await.unwrap(), Some(100));
            assert_eq!(pong.recv().await.unwrap(), None);
        });
    }

    #[test]
    fn parked_putters_served_fifo() {
        run_local(async {
            let rt = Runtime::new();
            let ch = rt.chan::<u32>();
            for i in 0..5 {
                let ch = ch.clone();
                rt.go::<(), _, _>(move |co| async move {
                    co.put(&ch, i).await?;
                    Ok(None)
                });
                // spawn order is put order
                settle().await;
            }
            let mut got = Vec::new();
            for _ in 0..5 {
                got.push(ch.recv().await.unwrap().unwrap());
            }
            assert_eq!(got, vec![0, 1, 2, 3, 4]);
        });
    }

    #[test]
    fn sleep_and_pass() {
        run_local(async {
            let rt = Runtime::new();
            let start = Instant::now();
            let out = rt.go(|co| async move {
                co.sleep(Duration::from_millis(30)).await?;
                let n = co.pass(5).await?;
                Ok(Some((n, Instant::now())))
            });
            let (n, at) = out.recv().await.unwrap().unwrap();
            assert_eq!(n, 5);
            assert!(at - start >= Duration::from_millis(30));
        });
    }

    #[test]
    fn alts_with_timeout() {
        run_local(async {
            let rt = Runtime::new();
            let never = rt.chan::<&'static str>();
            let out = rt.go(move |co| async move {
                let timeout = co.runtime().timeout::<&'static str>(Duration::from_millis(20));
                let result = co
                    .alts(vec![never.clone().into(), timeout.clone().into()], AltsOptions::default())
                    .await?;
                Ok(Some(result.channel() == Some(&timeout)))
            });
            assert_eq!(out.recv().await.unwrap(), Some(true));
        });
    }

    #[test]
    fn alts_default() {
        run_local(async {
            let rt = Runtime::new();
            let ch = rt.chan::<u32>();
            let out = rt.go(move |co| async move {
                let result = co
                    .alts(vec![ch.into()], AltsOptions::default().with_default(3))
                    .await?;
                Ok(Some(matches!(result, AltResult::Default(3))))
            });
            assert_eq!(out.recv().await.unwrap(), Some(true));
        });
    }

    #[test]
    fn usage_error_surfaces_in_computation() {
        run_local(async {
            let rt = Runtime::new();
            let out = rt.go(|co| async move {
                let result = co.alts::<u32>(Vec::new(), AltsOptions::default()).await;
                Ok(Some(matches!(result, Err(Error::EmptyAlts(_)))))
            });
            assert_eq!(out.recv().await.unwrap(), Some(true));
        });
    }

    #[test]
    fn uncaught_error_goes_to_exception_handler() {
        run_local(async {
            let rt = Runtime::new();
            let caught = Rc::new(RefCell::new(Vec::new()));
            let caught2 = Rc::clone(&caught);
            rt.set_default_exception_handler(move |err| caught2.borrow_mut().push(err.to_string()));

            let out = rt.go::<u32, _, _>(|_| async { Err(anyhow::anyhow!("boom").into()) });
            assert_eq!(out.recv().await.unwrap(), None);
            assert_eq!(*caught.borrow(), vec!["boom".to_owned()]);
        });
    }

    #[test]
    fn propagating_process() {
        run_local(async {
            let rt = Runtime::new();
            let failing = rt.go_propagating::<u32, _, _>(|_| async {
                Err(anyhow::anyhow!("inner failure").into())
            });
            let succeeding = rt.go_propagating(|_| async { Ok(Some(1u32)) });

            let out = rt.go(move |co| async move {
                let ok = co.take_propagate(&succeeding).await?;
                let err = co.take_propagate(&failing).await.unwrap_err();
                Ok(Some((ok, err.to_string())))
            });
            assert_eq!(
                out.recv().await.unwrap(),
                Some((Some(1), "inner failure".to_owned())),
            );
        });
    }

    #[test]
    fn propagated_error_fails_taker() {
        run_local(async {
            let rt = Runtime::new();
            let caught = Rc::new(Cell::new(0));
            let caught2 = Rc::clone(&caught);
            rt.set_default_exception_handler(move |_| caught2.set(caught2.get() + 1));

            let failing = rt.go_propagating::<u32, _, _>(|_| async {
                Err(anyhow::anyhow!("inner failure").into())
            });
            let out = rt.go(move |co| async move {
                let n = co.take_propagate(&failing).await?;
                Ok(n)
            });
            assert_eq!(out.recv().await.unwrap(), None);
            assert_eq!(caught.get(), 1);
        });
    }

    #[test]
    fn foreign_await_finishes_process() {
        run_local(async {
            let rt = Runtime::new();
            let output = Rc::new(RefCell::new(None));
            let output2 = Rc::clone(&output);
            rt.process().name("sleeper").spawn::<(), _, _, _>(
                |_| async {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Ok(None)
                },
                move |out| *output2.borrow_mut() = Some(out),
            );
            settle().await;
            let output = output.borrow_mut().take().unwrap();
            assert!(matches!(output, Err(Error::ForeignAwait(ForeignAwaitError))));
        });
    }

    #[test]
    fn spawn_reports_output() {
        run_local(async {
            let rt = Runtime::new();
            let output = Rc::new(Cell::new(None));
            let output2 = Rc::clone(&output);
            rt.spawn(
                |co| async move { Ok(Some(co.pass(9).await?)) },
                move |out: Result<Option<u32>, Error>| output2.set(out.ok().flatten()),
            );
            settle().await;
            assert_eq!(output.get(), Some(9));
        });
    }

    #[test]
    fn closed_channel_ends_loop() {
        run_local(async {
            let rt = Runtime::new();
            let ch = rt.buffered_chan::<u32>(3);
            for i in 0..3 {
                assert!(ch.offer(i));
            }
            ch.close();
            let ch2 = ch.clone();
            let sum = rt.go(move |co| async move {
                let mut sum = 0;
                while let Some(n) = co.take(&ch2).await? {
                    sum += n;
                }
                Ok(Some(sum))
            });
            assert_eq!(sum.recv().await.unwrap(), Some(3));
            // put on closed channel
            let put = rt.go(move |co| async move { Ok(Some(co.put(&ch, 1).await?)) });
            assert_eq!(put.recv().await.unwrap(), Some(false));
        });
    }
}
