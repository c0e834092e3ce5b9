// helpers for tests which need an event loop.

use std::{
    future::Future,
    time::Duration,
};
use tokio::task::LocalSet;


// run a future to completion within a LocalSet on a current-thread runtime with paused time.
//
// with time paused, the clock only advances when every task is idle, so timing assertions are
// exact and sleeps cost nothing.
pub(crate) fn run_local<F: Future>(future: F) -> F::Output {
    let host = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .expect("failed to build test runtime");
    LocalSet::new().block_on(&host, future)
}

// wait until everything runnable has run.
pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
