//! Run a task on a thread we do not own and wait for it, with a hard bound.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use crate::models::error::DispatchError;
use crate::traits::sensor::CameraTask;

/// Hand `task` to `post` and block until it finishes or `timeout` elapses.
///
/// `post` queues the boxed task on the target thread and reports whether it
/// was accepted. A panic inside the task is caught on the target thread and
/// reported as [`DispatchError::Panicked`]. On timeout the task may still run
/// later; its result is discarded.
pub fn run_with_timeout<R, P, F>(post: P, timeout: Duration, task: F) -> Result<R, DispatchError>
where
    R: Send + 'static,
    P: FnOnce(CameraTask) -> bool,
    F: FnOnce() -> R + Send + 'static,
{
    let (done_tx, done_rx) = mpsc::sync_channel::<thread::Result<R>>(1);

    let wrapped: CameraTask = Box::new(move || {
        let outcome = panic::catch_unwind(AssertUnwindSafe(task));
        // The waiter may have given up already.
        let _ = done_tx.send(outcome);
    });

    if !post(wrapped) {
        return Err(DispatchError::Rejected);
    }

    match done_rx.recv_timeout(timeout) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(_)) => Err(DispatchError::Panicked),
        Err(RecvTimeoutError::Timeout) => Err(DispatchError::Timeout),
        Err(RecvTimeoutError::Disconnected) => Err(DispatchError::Disconnected),
    }
}
