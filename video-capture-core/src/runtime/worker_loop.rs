//! A dedicated thread that runs posted tasks in order.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use crate::models::error::CaptureError;
use crate::traits::sensor::{CameraTask, CameraThread};

enum Message {
    Run(CameraTask),
    Quit,
}

/// Cloneable posting handle onto a [`WorkerLoop`].
#[derive(Clone)]
pub struct WorkerHandle {
    sender: mpsc::Sender<Message>,
    thread_id: ThreadId,
}

impl WorkerHandle {
    /// Queue a task. Returns `false` once the loop has exited.
    pub fn post(&self, task: CameraTask) -> bool {
        self.sender.send(Message::Run(task)).is_ok()
    }

    /// Whether the caller is running on this worker's thread.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }
}

impl CameraThread for WorkerHandle {
    fn post(&self, task: CameraTask) -> bool {
        WorkerHandle::post(self, task)
    }
}

/// Owned worker thread with a FIFO task queue.
///
/// Quitting drains tasks that were queued before the quit request; anything
/// posted afterwards is dropped unrun. A task that panics is logged and the
/// loop keeps going.
pub struct WorkerLoop {
    name: String,
    handle: WorkerHandle,
    join: Option<JoinHandle<()>>,
    exited: mpsc::Receiver<()>,
}

impl WorkerLoop {
    pub fn spawn(name: &str) -> Result<Self, CaptureError> {
        let (sender, receiver) = mpsc::channel::<Message>();
        let (exit_tx, exit_rx) = mpsc::sync_channel::<()>(1);
        let thread_name = name.to_string();

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                // Dropped when the loop returns, which wakes `quit_and_join`.
                let _exit_guard = exit_tx;
                for message in receiver {
                    match message {
                        Message::Run(task) => {
                            if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                                log::error!("Task panicked on {}", thread_name);
                            }
                        }
                        Message::Quit => break,
                    }
                }
                log::debug!("{} exited", thread_name);
            })
            .map_err(|e| CaptureError::StartFailed(format!("failed to spawn {}: {}", name, e)))?;

        let handle = WorkerHandle {
            sender,
            thread_id: join.thread().id(),
        };

        Ok(Self {
            name: name.to_string(),
            handle,
            join: Some(join),
            exited: exit_rx,
        })
    }

    pub fn handle(&self) -> WorkerHandle {
        self.handle.clone()
    }

    pub fn post(&self, task: CameraTask) -> bool {
        self.handle.post(task)
    }

    /// Ask the loop to finish queued work and exit, then wait up to
    /// `timeout` for it.
    ///
    /// Returns `false` if the thread did not exit in time; it is detached
    /// rather than waited on further.
    pub fn quit_and_join(mut self, timeout: Duration) -> bool {
        let _ = self.handle.sender.send(Message::Quit);

        if self.handle.is_current() {
            // Joining ourselves would deadlock; the loop exits after this task.
            self.join.take();
            return true;
        }

        match self.exited.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("{} did not exit within {:?}; detaching", self.name, timeout);
                self.join.take();
                false
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(join) = self.join.take() {
                    if join.join().is_err() {
                        log::warn!("{} terminated abnormally", self.name);
                    }
                }
                true
            }
        }
    }
}

impl Drop for WorkerLoop {
    fn drop(&mut self) {
        if self.join.is_some() {
            let _ = self.handle.sender.send(Message::Quit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn runs_tasks_in_order() {
        let worker = WorkerLoop::spawn("test-worker").unwrap();
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for i in 0..5 {
            let log = Arc::clone(&log);
            assert!(worker.post(Box::new(move || log.lock().push(i))));
        }

        assert!(worker.quit_and_join(Duration::from_secs(1)));
        assert_eq!(*log.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn survives_panicking_task() {
        let worker = WorkerLoop::spawn("test-worker").unwrap();
        let count = Arc::new(AtomicUsize::new(0));

        worker.post(Box::new(|| panic!("library fault")));
        let c = Arc::clone(&count);
        worker.post(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(worker.quit_and_join(Duration::from_secs(1)));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn posting_after_exit_is_rejected() {
        let worker = WorkerLoop::spawn("test-worker").unwrap();
        let handle = worker.handle();
        assert!(worker.quit_and_join(Duration::from_secs(1)));

        assert!(!handle.post(Box::new(|| {})));
    }

    #[test]
    fn join_timeout_detaches_stuck_thread() {
        let worker = WorkerLoop::spawn("test-worker").unwrap();
        worker.post(Box::new(|| thread::sleep(Duration::from_millis(300))));

        assert!(!worker.quit_and_join(Duration::from_millis(20)));
    }

    #[test]
    fn is_current_only_on_worker() {
        let worker = WorkerLoop::spawn("test-worker").unwrap();
        let handle = worker.handle();
        assert!(!handle.is_current());

        let (tx, rx) = mpsc::channel();
        let inner = worker.handle();
        worker.post(Box::new(move || {
            let _ = tx.send(inner.is_current());
        }));
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)), Ok(true));
        assert!(worker.quit_and_join(Duration::from_secs(1)));
    }
}
