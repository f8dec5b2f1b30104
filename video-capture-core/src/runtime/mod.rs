pub mod dispatch;
pub mod worker_loop;

pub use dispatch::run_with_timeout;
pub use worker_loop::{WorkerHandle, WorkerLoop};
