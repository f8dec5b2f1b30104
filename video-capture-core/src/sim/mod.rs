//! Simulated collaborators for demos and tests.
//!
//! Stands in for the platform pieces this crate only consumes: the device
//! enumerator, both sensor APIs, the UVC library, and a frame sink that
//! records what it is told.

mod enumerator;
mod sensor;
mod uvc;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::models::frame::VideoFrame;
use crate::traits::frame_sink::FrameSink;

pub use enumerator::{SimDevice, SimEnumerator};
pub use sensor::{SimLegacyCapturer, SimModernCapturer};
pub use uvc::{usb_device, SimUsbMonitor, SimUvcHelper, SimUvcLibrary};

/// Frame sink that keeps every start outcome and the latest frame.
#[derive(Default)]
pub struct RecordingSink {
    started: Mutex<Vec<bool>>,
    last_frame: Mutex<Option<VideoFrame>>,
    frames: AtomicUsize,
    stopped: AtomicUsize,
}

impl RecordingSink {
    pub fn started_events(&self) -> Vec<bool> {
        self.started.lock().clone()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }

    pub fn last_frame(&self) -> Option<VideoFrame> {
        self.last_frame.lock().clone()
    }

    pub fn stopped_count(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl FrameSink for RecordingSink {
    fn on_capture_started(&self, success: bool) {
        self.started.lock().push(success);
    }

    fn on_frame_captured(&self, frame: &VideoFrame) {
        *self.last_frame.lock() = Some(frame.clone());
        self.frames.fetch_add(1, Ordering::SeqCst);
    }

    fn on_capture_stopped(&self) {
        self.stopped.fetch_add(1, Ordering::SeqCst);
    }
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
}
