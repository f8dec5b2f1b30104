use crate::models::frame::VideoFrame;

/// Upstream consumer of capture events.
///
/// Implemented by the host. Methods are called from backend capture threads
/// (the USB bridge worker, the sensor camera thread), never from the caller
/// of `start_capture`. Implementations should hand frames off quickly.
pub trait FrameSink: Send + Sync {
    /// Capture start outcome. `false` means the backend gave up.
    fn on_capture_started(&self, success: bool);

    /// A new frame is available.
    fn on_frame_captured(&self, frame: &VideoFrame);

    /// The backend has stopped delivering frames.
    fn on_capture_stopped(&self);
}
