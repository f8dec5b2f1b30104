use std::sync::Arc;

use crate::models::device::Resolution;
use crate::models::error::CaptureError;
use crate::traits::sensor::{CameraThread, LegacySensorCapturer, LegacySensorSession, SwitchCallback};
use crate::traits::video_capturer::VideoCapturer;

/// Adapter over a legacy sensor API capturer.
///
/// Zoom state lives in the sensor's parameter block, so the adapter itself
/// tracks nothing.
pub struct LegacySensorAdapter {
    capturer: Box<dyn LegacySensorCapturer>,
}

impl LegacySensorAdapter {
    pub fn new(capturer: Box<dyn LegacySensorCapturer>) -> Self {
        Self { capturer }
    }

    pub fn camera_thread(&self) -> Option<Arc<dyn CameraThread>> {
        self.capturer.camera_thread()
    }

    pub fn current_session(&self) -> Option<Arc<dyn LegacySensorSession>> {
        self.capturer.current_session()
    }

    pub fn supported_sizes(&self) -> Vec<Resolution> {
        self.capturer.supported_sizes()
    }

    pub fn switch_camera(&mut self, done: SwitchCallback) {
        self.capturer.switch_camera(done);
    }
}

impl VideoCapturer for LegacySensorAdapter {
    fn start(&mut self, width: u32, height: u32, frame_rate: u32) -> Result<(), CaptureError> {
        self.capturer.start(width, height, frame_rate)
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.capturer.stop()
    }

    fn change_format(&mut self, width: u32, height: u32, frame_rate: u32) -> Result<(), CaptureError> {
        self.capturer.change_format(width, height, frame_rate)
    }

    fn dispose(&mut self) {
        self.capturer.dispose();
    }

    fn supports_zoom(&self) -> bool {
        self.capturer.supports_zoom()
    }
}
