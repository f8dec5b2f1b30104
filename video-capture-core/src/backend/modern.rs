use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::device::Resolution;
use crate::models::error::CaptureError;
use crate::traits::sensor::{CameraThread, ModernSensorCapturer, ModernSensorSession, SwitchCallback};
use crate::traits::video_capturer::VideoCapturer;

/// Adapter over a modern sensor API capturer.
///
/// The platform offers no read-back of the applied zoom, so the adapter
/// tracks the ratio it last submitted (starting at 1.0). The cell is shared
/// with zoom tasks running on the camera thread.
pub struct ModernSensorAdapter {
    capturer: Box<dyn ModernSensorCapturer>,
    zoom_ratio: Arc<Mutex<f32>>,
}

impl ModernSensorAdapter {
    pub fn new(capturer: Box<dyn ModernSensorCapturer>) -> Self {
        Self {
            capturer,
            zoom_ratio: Arc::new(Mutex::new(1.0)),
        }
    }

    pub fn camera_thread(&self) -> Option<Arc<dyn CameraThread>> {
        self.capturer.camera_thread()
    }

    pub fn current_session(&self) -> Option<Arc<dyn ModernSensorSession>> {
        self.capturer.current_session()
    }

    pub fn supported_sizes(&self) -> Vec<Resolution> {
        self.capturer.supported_sizes()
    }

    pub fn switch_camera(&mut self, done: SwitchCallback) {
        // A different sensor starts unzoomed.
        *self.zoom_ratio.lock() = 1.0;
        self.capturer.switch_camera(done);
    }

    /// Last ratio successfully submitted to the session.
    pub fn zoom_ratio(&self) -> f32 {
        *self.zoom_ratio.lock()
    }

    pub(crate) fn zoom_ratio_cell(&self) -> Arc<Mutex<f32>> {
        Arc::clone(&self.zoom_ratio)
    }
}

impl VideoCapturer for ModernSensorAdapter {
    fn start(&mut self, width: u32, height: u32, frame_rate: u32) -> Result<(), CaptureError> {
        self.capturer.start(width, height, frame_rate)
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        let result = self.capturer.stop();
        *self.zoom_ratio.lock() = 1.0;
        result
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
