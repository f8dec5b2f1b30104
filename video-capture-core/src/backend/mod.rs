//! The three capture backends behind one tagged union.
//!
//! Callers match on [`BackendAdapter`] where behavior differs (zoom, camera
//! switching, format negotiation) and use its [`VideoCapturer`] impl for the
//! shared lifecycle.

pub mod format;
pub mod legacy;
pub mod modern;

use std::sync::Arc;

pub use crate::bridge::ExternalUsbAdapter;
pub use legacy::LegacySensorAdapter;
pub use modern::ModernSensorAdapter;

use crate::models::device::BackendKind;
use crate::models::error::CaptureError;
use crate::traits::sensor::{CameraThread, SwitchCallback};
use crate::traits::video_capturer::VideoCapturer;

pub enum BackendAdapter {
    Legacy(LegacySensorAdapter),
    Modern(ModernSensorAdapter),
    ExternalUsb(ExternalUsbAdapter),
}

impl BackendAdapter {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Legacy(_) => BackendKind::LegacySensor,
            Self::Modern(_) => BackendKind::ModernSensor,
            Self::ExternalUsb(_) => BackendKind::ExternalUsb,
        }
    }

    /// The sensor backend's camera thread. The USB bridge has none.
    pub fn camera_thread(&self) -> Option<Arc<dyn CameraThread>> {
        match self {
            Self::Legacy(legacy) => legacy.camera_thread(),
            Self::Modern(modern) => modern.camera_thread(),
            Self::ExternalUsb(_) => None,
        }
    }

    /// Ask a sensor backend to switch cameras.
    ///
    /// Returns `false` (and drops `done` unrun) for the USB bridge.
    pub fn switch_camera(&mut self, done: SwitchCallback) -> bool {
        match self {
            Self::Legacy(legacy) => {
                legacy.switch_camera(done);
                true
            }
            Self::Modern(modern) => {
                modern.switch_camera(done);
                true
            }
            Self::ExternalUsb(_) => false,
        }
    }

    fn capturer_mut(&mut self) -> &mut dyn VideoCapturer {
        match self {
            Self::Legacy(legacy) => legacy,
            Self::Modern(modern) => modern,
            Self::ExternalUsb(usb) => usb,
        }
    }

    fn capturer(&self) -> &dyn VideoCapturer {
        match self {
            Self::Legacy(legacy) => legacy,
            Self::Modern(modern) => modern,
            Self::ExternalUsb(usb) => usb,
        }
    }
}

impl VideoCapturer for BackendAdapter {
    fn start(&mut self, width: u32, height: u32, frame_rate: u32) -> Result<(), CaptureError> {
        self.capturer_mut().start(width, height, frame_rate)
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.capturer_mut().stop()
    }

    fn change_format(&mut self, width: u32, height: u32, frame_rate: u32) -> Result<(), CaptureError> {
        self.capturer_mut().change_format(width, height, frame_rate)
    }

    fn dispose(&mut self) {
        self.capturer_mut().dispose();
    }

    fn supports_zoom(&self) -> bool {
        self.capturer().supports_zoom()
    }
}

impl From<LegacySensorAdapter> for BackendAdapter {
    fn from(adapter: LegacySensorAdapter) -> Self {
        Self::Legacy(adapter)
    }
}

impl From<ModernSensorAdapter> for BackendAdapter {
    fn from(adapter: ModernSensorAdapter) -> Self {
        Self::Modern(adapter)
    }
}

impl From<ExternalUsbAdapter> for BackendAdapter {
    fn from(adapter: ExternalUsbAdapter) -> Self {
        Self::ExternalUsb(adapter)
    }
}
