use std::sync::Arc;

use crate::models::device::Resolution;
use crate::models::error::CaptureError;
use crate::models::zoom::CropRect;

use super::video_capturer::VideoCapturer;

/// A unit of work queued onto a thread owned by a backend.
pub type CameraTask = Box<dyn FnOnce() + Send + 'static>;

/// Completion of a camera switch: `Ok(front_facing)` or a backend message.
pub type SwitchCallback = Box<dyn FnOnce(Result<bool, String>) + Send + 'static>;

/// The handler thread a sensor backend keeps its session state on.
///
/// Created and owned by the backend, not by this crate. Session objects may
/// only be touched from tasks posted here.
pub trait CameraThread: Send + Sync {
    /// Queue `task`. Returns `false` when the thread no longer accepts work.
    fn post(&self, task: CameraTask) -> bool;
}

/// Capabilities shared by both sensor-control capturers.
pub trait SensorCapturer: VideoCapturer {
    /// The backend's camera thread, once the capturer has been started.
    fn camera_thread(&self) -> Option<Arc<dyn CameraThread>>;

    /// Output sizes the device can produce.
    fn supported_sizes(&self) -> Vec<Resolution>;

    /// Switch to the next camera in the platform's order.
    ///
    /// `done` runs on the camera thread, possibly before this call returns.
    fn switch_camera(&mut self, done: SwitchCallback);
}

/// Legacy sensor API capturer (discrete zoom index).
pub trait LegacySensorCapturer: SensorCapturer {
    /// The open camera session, while one exists.
    fn current_session(&self) -> Option<Arc<dyn LegacySensorSession>>;
}

/// Modern sensor API capturer (continuous zoom ratio / crop region).
pub trait ModernSensorCapturer: SensorCapturer {
    /// The open camera session, while one exists.
    fn current_session(&self) -> Option<Arc<dyn ModernSensorSession>>;
}

/// Snapshot of the legacy parameter block, as far as zoom is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyParameters {
    pub zoom_supported: bool,
    pub zoom: i32,
    pub max_zoom: i32,
}

/// Open legacy camera session. Must only be used on its camera thread.
pub trait LegacySensorSession: Send + Sync {
    /// Read the current parameter block.
    fn parameters(&self) -> Result<LegacyParameters, CaptureError>;

    /// Write an updated parameter block back to the sensor.
    fn set_parameters(&self, params: &LegacyParameters) -> Result<(), CaptureError>;
}

/// Static facts about a modern-API sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModernCharacteristics {
    /// Maximum digital zoom ratio, if reported.
    pub max_digital_zoom: Option<f32>,
    /// Active pixel array in sensor coordinates, if reported.
    pub active_array: Option<CropRect>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestTemplate {
    Preview,
    Record,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    Off,
    Auto,
}

/// How a repeating request expresses zoom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoomControl {
    /// Native zoom ratio control.
    Ratio(f32),
    /// Explicit crop of the active pixel array.
    CropRegion(CropRect),
}

/// Opaque identifier of the surface a session renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputSurface(pub u64);

/// A repeating capture request for a modern-API session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepeatingRequest {
    pub template: RequestTemplate,
    pub control_mode: ControlMode,
    pub target: OutputSurface,
    pub zoom: ZoomControl,
}

/// Open modern camera session. Must only be used on its camera thread.
pub trait ModernSensorSession: Send + Sync {
    fn characteristics(&self) -> Option<ModernCharacteristics>;

    /// Whether the platform offers a native zoom ratio control.
    fn supports_zoom_ratio_control(&self) -> bool;

    /// The surface frames are rendered into, while the session is open.
    fn output_surface(&self) -> Option<OutputSurface>;

    /// Replace the session's repeating request. Completion is asynchronous.
    fn submit_repeating_request(&self, request: RepeatingRequest) -> Result<(), CaptureError>;
}
