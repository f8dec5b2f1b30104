use crate::models::error::CaptureError;

/// Uniform lifecycle shared by every backend capturer.
///
/// Implemented by:
/// - platform legacy and modern sensor capturers (behind
///   [`LegacySensorCapturer`](super::sensor::LegacySensorCapturer) and
///   [`ModernSensorCapturer`](super::sensor::ModernSensorCapturer))
/// - `ExternalUsbAdapter` (the USB bridge)
pub trait VideoCapturer: Send {
    /// Start delivering frames at (approximately) the given format.
    fn start(&mut self, width: u32, height: u32, frame_rate: u32) -> Result<(), CaptureError>;

    /// Stop delivering frames. May block; stopping twice is a no-op.
    fn stop(&mut self) -> Result<(), CaptureError>;

    /// Renegotiate the capture format without a full restart.
    fn change_format(&mut self, width: u32, height: u32, frame_rate: u32) -> Result<(), CaptureError>;

    /// Release every resource. The capturer is unusable afterwards.
    fn dispose(&mut self);

    /// Whether the backend can zoom at all.
    fn supports_zoom(&self) -> bool;
}
