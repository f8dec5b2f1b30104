use std::time::Duration;

/// Preference namespace holding the USB camera settings.
pub const USB_CAMERA_PREFS_NAMESPACE: &str = "usb_camera";

/// Bool: try the external USB bridge before any enumerated device.
pub const PREFER_USB_CAMERA_KEY: &str = "prefer_usb_camera";

/// String: device name of the USB camera to request permission for.
pub const USB_DEVICE_NAME_KEY: &str = "usb_device_name";

/// Timing and stepping knobs for a capture controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Upper bound on how long a zoom call blocks waiting for the thread
    /// that owns the camera session (default: 500 ms).
    pub zoom_timeout: Duration,

    /// How long the USB bridge waits for its teardown task (default: 2 s).
    pub usb_stop_timeout: Duration,

    /// How long the USB bridge waits for its worker to exit (default: 1 s).
    pub usb_join_timeout: Duration,

    /// Normalized delta applied by the global zoom-in/zoom-out commands.
    pub zoom_step: f32,
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.zoom_timeout.is_zero() {
            return Err("zoom timeout must be positive".into());
        }
        if self.usb_stop_timeout.is_zero() || self.usb_join_timeout.is_zero() {
            return Err("usb teardown timeouts must be positive".into());
        }
        if !(self.zoom_step > 0.0 && self.zoom_step <= 1.0) {
            return Err(format!("zoom step out of range: {}", self.zoom_step));
        }
        Ok(())
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            zoom_timeout: Duration::from_millis(500),
            usb_stop_timeout: Duration::from_secs(2),
            usb_join_timeout: Duration::from_secs(1),
            zoom_step: 0.1,
        }
    }
}

/// Host facts the USB bridge needs to drive the UVC library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbBridgeConfig {
    /// Application package, used to scope the permission broadcast.
    pub package_name: String,

    /// Platform API level; 31+ requires explicitly mutable permission intents.
    pub platform_level: u32,

    /// Whether a foreground host (activity) is attached. The library cannot
    /// open a device without one.
    pub host_attached: bool,
}

impl UsbBridgeConfig {
    pub fn new(package_name: impl Into<String>, platform_level: u32) -> Self {
        Self {
            package_name: package_name.into(),
            platform_level,
            host_attached: true,
        }
    }

    pub fn detached(mut self) -> Self {
        self.host_attached = false;
        self
    }
}
