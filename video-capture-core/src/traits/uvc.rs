//! Contract of the third-party UVC camera library.
//!
//! The library is discovered at runtime and its surface differs between
//! versions. Every optional entry point on [`UvcHelper`] has a default body
//! returning [`HelperError::Unsupported`], so a missing capability shows up as
//! an ordinary error at the call site instead of a link failure.

use std::sync::Arc;

use crate::models::error::HelperError;

pub type HelperResult<T> = Result<T, HelperError>;

/// Library type names that must all be loadable before the bridge is used.
pub const REQUIRED_LIBRARY_TYPES: [&str; 4] = [
    "usbcamera.UvcCameraHelper",
    "usbcamera.UvcCameraHelper.OnDeviceConnectListener",
    "usb.widget.CameraViewInterface",
    "usb.common.UvcCameraHandler.OnPreviewResultListener",
];

/// Processing-unit control id for absolute zoom, for `set_model_value`.
pub const PU_ZOOM_ABS: i32 = 11;

/// Entry point into a loaded (or absent) UVC library.
pub trait UvcLibrary: Send + Sync {
    /// Whether `type_name` can be loaded from the library.
    fn is_type_available(&self, type_name: &str) -> bool;

    /// The library's process-wide helper singleton.
    fn helper_instance(&self) -> Option<Arc<dyn UvcHelper>>;
}

/// A USB device as listed by the helper.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UsbDeviceInfo {
    /// Bus path, e.g. `/dev/bus/usb/001/004`. Matched against the persisted
    /// preferred device name.
    pub device_name: String,
    pub vendor_id: u16,
    pub product_id: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IntentFlags {
    pub update_current: bool,
    pub mutable: bool,
}

impl IntentFlags {
    /// Flags for a permission broadcast on the given platform level.
    ///
    /// Level 31 and later reject intents that do not declare mutability.
    pub fn for_platform(level: u32) -> Self {
        Self {
            update_current: true,
            mutable: level >= 31,
        }
    }
}

/// Broadcast the platform sends back when the user answers a USB permission
/// prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionIntent {
    pub action: String,
    pub package: String,
    pub request_code: i32,
    pub flags: IntentFlags,
}

/// The helper's USB monitor, which owns the permission round-trip.
pub trait UsbMonitor: Send + Sync {
    /// The intent currently installed, if any.
    fn permission_intent(&self) -> Option<PermissionIntent>;

    /// The broadcast action the monitor listens for, if it declares one.
    fn permission_action(&self) -> Option<String>;

    fn set_permission_intent(&self, intent: PermissionIntent) -> HelperResult<()>;
}

/// The library's camera helper singleton.
///
/// Not thread-safe: the bridge only calls it from its worker loop (library
/// callbacks excepted).
pub trait UvcHelper: Send + Sync {
    fn init_usb_monitor(
        &self,
        view: Arc<dyn CameraView>,
        listener: Arc<dyn DeviceConnectListener>,
    ) -> HelperResult<()>;

    fn set_preview_frame_listener(&self, listener: Arc<dyn PreviewFrameListener>) -> HelperResult<()>;

    fn usb_device_list(&self) -> HelperResult<Vec<UsbDeviceInfo>>;

    fn request_permission(&self, index: usize) -> HelperResult<()>;

    fn set_default_preview_size(&self, _width: u32, _height: u32) -> HelperResult<()> {
        Err(HelperError::Unsupported("set_default_preview_size"))
    }

    fn usb_monitor(&self) -> HelperResult<Option<Arc<dyn UsbMonitor>>> {
        Err(HelperError::Unsupported("usb_monitor"))
    }

    fn preview_width(&self) -> HelperResult<u32> {
        Err(HelperError::Unsupported("preview_width"))
    }

    fn preview_height(&self) -> HelperResult<u32> {
        Err(HelperError::Unsupported("preview_height"))
    }

    fn max_zoom(&self) -> HelperResult<i32> {
        Err(HelperError::Unsupported("max_zoom"))
    }

    fn zoom(&self) -> HelperResult<i32> {
        Err(HelperError::Unsupported("zoom"))
    }

    fn set_zoom(&self, _zoom: i32) -> HelperResult<()> {
        Err(HelperError::Unsupported("set_zoom"))
    }

    /// Generic UVC control write, `(control id, value)`.
    fn set_model_value(&self, _control: i32, _value: i32) -> HelperResult<()> {
        Err(HelperError::Unsupported("set_model_value"))
    }

    fn stop_preview(&self) -> HelperResult<()> {
        Err(HelperError::Unsupported("stop_preview"))
    }

    fn close_camera(&self) -> HelperResult<()> {
        Err(HelperError::Unsupported("close_camera"))
    }

    fn unregister_usb(&self) -> HelperResult<()> {
        Err(HelperError::Unsupported("unregister_usb"))
    }

    fn release(&self) -> HelperResult<()> {
        Err(HelperError::Unsupported("release"))
    }
}

/// Offscreen surface handed to the library in place of an on-screen view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle {
    pub id: u64,
    pub width: u32,
    pub height: u32,
}

/// Declared return type of a view call the bridge does not know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    Unit,
    Bool,
    Int,
    Double,
    Object,
}

/// A call the library makes on its camera view.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewCall {
    OnPause,
    OnResume,
    SetCallback,
    SetVideoEncoder,
    SetAspectRatio(f64),
    CaptureStillImage,
    SurfaceTexture,
    Surface,
    HasSurface,
    AspectRatio,
    Other { name: String, returns: ReturnKind },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewReply {
    Unit,
    Null,
    Bool(bool),
    Int(i32),
    Double(f64),
    Surface(SurfaceHandle),
}

impl ViewReply {
    /// Zero value for a declared return type.
    pub fn default_for(kind: ReturnKind) -> Self {
        match kind {
            ReturnKind::Unit => Self::Unit,
            ReturnKind::Bool => Self::Bool(false),
            ReturnKind::Int => Self::Int(0),
            ReturnKind::Double => Self::Double(0.0),
            ReturnKind::Object => Self::Null,
        }
    }
}

/// The view surface the library renders preview into.
pub trait CameraView: Send + Sync {
    fn handle(&self, call: ViewCall) -> ViewReply;
}

/// Device attach / permission / connect notifications.
pub trait DeviceConnectListener: Send + Sync {
    fn on_attach(&self, device: &UsbDeviceInfo);

    fn on_detach(&self, device: &UsbDeviceInfo);

    fn on_connect(&self, device: &UsbDeviceInfo, connected: bool);

    fn on_disconnect(&self, device: &UsbDeviceInfo);
}

/// Raw preview frames, NV21 at the negotiated preview size.
pub trait PreviewFrameListener: Send + Sync {
    fn on_preview_result(&self, frame: &[u8]);
}
