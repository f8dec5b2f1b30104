use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::error::HelperError;
use crate::traits::uvc::{
    CameraView, DeviceConnectListener, HelperResult, PermissionIntent, PreviewFrameListener,
    UsbDeviceInfo, UsbMonitor, UvcHelper, UvcLibrary, PU_ZOOM_ABS,
};

/// A UVC device at `name` with a common webcam vendor/product id.
pub fn usb_device(name: &str) -> UsbDeviceInfo {
    UsbDeviceInfo {
        device_name: name.to_string(),
        vendor_id: 0x046d,
        product_id: 0x0825,
    }
}

/// UVC library whose types are all present unless marked missing.
pub struct SimUvcLibrary {
    helper: Arc<SimUvcHelper>,
    missing: Vec<String>,
    helper_requests: AtomicUsize,
}

impl SimUvcLibrary {
    pub fn new(helper: Arc<SimUvcHelper>) -> Self {
        Self {
            helper,
            missing: Vec::new(),
            helper_requests: AtomicUsize::new(0),
        }
    }

    pub fn with_missing(mut self, type_name: &str) -> Self {
        self.missing.push(type_name.to_string());
        self
    }

    /// How many times the helper singleton has been requested.
    pub fn helper_requests(&self) -> usize {
        self.helper_requests.load(Ordering::SeqCst)
    }
}

impl UvcLibrary for SimUvcLibrary {
    fn is_type_available(&self, type_name: &str) -> bool {
        !self.missing.iter().any(|missing| missing == type_name)
    }

    fn helper_instance(&self) -> Option<Arc<dyn UvcHelper>> {
        self.helper_requests.fetch_add(1, Ordering::SeqCst);
        Some(Arc::clone(&self.helper) as Arc<dyn UvcHelper>)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ZoomSupport {
    None,
    /// `max_zoom`, `zoom`, and `set_zoom` all exist.
    Direct { max: i32 },
    /// Only the generic control write can change zoom.
    ModelValue { max: i32 },
}

/// UVC helper that opens devices as soon as permission is requested.
pub struct SimUvcHelper {
    devices: Mutex<Vec<UsbDeviceInfo>>,
    preview_size: Option<(u32, u32)>,
    zoom_support: ZoomSupport,
    zoom: AtomicI32,
    auto_connect: bool,
    stop_delay: Option<Duration>,
    monitor: Arc<SimUsbMonitor>,
    view: Mutex<Option<Arc<dyn CameraView>>>,
    connect_listener: Mutex<Option<Arc<dyn DeviceConnectListener>>>,
    frame_listener: Mutex<Option<Arc<dyn PreviewFrameListener>>>,
    calls: Mutex<Vec<String>>,
    permission_requests: Mutex<Vec<usize>>,
    model_writes: Mutex<Vec<(i32, i32)>>,
}

impl SimUvcHelper {
    pub fn new(devices: Vec<UsbDeviceInfo>) -> Self {
        Self {
            devices: Mutex::new(devices),
            preview_size: None,
            zoom_support: ZoomSupport::None,
            zoom: AtomicI32::new(0),
            auto_connect: true,
            stop_delay: None,
            monitor: Arc::new(SimUsbMonitor::new(None)),
            view: Mutex::new(None),
            connect_listener: Mutex::new(None),
            frame_listener: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            permission_requests: Mutex::new(Vec::new()),
            model_writes: Mutex::new(Vec::new()),
        }
    }

    /// Report this size from `preview_width` / `preview_height`.
    pub fn with_preview_size(mut self, width: u32, height: u32) -> Self {
        self.preview_size = Some((width, height));
        self
    }

    pub fn with_zoom(mut self, max: i32, current: i32) -> Self {
        self.zoom_support = ZoomSupport::Direct { max };
        self.zoom = AtomicI32::new(current);
        self
    }

    pub fn with_model_value_zoom(mut self, max: i32) -> Self {
        self.zoom_support = ZoomSupport::ModelValue { max };
        self
    }

    /// Whether a permission request immediately connects the device.
    pub fn with_auto_connect(mut self, auto_connect: bool) -> Self {
        self.auto_connect = auto_connect;
        self
    }

    /// Make `stop_preview` block for `delay`, like a wedged device.
    pub fn with_stop_delay(mut self, delay: Duration) -> Self {
        self.stop_delay = Some(delay);
        self
    }

    pub fn set_devices(&self, devices: Vec<UsbDeviceInfo>) {
        *self.devices.lock() = devices;
    }

    /// Deliver an attach notification, as when a camera is plugged in.
    pub fn attach(&self, device: &UsbDeviceInfo) {
        let listener = self.connect_listener.lock().clone();
        if let Some(listener) = listener {
            listener.on_attach(device);
        }
    }

    /// Deliver a raw preview frame to the installed frame listener.
    pub fn emit_frame(&self, frame: &[u8]) {
        let listener = self.frame_listener.lock().clone();
        if let Some(listener) = listener {
            listener.on_preview_result(frame);
        }
    }

    pub fn monitor(&self) -> Arc<SimUsbMonitor> {
        Arc::clone(&self.monitor)
    }

    pub fn view(&self) -> Option<Arc<dyn CameraView>> {
        self.view.lock().clone()
    }

    /// Names of the lifecycle entry points called so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn permission_requests(&self) -> Vec<usize> {
        self.permission_requests.lock().clone()
    }

    pub fn model_writes(&self) -> Vec<(i32, i32)> {
        self.model_writes.lock().clone()
    }

    pub fn zoom_value(&self) -> i32 {
        self.zoom.load(Ordering::SeqCst)
    }

    fn record(&self, call: &str) {
        self.calls.lock().push(call.to_string());
    }
}

impl UvcHelper for SimUvcHelper {
    fn init_usb_monitor(
        &self,
        view: Arc<dyn CameraView>,
        listener: Arc<dyn DeviceConnectListener>,
    ) -> HelperResult<()> {
        self.record("init_usb_monitor");
        *self.view.lock() = Some(view);
        *self.connect_listener.lock() = Some(listener);
        Ok(())
    }

    fn set_preview_frame_listener(&self, listener: Arc<dyn PreviewFrameListener>) -> HelperResult<()> {
        self.record("set_preview_frame_listener");
        *self.frame_listener.lock() = Some(listener);
        Ok(())
    }

    fn usb_device_list(&self) -> HelperResult<Vec<UsbDeviceInfo>> {
        Ok(self.devices.lock().clone())
    }

    fn request_permission(&self, index: usize) -> HelperResult<()> {
        self.permission_requests.lock().push(index);
        let device = self
            .devices
            .lock()
            .get(index)
            .cloned()
            .ok_or_else(|| HelperError::Fault(format!("no USB device at index {}", index)))?;

        if self.auto_connect {
            let listener = self.connect_listener.lock().clone();
            if let Some(listener) = listener {
                listener.on_connect(&device, true);
            }
        }
        Ok(())
    }

    fn set_default_preview_size(&self, _width: u32, _height: u32) -> HelperResult<()> {
        self.record("set_default_preview_size");
        Ok(())
    }

    fn usb_monitor(&self) -> HelperResult<Option<Arc<dyn UsbMonitor>>> {
        Ok(Some(Arc::clone(&self.monitor) as Arc<dyn UsbMonitor>))
    }

    fn preview_width(&self) -> HelperResult<u32> {
        self.preview_size
            .map(|(width, _)| width)
            .ok_or(HelperError::Unsupported("preview_width"))
    }

    fn preview_height(&self) -> HelperResult<u32> {
        self.preview_size
            .map(|(_, height)| height)
            .ok_or(HelperError::Unsupported("preview_height"))
    }

    fn max_zoom(&self) -> HelperResult<i32> {
        match self.zoom_support {
            ZoomSupport::None => Err(HelperError::Unsupported("max_zoom")),
            ZoomSupport::Direct { max } | ZoomSupport::ModelValue { max } => Ok(max),
        }
    }

    fn zoom(&self) -> HelperResult<i32> {
        match self.zoom_support {
            ZoomSupport::None => Err(HelperError::Unsupported("zoom")),
            _ => Ok(self.zoom.load(Ordering::SeqCst)),
        }
    }

    fn set_zoom(&self, zoom: i32) -> HelperResult<()> {
        match self.zoom_support {
            ZoomSupport::Direct { .. } => {
                self.zoom.store(zoom, Ordering::SeqCst);
                Ok(())
            }
            _ => Err(HelperError::Unsupported("set_zoom")),
        }
    }

    fn set_model_value(&self, control: i32, value: i32) -> HelperResult<()> {
        match self.zoom_support {
            ZoomSupport::ModelValue { .. } => {
                self.model_writes.lock().push((control, value));
                if control == PU_ZOOM_ABS {
                    self.zoom.store(value, Ordering::SeqCst);
                }
                Ok(())
            }
            _ => Err(HelperError::Unsupported("set_model_value")),
        }
    }

    fn stop_preview(&self) -> HelperResult<()> {
        self.record("stop_preview");
        if let Some(delay) = self.stop_delay {
            thread::sleep(delay);
        }
        Ok(())
    }

    fn close_camera(&self) -> HelperResult<()> {
        self.record("close_camera");
        Ok(())
    }

    fn unregister_usb(&self) -> HelperResult<()> {
        self.record("unregister_usb");
        Ok(())
    }

    fn release(&self) -> HelperResult<()> {
        self.record("release");
        Ok(())
    }
}

/// USB monitor that stores whatever permission intent it is given.
pub struct SimUsbMonitor {
    declared_action: Option<String>,
    intent: Mutex<Option<PermissionIntent>>,
    installs: AtomicUsize,
}

impl SimUsbMonitor {
    pub fn new(declared_action: Option<String>) -> Self {
        Self {
            declared_action,
            intent: Mutex::new(None),
            installs: AtomicUsize::new(0),
        }
    }

    /// Seed an intent as if the library had registered one itself.
    pub fn preinstall(&self, intent: PermissionIntent) {
        *self.intent.lock() = Some(intent);
    }

    pub fn installed(&self) -> Option<PermissionIntent> {
        self.intent.lock().clone()
    }

    /// Calls to `set_permission_intent`.
    pub fn install_count(&self) -> usize {
        self.installs.load(Ordering::SeqCst)
    }
}

impl UsbMonitor for SimUsbMonitor {
    fn permission_intent(&self) -> Option<PermissionIntent> {
        self.intent.lock().clone()
    }

    fn permission_action(&self) -> Option<String> {
        self.declared_action.clone()
    }

    fn set_permission_intent(&self, intent: PermissionIntent) -> HelperResult<()> {
        *self.intent.lock() = Some(intent);
        self.installs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
