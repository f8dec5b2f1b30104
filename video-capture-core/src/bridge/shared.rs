//! State shared between the bridge, its worker loop, and library callbacks.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::config::{UsbBridgeConfig, USB_CAMERA_PREFS_NAMESPACE, USB_DEVICE_NAME_KEY};
use crate::models::state::BridgeState;
use crate::models::zoom::discrete_target;
use crate::traits::frame_sink::FrameSink;
use crate::traits::preference_store::PreferenceStore;
use crate::traits::uvc::{
    CameraView, DeviceConnectListener, IntentFlags, PermissionIntent, PreviewFrameListener,
    HelperResult, SurfaceHandle, UsbDeviceInfo, UvcHelper, PU_ZOOM_ABS,
};

/// Offscreen texture + surface pair standing in for an on-screen view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadlessSurface {
    pub texture: SurfaceHandle,
    pub surface: SurfaceHandle,
}

impl HeadlessSurface {
    pub fn new(width: u32, height: u32) -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        let next = || SurfaceHandle {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            width,
            height,
        };
        Self {
            texture: next(),
            surface: next(),
        }
    }
}

/// Callback objects installed on the helper, kept alive for the session.
pub(crate) struct CallbackSet {
    pub view: Arc<dyn CameraView>,
    pub connect: Arc<dyn DeviceConnectListener>,
    pub frames: Arc<dyn PreviewFrameListener>,
}

pub(crate) struct BridgeShared {
    pub sink: Arc<dyn FrameSink>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub config: UsbBridgeConfig,

    pub started: AtomicBool,
    pub started_notified: AtomicBool,
    pub frame_width: AtomicU32,
    pub frame_height: AtomicU32,
    pub current_zoom: AtomicI32,
    pub max_zoom: AtomicI32,

    state: Mutex<BridgeState>,
    helper: Mutex<Option<Arc<dyn UvcHelper>>>,
    callbacks: Mutex<Option<CallbackSet>>,
    surface: Mutex<Option<HeadlessSurface>>,
}

impl BridgeShared {
    pub fn new(
        sink: Arc<dyn FrameSink>,
        preferences: Arc<dyn PreferenceStore>,
        config: UsbBridgeConfig,
    ) -> Self {
        Self {
            sink,
            preferences,
            config,
            started: AtomicBool::new(false),
            started_notified: AtomicBool::new(false),
            frame_width: AtomicU32::new(640),
            frame_height: AtomicU32::new(480),
            current_zoom: AtomicI32::new(0),
            max_zoom: AtomicI32::new(0),
            state: Mutex::new(BridgeState::Idle),
            helper: Mutex::new(None),
            callbacks: Mutex::new(None),
            surface: Mutex::new(None),
        }
    }

    pub fn state(&self) -> BridgeState {
        *self.state.lock()
    }

    pub fn set_state(&self, next: BridgeState) {
        let mut state = self.state.lock();
        if *state != next {
            log::debug!("USB bridge {:?} -> {:?}", *state, next);
            *state = next;
        }
    }

    /// Move to `next` only if currently in `from`.
    pub fn advance(&self, from: BridgeState, next: BridgeState) -> bool {
        let mut state = self.state.lock();
        if *state != from {
            return false;
        }
        log::debug!("USB bridge {:?} -> {:?}", from, next);
        *state = next;
        true
    }

    /// Whether a library callback should be acted upon.
    pub fn is_live(&self) -> bool {
        self.started.load(Ordering::SeqCst) && self.state().accepts_callbacks()
    }

    pub fn frame_size(&self) -> (u32, u32) {
        (
            self.frame_width.load(Ordering::SeqCst),
            self.frame_height.load(Ordering::SeqCst),
        )
    }

    pub fn set_frame_size(&self, width: u32, height: u32) {
        self.frame_width.store(width, Ordering::SeqCst);
        self.frame_height.store(height, Ordering::SeqCst);
    }

    pub fn helper(&self) -> Option<Arc<dyn UvcHelper>> {
        self.helper.lock().clone()
    }

    pub fn install(&self, helper: Arc<dyn UvcHelper>) {
        *self.helper.lock() = Some(helper);
    }

    pub fn install_callbacks(&self, callbacks: CallbackSet) {
        *self.callbacks.lock() = Some(callbacks);
    }

    pub fn surface(&self) -> Option<HeadlessSurface> {
        *self.surface.lock()
    }

    pub fn create_surface(&self) -> HeadlessSurface {
        let (width, height) = self.frame_size();
        let surface = HeadlessSurface::new(width, height);
        *self.surface.lock() = Some(surface);
        surface
    }

    /// Drop every library handle. Safe to call repeatedly.
    pub fn clear_handles(&self) {
        *self.helper.lock() = None;
        *self.callbacks.lock() = None;
        *self.surface.lock() = None;
    }

    pub fn notify_started(&self, success: bool) {
        self.sink.on_capture_started(success);
        if success {
            self.started_notified.store(true, Ordering::SeqCst);
        }
    }

    /// Signal a successful start unless it has already been signaled.
    pub fn notify_started_once(&self) {
        if !self.started_notified.swap(true, Ordering::SeqCst) {
            self.sink.on_capture_started(true);
        }
    }

    fn preferred_device_name(&self) -> Option<String> {
        self.preferences
            .get_string(USB_CAMERA_PREFS_NAMESPACE, USB_DEVICE_NAME_KEY)
            .filter(|name| !name.is_empty())
    }

    /// Request USB permission for the preferred device (or the first one).
    ///
    /// A missing or empty device list reports a failed start but leaves the
    /// bridge running: attaching a device later retries from the attach
    /// callback.
    pub fn request_preferred_device_permission(&self) {
        let Some(helper) = self.helper() else {
            return;
        };

        let devices = match helper.usb_device_list() {
            Ok(devices) => devices,
            Err(e) => {
                log::error!("Failed listing USB devices: {}", e);
                self.notify_started(false);
                return;
            }
        };
        if devices.is_empty() {
            log::warn!("No USB UVC devices available");
            self.notify_started(false);
            return;
        }

        let index = resolve_preferred_index(&devices, self.preferred_device_name().as_deref());
        match helper.request_permission(index) {
            Ok(()) => log::debug!(
                "Requested USB permission for index={} of {}",
                index,
                devices.len()
            ),
            Err(e) => {
                log::error!("Failed requesting USB permission: {}", e);
                self.notify_started(false);
            }
        }
    }

    /// Install a permission intent the platform will accept, unless the
    /// monitor already carries one.
    ///
    /// The library's own registration uses flags newer platforms reject, so
    /// the bridge never calls it and primes the monitor directly instead.
    pub fn prepare_permission_flow(&self) {
        let Some(helper) = self.helper() else {
            return;
        };

        let monitor = match helper.usb_monitor() {
            Ok(Some(monitor)) => monitor,
            Ok(None) => return,
            Err(e) => {
                log::warn!("Failed preparing USB permission flow: {}", e);
                return;
            }
        };
        if monitor.permission_intent().is_some() {
            return;
        }

        let intent = permission_intent_for(&self.config, monitor.permission_action());
        match monitor.set_permission_intent(intent) {
            Ok(()) => log::debug!("Prepared USB permission flow with platform-safe intent flags"),
            Err(e) => log::warn!("Failed preparing USB permission flow: {}", e),
        }
    }

    /// Adopt the helper's negotiated preview size when it reports one.
    pub fn update_preview_size_from_helper(&self) {
        let Some(helper) = self.helper() else {
            return;
        };
        match (helper.preview_width(), helper.preview_height()) {
            (Ok(width), Ok(height)) if width > 0 && height > 0 => {
                self.set_frame_size(width, height);
            }
            (Ok(_), Ok(_)) => {}
            (Err(e), _) | (_, Err(e)) => log::warn!("Unable to read UVC preview size: {}", e),
        }
    }

    /// Refresh zoom bounds from the helper, best-effort.
    pub fn update_zoom_bounds_from_helper(&self) {
        let Some(helper) = self.helper() else {
            return;
        };
        let max = helper.max_zoom().unwrap_or(0).max(0);
        let current = helper
            .zoom()
            .unwrap_or_else(|_| self.current_zoom.load(Ordering::SeqCst));

        self.max_zoom.store(max, Ordering::SeqCst);
        self.current_zoom.store(current.clamp(0, max), Ordering::SeqCst);
    }

    /// Step the discrete zoom index. Runs on the worker loop.
    pub fn apply_zoom(&self, delta: f32) -> bool {
        let Some(helper) = self.helper() else {
            log::debug!("Zoom ignored: USB camera helper not initialized");
            return false;
        };

        if self.max_zoom.load(Ordering::SeqCst) <= 0 {
            self.update_zoom_bounds_from_helper();
        }
        let max = self.max_zoom.load(Ordering::SeqCst);
        if max <= 0 {
            log::debug!("USB zoom not supported by current helper implementation");
            return false;
        }

        let current = self.current_zoom.load(Ordering::SeqCst);
        let target = discrete_target(current, max, delta);
        if target == current {
            return true;
        }

        if set_zoom_via_helper(helper.as_ref(), target) {
            self.current_zoom.store(target, Ordering::SeqCst);
            log::debug!("Applied USB camera zoom current={} max={}", target, max);
            return true;
        }
        false
    }

    /// Best-effort library teardown. Runs on the worker loop.
    pub fn teardown(&self) {
        if let Some(helper) = self.helper() {
            log_teardown_step("stop_preview", helper.stop_preview());
            log_teardown_step("close_camera", helper.close_camera());
            log_teardown_step("unregister_usb", helper.unregister_usb());
            log_teardown_step("release", helper.release());
        }

        *self.surface.lock() = None;
        self.sink.on_capture_stopped();
        self.current_zoom.store(0, Ordering::SeqCst);
        self.max_zoom.store(0, Ordering::SeqCst);
        log::debug!("USB UVC capture stopped");
    }
}

/// Index of `preferred` in `devices`, or 0.
pub(crate) fn resolve_preferred_index(devices: &[UsbDeviceInfo], preferred: Option<&str>) -> usize {
    preferred
        .and_then(|name| devices.iter().position(|d| d.device_name == name))
        .unwrap_or(0)
}

pub(crate) fn permission_intent_for(config: &UsbBridgeConfig, declared_action: Option<String>) -> PermissionIntent {
    let action = declared_action
        .filter(|action| !action.is_empty())
        .unwrap_or_else(|| format!("{}.USB_PERMISSION", config.package_name));
    PermissionIntent {
        action,
        package: config.package_name.clone(),
        request_code: 0,
        flags: IntentFlags::for_platform(config.platform_level),
    }
}

fn log_teardown_step(name: &str, result: HelperResult<()>) {
    if let Err(e) = result {
        log::debug!("UVC teardown step {} skipped: {}", name, e);
    }
}

/// Try `set_zoom`, then the generic absolute-zoom control.
fn set_zoom_via_helper(helper: &dyn UvcHelper, target: i32) -> bool {
    match helper.set_zoom(target) {
        Ok(()) => return true,
        Err(e) => log::debug!("UVC set_zoom unavailable: {}", e),
    }
    match helper.set_model_value(PU_ZOOM_ABS, target) {
        Ok(()) => true,
        Err(e) => {
            log::debug!("UVC set_model_value unavailable: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(name: &str) -> UsbDeviceInfo {
        UsbDeviceInfo {
            device_name: name.to_string(),
            vendor_id: 0x046d,
            product_id: 0x0825,
        }
    }

    #[test]
    fn preferred_index_matches_device_name() {
        let devices = [device("/dev/bus/usb/001/002"), device("/dev/bus/usb/001/005")];
        assert_eq!(resolve_preferred_index(&devices, Some("/dev/bus/usb/001/005")), 1);
    }

    #[test]
    fn preferred_index_defaults_to_first() {
        let devices = [device("/dev/bus/usb/001/002"), device("/dev/bus/usb/001/005")];
        assert_eq!(resolve_preferred_index(&devices, None), 0);
        assert_eq!(resolve_preferred_index(&devices, Some("/dev/bus/usb/002/001")), 0);
    }

    #[test]
    fn permission_intent_is_mutable_on_newer_platforms() {
        let config = UsbBridgeConfig::new("org.example.meet", 33);
        let intent = permission_intent_for(&config, None);

        assert_eq!(intent.action, "org.example.meet.USB_PERMISSION");
        assert_eq!(intent.package, "org.example.meet");
        assert!(intent.flags.update_current);
        assert!(intent.flags.mutable);
    }

    #[test]
    fn permission_intent_keeps_declared_action() {
        let config = UsbBridgeConfig::new("org.example.meet", 29);
        let intent = permission_intent_for(&config, Some("com.usb.ACTION_PERMISSION".into()));

        assert_eq!(intent.action, "com.usb.ACTION_PERMISSION");
        assert!(!intent.flags.mutable);

        let intent = permission_intent_for(&config, Some(String::new()));
        assert_eq!(intent.action, "org.example.meet.USB_PERMISSION");
    }
}
