use std::sync::Arc;

use video_capture_core::models::config::{PREFER_USB_CAMERA_KEY, USB_CAMERA_PREFS_NAMESPACE};
use video_capture_core::models::device::Facing;
use video_capture_core::sim::{usb_device, SimDevice, SimEnumerator, SimUvcHelper, SimUvcLibrary};
use video_capture_core::{PreferenceStore, UsbBackendFactory, UsbBridgeConfig};

const DEMO_PACKAGE: &str = "com.example.videocapture";
const DEMO_PLATFORM_LEVEL: u32 = 34;

/// Two built-in cameras: a modern back sensor and a legacy front one.
pub fn demo_enumerator() -> Arc<SimEnumerator> {
    Arc::new(SimEnumerator::new(vec![
        SimDevice::modern("back-0", Facing::Back),
        SimDevice::legacy("front-1", Facing::Front).with_legacy_zoom(0, 30),
    ]))
}

/// A single plugged-in UVC webcam.
pub fn demo_usb_helper() -> Arc<SimUvcHelper> {
    Arc::new(
        SimUvcHelper::new(vec![usb_device("/dev/bus/usb/001/004")])
            .with_preview_size(1280, 720)
            .with_zoom(20, 0),
    )
}

pub fn demo_usb_factory(helper: Arc<SimUvcHelper>, preferences: Arc<dyn PreferenceStore>) -> UsbBackendFactory {
    UsbBackendFactory::new(
        Arc::new(SimUvcLibrary::new(helper)),
        preferences,
        UsbBridgeConfig::new(DEMO_PACKAGE, DEMO_PLATFORM_LEVEL),
    )
}

pub fn prefers_usb(preferences: &dyn PreferenceStore) -> bool {
    preferences.get_bool(USB_CAMERA_PREFS_NAMESPACE, PREFER_USB_CAMERA_KEY, false)
}
