//! Picks the capture device for a set of constraints.
//!
//! Strict priority, each step skipping devices that already failed:
//!
//! 1. `device_id`, when it is a valid index into the device list.
//! 2. If the user prefers USB cameras: the USB bridge, then enumerated
//!    external devices.
//! 3. Devices of the requested facing (front unless `environment`).
//! 4. Any remaining device.

use std::collections::HashSet;
use std::sync::Arc;

use crate::backend::BackendAdapter;
use crate::bridge::{UsbBackendFactory, EXTERNAL_USB_DEVICE_NAME};
use crate::models::config::{PREFER_USB_CAMERA_KEY, USB_CAMERA_PREFS_NAMESPACE};
use crate::models::constraints::CaptureConstraints;
use crate::models::device::{DeviceDescriptor, Facing};
use crate::models::error::CaptureError;
use crate::traits::device_enumerator::DeviceEnumerator;
use crate::traits::frame_sink::FrameSink;
use crate::traits::preference_store::PreferenceStore;

/// A device and a freshly created (not yet started) adapter for it.
pub struct Selection {
    pub device: DeviceDescriptor,
    pub adapter: BackendAdapter,
    pub front_facing: bool,
}

pub struct CaptureSourceSelector<'a> {
    enumerator: &'a dyn DeviceEnumerator,
    preferences: &'a dyn PreferenceStore,
    usb: Option<&'a UsbBackendFactory>,
    sink: Arc<dyn FrameSink>,
}

impl<'a> CaptureSourceSelector<'a> {
    pub fn new(
        enumerator: &'a dyn DeviceEnumerator,
        preferences: &'a dyn PreferenceStore,
        usb: Option<&'a UsbBackendFactory>,
        sink: Arc<dyn FrameSink>,
    ) -> Self {
        Self {
            enumerator,
            preferences,
            usb,
            sink,
        }
    }

    pub fn select(&self, constraints: &CaptureConstraints) -> Result<Selection, CaptureError> {
        let devices = self.enumerator.devices();
        let mut failed = HashSet::new();

        // deviceId takes precedence over facingMode.
        match constraints.device_index().and_then(|index| devices.get(index)) {
            Some(device) => {
                if let Some(selection) = self.attempt(device, "user-specified", &mut failed) {
                    return Ok(selection);
                }
            }
            None => {
                if let Some(id) = &constraints.device_id {
                    log::debug!("failed to find device with id: {}", id);
                }
            }
        }

        if self.prefers_usb_camera() {
            if let Some(selection) = self.try_usb_bridge() {
                return Ok(selection);
            }
            let external = devices.iter().filter(|d| d.facing == Facing::External);
            for device in external {
                if failed.contains(&device.name) {
                    continue;
                }
                if let Some(selection) = self.attempt(device, "external", &mut failed) {
                    return Ok(selection);
                }
            }
            log::debug!("No usable external camera capturer was found");
        }

        let wants_front = constraints.wants_front();
        for device in &devices {
            if failed.contains(&device.name) || device.facing.is_front() != wants_front {
                continue;
            }
            if let Some(selection) = self.attempt(device, "facing", &mut failed) {
                return Ok(selection);
            }
        }

        for device in &devices {
            if failed.contains(&device.name) {
                continue;
            }
            if let Some(selection) = self.attempt(device, "fallback", &mut failed) {
                return Ok(selection);
            }
        }

        log::warn!("Unable to identify a suitable camera.");
        Err(CaptureError::NoSuitableDevice)
    }

    fn attempt(
        &self,
        device: &DeviceDescriptor,
        step: &str,
        failed: &mut HashSet<String>,
    ) -> Option<Selection> {
        match self.enumerator.create_capturer(&device.name, Arc::clone(&self.sink)) {
            Some(adapter) => {
                log::debug!("Create {} camera {} succeeded", step, device.name);
                Some(Selection {
                    device: device.clone(),
                    adapter,
                    front_facing: device.facing.is_front(),
                })
            }
            None => {
                log::debug!("Create {} camera {} failed", step, device.name);
                failed.insert(device.name.clone());
                None
            }
        }
    }

    fn prefers_usb_camera(&self) -> bool {
        let enabled = self
            .preferences
            .get_bool(USB_CAMERA_PREFS_NAMESPACE, PREFER_USB_CAMERA_KEY, false);
        log::debug!("USB camera preference enabled={}", enabled);
        enabled
    }

    fn try_usb_bridge(&self) -> Option<Selection> {
        let Some(usb) = self.usb else {
            log::debug!("USB UVC bridge not configured; skipping");
            return None;
        };

        match usb.create(Arc::clone(&self.sink)) {
            Ok(adapter) => {
                log::debug!("Create USB UVC capturer succeeded");
                Some(Selection {
                    device: DeviceDescriptor::new(EXTERNAL_USB_DEVICE_NAME, Facing::External),
                    adapter: BackendAdapter::ExternalUsb(adapter),
                    front_facing: false,
                })
            }
            Err(e) => {
                log::debug!("Skipping USB UVC capturer: {}", e);
                None
            }
        }
    }
}
