//! Callback objects handed to the UVC library.
//!
//! Each one holds a weak reference to the bridge so a late callback after
//! teardown simply finds nothing to act on.

use std::sync::{Arc, Weak};

use crate::models::frame::{monotonic_nanos, Nv21Buffer, VideoFrame};
use crate::models::state::BridgeState;
use crate::traits::uvc::{
    CameraView, DeviceConnectListener, PreviewFrameListener, UsbDeviceInfo, ViewCall, ViewReply,
};

use super::shared::{BridgeShared, CallbackSet};

pub(crate) fn callback_set(shared: &Arc<BridgeShared>) -> CallbackSet {
    let weak = Arc::downgrade(shared);
    CallbackSet {
        view: Arc::new(HeadlessCameraView { shared: weak.clone() }),
        connect: Arc::new(ConnectListener { shared: weak.clone() }),
        frames: Arc::new(FrameListener { shared: weak }),
    }
}

/// Stand-in for the on-screen preview view the library expects.
struct HeadlessCameraView {
    shared: Weak<BridgeShared>,
}

impl CameraView for HeadlessCameraView {
    fn handle(&self, call: ViewCall) -> ViewReply {
        let Some(shared) = self.shared.upgrade() else {
            return ViewReply::Null;
        };

        match call {
            ViewCall::OnPause
            | ViewCall::OnResume
            | ViewCall::SetCallback
            | ViewCall::SetVideoEncoder
            | ViewCall::SetAspectRatio(_) => ViewReply::Unit,
            ViewCall::CaptureStillImage => ViewReply::Null,
            ViewCall::SurfaceTexture => shared
                .surface()
                .map_or(ViewReply::Null, |s| ViewReply::Surface(s.texture)),
            ViewCall::Surface => shared
                .surface()
                .map_or(ViewReply::Null, |s| ViewReply::Surface(s.surface)),
            ViewCall::HasSurface => ViewReply::Bool(true),
            ViewCall::AspectRatio => {
                let (width, height) = shared.frame_size();
                if height == 0 {
                    ViewReply::Double(1.0)
                } else {
                    ViewReply::Double(f64::from(width) / f64::from(height))
                }
            }
            ViewCall::Other { returns, .. } => ViewReply::default_for(returns),
        }
    }
}

struct ConnectListener {
    shared: Weak<BridgeShared>,
}

impl ConnectListener {
    fn live(&self) -> Option<Arc<BridgeShared>> {
        self.shared.upgrade().filter(|shared| shared.is_live())
    }
}

impl DeviceConnectListener for ConnectListener {
    fn on_attach(&self, device: &UsbDeviceInfo) {
        let Some(shared) = self.live() else {
            return;
        };
        log::debug!("USB device attached: {}", device.device_name);
        shared.request_preferred_device_permission();
    }

    fn on_detach(&self, device: &UsbDeviceInfo) {
        log::debug!("USB device detached: {}", device.device_name);
    }

    fn on_connect(&self, device: &UsbDeviceInfo, connected: bool) {
        let Some(shared) = self.live() else {
            return;
        };
        if !connected {
            log::debug!("USB device {} failed to open", device.device_name);
            return;
        }

        shared.update_preview_size_from_helper();
        shared.update_zoom_bounds_from_helper();
        shared.advance(BridgeState::WaitingForPermission, BridgeState::Connected);
        shared.notify_started(true);
        log::debug!("USB device connected for capture: {}", device.device_name);
    }

    fn on_disconnect(&self, device: &UsbDeviceInfo) {
        log::debug!("USB device disconnected: {}", device.device_name);
    }
}

struct FrameListener {
    shared: Weak<BridgeShared>,
}

impl PreviewFrameListener for FrameListener {
    fn on_preview_result(&self, frame: &[u8]) {
        let Some(shared) = self.shared.upgrade().filter(|shared| shared.is_live()) else {
            return;
        };

        let (width, height) = shared.frame_size();
        let Some(buffer) = Nv21Buffer::from_slice(frame, width, height) else {
            log::trace!(
                "Dropping short preview frame: {} bytes for {}x{}",
                frame.len(),
                width,
                height
            );
            return;
        };

        shared.notify_started_once();
        if !shared.advance(BridgeState::Connected, BridgeState::Streaming) {
            shared.advance(BridgeState::WaitingForPermission, BridgeState::Streaming);
        }

        let video_frame = VideoFrame {
            buffer,
            rotation: 0,
            timestamp_nanos: monotonic_nanos(),
        };
        shared.sink.on_frame_captured(&video_frame);
    }
}
