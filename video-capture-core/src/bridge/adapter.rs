use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::models::config::{ControllerConfig, UsbBridgeConfig};
use crate::models::error::CaptureError;
use crate::models::state::BridgeState;
use crate::runtime::{run_with_timeout, WorkerHandle, WorkerLoop};
use crate::traits::frame_sink::FrameSink;
use crate::traits::preference_store::PreferenceStore;
use crate::traits::uvc::UvcLibrary;
use crate::traits::video_capturer::VideoCapturer;

use super::callbacks::callback_set;
use super::availability;
use super::shared::BridgeShared;

/// Name of the pseudo-device the selector uses for the USB bridge. It never
/// appears in the device enumeration.
pub const EXTERNAL_USB_DEVICE_NAME: &str = "USB-UVC";

const WORKER_NAME: &str = "usb-video-capture";

/// Capture adapter driving a UVC camera through the third-party library.
///
/// Every library call is made from one dedicated worker loop, spawned on
/// start and joined on stop. Library callbacks may arrive on other threads;
/// they only touch the shared state and the frame sink.
pub struct ExternalUsbAdapter {
    shared: Arc<BridgeShared>,
    library: Arc<dyn UvcLibrary>,
    timeouts: ControllerConfig,
    worker: Option<WorkerLoop>,
}

impl ExternalUsbAdapter {
    /// Create an idle bridge.
    ///
    /// Fails with [`CaptureError::BackendUnsupported`] when the library is
    /// missing any required type; nothing is allocated in that case.
    pub fn new(
        library: Arc<dyn UvcLibrary>,
        sink: Arc<dyn FrameSink>,
        preferences: Arc<dyn PreferenceStore>,
        config: UsbBridgeConfig,
        timeouts: ControllerConfig,
    ) -> Result<Self, CaptureError> {
        if !availability::is_supported(library.as_ref()) {
            return Err(CaptureError::BackendUnsupported(
                "USB UVC library unavailable".to_string(),
            ));
        }

        Ok(Self {
            shared: Arc::new(BridgeShared::new(sink, preferences, config)),
            library,
            timeouts,
            worker: None,
        })
    }

    pub fn state(&self) -> BridgeState {
        self.shared.state()
    }

    pub fn is_started(&self) -> bool {
        self.shared.started.load(Ordering::SeqCst)
    }

    /// Frame size frames are validated against. Tracks the requested size
    /// until the device reports its negotiated preview size.
    pub fn frame_size(&self) -> (u32, u32) {
        self.shared.frame_size()
    }

    /// Handle for running zoom steps on the worker loop. `None` when stopped.
    pub fn zoom_handle(&self) -> Option<UsbZoomHandle> {
        self.worker.as_ref().map(|worker| UsbZoomHandle {
            worker: worker.handle(),
            shared: Arc::clone(&self.shared),
        })
    }
}

impl VideoCapturer for ExternalUsbAdapter {
    fn start(&mut self, width: u32, height: u32, _frame_rate: u32) -> Result<(), CaptureError> {
        self.shared.set_frame_size(width, height);
        if self.is_started() {
            return Ok(());
        }

        let worker = WorkerLoop::spawn(WORKER_NAME)?;
        self.shared.started.store(true, Ordering::SeqCst);
        self.shared.started_notified.store(false, Ordering::SeqCst);
        self.shared.set_state(BridgeState::Initializing);

        let shared = Arc::clone(&self.shared);
        let library = Arc::clone(&self.library);
        if !worker.post(Box::new(move || start_on_worker(&shared, library.as_ref()))) {
            self.shared.started.store(false, Ordering::SeqCst);
            self.shared.set_state(BridgeState::Idle);
            return Err(CaptureError::StartFailed(format!("{} rejected start", WORKER_NAME)));
        }

        self.worker = Some(worker);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        let worker = self.worker.take();
        if !self.shared.started.swap(false, Ordering::SeqCst) {
            // A failed start already tore down; only the loop is left.
            if let Some(worker) = worker {
                worker.quit_and_join(self.timeouts.usb_join_timeout);
            }
            self.shared.clear_handles();
            return Ok(());
        }
        self.shared.set_state(BridgeState::Stopping);

        let mut outcome = Ok(());
        if let Some(worker) = worker {
            let shared = Arc::clone(&self.shared);
            let teardown = run_with_timeout(
                |task| worker.post(task),
                self.timeouts.usb_stop_timeout,
                move || shared.teardown(),
            );
            if let Err(e) = teardown {
                log::warn!("USB UVC teardown did not complete: {}", e);
                outcome = Err(CaptureError::from(e));
            }
            if !worker.quit_and_join(self.timeouts.usb_join_timeout) {
                log::warn!("{} still running after stop; continuing", WORKER_NAME);
            }
        }

        // The bridge is idle even when teardown was cut short.
        self.shared.clear_handles();
        self.shared.set_state(BridgeState::Idle);
        outcome
    }

    fn change_format(&mut self, width: u32, height: u32, _frame_rate: u32) -> Result<(), CaptureError> {
        self.shared.set_frame_size(width, height);
        Ok(())
    }

    fn dispose(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("Failed stopping USB UVC capture on dispose: {}", e);
        }
    }

    /// Zoom bounds are only known once a device connects, so the bridge
    /// always accepts zoom requests and reports failure per call.
    fn supports_zoom(&self) -> bool {
        true
    }
}

impl Drop for ExternalUsbAdapter {
    fn drop(&mut self) {
        if self.is_started() {
            self.dispose();
        }
    }
}

fn start_on_worker(shared: &Arc<BridgeShared>, library: &dyn UvcLibrary) {
    match initialize(shared, library) {
        Ok(()) => {
            log::debug!("USB UVC helper initialized, waiting for device connection/frames");
        }
        Err(e) => {
            log::error!("Failed to start USB UVC capture: {}", e);
            shared.started.store(false, Ordering::SeqCst);
            shared.set_state(BridgeState::Idle);
            shared.notify_started(false);
            shared.teardown();
        }
    }
}

fn initialize(shared: &Arc<BridgeShared>, library: &dyn UvcLibrary) -> Result<(), CaptureError> {
    if !shared.config.host_attached {
        return Err(CaptureError::InvalidState(
            "USB UVC capture requires a foreground host".to_string(),
        ));
    }

    let helper = library
        .helper_instance()
        .ok_or_else(|| CaptureError::DeviceNotAvailable("UVC helper instance".to_string()))?;
    shared.install(Arc::clone(&helper));

    let (width, height) = shared.frame_size();
    if let Err(e) = helper.set_default_preview_size(width, height) {
        log::debug!("UVC default preview size not set: {}", e);
    }

    shared.create_surface();
    let callbacks = callback_set(shared);
    helper
        .init_usb_monitor(Arc::clone(&callbacks.view), Arc::clone(&callbacks.connect))
        .map_err(|e| CaptureError::ConfigurationFailed(format!("init_usb_monitor: {}", e)))?;
    helper
        .set_preview_frame_listener(Arc::clone(&callbacks.frames))
        .map_err(|e| CaptureError::ConfigurationFailed(format!("set_preview_frame_listener: {}", e)))?;
    shared.install_callbacks(callbacks);

    shared.prepare_permission_flow();
    shared.advance(BridgeState::Initializing, BridgeState::WaitingForPermission);
    shared.request_preferred_device_permission();
    Ok(())
}

/// Posts zoom steps onto a running bridge's worker loop.
#[derive(Clone)]
pub struct UsbZoomHandle {
    worker: WorkerHandle,
    shared: Arc<BridgeShared>,
}

impl UsbZoomHandle {
    /// Apply a normalized delta, waiting at most `timeout`.
    pub fn apply(&self, delta: f32, timeout: Duration) -> bool {
        let shared = Arc::clone(&self.shared);
        match run_with_timeout(|task| self.worker.post(task), timeout, move || shared.apply_zoom(delta)) {
            Ok(applied) => applied,
            Err(e) => {
                log::warn!("USB zoom failed: {}", e);
                false
            }
        }
    }
}

/// Everything needed to build a USB bridge for a controller.
#[derive(Clone)]
pub struct UsbBackendFactory {
    library: Arc<dyn UvcLibrary>,
    preferences: Arc<dyn PreferenceStore>,
    config: UsbBridgeConfig,
    timeouts: ControllerConfig,
}

impl UsbBackendFactory {
    pub fn new(
        library: Arc<dyn UvcLibrary>,
        preferences: Arc<dyn PreferenceStore>,
        config: UsbBridgeConfig,
    ) -> Self {
        Self {
            library,
            preferences,
            config,
            timeouts: ControllerConfig::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: ControllerConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn is_supported(&self) -> bool {
        availability::is_supported(self.library.as_ref())
    }

    pub fn create(&self, sink: Arc<dyn FrameSink>) -> Result<ExternalUsbAdapter, CaptureError> {
        ExternalUsbAdapter::new(
            Arc::clone(&self.library),
            sink,
            Arc::clone(&self.preferences),
            self.config.clone(),
            self.timeouts.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::{USB_CAMERA_PREFS_NAMESPACE, USB_DEVICE_NAME_KEY};
    use crate::models::frame::Nv21Buffer;
    use crate::sim::{usb_device, wait_until, RecordingSink, SimUvcHelper, SimUvcLibrary};
    use crate::storage::MemoryPreferences;
    use crate::traits::uvc::{PermissionIntent, ReturnKind, ViewCall, ViewReply, REQUIRED_LIBRARY_TYPES};

    const WAIT: Duration = Duration::from_secs(2);

    struct Rig {
        helper: Arc<SimUvcHelper>,
        library: Arc<SimUvcLibrary>,
        sink: Arc<RecordingSink>,
        adapter: ExternalUsbAdapter,
    }

    fn rig_with(helper: SimUvcHelper, preferences: MemoryPreferences, config: UsbBridgeConfig) -> Rig {
        let helper = Arc::new(helper);
        let library = Arc::new(SimUvcLibrary::new(Arc::clone(&helper)));
        let sink = Arc::new(RecordingSink::default());
        let adapter = ExternalUsbAdapter::new(
            library.clone(),
            sink.clone(),
            Arc::new(preferences),
            config,
            ControllerConfig::default(),
        )
        .unwrap();
        Rig {
            helper,
            library,
            sink,
            adapter,
        }
    }

    fn rig(helper: SimUvcHelper) -> Rig {
        rig_with(
            helper,
            MemoryPreferences::default(),
            UsbBridgeConfig::new("org.example.meet", 33),
        )
    }

    fn one_camera() -> SimUvcHelper {
        SimUvcHelper::new(vec![usb_device("/dev/bus/usb/001/004")])
    }

    #[test]
    fn missing_library_type_is_unsupported_without_side_effects() {
        let helper = Arc::new(one_camera());
        let library = Arc::new(SimUvcLibrary::new(helper).with_missing(REQUIRED_LIBRARY_TYPES[2]));
        let factory = UsbBackendFactory::new(
            library.clone(),
            Arc::new(MemoryPreferences::default()),
            UsbBridgeConfig::new("org.example.meet", 33),
        );

        assert!(!factory.is_supported());
        let result = factory.create(Arc::new(RecordingSink::default()));
        assert!(matches!(result, Err(CaptureError::BackendUnsupported(_))));
        assert_eq!(library.helper_requests(), 0);
    }

    #[test]
    fn connect_signals_started_and_adopts_preview_size() {
        let mut rig = rig(one_camera().with_preview_size(1280, 720));
        rig.adapter.start(640, 480, 30).unwrap();

        assert!(wait_until(WAIT, || rig.sink.started_events() == vec![true]));
        assert_eq!(rig.adapter.state(), BridgeState::Connected);
        assert_eq!(rig.adapter.frame_size(), (1280, 720));
        assert_eq!(rig.helper.permission_requests(), vec![0]);

        rig.adapter.stop().unwrap();
    }

    #[test]
    fn short_frames_are_dropped_and_valid_frames_forwarded() {
        let mut rig = rig(one_camera().with_preview_size(4, 2));
        rig.adapter.start(4, 2, 30).unwrap();
        assert!(wait_until(WAIT, || rig.adapter.state() == BridgeState::Connected));

        rig.helper.emit_frame(&[0u8; 11]);
        assert_eq!(rig.sink.frame_count(), 0);

        rig.helper.emit_frame(&[9u8; 14]);
        assert_eq!(rig.sink.frame_count(), 1);
        let frame = rig.sink.last_frame().unwrap();
        assert_eq!(frame.buffer, Nv21Buffer::from_slice(&[9u8; 12], 4, 2).unwrap());
        assert_eq!(frame.rotation, 0);
        assert_eq!(rig.adapter.state(), BridgeState::Streaming);

        // Connect already signaled; the first frame does not repeat it.
        assert_eq!(rig.sink.started_events(), vec![true]);
        rig.adapter.stop().unwrap();
    }

    #[test]
    fn first_frame_signals_started_when_connect_is_silent() {
        let mut rig = rig(one_camera().with_auto_connect(false));
        rig.adapter.start(4, 2, 30).unwrap();
        assert!(wait_until(WAIT, || rig.helper.permission_requests() == vec![0]));

        rig.helper.emit_frame(&[1u8; 12]);
        rig.helper.emit_frame(&[2u8; 12]);

        assert_eq!(rig.sink.started_events(), vec![true]);
        assert_eq!(rig.sink.frame_count(), 2);
        rig.adapter.stop().unwrap();
    }

    #[test]
    fn permission_requested_for_preferred_device() {
        let helper = SimUvcHelper::new(vec![
            usb_device("/dev/bus/usb/001/002"),
            usb_device("/dev/bus/usb/001/005"),
        ]);
        let preferences = MemoryPreferences::default();
        preferences.set_string(USB_CAMERA_PREFS_NAMESPACE, USB_DEVICE_NAME_KEY, "/dev/bus/usb/001/005");

        let mut rig = rig_with(helper, preferences, UsbBridgeConfig::new("org.example.meet", 33));
        rig.adapter.start(640, 480, 30).unwrap();

        assert!(wait_until(WAIT, || rig.helper.permission_requests() == vec![1]));
        rig.adapter.stop().unwrap();
    }

    #[test]
    fn empty_device_list_waits_for_attach() {
        let mut rig = rig(SimUvcHelper::new(Vec::new()));
        rig.adapter.start(640, 480, 30).unwrap();

        assert!(wait_until(WAIT, || rig.sink.started_events() == vec![false]));
        assert_eq!(rig.adapter.state(), BridgeState::WaitingForPermission);

        let device = usb_device("/dev/bus/usb/001/007");
        rig.helper.set_devices(vec![device.clone()]);
        rig.helper.attach(&device);

        assert!(wait_until(WAIT, || rig.sink.started_events() == vec![false, true]));
        assert_eq!(rig.adapter.state(), BridgeState::Connected);
        rig.adapter.stop().unwrap();
    }

    #[test]
    fn detached_host_fails_start_and_tears_down() {
        let mut rig = rig_with(
            one_camera(),
            MemoryPreferences::default(),
            UsbBridgeConfig::new("org.example.meet", 33).detached(),
        );
        rig.adapter.start(640, 480, 30).unwrap();

        assert!(wait_until(WAIT, || rig.sink.stopped_count() == 1));
        assert_eq!(rig.sink.started_events(), vec![false]);
        assert_eq!(rig.library.helper_requests(), 0);
        assert_eq!(rig.adapter.state(), BridgeState::Idle);

        rig.adapter.stop().unwrap();
        assert_eq!(rig.sink.stopped_count(), 1);
    }

    #[test]
    fn stop_is_idempotent() {
        let mut rig = rig(one_camera());
        rig.adapter.stop().unwrap();
        assert_eq!(rig.sink.stopped_count(), 0);

        rig.adapter.start(640, 480, 30).unwrap();
        assert!(wait_until(WAIT, || rig.adapter.state() == BridgeState::Connected));

        rig.adapter.stop().unwrap();
        rig.adapter.stop().unwrap();

        assert_eq!(rig.sink.stopped_count(), 1);
        assert_eq!(rig.adapter.state(), BridgeState::Idle);
        assert!(rig.adapter.zoom_handle().is_none());
        let calls = rig.helper.calls();
        for step in ["stop_preview", "close_camera", "unregister_usb", "release"] {
            assert!(calls.iter().any(|c| c == step), "missing {}", step);
        }
    }

    #[test]
    fn callbacks_after_stop_are_ignored() {
        let mut rig = rig(one_camera().with_preview_size(4, 2));
        rig.adapter.start(4, 2, 30).unwrap();
        assert!(wait_until(WAIT, || rig.adapter.state() == BridgeState::Connected));
        rig.adapter.stop().unwrap();

        rig.helper.emit_frame(&[0u8; 12]);
        rig.helper.attach(&usb_device("/dev/bus/usb/001/004"));

        assert_eq!(rig.sink.frame_count(), 0);
        assert_eq!(rig.helper.permission_requests(), vec![0]);
    }

    #[test]
    fn second_start_only_updates_frame_size() {
        let mut rig = rig(one_camera().with_auto_connect(false));
        rig.adapter.start(640, 480, 30).unwrap();
        rig.adapter.start(320, 240, 15).unwrap();

        assert_eq!(rig.adapter.frame_size(), (320, 240));
        assert!(wait_until(WAIT, || rig.helper.permission_requests() == vec![0]));
        rig.adapter.stop().unwrap();
        assert_eq!(rig.helper.permission_requests(), vec![0]);
    }

    #[test]
    fn installs_platform_safe_permission_intent() {
        let mut rig = rig(one_camera());
        rig.adapter.start(640, 480, 30).unwrap();
        assert!(wait_until(WAIT, || rig.helper.monitor().installed().is_some()));

        let intent = rig.helper.monitor().installed().unwrap();
        assert_eq!(intent.action, "org.example.meet.USB_PERMISSION");
        assert!(intent.flags.mutable);
        rig.adapter.stop().unwrap();
    }

    #[test]
    fn existing_permission_intent_is_kept() {
        let helper = one_camera();
        let existing = PermissionIntent {
            action: "com.usb.ACTION".to_string(),
            package: "org.example.meet".to_string(),
            request_code: 3,
            flags: Default::default(),
        };
        helper.monitor().preinstall(existing.clone());

        let mut rig = rig(helper);
        rig.adapter.start(640, 480, 30).unwrap();
        assert!(wait_until(WAIT, || rig.helper.permission_requests() == vec![0]));

        assert_eq!(rig.helper.monitor().installed(), Some(existing));
        assert_eq!(rig.helper.monitor().install_count(), 0);
        rig.adapter.stop().unwrap();
    }

    #[test]
    fn headless_view_answers_layout_queries() {
        let mut rig = rig(one_camera().with_preview_size(1280, 720));
        rig.adapter.start(1280, 720, 30).unwrap();
        assert!(wait_until(WAIT, || rig.adapter.state() == BridgeState::Connected));

        let view = rig.helper.view().unwrap();
        assert_eq!(view.handle(ViewCall::HasSurface), ViewReply::Bool(true));
        assert_eq!(view.handle(ViewCall::OnResume), ViewReply::Unit);
        assert_eq!(view.handle(ViewCall::CaptureStillImage), ViewReply::Null);
        assert!(matches!(view.handle(ViewCall::Surface), ViewReply::Surface(_)));
        match view.handle(ViewCall::AspectRatio) {
            ViewReply::Double(ratio) => approx::assert_relative_eq!(ratio, 1280.0 / 720.0),
            other => panic!("unexpected reply {:?}", other),
        }
        let unknown = ViewCall::Other {
            name: "getPreviewWidth".to_string(),
            returns: ReturnKind::Int,
        };
        assert_eq!(view.handle(unknown), ViewReply::Int(0));
        rig.adapter.stop().unwrap();
    }

    #[test]
    fn zoom_steps_discrete_index() {
        let mut rig = rig(one_camera().with_zoom(10, 5));
        rig.adapter.start(640, 480, 30).unwrap();
        assert!(wait_until(WAIT, || rig.adapter.state() == BridgeState::Connected));

        let zoom = rig.adapter.zoom_handle().unwrap();
        assert!(zoom.apply(-1.0, Duration::from_millis(500)));
        assert_eq!(rig.helper.zoom_value(), 0);

        // Already at the lower edge.
        assert!(zoom.apply(-0.5, Duration::from_millis(500)));
        assert_eq!(rig.helper.zoom_value(), 0);
        rig.adapter.stop().unwrap();
    }

    #[test]
    fn zoom_falls_back_to_model_value() {
        let mut rig = rig(one_camera().with_model_value_zoom(10));
        rig.adapter.start(640, 480, 30).unwrap();
        assert!(wait_until(WAIT, || rig.adapter.state() == BridgeState::Connected));

        let zoom = rig.adapter.zoom_handle().unwrap();
        assert!(zoom.apply(0.5, Duration::from_millis(500)));
        assert_eq!(rig.helper.model_writes(), vec![(crate::traits::uvc::PU_ZOOM_ABS, 5)]);
        rig.adapter.stop().unwrap();
    }

    #[test]
    fn zoom_without_bounds_fails() {
        let mut rig = rig(one_camera());
        rig.adapter.start(640, 480, 30).unwrap();
        assert!(wait_until(WAIT, || rig.adapter.state() == BridgeState::Connected));

        let zoom = rig.adapter.zoom_handle().unwrap();
        assert!(!zoom.apply(0.5, Duration::from_millis(500)));
        rig.adapter.stop().unwrap();
    }

    #[test]
    fn wedged_teardown_is_bounded_and_still_ends_idle() {
        let mut rig = rig(one_camera().with_stop_delay(Duration::from_secs(6)));
        rig.adapter.start(640, 480, 30).unwrap();
        assert!(wait_until(WAIT, || rig.adapter.state() == BridgeState::Connected));

        let begun = std::time::Instant::now();
        let result = rig.adapter.stop();
        let elapsed = begun.elapsed();

        // 2 s teardown wait plus 1 s join, with some scheduling slack.
        assert_eq!(result, Err(CaptureError::Timeout));
        assert!(elapsed >= Duration::from_secs(2), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(3_800), "{:?}", elapsed);
        assert_eq!(rig.adapter.state(), BridgeState::Idle);
        assert!(!rig.adapter.is_started());
        assert!(rig.adapter.zoom_handle().is_none());
        assert!(rig.adapter.shared.helper().is_none());
        assert!(rig.helper.calls().contains(&"stop_preview".to_string()));

        // Nothing left to stop.
        assert_eq!(rig.adapter.stop(), Ok(()));
    }
}
