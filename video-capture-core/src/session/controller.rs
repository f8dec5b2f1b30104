use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::backend::format::negotiate_resolution;
use crate::backend::BackendAdapter;
use crate::bridge::UsbBackendFactory;
use crate::models::config::ControllerConfig;
use crate::models::constraints::CaptureConstraints;
use crate::models::device::{BackendKind, Resolution};
use crate::models::error::CaptureError;
use crate::models::session::SessionInfo;
use crate::traits::device_enumerator::DeviceEnumerator;
use crate::traits::frame_sink::FrameSink;
use crate::traits::preference_store::PreferenceStore;
use crate::traits::video_capturer::VideoCapturer;

use super::registry::ActiveInstanceRegistry;
use super::selector::CaptureSourceSelector;
use super::zoom::{ZoomCoordinator, ZoomRoute};

/// Collaborators a controller is wired to.
#[derive(Clone)]
pub struct CaptureEnvironment {
    pub enumerator: Arc<dyn DeviceEnumerator>,
    pub preferences: Arc<dyn PreferenceStore>,
    /// USB bridge factory; `None` when the host ships no UVC library.
    pub usb: Option<UsbBackendFactory>,
    pub registry: Arc<ActiveInstanceRegistry<CaptureController>>,
}

/// How long a queued camera switch waits for the adapter before giving up.
const SWITCH_LOCK_WAIT: Duration = Duration::from_millis(100);

struct CaptureSession {
    adapter: Arc<Mutex<BackendAdapter>>,
    info: SessionInfo,
    /// Cleared before the adapter is stopped.
    live: Arc<AtomicBool>,
}

impl CaptureSession {
    /// The USB bridge adopts the device's preview size after connecting.
    fn resolution(&self) -> Resolution {
        if self.info.backend != BackendKind::ExternalUsb {
            return self.info.resolution();
        }
        match &*self.adapter.lock() {
            BackendAdapter::ExternalUsb(usb) => {
                let (width, height) = usb.frame_size();
                Resolution::new(width, height)
            }
            _ => self.info.resolution(),
        }
    }
}

/// One camera capture: selection, lifecycle, zoom, camera switching.
///
/// Holds at most one live session. A successful start registers the
/// controller as the active instance; disposing it unregisters it unless
/// another controller has taken over since.
pub struct CaptureController {
    constraints: CaptureConstraints,
    environment: CaptureEnvironment,
    sink: Arc<dyn FrameSink>,
    zoom: ZoomCoordinator,
    front_facing: Arc<AtomicBool>,
    session: Mutex<Option<CaptureSession>>,
}

impl CaptureController {
    pub fn new(
        constraints: CaptureConstraints,
        mut environment: CaptureEnvironment,
        sink: Arc<dyn FrameSink>,
        config: ControllerConfig,
    ) -> Result<Arc<Self>, CaptureError> {
        constraints
            .validate()
            .map_err(CaptureError::ConfigurationFailed)?;
        config.validate().map_err(CaptureError::ConfigurationFailed)?;

        environment.usb = environment
            .usb
            .take()
            .map(|usb| usb.with_timeouts(config.clone()));

        Ok(Arc::new(Self {
            constraints,
            environment,
            sink,
            zoom: ZoomCoordinator::new(config.zoom_timeout),
            front_facing: Arc::new(AtomicBool::new(true)),
            session: Mutex::new(None),
        }))
    }

    pub fn constraints(&self) -> &CaptureConstraints {
        &self.constraints
    }

    /// Select a device, start it, and register as the active instance.
    ///
    /// A no-op while a session is already live.
    pub fn start_capture(self: &Arc<Self>) -> Result<(), CaptureError> {
        let mut slot = self.session.lock();
        if slot.is_some() {
            self.environment.registry.set_active(self);
            return Ok(());
        }

        let selector = CaptureSourceSelector::new(
            self.environment.enumerator.as_ref(),
            self.environment.preferences.as_ref(),
            self.environment.usb.as_ref(),
            Arc::clone(&self.sink),
        );
        let selection = selector.select(&self.constraints)?;
        self.front_facing.store(selection.front_facing, Ordering::SeqCst);

        let mut adapter = selection.adapter;
        let target = Resolution::new(self.constraints.target_width, self.constraints.target_height);
        let actual = negotiate_resolution(&adapter, target);
        let frame_rate = self.constraints.target_frame_rate;

        if let Err(e) = adapter.start(actual.width, actual.height, frame_rate) {
            log::error!("Failed to start capture on {}: {}", selection.device.name, e);
            if let Err(stop_err) = adapter.stop() {
                log::debug!("Stop after failed start: {}", stop_err);
            }
            adapter.dispose();
            return Err(e);
        }

        let info = SessionInfo::new(
            &selection.device.name,
            adapter.kind(),
            actual,
            frame_rate,
            selection.front_facing,
        );
        log::info!(
            "Capture started on {} ({}) at {} {}fps",
            info.device_name,
            info.backend,
            actual,
            frame_rate
        );
        *slot = Some(CaptureSession {
            adapter: Arc::new(Mutex::new(adapter)),
            info,
            live: Arc::new(AtomicBool::new(true)),
        });
        drop(slot);

        self.environment.registry.set_active(self);
        Ok(())
    }

    /// Stop and dispose the live adapter. `true` when nothing was running.
    pub fn stop_capture(&self) -> bool {
        let Some(session) = self.session.lock().take() else {
            return true;
        };
        session.live.store(false, Ordering::SeqCst);

        let mut adapter = session.adapter.lock();
        let stopped = match adapter.stop() {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed stopping capture on {}: {}", session.info.device_name, e);
                false
            }
        };
        adapter.dispose();
        log::info!("Capture stopped on {}", session.info.device_name);
        stopped
    }

    pub fn change_capture_format(&self, width: u32, height: u32, frame_rate: u32) -> Result<(), CaptureError> {
        let mut slot = self.session.lock();
        let Some(session) = slot.as_mut() else {
            return Err(CaptureError::InvalidState("no active capture session".to_string()));
        };

        session.adapter.lock().change_format(width, height, frame_rate)?;
        session.info.width = width;
        session.info.height = height;
        session.info.frame_rate = frame_rate;
        Ok(())
    }

    /// Step zoom by a fraction of the backend's range, `[-1.0, 1.0]`.
    ///
    /// `true` when applied or already at the edge. Blocks for at most the
    /// configured zoom timeout.
    pub fn adjust_zoom(&self, delta: f32) -> bool {
        let Some(adapter) = self.live_adapter() else {
            log::debug!("Zoom ignored: video capturer not initialized");
            return false;
        };

        let route = {
            let adapter = adapter.lock();
            if !adapter.supports_zoom() {
                log::debug!("Zoom ignored: {} capture has no zoom", adapter.kind());
                return false;
            }
            ZoomRoute::for_adapter(&adapter)
        };
        match route {
            Some(route) => self.zoom.apply(route, delta),
            None => false,
        }
    }

    /// Switch to a camera of the opposite facing.
    ///
    /// With exactly two cameras this is a single switch. With more, the
    /// backend is switched until the opposite facing comes up, at most once
    /// per camera. The USB bridge cannot switch.
    pub fn switch_camera(&self) {
        let Some((adapter, live)) = self.session.lock().as_ref().map(|session| {
            (Arc::clone(&session.adapter), Arc::clone(&session.live))
        }) else {
            log::debug!("Camera switch ignored: no active capture");
            return;
        };

        let device_count = self.environment.enumerator.device_names().len();
        if device_count < 2 {
            return;
        }

        if device_count == 2 {
            let front_facing = Arc::clone(&self.front_facing);
            let accepted = adapter.lock().switch_camera(Box::new(move |result| match result {
                Ok(front) => front_facing.store(front, Ordering::SeqCst),
                Err(e) => log::error!("Error switching camera: {}", e),
            }));
            if !accepted {
                log::debug!("Camera switch ignored: backend cannot switch cameras");
            }
            return;
        }

        let plan = SwitchPlan {
            adapter,
            live,
            front_facing: Arc::clone(&self.front_facing),
            desired_front: !self.front_facing.load(Ordering::SeqCst),
        };
        let adapter = Arc::clone(&plan.adapter);
        let mut guard = adapter.lock();
        switch_until(&mut guard, plan, device_count);
    }

    /// Stop capturing and leave the active-instance slot if we hold it.
    pub fn dispose(&self) {
        self.stop_capture();
        if self.environment.registry.clear_if_mine(self) {
            log::debug!("Cleared active camera capture controller");
        }
    }

    pub fn is_front_facing(&self) -> bool {
        self.front_facing.load(Ordering::SeqCst)
    }

    pub fn session_info(&self) -> Option<SessionInfo> {
        self.session.lock().as_ref().map(|session| {
            let mut info = session.info.clone();
            let resolution = session.resolution();
            info.width = resolution.width;
            info.height = resolution.height;
            info.front_facing = self.is_front_facing();
            info
        })
    }

    pub fn actual_resolution(&self) -> Option<Resolution> {
        self.session.lock().as_ref().map(CaptureSession::resolution)
    }

    pub fn backend_kind(&self) -> Option<BackendKind> {
        self.session.lock().as_ref().map(|session| session.info.backend)
    }

    fn live_adapter(&self) -> Option<Arc<Mutex<BackendAdapter>>> {
        self.session
            .lock()
            .as_ref()
            .map(|session| Arc::clone(&session.adapter))
    }
}

/// A multi-camera switch in progress.
struct SwitchPlan {
    adapter: Arc<Mutex<BackendAdapter>>,
    live: Arc<AtomicBool>,
    front_facing: Arc<AtomicBool>,
    desired_front: bool,
}

/// Switch once, and from the completion keep switching until the desired
/// facing comes up or `tries` runs out.
///
/// Follow-up switches are posted to the camera thread rather than issued
/// from inside the completion, which may run under the adapter lock.
fn switch_until(adapter: &mut BackendAdapter, plan: SwitchPlan, tries: usize) {
    let thread = adapter.camera_thread();
    let accepted = adapter.switch_camera(Box::new(move |result| match result {
        Ok(front) => {
            plan.front_facing.store(front, Ordering::SeqCst);
            let remaining = tries.saturating_sub(1);
            if front == plan.desired_front || remaining == 0 {
                return;
            }
            let posted = thread.is_some_and(|thread| {
                thread.post(Box::new(move || continue_switch(plan, remaining)))
            });
            if !posted {
                log::warn!("Camera switch abandoned: camera thread unavailable");
            }
        }
        Err(e) => log::error!("Error switching camera: {}", e),
    }));
    if !accepted {
        log::debug!("Camera switch ignored: backend cannot switch cameras");
    }
}

/// Runs on the camera thread. A stop may hold the adapter lock while it
/// waits for this thread, so the lock is only tried, never waited on.
fn continue_switch(plan: SwitchPlan, tries: usize) {
    if !plan.live.load(Ordering::SeqCst) {
        log::debug!("Camera switch abandoned: capture stopped");
        return;
    }
    let adapter = Arc::clone(&plan.adapter);
    let Some(mut guard) = adapter.try_lock_for(SWITCH_LOCK_WAIT) else {
        log::warn!("Camera switch abandoned: capture busy");
        return;
    };
    switch_until(&mut guard, plan, tries);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Weak;
    use std::time::Instant;

    use crate::models::config::{UsbBridgeConfig, PREFER_USB_CAMERA_KEY, USB_CAMERA_PREFS_NAMESPACE};
    use crate::models::device::Facing;
    use crate::sim::{usb_device, wait_until, RecordingSink, SimDevice, SimEnumerator, SimUvcHelper, SimUvcLibrary};
    use crate::storage::MemoryPreferences;
    use crate::VideoFrame;

    struct Rig {
        enumerator: Arc<SimEnumerator>,
        registry: Arc<ActiveInstanceRegistry<CaptureController>>,
        sink: Arc<RecordingSink>,
        preferences: MemoryPreferences,
    }

    impl Rig {
        fn new(devices: Vec<SimDevice>) -> Self {
            Self {
                enumerator: Arc::new(SimEnumerator::new(devices)),
                registry: Arc::new(ActiveInstanceRegistry::new()),
                sink: Arc::new(RecordingSink::default()),
                preferences: MemoryPreferences::default(),
            }
        }

        fn environment(&self, usb: Option<UsbBackendFactory>) -> CaptureEnvironment {
            CaptureEnvironment {
                enumerator: self.enumerator.clone(),
                preferences: Arc::new(self.preferences.clone()),
                usb,
                registry: Arc::clone(&self.registry),
            }
        }

        fn controller(&self, constraints: CaptureConstraints) -> Arc<CaptureController> {
            CaptureController::new(
                constraints,
                self.environment(None),
                self.sink.clone(),
                ControllerConfig::default(),
            )
            .unwrap()
        }
    }

    fn front_and_back() -> Vec<SimDevice> {
        vec![
            SimDevice::legacy("cam0", Facing::Front),
            SimDevice::legacy("cam1", Facing::Back),
        ]
    }

    #[test]
    fn rejects_invalid_constraints() {
        let rig = Rig::new(front_and_back());
        let result = CaptureController::new(
            CaptureConstraints::new(0, 720, 30),
            rig.environment(None),
            rig.sink.clone(),
            ControllerConfig::default(),
        );
        assert!(matches!(result, Err(CaptureError::ConfigurationFailed(_))));
    }

    #[test]
    fn start_negotiates_closest_size_and_registers() {
        let rig = Rig::new(vec![SimDevice::modern("cam0", Facing::Front)
            .with_sizes(vec![Resolution::new(640, 480), Resolution::new(1280, 720)])]);
        let controller = rig.controller(CaptureConstraints::new(1200, 700, 24));

        controller.start_capture().unwrap();

        assert_eq!(controller.actual_resolution(), Some(Resolution::new(1280, 720)));
        assert_eq!(controller.backend_kind(), Some(BackendKind::ModernSensor));
        assert!(controller.is_front_facing());
        assert!(rig.registry.is_active(&controller));
        assert!(wait_until(Duration::from_secs(1), || rig.sink.started_events() == vec![true]));

        let info = controller.session_info().unwrap();
        assert_eq!(info.device_name, "cam0");
        assert_eq!(info.frame_rate, 24);
        controller.dispose();
    }

    #[test]
    fn second_start_is_a_no_op() {
        let rig = Rig::new(front_and_back());
        let controller = rig.controller(CaptureConstraints::new(640, 480, 30));

        controller.start_capture().unwrap();
        let id = controller.session_info().unwrap().id;
        controller.start_capture().unwrap();

        assert_eq!(controller.session_info().unwrap().id, id);
        assert_eq!(rig.enumerator.attempts(), vec!["cam0"]);
        controller.dispose();
    }

    #[test]
    fn no_devices_fails_start() {
        let rig = Rig::new(Vec::new());
        let controller = rig.controller(CaptureConstraints::new(640, 480, 30));

        assert_eq!(controller.start_capture(), Err(CaptureError::NoSuitableDevice));
        assert!(controller.session_info().is_none());
        assert!(rig.registry.current().is_none());
    }

    #[test]
    fn failed_start_tears_down_adapter() {
        let rig = Rig::new(vec![SimDevice::legacy("cam0", Facing::Front).failing_start()]);
        let controller = rig.controller(CaptureConstraints::new(640, 480, 30));

        assert!(matches!(controller.start_capture(), Err(CaptureError::StartFailed(_))));
        assert_eq!(rig.enumerator.disposed(), vec!["cam0"]);
        assert!(controller.session_info().is_none());
        assert!(rig.registry.current().is_none());
    }

    #[test]
    fn stop_is_idempotent() {
        let rig = Rig::new(front_and_back());
        let controller = rig.controller(CaptureConstraints::new(640, 480, 30));

        assert!(controller.stop_capture());
        controller.start_capture().unwrap();
        assert!(controller.stop_capture());
        assert!(controller.stop_capture());
        assert_eq!(rig.sink.stopped_count(), 1);
    }

    #[test]
    fn registry_keeps_latest_controller() {
        let rig = Rig::new(front_and_back());
        let a = rig.controller(CaptureConstraints::new(640, 480, 30));
        let b = rig.controller(CaptureConstraints::new(640, 480, 30));

        a.start_capture().unwrap();
        b.start_capture().unwrap();
        assert!(rig.registry.is_active(&b));

        a.dispose();
        assert!(rig.registry.is_active(&b));

        b.dispose();
        assert!(rig.registry.current().is_none());
    }

    #[test]
    fn change_format_requires_session() {
        let rig = Rig::new(front_and_back());
        let controller = rig.controller(CaptureConstraints::new(640, 480, 30));

        assert!(matches!(
            controller.change_capture_format(1280, 720, 30),
            Err(CaptureError::InvalidState(_))
        ));

        controller.start_capture().unwrap();
        controller.change_capture_format(1280, 720, 15).unwrap();
        assert_eq!(controller.actual_resolution(), Some(Resolution::new(1280, 720)));
        controller.dispose();
    }

    #[test]
    fn zoom_without_session_fails() {
        let rig = Rig::new(front_and_back());
        let controller = rig.controller(CaptureConstraints::new(640, 480, 30));

        assert!(!controller.adjust_zoom(0.1));
    }

    #[test]
    fn zoom_reaches_legacy_session() {
        let rig = Rig::new(vec![SimDevice::legacy("cam0", Facing::Front).with_legacy_zoom(5, 10)]);
        let controller = rig.controller(CaptureConstraints::new(640, 480, 30));
        controller.start_capture().unwrap();

        assert!(controller.adjust_zoom(0.1));
        assert_eq!(rig.enumerator.legacy_zoom("cam0"), Some(6));
        controller.dispose();
    }

    #[test]
    fn zoom_refused_when_backend_has_no_zoom() {
        let rig = Rig::new(vec![SimDevice::legacy("cam0", Facing::Front).with_legacy_zoom(0, 0)]);
        let controller = rig.controller(CaptureConstraints::new(640, 480, 30));
        controller.start_capture().unwrap();

        assert!(!controller.adjust_zoom(0.5));
        assert!(!controller.adjust_zoom(-0.5));
        assert_eq!(rig.enumerator.legacy_zoom("cam0"), Some(0));
        controller.dispose();
    }

    /// Asks the controller for its session from inside the start callback.
    #[derive(Default)]
    struct SessionQueryingSink {
        controller: Mutex<Weak<CaptureController>>,
        seen: Mutex<Option<Option<SessionInfo>>>,
    }

    impl FrameSink for SessionQueryingSink {
        fn on_capture_started(&self, _success: bool) {
            let controller = self.controller.lock().upgrade();
            if let Some(controller) = controller {
                *self.seen.lock() = Some(controller.session_info());
            }
        }

        fn on_frame_captured(&self, _frame: &VideoFrame) {}

        fn on_capture_stopped(&self) {}
    }

    #[test]
    fn start_callback_may_query_the_controller() {
        let rig = Rig::new(front_and_back());
        let sink = Arc::new(SessionQueryingSink::default());
        let controller = CaptureController::new(
            CaptureConstraints::new(640, 480, 30),
            rig.environment(None),
            sink.clone(),
            ControllerConfig::default(),
        )
        .unwrap();
        *sink.controller.lock() = Arc::downgrade(&controller);

        controller.start_capture().unwrap();

        assert!(wait_until(Duration::from_secs(1), || sink.seen.lock().is_some()));
        let info = sink.seen.lock().clone().flatten().unwrap();
        assert_eq!(info.device_name, "cam0");
        controller.dispose();
    }

    #[test]
    fn switch_with_two_cameras_flips_facing() {
        let rig = Rig::new(front_and_back());
        let controller = rig.controller(CaptureConstraints::new(640, 480, 30));
        controller.start_capture().unwrap();
        assert!(controller.is_front_facing());

        controller.switch_camera();
        assert!(wait_until(Duration::from_secs(1), || !controller.is_front_facing()));
        controller.dispose();
    }

    #[test]
    fn switch_cycles_until_opposite_facing() {
        let rig = Rig::new(vec![
            SimDevice::legacy("cam0", Facing::Front),
            SimDevice::legacy("cam1", Facing::Front),
            SimDevice::legacy("cam2", Facing::Back),
        ]);
        let controller = rig.controller(CaptureConstraints::new(640, 480, 30));
        controller.start_capture().unwrap();

        controller.switch_camera();
        assert!(wait_until(Duration::from_secs(1), || !controller.is_front_facing()));
        assert_eq!(rig.enumerator.switch_count("cam0"), 2);
        controller.dispose();
    }

    #[test]
    fn stop_is_not_held_up_by_a_queued_switch() {
        let rig = Rig::new(vec![
            SimDevice::legacy("cam0", Facing::Front),
            SimDevice::legacy("cam1", Facing::Front),
            SimDevice::legacy("cam2", Facing::Back),
        ]);
        let controller = rig.controller(CaptureConstraints::new(640, 480, 30));
        controller.start_capture().unwrap();
        let camera = rig.enumerator.camera_thread("cam0").unwrap();

        // Hold the camera thread so the first switch lands between two
        // blocking tasks and its follow-up queues behind the second.
        let (release, gate) = std::sync::mpsc::channel::<()>();
        assert!(camera.post(Box::new(move || {
            let _ = gate.recv();
        })));
        controller.switch_camera();
        assert!(camera.post(Box::new(|| std::thread::sleep(Duration::from_millis(300)))));
        release.send(()).unwrap();
        assert!(wait_until(Duration::from_secs(1), || rig.enumerator.switch_count("cam0") == 1));

        let begun = Instant::now();
        assert!(controller.stop_capture());
        let elapsed = begun.elapsed();

        assert!(elapsed < Duration::from_millis(800), "{:?}", elapsed);
        assert_eq!(rig.enumerator.switch_count("cam0"), 1);
        assert!(controller.is_front_facing());
        controller.dispose();
    }

    #[test]
    fn switch_with_single_camera_is_a_no_op() {
        let rig = Rig::new(vec![SimDevice::legacy("cam0", Facing::Front)]);
        let controller = rig.controller(CaptureConstraints::new(640, 480, 30));
        controller.start_capture().unwrap();

        controller.switch_camera();
        assert_eq!(rig.enumerator.switch_count("cam0"), 0);
        assert!(controller.is_front_facing());
        controller.dispose();
    }

    #[test]
    fn usb_bridge_session_through_controller() {
        let rig = Rig::new(front_and_back());
        rig.preferences
            .set_bool(USB_CAMERA_PREFS_NAMESPACE, PREFER_USB_CAMERA_KEY, true);
        let helper = Arc::new(
            SimUvcHelper::new(vec![usb_device("/dev/bus/usb/001/004")])
                .with_preview_size(1920, 1080)
                .with_zoom(10, 0),
        );
        let factory = UsbBackendFactory::new(
            Arc::new(SimUvcLibrary::new(Arc::clone(&helper))),
            Arc::new(rig.preferences.clone()),
            UsbBridgeConfig::new("org.example.meet", 34),
        );
        let controller = CaptureController::new(
            CaptureConstraints::new(640, 480, 30),
            rig.environment(Some(factory)),
            rig.sink.clone(),
            ControllerConfig::default(),
        )
        .unwrap();

        controller.start_capture().unwrap();
        assert_eq!(controller.backend_kind(), Some(BackendKind::ExternalUsb));
        assert!(!controller.is_front_facing());
        assert!(wait_until(Duration::from_secs(2), || rig.sink.started_events() == vec![true]));

        // Frames arrive at the device's preview size, not the requested one.
        assert_eq!(controller.actual_resolution(), Some(Resolution::new(1920, 1080)));
        let info = controller.session_info().unwrap();
        assert_eq!((info.width, info.height), (1920, 1080));

        assert!(controller.adjust_zoom(0.3));
        assert_eq!(helper.zoom_value(), 3);

        // Switching is a sensor-only operation.
        controller.switch_camera();
        assert!(!controller.is_front_facing());

        assert!(controller.stop_capture());
        assert_eq!(rig.sink.stopped_count(), 1);
        assert!(!controller.adjust_zoom(0.3));
        controller.dispose();
    }
}
