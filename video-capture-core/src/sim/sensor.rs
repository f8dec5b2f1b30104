use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::device::Resolution;
use crate::models::error::CaptureError;
use crate::models::zoom::CropRect;
use crate::runtime::{WorkerHandle, WorkerLoop};
use crate::traits::frame_sink::FrameSink;
use crate::traits::sensor::{
    CameraThread, LegacyParameters, LegacySensorCapturer, LegacySensorSession, ModernCharacteristics,
    ModernSensorCapturer, ModernSensorSession, OutputSurface, RepeatingRequest, SensorCapturer,
    SwitchCallback,
};
use crate::traits::video_capturer::VideoCapturer;

const JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Names of disposed capturers, shared with the enumerator that made them.
pub(super) type DisposeLog = Arc<Mutex<Vec<String>>>;

struct SensorState {
    worker: Mutex<Option<WorkerLoop>>,
    thread: Mutex<Option<WorkerHandle>>,
    running: AtomicBool,
    fail_start: AtomicBool,
    facing_index: AtomicUsize,
    switches: AtomicUsize,
    delay: Mutex<Duration>,
}

impl SensorState {
    /// Simulated latency of session calls on the camera thread.
    fn pause(&self) {
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }
}

/// Camera thread, lifecycle and switching shared by both simulated APIs.
#[derive(Clone)]
struct SimSensor {
    name: String,
    sink: Option<Arc<dyn FrameSink>>,
    sizes: Vec<Resolution>,
    /// Front flags in switch order, starting with the opened camera.
    facings: Vec<bool>,
    disposed: DisposeLog,
    state: Arc<SensorState>,
}

impl SimSensor {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            sink: None,
            sizes: vec![Resolution::new(640, 480), Resolution::new(1280, 720)],
            facings: vec![true, false],
            disposed: DisposeLog::default(),
            state: Arc::new(SensorState {
                worker: Mutex::new(None),
                thread: Mutex::new(None),
                running: AtomicBool::new(false),
                fail_start: AtomicBool::new(false),
                facing_index: AtomicUsize::new(0),
                switches: AtomicUsize::new(0),
                delay: Mutex::new(Duration::ZERO),
            }),
        }
    }

    fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    fn start(&self) -> Result<(), CaptureError> {
        if self.state.fail_start.load(Ordering::SeqCst) {
            return Err(CaptureError::StartFailed(format!("{} refused to open", self.name)));
        }
        if self.is_running() {
            return Ok(());
        }

        let worker = WorkerLoop::spawn(&format!("sim-camera-{}", self.name))?;
        if let Some(sink) = &self.sink {
            let sink = Arc::clone(sink);
            if !worker.post(Box::new(move || sink.on_capture_started(true))) {
                log::warn!("{} camera thread rejected start notification", self.name);
            }
        }
        *self.state.thread.lock() = Some(worker.handle());
        *self.state.worker.lock() = Some(worker);
        self.state.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) -> Result<(), CaptureError> {
        if !self.state.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.state.thread.lock().take();
        let worker = self.state.worker.lock().take();
        if let Some(worker) = worker {
            worker.quit_and_join(JOIN_TIMEOUT);
        }
        if let Some(sink) = &self.sink {
            sink.on_capture_stopped();
        }
        Ok(())
    }

    fn dispose(&self) {
        if let Err(e) = self.stop() {
            log::warn!("{} stop failed: {}", self.name, e);
        }
        self.disposed.lock().push(self.name.clone());
    }

    fn camera_thread(&self) -> Option<Arc<dyn CameraThread>> {
        self.state
            .thread
            .lock()
            .clone()
            .map(|handle| Arc::new(handle) as Arc<dyn CameraThread>)
    }

    fn switch_camera(&self, done: SwitchCallback) {
        let Some(thread) = self.state.thread.lock().clone() else {
            done(Err(format!("{} is not running", self.name)));
            return;
        };

        let state = Arc::clone(&self.state);
        let facings = self.facings.clone();
        let posted = thread.post(Box::new(move || {
            if facings.is_empty() {
                done(Err("no cameras to switch to".to_string()));
                return;
            }
            let next = (state.facing_index.load(Ordering::SeqCst) + 1) % facings.len();
            state.facing_index.store(next, Ordering::SeqCst);
            state.switches.fetch_add(1, Ordering::SeqCst);
            done(Ok(facings[next]));
        }));
        if !posted {
            log::warn!("{} camera thread rejected switch", self.name);
        }
    }
}

/// Legacy sensor API stand-in. Clones share state, so a test can keep one
/// while an adapter owns another.
#[derive(Clone)]
pub struct SimLegacyCapturer {
    sensor: SimSensor,
    session: Arc<SimLegacySession>,
}

struct SimLegacySession {
    params: Mutex<LegacyParameters>,
    writes: AtomicUsize,
    sensor: Arc<SensorState>,
}

impl SimLegacyCapturer {
    pub fn new(params: LegacyParameters) -> Self {
        let sensor = SimSensor::new("sim-legacy");
        let session = Arc::new(SimLegacySession {
            params: Mutex::new(params),
            writes: AtomicUsize::new(0),
            sensor: Arc::clone(&sensor.state),
        });
        Self { sensor, session }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.sensor.name = name.to_string();
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn FrameSink>) -> Self {
        self.sensor.sink = Some(sink);
        self
    }

    pub fn with_sizes(mut self, sizes: Vec<Resolution>) -> Self {
        self.sensor.sizes = sizes;
        self
    }

    pub fn with_facings(mut self, facings: Vec<bool>) -> Self {
        self.sensor.facings = facings;
        self
    }

    pub(super) fn with_dispose_log(mut self, log: DisposeLog) -> Self {
        self.sensor.disposed = log;
        self
    }

    pub fn failing_start(self) -> Self {
        self.sensor.state.fail_start.store(true, Ordering::SeqCst);
        self
    }

    pub fn set_camera_delay(&self, delay: Duration) {
        *self.sensor.state.delay.lock() = delay;
    }

    pub fn parameters(&self) -> LegacyParameters {
        *self.session.params.lock()
    }

    pub fn parameter_writes(&self) -> usize {
        self.session.writes.load(Ordering::SeqCst)
    }

    pub fn switch_count(&self) -> usize {
        self.sensor.state.switches.load(Ordering::SeqCst)
    }
}

impl LegacySensorSession for SimLegacySession {
    fn parameters(&self) -> Result<LegacyParameters, CaptureError> {
        self.sensor.pause();
        Ok(*self.params.lock())
    }

    fn set_parameters(&self, params: &LegacyParameters) -> Result<(), CaptureError> {
        *self.params.lock() = *params;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl VideoCapturer for SimLegacyCapturer {
    fn start(&mut self, _width: u32, _height: u32, _frame_rate: u32) -> Result<(), CaptureError> {
        self.sensor.start()
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.sensor.stop()
    }

    fn change_format(&mut self, _width: u32, _height: u32, _frame_rate: u32) -> Result<(), CaptureError> {
        Ok(())
    }

    fn dispose(&mut self) {
        self.sensor.dispose();
    }

    fn supports_zoom(&self) -> bool {
        self.session.params.lock().zoom_supported
    }
}

impl SensorCapturer for SimLegacyCapturer {
    fn camera_thread(&self) -> Option<Arc<dyn CameraThread>> {
        self.sensor.camera_thread()
    }

    fn supported_sizes(&self) -> Vec<Resolution> {
        self.sensor.sizes.clone()
    }

    fn switch_camera(&mut self, done: SwitchCallback) {
        self.sensor.switch_camera(done);
    }
}

impl LegacySensorCapturer for SimLegacyCapturer {
    fn current_session(&self) -> Option<Arc<dyn LegacySensorSession>> {
        if !self.sensor.is_running() {
            return None;
        }
        Some(Arc::clone(&self.session) as Arc<dyn LegacySensorSession>)
    }
}

/// Modern sensor API stand-in. Clones share state.
#[derive(Clone)]
pub struct SimModernCapturer {
    sensor: SimSensor,
    session: Arc<SimModernSession>,
}

struct SimModernSession {
    characteristics: ModernCharacteristics,
    ratio_control: AtomicBool,
    fail_submissions: AtomicBool,
    requests: Mutex<Vec<RepeatingRequest>>,
    sensor: Arc<SensorState>,
}

impl SimModernCapturer {
    pub fn new(characteristics: ModernCharacteristics) -> Self {
        let sensor = SimSensor::new("sim-modern");
        let session = Arc::new(SimModernSession {
            characteristics,
            ratio_control: AtomicBool::new(true),
            fail_submissions: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
            sensor: Arc::clone(&sensor.state),
        });
        Self { sensor, session }
    }

    /// A 4000x3000 sensor with up to 4x digital zoom.
    pub fn typical() -> Self {
        Self::new(ModernCharacteristics {
            max_digital_zoom: Some(4.0),
            active_array: Some(CropRect::new(0, 0, 4000, 3000)),
        })
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.sensor.name = name.to_string();
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn FrameSink>) -> Self {
        self.sensor.sink = Some(sink);
        self
    }

    pub fn with_sizes(mut self, sizes: Vec<Resolution>) -> Self {
        self.sensor.sizes = sizes;
        self
    }

    pub fn with_facings(mut self, facings: Vec<bool>) -> Self {
        self.sensor.facings = facings;
        self
    }

    pub fn with_ratio_control(self, supported: bool) -> Self {
        self.session.ratio_control.store(supported, Ordering::SeqCst);
        self
    }

    pub(super) fn with_dispose_log(mut self, log: DisposeLog) -> Self {
        self.sensor.disposed = log;
        self
    }

    pub fn failing_start(self) -> Self {
        self.sensor.state.fail_start.store(true, Ordering::SeqCst);
        self
    }

    pub fn set_camera_delay(&self, delay: Duration) {
        *self.sensor.state.delay.lock() = delay;
    }

    pub fn fail_submissions(&self, fail: bool) {
        self.session.fail_submissions.store(fail, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<RepeatingRequest> {
        self.session.requests.lock().clone()
    }

    pub fn switch_count(&self) -> usize {
        self.sensor.state.switches.load(Ordering::SeqCst)
    }
}

impl ModernSensorSession for SimModernSession {
    fn characteristics(&self) -> Option<ModernCharacteristics> {
        self.sensor.pause();
        Some(self.characteristics)
    }

    fn supports_zoom_ratio_control(&self) -> bool {
        self.ratio_control.load(Ordering::SeqCst)
    }

    fn output_surface(&self) -> Option<OutputSurface> {
        Some(OutputSurface(1))
    }

    fn submit_repeating_request(&self, request: RepeatingRequest) -> Result<(), CaptureError> {
        if self.fail_submissions.load(Ordering::SeqCst) {
            return Err(CaptureError::Unknown("capture session closed".to_string()));
        }
        self.requests.lock().push(request);
        Ok(())
    }
}

impl VideoCapturer for SimModernCapturer {
    fn start(&mut self, _width: u32, _height: u32, _frame_rate: u32) -> Result<(), CaptureError> {
        self.sensor.start()
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.sensor.stop()
    }

    fn change_format(&mut self, _width: u32, _height: u32, _frame_rate: u32) -> Result<(), CaptureError> {
        Ok(())
    }

    fn dispose(&mut self) {
        self.sensor.dispose();
    }

    fn supports_zoom(&self) -> bool {
        self.session
            .characteristics
            .max_digital_zoom
            .is_some_and(|max| max > 1.0)
    }
}

impl SensorCapturer for SimModernCapturer {
    fn camera_thread(&self) -> Option<Arc<dyn CameraThread>> {
        self.sensor.camera_thread()
    }

    fn supported_sizes(&self) -> Vec<Resolution> {
        self.sensor.sizes.clone()
    }

    fn switch_camera(&mut self, done: SwitchCallback) {
        self.sensor.switch_camera(done);
    }
}

impl ModernSensorCapturer for SimModernCapturer {
    fn current_session(&self) -> Option<Arc<dyn ModernSensorSession>> {
        if !self.sensor.is_running() {
            return None;
        }
        Some(Arc::clone(&self.session) as Arc<dyn ModernSensorSession>)
    }
}
