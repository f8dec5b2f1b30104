use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{BackendAdapter, LegacySensorAdapter, ModernSensorAdapter};
use crate::models::device::{Facing, Resolution};
use crate::traits::device_enumerator::DeviceEnumerator;
use crate::traits::frame_sink::FrameSink;
use crate::traits::sensor::{CameraThread, LegacyParameters, SensorCapturer};

use super::sensor::{DisposeLog, SimLegacyCapturer, SimModernCapturer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SimBackend {
    Legacy,
    Modern,
    /// Enumerated, but `create_capturer` returns `None`.
    Unavailable,
}

/// One enumerated camera.
#[derive(Debug, Clone)]
pub struct SimDevice {
    name: String,
    facing: Facing,
    backend: SimBackend,
    sizes: Vec<Resolution>,
    legacy_zoom: (i32, i32),
    fail_start: bool,
}

impl SimDevice {
    fn new(name: &str, facing: Facing, backend: SimBackend) -> Self {
        Self {
            name: name.to_string(),
            facing,
            backend,
            sizes: vec![
                Resolution::new(640, 480),
                Resolution::new(1280, 720),
                Resolution::new(1920, 1080),
            ],
            legacy_zoom: (0, 10),
            fail_start: false,
        }
    }

    pub fn legacy(name: &str, facing: Facing) -> Self {
        Self::new(name, facing, SimBackend::Legacy)
    }

    pub fn modern(name: &str, facing: Facing) -> Self {
        Self::new(name, facing, SimBackend::Modern)
    }

    pub fn unavailable(name: &str, facing: Facing) -> Self {
        Self::new(name, facing, SimBackend::Unavailable)
    }

    pub fn with_sizes(mut self, sizes: Vec<Resolution>) -> Self {
        self.sizes = sizes;
        self
    }

    /// Initial zoom index and maximum for a legacy device.
    pub fn with_legacy_zoom(mut self, current: i32, max: i32) -> Self {
        self.legacy_zoom = (current, max);
        self
    }

    /// The capturer is created but refuses to start.
    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }
}

enum Created {
    Legacy(SimLegacyCapturer),
    Modern(SimModernCapturer),
}

/// Device enumerator over a fixed list of simulated cameras.
///
/// Records every `create_capturer` call and keeps a handle to each capturer
/// it hands out so tests can inspect sensor state afterwards.
pub struct SimEnumerator {
    devices: Vec<SimDevice>,
    attempts: Mutex<Vec<String>>,
    created: Mutex<Vec<(String, Created)>>,
    disposed: DisposeLog,
}

impl SimEnumerator {
    pub fn new(devices: Vec<SimDevice>) -> Self {
        Self {
            devices,
            attempts: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            disposed: DisposeLog::default(),
        }
    }

    /// Device names passed to `create_capturer`, in call order.
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().clone()
    }

    /// Names of capturers that have been disposed, in order.
    pub fn disposed(&self) -> Vec<String> {
        self.disposed.lock().clone()
    }

    /// Current zoom index of the latest legacy capturer made for `name`.
    pub fn legacy_zoom(&self, name: &str) -> Option<i32> {
        self.created
            .lock()
            .iter()
            .rev()
            .find_map(|(created_for, capturer)| match capturer {
                Created::Legacy(legacy) if created_for == name => Some(legacy.parameters().zoom),
                _ => None,
            })
    }

    /// Camera switches performed by the latest capturer made for `name`.
    pub fn switch_count(&self, name: &str) -> usize {
        self.created
            .lock()
            .iter()
            .rev()
            .find(|(created_for, _)| created_for == name)
            .map_or(0, |(_, capturer)| match capturer {
                Created::Legacy(legacy) => legacy.switch_count(),
                Created::Modern(modern) => modern.switch_count(),
            })
    }

    /// Camera thread of the latest capturer made for `name`, while it runs.
    pub fn camera_thread(&self, name: &str) -> Option<Arc<dyn CameraThread>> {
        self.created
            .lock()
            .iter()
            .rev()
            .find(|(created_for, _)| created_for == name)
            .and_then(|(_, capturer)| match capturer {
                Created::Legacy(legacy) => legacy.camera_thread(),
                Created::Modern(modern) => modern.camera_thread(),
            })
    }

    /// Front flags in switch order starting from the device at `index`.
    fn facings_from(&self, index: usize) -> Vec<bool> {
        self.devices
            .iter()
            .cycle()
            .skip(index)
            .take(self.devices.len())
            .map(|device| device.facing.is_front())
            .collect()
    }
}

impl DeviceEnumerator for SimEnumerator {
    fn device_names(&self) -> Vec<String> {
        self.devices.iter().map(|device| device.name.clone()).collect()
    }

    fn is_front_facing(&self, name: &str) -> bool {
        self.devices
            .iter()
            .any(|device| device.name == name && device.facing == Facing::Front)
    }

    fn is_back_facing(&self, name: &str) -> bool {
        self.devices
            .iter()
            .any(|device| device.name == name && device.facing == Facing::Back)
    }

    fn create_capturer(&self, name: &str, sink: Arc<dyn FrameSink>) -> Option<BackendAdapter> {
        self.attempts.lock().push(name.to_string());
        let index = self.devices.iter().position(|device| device.name == name)?;
        let device = &self.devices[index];
        let facings = self.facings_from(index);

        match device.backend {
            SimBackend::Unavailable => None,
            SimBackend::Legacy => {
                let (zoom, max_zoom) = device.legacy_zoom;
                let mut capturer = SimLegacyCapturer::new(LegacyParameters {
                    zoom_supported: max_zoom > 0,
                    zoom,
                    max_zoom,
                })
                .with_name(name)
                .with_sink(sink)
                .with_sizes(device.sizes.clone())
                .with_facings(facings)
                .with_dispose_log(Arc::clone(&self.disposed));
                if device.fail_start {
                    capturer = capturer.failing_start();
                }
                self.created
                    .lock()
                    .push((name.to_string(), Created::Legacy(capturer.clone())));
                Some(LegacySensorAdapter::new(Box::new(capturer)).into())
            }
            SimBackend::Modern => {
                let mut capturer = SimModernCapturer::typical()
                    .with_name(name)
                    .with_sink(sink)
                    .with_sizes(device.sizes.clone())
                    .with_facings(facings)
                    .with_dispose_log(Arc::clone(&self.disposed));
                if device.fail_start {
                    capturer = capturer.failing_start();
                }
                self.created
                    .lock()
                    .push((name.to_string(), Created::Modern(capturer.clone())));
                Some(ModernSensorAdapter::new(Box::new(capturer)).into())
            }
        }
    }
}
