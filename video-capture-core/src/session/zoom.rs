//! Routes a normalized zoom delta to whichever backend is live.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::backend::BackendAdapter;
use crate::bridge::UsbZoomHandle;
use crate::models::error::DispatchError;
use crate::models::zoom::{crop_region_for_zoom, normalize_delta, ZoomState};
use crate::runtime::run_with_timeout;
use crate::traits::sensor::{
    CameraThread, ControlMode, LegacySensorSession, ModernSensorSession, RepeatingRequest,
    RequestTemplate, ZoomControl,
};

/// Everything a zoom step needs, detached from the adapter lock.
pub enum ZoomRoute {
    Usb(UsbZoomHandle),
    Legacy {
        thread: Arc<dyn CameraThread>,
        session: Arc<dyn LegacySensorSession>,
    },
    Modern {
        thread: Arc<dyn CameraThread>,
        session: Arc<dyn ModernSensorSession>,
        ratio: Arc<Mutex<f32>>,
    },
}

impl ZoomRoute {
    /// Resolve the route for `adapter`, or `None` if it cannot zoom right now.
    pub fn for_adapter(adapter: &BackendAdapter) -> Option<Self> {
        match adapter {
            BackendAdapter::ExternalUsb(usb) => {
                let handle = usb.zoom_handle();
                if handle.is_none() {
                    log::debug!("Zoom ignored: USB capture not started");
                }
                handle.map(Self::Usb)
            }
            BackendAdapter::Legacy(legacy) => {
                let (thread, session) = sensor_parts(legacy.camera_thread(), legacy.current_session())?;
                Some(Self::Legacy { thread, session })
            }
            BackendAdapter::Modern(modern) => {
                let (thread, session) = sensor_parts(modern.camera_thread(), modern.current_session())?;
                Some(Self::Modern {
                    thread,
                    session,
                    ratio: modern.zoom_ratio_cell(),
                })
            }
        }
    }
}

fn sensor_parts<S: ?Sized>(
    thread: Option<Arc<dyn CameraThread>>,
    session: Option<Arc<S>>,
) -> Option<(Arc<dyn CameraThread>, Arc<S>)> {
    let Some(thread) = thread else {
        log::debug!("Zoom ignored: camera thread handler unavailable");
        return None;
    };
    let Some(session) = session else {
        log::debug!("Zoom ignored: camera session unavailable");
        return None;
    };
    Some((thread, session))
}

/// Applies zoom steps with a bounded wait on the thread owning the session.
#[derive(Debug, Clone)]
pub struct ZoomCoordinator {
    timeout: Duration,
}

impl ZoomCoordinator {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// `true` when the step was applied or the zoom is already at the edge.
    pub fn apply(&self, route: ZoomRoute, delta: f32) -> bool {
        let Some(delta) = normalize_delta(delta) else {
            log::debug!("Zoom ignored: non-finite delta");
            return false;
        };

        match route {
            ZoomRoute::Usb(handle) => handle.apply(delta, self.timeout),
            ZoomRoute::Legacy { thread, session } => {
                self.on_camera_thread(&thread, move || apply_legacy_zoom(session.as_ref(), delta))
            }
            ZoomRoute::Modern {
                thread,
                session,
                ratio,
            } => self.on_camera_thread(&thread, move || {
                apply_modern_zoom(session.as_ref(), &ratio, delta)
            }),
        }
    }

    fn on_camera_thread<F>(&self, thread: &Arc<dyn CameraThread>, task: F) -> bool
    where
        F: FnOnce() -> bool + Send + 'static,
    {
        match run_with_timeout(|t| thread.post(t), self.timeout, task) {
            Ok(applied) => applied,
            Err(DispatchError::Timeout) => {
                log::warn!("Timed out applying camera zoom after {:?}", self.timeout);
                false
            }
            Err(e) => {
                log::warn!("Failed applying camera zoom: {}", e);
                false
            }
        }
    }
}

/// Step the legacy parameter block's zoom index. Camera thread only.
fn apply_legacy_zoom(session: &dyn LegacySensorSession, delta: f32) -> bool {
    let mut params = match session.parameters() {
        Ok(params) => params,
        Err(e) => {
            log::warn!("Failed reading camera parameters: {}", e);
            return false;
        }
    };
    if !params.zoom_supported {
        log::debug!("Zoom ignored: camera parameters do not support zoom");
        return false;
    }

    let state = ZoomState::Discrete {
        current: params.zoom,
        max: params.max_zoom,
    };
    let next = state.stepped(delta);
    if !state.differs_from(&next) {
        return true;
    }
    let ZoomState::Discrete { current: target, .. } = next else {
        return false;
    };

    params.zoom = target;
    match session.set_parameters(&params) {
        Ok(()) => {
            log::debug!("Applied camera zoom index={} max={}", target, params.max_zoom);
            true
        }
        Err(e) => {
            log::warn!("Failed applying camera zoom: {}", e);
            false
        }
    }
}

/// Step the tracked zoom ratio and resubmit the repeating request. Camera
/// thread only.
fn apply_modern_zoom(session: &dyn ModernSensorSession, ratio: &Mutex<f32>, delta: f32) -> bool {
    let Some(characteristics) = session.characteristics() else {
        log::debug!("Zoom ignored: camera characteristics unavailable");
        return false;
    };
    let max = match characteristics.max_digital_zoom {
        Some(max) if max > 1.0 => max,
        _ => {
            log::debug!("Zoom ignored: camera has no digital zoom range");
            return false;
        }
    };
    let Some(active_array) = characteristics.active_array else {
        log::debug!("Zoom ignored: active array size unavailable");
        return false;
    };

    let state = ZoomState::Ratio {
        current: *ratio.lock(),
        max,
    };
    let next = state.stepped(delta);
    if !state.differs_from(&next) {
        return true;
    }
    let ZoomState::Ratio { current: target, .. } = next else {
        return false;
    };

    let Some(surface) = session.output_surface() else {
        log::debug!("Zoom ignored: capture surface unavailable");
        return false;
    };
    let zoom = if session.supports_zoom_ratio_control() {
        ZoomControl::Ratio(target)
    } else {
        ZoomControl::CropRegion(crop_region_for_zoom(&active_array, target))
    };
    let request = RepeatingRequest {
        template: RequestTemplate::Record,
        control_mode: ControlMode::Auto,
        target: surface,
        zoom,
    };

    match session.submit_repeating_request(request) {
        Ok(()) => {
            *ratio.lock() = target;
            log::debug!("Applied camera zoom ratio={:.3} max={:.3}", target, max);
            true
        }
        Err(e) => {
            log::warn!("Failed applying camera zoom: {}", e);
            false
        }
    }
}
