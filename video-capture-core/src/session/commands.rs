use std::sync::Arc;

use crate::models::config::ControllerConfig;

use super::controller::CaptureController;
use super::registry::ActiveInstanceRegistry;

/// Zoom entry points for callers that do not hold a controller, such as
/// hardware volume-key handlers. Commands reach whichever controller is
/// currently registered as active.
#[derive(Clone)]
pub struct ZoomCommands {
    registry: Arc<ActiveInstanceRegistry<CaptureController>>,
    step: f32,
}

impl ZoomCommands {
    pub fn new(registry: Arc<ActiveInstanceRegistry<CaptureController>>, config: &ControllerConfig) -> Self {
        Self {
            registry,
            step: config.zoom_step,
        }
    }

    pub fn step_zoom_in(&self) -> bool {
        self.adjust_active(self.step)
    }

    pub fn step_zoom_out(&self) -> bool {
        self.adjust_active(-self.step)
    }

    /// Apply `delta` to the active controller. `false` when none is active.
    pub fn adjust_active(&self, delta: f32) -> bool {
        match self.registry.current() {
            Some(controller) => controller.adjust_zoom(delta),
            None => {
                log::debug!("Zoom ignored: no active camera capture controller");
                false
            }
        }
    }
}
