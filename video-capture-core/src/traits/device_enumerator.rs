use std::sync::Arc;

use crate::backend::BackendAdapter;
use crate::models::device::{DeviceDescriptor, Facing};

use super::frame_sink::FrameSink;

/// Platform camera enumeration.
///
/// Consumed, not implemented, by this crate. Device order is significant:
/// selection scans devices in the order returned here.
pub trait DeviceEnumerator: Send + Sync {
    fn device_names(&self) -> Vec<String>;

    fn is_front_facing(&self, name: &str) -> bool;

    fn is_back_facing(&self, name: &str) -> bool;

    /// Instantiate a capturer for `name`. `None` when the device cannot be
    /// opened right now.
    fn create_capturer(&self, name: &str, sink: Arc<dyn FrameSink>) -> Option<BackendAdapter>;

    fn describe(&self, name: &str) -> DeviceDescriptor {
        let facing = Facing::from_flags(self.is_front_facing(name), self.is_back_facing(name));
        DeviceDescriptor::new(name, facing)
    }

    fn devices(&self) -> Vec<DeviceDescriptor> {
        self.device_names()
            .iter()
            .map(|name| self.describe(name))
            .collect()
    }
}
