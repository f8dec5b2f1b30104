use serde::{Deserialize, Serialize};

use super::device::{BackendKind, Resolution};

/// Description of a live capture session, reported to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    pub device_name: String,
    pub backend: BackendKind,
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub front_facing: bool,
    pub started_at: String,
}

impl SessionInfo {
    pub fn new(
        device_name: &str,
        backend: BackendKind,
        resolution: Resolution,
        frame_rate: u32,
        front_facing: bool,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            device_name: device_name.to_string(),
            backend,
            width: resolution.width,
            height: resolution.height,
            frame_rate,
            front_facing,
            started_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}
