use serde::{Deserialize, Serialize};

use super::error::CaptureError;

/// Requested camera facing, as expressed by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    User,
    Environment,
}

impl FacingMode {
    /// Whether this facing mode asks for a front (user) camera.
    pub fn wants_front(self) -> bool {
        matches!(self, Self::User)
    }
}

/// Caller constraints for a capture controller.
///
/// Supplied once at construction; never mutated afterwards. Deserializes from
/// the host's camelCase constraint map:
///
/// ```text
/// { "deviceId": "1", "facingMode": "environment",
///   "width": 1280, "height": 720, "frameRate": 30 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureConstraints {
    /// Index into the enumerator's device list, as a string.
    #[serde(default)]
    pub device_id: Option<String>,

    /// Preferred facing; front (user) when absent.
    #[serde(default)]
    pub facing_mode: Option<FacingMode>,

    #[serde(rename = "width")]
    pub target_width: u32,

    #[serde(rename = "height")]
    pub target_height: u32,

    #[serde(rename = "frameRate")]
    pub target_frame_rate: u32,
}

impl CaptureConstraints {
    pub fn new(target_width: u32, target_height: u32, target_frame_rate: u32) -> Self {
        Self {
            device_id: None,
            facing_mode: None,
            target_width,
            target_height,
            target_frame_rate,
        }
    }

    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn with_facing_mode(mut self, facing_mode: FacingMode) -> Self {
        self.facing_mode = Some(facing_mode);
        self
    }

    /// Parse and validate a host constraint map given as JSON.
    pub fn from_json(json: &str) -> Result<Self, CaptureError> {
        let constraints: Self = serde_json::from_str(json)
            .map_err(|e| CaptureError::ConfigurationFailed(format!("invalid constraints: {}", e)))?;
        constraints
            .validate()
            .map_err(CaptureError::ConfigurationFailed)?;
        Ok(constraints)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.target_width == 0 || self.target_height == 0 {
            return Err(format!(
                "target size must be positive: {}x{}",
                self.target_width, self.target_height
            ));
        }
        if self.target_frame_rate == 0 {
            return Err("target frame rate must be positive".into());
        }
        Ok(())
    }

    /// The requested device index, when `device_id` parses as one.
    ///
    /// Whether the index is in range is for the caller to decide.
    pub fn device_index(&self) -> Option<usize> {
        self.device_id.as_deref()?.parse().ok()
    }

    /// Whether the caller wants a front camera (the default).
    pub fn wants_front(&self) -> bool {
        self.facing_mode.map_or(true, FacingMode::wants_front)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_constraint_map() {
        let json = r#"{"deviceId":"1","facingMode":"environment","width":1280,"height":720,"frameRate":30}"#;
        let constraints = CaptureConstraints::from_json(json).unwrap();

        assert_eq!(constraints.device_id.as_deref(), Some("1"));
        assert_eq!(constraints.facing_mode, Some(FacingMode::Environment));
        assert_eq!(constraints.target_width, 1280);
        assert_eq!(constraints.target_height, 720);
        assert_eq!(constraints.target_frame_rate, 30);
        assert_eq!(constraints.device_index(), Some(1));
        assert!(!constraints.wants_front());
    }

    #[test]
    fn device_index_must_be_a_bare_integer() {
        let mut constraints = CaptureConstraints::new(640, 480, 15);
        for id in [" 1", "1 ", "+x", "-1", "one", ""] {
            constraints.device_id = Some(id.into());
            assert_eq!(constraints.device_index(), None, "{:?}", id);
        }
        constraints.device_id = Some("2".into());
        assert_eq!(constraints.device_index(), Some(2));
    }

    #[test]
    fn optional_fields_default_to_front_camera() {
        let constraints =
            CaptureConstraints::from_json(r#"{"width":640,"height":480,"frameRate":15}"#).unwrap();

        assert!(constraints.device_id.is_none());
        assert!(constraints.facing_mode.is_none());
        assert!(constraints.wants_front());
    }

    #[test]
    fn rejects_zero_sized_target() {
        let err =
            CaptureConstraints::from_json(r#"{"width":0,"height":480,"frameRate":15}"#).unwrap_err();
        assert!(matches!(err, CaptureError::ConfigurationFailed(_)));
    }

    #[test]
    fn non_numeric_device_id_has_no_index() {
        let constraints = CaptureConstraints::new(640, 480, 30).with_device_id("front-camera");
        assert_eq!(constraints.device_index(), None);

        let constraints = CaptureConstraints::new(640, 480, 30).with_device_id("-1");
        assert_eq!(constraints.device_index(), None);
    }
}
