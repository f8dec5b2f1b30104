use std::fmt;

use serde::{Deserialize, Serialize};

/// Physical orientation class of a camera device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    Front,
    Back,
    /// Neither front nor back, e.g. a USB webcam.
    External,
}

impl Facing {
    pub fn from_flags(front: bool, back: bool) -> Self {
        if front {
            Self::Front
        } else if back {
            Self::Back
        } else {
            Self::External
        }
    }

    pub fn is_front(self) -> bool {
        matches!(self, Self::Front)
    }
}

/// A camera device as reported by the device enumerator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub name: String,
    pub facing: Facing,
}

impl DeviceDescriptor {
    pub fn new(name: impl Into<String>, facing: Facing) -> Self {
        Self {
            name: name.into(),
            facing,
        }
    }
}

/// The capture mechanism behind an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    LegacySensor,
    ModernSensor,
    ExternalUsb,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LegacySensor => "legacy-sensor",
            Self::ModernSensor => "modern-sensor",
            Self::ExternalUsb => "external-usb",
        };
        f.write_str(name)
    }
}

/// Frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Manhattan distance between two sizes, used for format matching.
    pub fn distance_to(&self, other: &Resolution) -> u64 {
        u64::from(self.width.abs_diff(other.width)) + u64::from(self.height.abs_diff(other.height))
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
