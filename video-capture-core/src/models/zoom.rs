//! Zoom state and the pure arithmetic shared by every backend.
//!
//! A caller-supplied delta is a fraction of the backend's full zoom range in
//! `[-1.0, 1.0]`. Results always clamp into the backend's valid range.

use serde::{Deserialize, Serialize};

/// Smallest ratio change that is worth re-issuing a capture request for.
pub const RATIO_EPSILON: f32 = 0.001;

/// Backend-specific zoom position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ZoomState {
    /// Discrete zoom index in `[0, max]`.
    Discrete { current: i32, max: i32 },
    /// Continuous zoom ratio in `[1.0, max]`.
    Ratio { current: f32, max: f32 },
}

impl ZoomState {
    /// Apply a normalized delta, returning the clamped next state.
    pub fn stepped(&self, delta: f32) -> ZoomState {
        match *self {
            Self::Discrete { current, max } => Self::Discrete {
                current: discrete_target(current, max, delta),
                max,
            },
            Self::Ratio { current, max } => Self::Ratio {
                current: ratio_target(current, max, delta),
                max,
            },
        }
    }

    /// Whether moving to `next` would change anything on the device.
    pub fn differs_from(&self, next: &ZoomState) -> bool {
        match (*self, *next) {
            (Self::Discrete { current: a, .. }, Self::Discrete { current: b, .. }) => a != b,
            (Self::Ratio { current: a, .. }, Self::Ratio { current: b, .. }) => {
                (a - b).abs() >= RATIO_EPSILON
            }
            _ => true,
        }
    }
}

/// Clamp a caller-supplied delta into `[-1.0, 1.0]`.
///
/// Returns `None` for NaN or infinite input.
pub fn normalize_delta(delta: f32) -> Option<f32> {
    if !delta.is_finite() {
        return None;
    }
    Some(delta.clamp(-1.0, 1.0))
}

/// Round half up, the way sensor zoom indices have always been stepped.
fn round_half_up(value: f32) -> i32 {
    (value + 0.5).floor() as i32
}

/// `clamp(current + round(delta * max), 0, max)`.
pub fn discrete_target(current: i32, max: i32, delta: f32) -> i32 {
    let max = max.max(0);
    let step = round_half_up(delta * max as f32);
    current.saturating_add(step).clamp(0, max)
}

/// `clamp(current + delta * (max - 1), 1.0, max)`.
pub fn ratio_target(current: f32, max: f32, delta: f32) -> f32 {
    let max = max.max(1.0);
    (current + delta * (max - 1.0)).clamp(1.0, max)
}

/// Axis-aligned rectangle in sensor pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CropRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl CropRect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn center_x(&self) -> i32 {
        (self.left + self.right) >> 1
    }

    pub fn center_y(&self) -> i32 {
        (self.top + self.bottom) >> 1
    }
}

/// Centered crop of the active pixel array equivalent to `ratio` zoom.
pub fn crop_region_for_zoom(active: &CropRect, ratio: f32) -> CropRect {
    let ratio = ratio.max(1.0);
    let half_w = (0.5 * active.width() as f32 / ratio) as i32;
    let half_h = (0.5 * active.height() as f32 / ratio) as i32;
    let cx = active.center_x();
    let cy = active.center_y();
    CropRect::new(cx - half_w, cy - half_h, cx + half_w, cy + half_h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn discrete_step_clamps_to_zero() {
        assert_eq!(discrete_target(5, 10, -1.0), 0);
    }

    #[test]
    fn discrete_step_clamps_to_max() {
        assert_eq!(discrete_target(8, 10, 0.5), 10);
    }

    #[test]
    fn discrete_step_rounds_half_up() {
        // 0.25 * 2 = 0.5 -> 1, -0.25 * 2 = -0.5 -> 0
        assert_eq!(discrete_target(1, 2, 0.25), 2);
        assert_eq!(discrete_target(1, 2, -0.25), 1);
        assert_eq!(discrete_target(3, 10, 0.1), 4);
        assert_eq!(discrete_target(3, 10, -0.1), 2);
    }

    #[test]
    fn discrete_with_no_range_stays_at_zero() {
        assert_eq!(discrete_target(0, 0, 1.0), 0);
    }

    #[test]
    fn ratio_step_scales_by_range() {
        assert_relative_eq!(ratio_target(1.0, 4.0, 0.5), 2.5);
        assert_relative_eq!(ratio_target(2.5, 4.0, -0.1), 2.2, epsilon = 1e-6);
    }

    #[test]
    fn ratio_step_clamps() {
        assert_relative_eq!(ratio_target(1.0, 4.0, -1.0), 1.0);
        assert_relative_eq!(ratio_target(3.9, 4.0, 1.0), 4.0);
    }

    #[test]
    fn normalize_rejects_non_finite() {
        assert_eq!(normalize_delta(f32::NAN), None);
        assert_eq!(normalize_delta(f32::INFINITY), None);
        assert_eq!(normalize_delta(3.0), Some(1.0));
        assert_eq!(normalize_delta(-7.5), Some(-1.0));
        assert_eq!(normalize_delta(0.25), Some(0.25));
    }

    #[test]
    fn state_detects_no_op_steps() {
        let edge = ZoomState::Discrete { current: 10, max: 10 };
        assert!(!edge.differs_from(&edge.stepped(0.1)));

        let ratio = ZoomState::Ratio { current: 2.0, max: 4.0 };
        assert!(!ratio.differs_from(&ratio.stepped(0.0001)));
        assert!(ratio.differs_from(&ratio.stepped(0.1)));
    }

    #[test]
    fn crop_region_is_centered() {
        let active = CropRect::new(0, 0, 4000, 3000);
        let crop = crop_region_for_zoom(&active, 2.0);

        assert_eq!(crop, CropRect::new(1000, 750, 3000, 2250));
        assert_eq!(crop.center_x(), active.center_x());
        assert_eq!(crop.center_y(), active.center_y());
    }

    #[test]
    fn crop_region_at_unit_ratio_covers_array() {
        let active = CropRect::new(0, 0, 4032, 3024);
        assert_eq!(crop_region_for_zoom(&active, 1.0), active);
    }
}
