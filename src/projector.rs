//! Linear projection of target directions into the camera preview

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::math::{normalize_360, wrap_180};
use crate::types::OrientationEstimate;

/// Camera field of view in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldOfView {
    /// Horizontal extent
    pub horizontal: f32,
    /// Vertical extent
    pub vertical: f32,
}

impl FieldOfView {
    pub fn new(horizontal: f32, vertical: f32) -> Self {
        Self {
            horizontal,
            vertical,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let in_range = |angle: f32| angle > 0.0 && angle <= 180.0;
        if in_range(self.horizontal) && in_range(self.vertical) {
            Ok(())
        } else {
            Err(Error::InvalidSettings(format!(
                "field of view must be within (0, 180] degrees, got {}x{}",
                self.horizontal, self.vertical
            )))
        }
    }
}

impl Default for FieldOfView {
    fn default() -> Self {
        Self::new(60.0, 45.0)
    }
}

/// Preview size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: f32,
    pub height: f32,
}

impl ScreenSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Center of the preview, where the reticle sits
    pub fn center(&self) -> (f32, f32) {
        (self.width / 2.0, self.height / 2.0)
    }
}

impl Default for ScreenSize {
    fn default() -> Self {
        Self::new(360.0, 640.0)
    }
}

/// A fixed direction on the sphere, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Direction {
    pub pitch: f32,
    pub yaw: f32,
}

impl Direction {
    pub fn new(pitch: f32, yaw: f32) -> Self {
        Self { pitch, yaw }
    }
}

/// Where a target lands in the preview for the current orientation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Horizontal pixel position
    pub x: f32,
    /// Vertical pixel position, growing downward
    pub y: f32,
    /// Whether the target lies inside the visible part of the field of view
    pub is_visible: bool,
    /// Shortest signed yaw from the view center to the target, `(-180, 180]`
    pub delta_yaw: f32,
    /// Pitch from the view center to the target
    pub delta_pitch: f32,
}

impl Projection {
    /// Euclidean pixel distance from the projected position to the preview center
    pub fn distance_from_center(&self, screen: ScreenSize) -> f32 {
        let (cx, cy) = screen.center();
        (self.x - cx).hypot(self.y - cy)
    }
}

/// Project a target direction into the preview.
///
/// A small-angle linear mapping: each degree of yaw is `width / fov.h` pixels
/// and each degree of pitch `height / fov.v` pixels. It is only accurate near
/// the optical axis and is not a gnomonic projection.
///
/// Both yaws are normalized before differencing because the estimate may
/// have accumulated several full turns. `visible_fraction` shrinks the
/// visibility window below the full field of view.
///
/// # Example
/// ```
/// use sphere_capture::{Direction, FieldOfView, OrientationEstimate, ScreenSize, project};
///
/// let target = Direction::new(90.0, 350.0);
/// let current = OrientationEstimate::new(90.0, 0.0, 10.0);
/// let screen = ScreenSize::new(360.0, 640.0);
///
/// let projection = project(target, &current, FieldOfView::new(60.0, 45.0), screen, 2.0 / 3.0);
///
/// assert_eq!(projection.delta_yaw, -20.0);
/// assert_eq!(projection.x, 60.0); // 20° left of center at 6 px/°
/// assert!(projection.is_visible);
/// ```
pub fn project(
    target: Direction,
    current: &OrientationEstimate,
    fov: FieldOfView,
    screen: ScreenSize,
    visible_fraction: f32,
) -> Projection {
    let delta_yaw = wrap_180(normalize_360(target.yaw) - normalize_360(current.yaw));
    let delta_pitch = target.pitch - current.pitch;

    let is_visible = delta_yaw.abs() < visible_fraction * fov.horizontal
        && delta_pitch.abs() < visible_fraction * fov.vertical;

    let (cx, cy) = screen.center();
    let x = cx + delta_yaw * (screen.width / fov.horizontal);
    // Higher pitch is further up the preview, i.e. a smaller row
    let y = cy - delta_pitch * (screen.height / fov.vertical);

    Projection {
        x,
        y,
        is_visible,
        delta_yaw,
        delta_pitch,
    }
}
