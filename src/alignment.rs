//! Alignment predicate between a projected target and the view center

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::projector::{Direction, Projection};
use crate::types::{AlignmentSettings, PitchConvention, ViewSettings};

/// How closely a target must match the view center to trigger a capture
///
/// # Example
/// ```
/// use sphere_capture::AlignmentCriterion;
///
/// let criterion: AlignmentCriterion = serde_json::from_str(r#"{ "angular": { "threshold": 3.0 } }"#).unwrap();
/// assert_eq!(criterion, AlignmentCriterion::Angular { threshold: 3.0 });
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentCriterion {
    /// Projected position within `radius` pixels of the preview center
    Pixel { radius: f32 },
    /// Pitch and yaw each within `threshold` degrees of the view center
    Angular { threshold: f32 },
}

impl Default for AlignmentCriterion {
    fn default() -> Self {
        AlignmentCriterion::Pixel { radius: 20.0 }
    }
}

impl AlignmentCriterion {
    pub fn validate(&self) -> Result<()> {
        match *self {
            AlignmentCriterion::Pixel { radius } if !(radius > 0.0) => Err(Error::InvalidSettings(
                format!("alignment radius must be positive, got {radius}"),
            )),
            AlignmentCriterion::Angular { threshold } if !(threshold > 0.0) => {
                Err(Error::InvalidSettings(format!(
                    "alignment threshold must be positive, got {threshold}"
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Whether `target`, projected as `projection`, is aligned with the view.
///
/// Within `pole_band` degrees of either pole yaw is meaningless, so only the
/// pitch component is compared there: the vertical pixel offset for
/// [`AlignmentCriterion::Pixel`] or the pitch difference for
/// [`AlignmentCriterion::Angular`].
///
/// # Example
/// ```
/// use sphere_capture::{
///     AlignmentSettings, Direction, OrientationEstimate, PitchConvention, ViewSettings,
///     is_aligned, project,
/// };
///
/// let view = ViewSettings::default();
/// let target = Direction::new(179.0, 0.0);
/// // Looking almost straight up but turned 170° away from the target's yaw
/// let current = OrientationEstimate::new(179.0, 0.0, 170.0);
///
/// let projection = project(target, &current, view.fov, view.screen, view.visible_fraction);
/// let aligned = is_aligned(target, &projection, &AlignmentSettings::default(), &view, PitchConvention::NadirZero);
///
/// assert!(aligned);
/// ```
pub fn is_aligned(
    target: Direction,
    projection: &Projection,
    alignment: &AlignmentSettings,
    view: &ViewSettings,
    convention: PitchConvention,
) -> bool {
    let near_pole = convention.distance_to_pole(target.pitch) < alignment.pole_band;

    match alignment.criterion {
        AlignmentCriterion::Pixel { radius } => {
            if near_pole {
                let (_, cy) = view.screen.center();
                (projection.y - cy).abs() < radius
            } else {
                projection.distance_from_center(view.screen) < radius
            }
        }
        AlignmentCriterion::Angular { threshold } => {
            projection.delta_pitch.abs() < threshold
                && (near_pole || projection.delta_yaw.abs() < threshold)
        }
    }
}
