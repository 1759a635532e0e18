//! Sphere layout generator
//!
//! A layout is a list of ring sizes from the zenith down to the nadir. Both
//! ends are single-point poles; the rings between them are evenly spaced in
//! pitch and each ring's points are evenly spaced in yaw starting at 0°.

use serde::{Deserialize, Serialize};

use crate::constellation::{Constellation, TargetPoint};
use crate::error::{Error, Result};
use crate::math::DEG_TO_RAD;
use crate::projector::{Direction, FieldOfView};
use crate::types::PitchConvention;

/// Built-in constellation densities
///
/// # Densities
/// - **Sparse**: 16 points, rings of 1, 4, 6, 4, 1
/// - **Standard**: 22 points, rings of 1, 6, 8, 6, 1
/// - **Dense**: 32 points, rings of 1, 5, 6, 8, 6, 5, 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Density {
    Sparse,
    #[default]
    Standard,
    Dense,
}

impl Density {
    /// Ring sizes from zenith to nadir
    pub fn ring_sizes(self) -> &'static [usize] {
        match self {
            Density::Sparse => &[1, 4, 6, 4, 1],
            Density::Standard => &[1, 6, 8, 6, 1],
            Density::Dense => &[1, 5, 6, 8, 6, 5, 1],
        }
    }
}

/// How a session chooses its layout
///
/// # Example
/// ```
/// use sphere_capture::{Density, LayoutSpec};
///
/// let layout: LayoutSpec = serde_json::from_str(r#"{ "kind": "preset", "density": "dense" }"#).unwrap();
/// assert_eq!(layout, LayoutSpec::Preset { density: Density::Dense });
/// assert_eq!(layout.resolve().unwrap().total_points(), 32);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayoutSpec {
    /// One of the built-in densities
    Preset { density: Density },
    /// Explicit ring sizes from zenith to nadir
    Rings { ring_sizes: Vec<usize> },
    /// Derived from the camera field of view and the desired overlap
    FieldOfView { fov: FieldOfView, overlap: f32 },
}

impl Default for LayoutSpec {
    fn default() -> Self {
        LayoutSpec::Preset {
            density: Density::default(),
        }
    }
}

impl LayoutSpec {
    /// Build and validate the chosen layout
    pub fn resolve(&self) -> Result<SphereLayout> {
        match self {
            LayoutSpec::Preset { density } => Ok(SphereLayout::preset(*density)),
            LayoutSpec::Rings { ring_sizes } => SphereLayout::new(ring_sizes.clone()),
            LayoutSpec::FieldOfView { fov, overlap } => {
                SphereLayout::for_field_of_view(*fov, *overlap)
            }
        }
    }
}

/// Validated ring structure of a constellation
///
/// # Example
/// ```
/// use sphere_capture::{Density, PitchConvention, SphereLayout};
///
/// let layout = SphereLayout::preset(Density::Standard);
/// assert_eq!(layout.ring_count(), 5);
/// assert_eq!(layout.ring_spacing(), 45.0);
///
/// let constellation = layout.generate(PitchConvention::NadirZero);
/// assert_eq!(constellation.len(), 22);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SphereLayout {
    ring_sizes: Vec<usize>,
}

impl SphereLayout {
    /// Validate explicit ring sizes, zenith first.
    ///
    /// Requires at least three rings, single-point poles at both ends, and no
    /// empty ring.
    pub fn new(ring_sizes: Vec<usize>) -> Result<Self> {
        if ring_sizes.len() < 3 {
            return Err(Error::InvalidLayout(format!(
                "need both poles and at least one ring, got {} ring(s)",
                ring_sizes.len()
            )));
        }
        if ring_sizes.first() != Some(&1) || ring_sizes.last() != Some(&1) {
            return Err(Error::InvalidLayout(
                "zenith and nadir must be single-point rings".into(),
            ));
        }
        if let Some(ring) = ring_sizes.iter().position(|&size| size == 0) {
            return Err(Error::InvalidLayout(format!("ring {ring} is empty")));
        }
        Ok(Self { ring_sizes })
    }

    /// One of the built-in densities
    pub fn preset(density: Density) -> Self {
        Self {
            ring_sizes: density.ring_sizes().to_vec(),
        }
    }

    /// Derive a layout so neighbouring photos overlap by `overlap` of the
    /// field of view.
    ///
    /// Rings are spaced `fov.v * (1 - overlap)` apart at most. A ring at
    /// elevation `e` above the horizon gets `ceil(360 cos(e) / (fov.h * (1 - overlap)))`
    /// points, so rings thin out toward the poles.
    pub fn for_field_of_view(fov: FieldOfView, overlap: f32) -> Result<Self> {
        fov.validate()?;
        if !(0.0..1.0).contains(&overlap) {
            return Err(Error::InvalidLayout(format!(
                "overlap must be within [0, 1), got {overlap}"
            )));
        }

        let vertical_step = fov.vertical * (1.0 - overlap);
        let horizontal_step = fov.horizontal * (1.0 - overlap);
        let intervals = ((180.0 / vertical_step).ceil() as usize).max(2);
        let spacing = 180.0 / intervals as f32;

        let ring_sizes = (0..=intervals)
            .map(|ring| {
                if ring == 0 || ring == intervals {
                    return 1;
                }
                let elevation = 90.0 - ring as f32 * spacing;
                let circumference = 360.0 * (elevation * DEG_TO_RAD).cos();
                ((circumference / horizontal_step).ceil() as usize).max(1)
            })
            .collect();

        Self::new(ring_sizes)
    }

    /// Number of rings including both poles
    pub fn ring_count(&self) -> usize {
        self.ring_sizes.len()
    }

    /// Ring sizes from zenith to nadir
    pub fn ring_sizes(&self) -> &[usize] {
        &self.ring_sizes
    }

    /// Total number of target points
    pub fn total_points(&self) -> usize {
        self.ring_sizes.iter().sum()
    }

    /// Pitch between adjacent rings, `180 / (R - 1)`
    pub fn ring_spacing(&self) -> f32 {
        180.0 / (self.ring_count() - 1) as f32
    }

    /// Pitch of ring `ring` (0 is the zenith) in the given convention
    pub fn ring_pitch(&self, ring: usize, convention: PitchConvention) -> f32 {
        convention.zenith() - ring as f32 * self.ring_spacing()
    }

    /// Generate the constellation, zenith first and nadir last.
    ///
    /// Ids are assigned sequentially in this order.
    pub fn generate(&self, convention: PitchConvention) -> Constellation {
        let mut points = Vec::with_capacity(self.total_points());

        for (ring, &size) in self.ring_sizes.iter().enumerate() {
            let pitch = self.ring_pitch(ring, convention);
            let yaw_step = 360.0 / size as f32;

            for slot in 0..size {
                let id = points.len() as u32;
                let direction = Direction::new(pitch, slot as f32 * yaw_step);
                points.push(TargetPoint::new(id, ring, direction));
            }
        }

        Constellation::new(points, convention)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_standard_layout_rings() {
        let constellation = SphereLayout::preset(Density::Standard).generate(PitchConvention::NadirZero);
        assert_eq!(constellation.len(), 22);

        let pitches: Vec<f32> = constellation.iter().map(|point| point.pitch()).collect();
        assert_eq!(pitches[0], 180.0);
        assert!(pitches[1..7].iter().all(|&pitch| pitch == 135.0));
        assert!(pitches[7..15].iter().all(|&pitch| pitch == 90.0));
        assert!(pitches[15..21].iter().all(|&pitch| pitch == 45.0));
        assert_eq!(pitches[21], 0.0);
    }

    #[test]
    fn test_ids_unique_and_sequential() {
        for density in [Density::Sparse, Density::Standard, Density::Dense] {
            let constellation = SphereLayout::preset(density).generate(PitchConvention::NadirZero);
            let ids: HashSet<_> = constellation.iter().map(|point| point.id()).collect();
            assert_eq!(ids.len(), constellation.len());
            assert!(constellation.iter().enumerate().all(|(i, point)| point.id().0 == i as u32));
        }
    }

    #[test]
    fn test_preset_sizes() {
        assert_eq!(SphereLayout::preset(Density::Sparse).total_points(), 16);
        assert_eq!(SphereLayout::preset(Density::Standard).total_points(), 22);
        assert_eq!(SphereLayout::preset(Density::Dense).total_points(), 32);
        assert_eq!(SphereLayout::preset(Density::Dense).ring_spacing(), 30.0);
    }

    #[test]
    fn test_ring_yaw_spacing() {
        let constellation = SphereLayout::preset(Density::Dense).generate(PitchConvention::NadirZero);

        for ring in 1..6 {
            let yaws: Vec<f32> = constellation
                .iter()
                .filter(|point| point.ring() == ring)
                .map(|point| point.yaw())
                .collect();
            let step = 360.0 / yaws.len() as f32;
            assert_eq!(yaws[0], 0.0);
            for pair in yaws.windows(2) {
                assert!((pair[1] - pair[0] - step).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn test_horizon_zero_pitches() {
        let layout = SphereLayout::preset(Density::Standard);
        assert_eq!(layout.ring_pitch(0, PitchConvention::HorizonZero), 90.0);
        assert_eq!(layout.ring_pitch(2, PitchConvention::HorizonZero), 0.0);
        assert_eq!(layout.ring_pitch(4, PitchConvention::HorizonZero), -90.0);
    }

    #[test]
    fn test_poles_have_zero_yaw() {
        let constellation = SphereLayout::preset(Density::Sparse).generate(PitchConvention::HorizonZero);
        let first = constellation.get(0).unwrap();
        let last = constellation.get(constellation.len() - 1).unwrap();
        assert_eq!((first.pitch(), first.yaw()), (90.0, 0.0));
        assert_eq!((last.pitch(), last.yaw()), (-90.0, 0.0));
    }

    #[test]
    fn test_invalid_layouts() {
        assert!(matches!(SphereLayout::new(vec![1, 1]), Err(Error::InvalidLayout(_))));
        assert!(matches!(SphereLayout::new(vec![2, 6, 1]), Err(Error::InvalidLayout(_))));
        assert!(matches!(SphereLayout::new(vec![1, 0, 1]), Err(Error::InvalidLayout(_))));
        assert!(SphereLayout::new(vec![1, 3, 1]).is_ok());
    }

    #[test]
    fn test_layout_from_field_of_view() {
        let layout = SphereLayout::for_field_of_view(FieldOfView::new(60.0, 45.0), 0.5).unwrap();

        // 45° * 0.5 = 22.5° between rings: 8 intervals
        assert_eq!(layout.ring_count(), 9);
        assert_eq!(layout.ring_spacing(), 22.5);

        let sizes = layout.ring_sizes();
        assert_eq!((sizes[0], sizes[8]), (1, 1));
        // The horizon ring is the densest: 360° / 30° = 12
        assert_eq!(sizes[4], 12);
        assert!(sizes[1] < sizes[2] && sizes[2] < sizes[3]);
        // Symmetric about the horizon
        for ring in 0..4 {
            assert_eq!(sizes[ring], sizes[8 - ring]);
        }
    }

    #[test]
    fn test_layout_rejects_full_overlap() {
        let result = SphereLayout::for_field_of_view(FieldOfView::default(), 1.0);
        assert!(matches!(result, Err(Error::InvalidLayout(_))));
    }

    #[test]
    fn test_layout_choice_resolution() {
        let rings = LayoutSpec::Rings {
            ring_sizes: vec![1, 4, 1],
        };
        assert_eq!(rings.resolve().unwrap().total_points(), 6);
        assert_eq!(LayoutSpec::default().resolve().unwrap().total_points(), 22);
    }
}
