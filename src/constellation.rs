//! Target points and the constellation a session must visit

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::math::normalize_360;
use crate::projector::Direction;
use crate::types::PitchConvention;

/// Stable identifier of a target point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(pub u32);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A photo returned by the capture sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedImage {
    /// Where the sink stored the photo
    pub path: PathBuf,
}

impl CapturedImage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// A direction on the sphere that must be photographed once
///
/// The direction never changes after construction. Capture state moves from
/// uncaptured to captured exactly once, by replacing the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetPoint {
    id: TargetId,
    ring: usize,
    pitch: f32,
    yaw: f32,
    image: Option<CapturedImage>,
}

impl TargetPoint {
    pub(crate) fn new(id: u32, ring: usize, direction: Direction) -> Self {
        Self {
            id: TargetId(id),
            ring,
            pitch: direction.pitch,
            yaw: direction.yaw,
            image: None,
        }
    }

    pub fn id(&self) -> TargetId {
        self.id
    }

    /// Ring index, 0 at the zenith
    pub fn ring(&self) -> usize {
        self.ring
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Yaw in `[0, 360)`
    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn direction(&self) -> Direction {
        Direction::new(self.pitch, self.yaw)
    }

    pub fn is_captured(&self) -> bool {
        self.image.is_some()
    }

    /// Photo taken for this target, once captured
    pub fn image(&self) -> Option<&CapturedImage> {
        self.image.as_ref()
    }

    /// A copy of this target marked as captured by `image`
    pub fn with_capture(&self, image: CapturedImage) -> Self {
        Self {
            image: Some(image),
            ..self.clone()
        }
    }
}

/// Pose of one captured photo in the stitching manifest
///
/// Pitch is always nadir-referenced (0 straight down, 180 straight up) and
/// yaw is in `[0, 360)`, whatever convention the session ran in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StitchPose {
    pub path: PathBuf,
    pub pitch: f32,
    pub yaw: f32,
}

#[derive(Serialize)]
struct PoseEntry {
    pitch: f32,
    yaw: f32,
}

/// Ordered, fixed-size set of target points
///
/// Built once by [`SphereLayout::generate`](crate::SphereLayout::generate).
/// Points are never added or removed; capturing a target replaces its record.
///
/// # Example
/// ```
/// use sphere_capture::{CapturedImage, Density, PitchConvention, SphereLayout};
///
/// let mut constellation = SphereLayout::preset(Density::Sparse).generate(PitchConvention::NadirZero);
/// constellation.mark_captured(0, CapturedImage::new("zenith.jpg")).unwrap();
///
/// assert_eq!(constellation.captured_count(), 1);
/// assert!(constellation.mark_captured(0, CapturedImage::new("again.jpg")).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constellation {
    convention: PitchConvention,
    points: Vec<TargetPoint>,
}

impl Constellation {
    pub(crate) fn new(points: Vec<TargetPoint>, convention: PitchConvention) -> Self {
        Self { convention, points }
    }

    /// Pitch convention the target pitches are expressed in
    pub fn convention(&self) -> PitchConvention {
        self.convention
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TargetPoint> {
        self.points.get(index)
    }

    /// Targets in constellation order, zenith first
    pub fn iter(&self) -> impl Iterator<Item = &TargetPoint> {
        self.points.iter()
    }

    /// Indices and targets not yet captured, in constellation order
    pub fn uncaptured(&self) -> impl Iterator<Item = (usize, &TargetPoint)> {
        self.points
            .iter()
            .enumerate()
            .filter(|(_, point)| !point.is_captured())
    }

    pub fn captured_count(&self) -> usize {
        self.points.iter().filter(|point| point.is_captured()).count()
    }

    /// Whether every target has been captured
    pub fn is_complete(&self) -> bool {
        self.points.iter().all(TargetPoint::is_captured)
    }

    /// Record the photo for the target at `index`.
    ///
    /// Fails with [`Error::UnknownTarget`] for an index outside the
    /// constellation and [`Error::AlreadyCaptured`] if the target already
    /// has a photo; the existing photo is kept.
    pub fn mark_captured(&mut self, index: usize, image: CapturedImage) -> Result<()> {
        let point = self.points.get(index).ok_or(Error::UnknownTarget(index))?;
        if point.is_captured() {
            return Err(Error::AlreadyCaptured(index));
        }
        let captured = point.with_capture(image);
        self.points[index] = captured;
        Ok(())
    }

    /// Poses of the captured photos, in constellation order
    pub fn stitch_poses(&self) -> Vec<StitchPose> {
        let nadir = self.convention.nadir();
        self.points
            .iter()
            .filter_map(|point| {
                point.image().map(|image| StitchPose {
                    path: image.path.clone(),
                    pitch: point.pitch - nadir,
                    yaw: normalize_360(point.yaw),
                })
            })
            .collect()
    }

    /// JSON array of `{pitch, yaw}` objects, one per captured photo, in the
    /// same order as [`Constellation::stitch_poses`].
    pub fn poses_json(&self) -> Result<String> {
        let entries: Vec<PoseEntry> = self
            .stitch_poses()
            .into_iter()
            .map(|pose| PoseEntry {
                pitch: pose.pitch,
                yaw: pose.yaw,
            })
            .collect();
        Ok(serde_json::to_string(&entries)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{Density, SphereLayout};

    fn standard(convention: PitchConvention) -> Constellation {
        SphereLayout::preset(Density::Standard).generate(convention)
    }

    #[test]
    fn test_mark_captured_replaces_record() {
        let mut constellation = standard(PitchConvention::NadirZero);
        let before = constellation.get(8).unwrap().clone();

        constellation.mark_captured(8, CapturedImage::new("/tmp/8.jpg")).unwrap();

        let after = constellation.get(8).unwrap();
        assert!(after.is_captured());
        assert_eq!(after.id(), before.id());
        assert_eq!(after.direction(), before.direction());
        assert_eq!(after.image().unwrap().path, PathBuf::from("/tmp/8.jpg"));
        assert_eq!(constellation.len(), 22);
        assert_eq!(constellation.captured_count(), 1);
    }

    #[test]
    fn test_capture_is_never_overwritten() {
        let mut constellation = standard(PitchConvention::NadirZero);
        constellation.mark_captured(3, CapturedImage::new("first.jpg")).unwrap();

        let result = constellation.mark_captured(3, CapturedImage::new("second.jpg"));
        assert!(matches!(result, Err(Error::AlreadyCaptured(3))));
        assert_eq!(constellation.get(3).unwrap().image().unwrap().path, PathBuf::from("first.jpg"));
    }

    #[test]
    fn test_unknown_target() {
        let mut constellation = standard(PitchConvention::NadirZero);
        let result = constellation.mark_captured(22, CapturedImage::new("x.jpg"));
        assert!(matches!(result, Err(Error::UnknownTarget(22))));
    }

    #[test]
    fn test_uncaptured_skips_captured_targets() {
        let mut constellation = standard(PitchConvention::NadirZero);
        constellation.mark_captured(0, CapturedImage::new("0.jpg")).unwrap();
        constellation.mark_captured(2, CapturedImage::new("2.jpg")).unwrap();

        let indices: Vec<usize> = constellation.uncaptured().map(|(i, _)| i).take(3).collect();
        assert_eq!(indices, vec![1, 3, 4]);
    }

    #[test]
    fn test_complete() {
        let mut constellation = SphereLayout::new(vec![1, 2, 1]).unwrap().generate(PitchConvention::NadirZero);
        for index in 0..constellation.len() {
            assert!(!constellation.is_complete());
            constellation
                .mark_captured(index, CapturedImage::new(format!("{index}.jpg")))
                .unwrap();
        }
        assert!(constellation.is_complete());
        assert_eq!(constellation.uncaptured().count(), 0);
    }

    #[test]
    fn test_stitch_poses_are_nadir_referenced() {
        let mut constellation = standard(PitchConvention::HorizonZero);
        // Index 1 is the first point of the 135° ring: 45° above the horizon
        constellation.mark_captured(1, CapturedImage::new("a.jpg")).unwrap();
        constellation.mark_captured(21, CapturedImage::new("b.jpg")).unwrap();

        let poses = constellation.stitch_poses();
        assert_eq!(poses.len(), 2);
        assert_eq!(poses[0].path, PathBuf::from("a.jpg"));
        assert_eq!((poses[0].pitch, poses[0].yaw), (135.0, 0.0));
        assert_eq!((poses[1].pitch, poses[1].yaw), (0.0, 0.0));
    }

    #[test]
    fn test_poses_json() {
        let mut constellation = standard(PitchConvention::NadirZero);
        constellation.mark_captured(9, CapturedImage::new("9.jpg")).unwrap();

        // Index 9 is the third point of the horizon ring
        let json: serde_json::Value = serde_json::from_str(&constellation.poses_json().unwrap()).unwrap();
        assert_eq!(json, serde_json::json!([{ "pitch": 90.0, "yaw": 90.0 }]));
    }

    #[test]
    fn test_constellation_serde() {
        let mut constellation = standard(PitchConvention::NadirZero);
        constellation.mark_captured(5, CapturedImage::new("5.jpg")).unwrap();

        let json = serde_json::to_string(&constellation).unwrap();
        let restored: Constellation = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, constellation);
    }
}
