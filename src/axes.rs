//! Sensor axes remapping for the current screen orientation
//!
//! Mobile platforms report accelerometer and gyroscope samples in the frame of
//! the device's natural (portrait) orientation. The estimator works in the
//! frame of the camera preview: x to the right of the preview, y up, z out of
//! the screen. When the preview is rotated, sensor axes are remapped first.
//!
//! # Example
//! ```
//! use nalgebra::Vector3;
//! use sphere_capture::DeviceAxes;
//!
//! // Gravity reaction of a phone held upright in landscape, top to the left
//! let sensor = Vector3::new(9.81, 0.0, 0.0);
//!
//! let preview = DeviceAxes::LandscapeLeft.remap(sensor);
//!
//! assert_eq!(preview.y, 9.81); // Preview "up" sees the full gravity reaction
//! ```

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Screen orientation of the camera preview relative to the device's natural
/// portrait orientation.
///
/// Every variant is a rotation about the screen normal, so the z axis is
/// never remapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceAxes {
    /// Natural orientation, no remapping
    #[default]
    Portrait,
    /// Device rotated 90° counter-clockwise (top of the device points left)
    LandscapeLeft,
    /// Device rotated 90° clockwise (top of the device points right)
    LandscapeRight,
    /// Device rotated 180°
    PortraitUpsideDown,
}

impl DeviceAxes {
    /// Remap a sensor vector from the device frame into the preview frame.
    ///
    /// Applies equally to accelerometer and gyroscope vectors.
    #[inline]
    pub fn remap(self, sensor: Vector3<f32>) -> Vector3<f32> {
        match self {
            DeviceAxes::Portrait => sensor,
            DeviceAxes::LandscapeLeft => Vector3::new(-sensor.y, sensor.x, sensor.z),
            DeviceAxes::LandscapeRight => Vector3::new(sensor.y, -sensor.x, sensor.z),
            DeviceAxes::PortraitUpsideDown => Vector3::new(-sensor.x, -sensor.y, sensor.z),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [DeviceAxes; 4] = [
        DeviceAxes::Portrait,
        DeviceAxes::LandscapeLeft,
        DeviceAxes::LandscapeRight,
        DeviceAxes::PortraitUpsideDown,
    ];

    #[test]
    fn test_portrait_is_identity() {
        let sensor = Vector3::new(1.0, 2.0, 3.0);
        assert_eq!(DeviceAxes::Portrait.remap(sensor), sensor);
    }

    #[test]
    fn test_remap_preserves_magnitude_and_normal() {
        let sensor = Vector3::new(0.3, -1.2, 4.5);

        for axes in ALL {
            let preview = axes.remap(sensor);
            assert!((preview.magnitude() - sensor.magnitude()).abs() < 1e-6);
            assert_eq!(preview.z, sensor.z);
        }
    }

    #[test]
    fn test_landscape_rotations_are_inverse() {
        let sensor = Vector3::new(1.0, 2.0, 3.0);
        let there = DeviceAxes::LandscapeLeft.remap(sensor);
        let back = DeviceAxes::LandscapeRight.remap(there);
        assert_eq!(back, sensor);
    }

    #[test]
    fn test_upright_gravity_points_up_in_every_orientation() {
        // Gravity reaction along the device axis that points up for each hold
        let cases = [
            (DeviceAxes::Portrait, Vector3::new(0.0, 1.0, 0.0)),
            (DeviceAxes::LandscapeLeft, Vector3::new(1.0, 0.0, 0.0)),
            (DeviceAxes::LandscapeRight, Vector3::new(-1.0, 0.0, 0.0)),
            (DeviceAxes::PortraitUpsideDown, Vector3::new(0.0, -1.0, 0.0)),
        ];

        for (axes, sensor) in cases {
            assert_eq!(axes.remap(sensor), Vector3::new(0.0, 1.0, 0.0), "{axes:?}");
        }
    }
}
