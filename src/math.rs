//! Angle utilities and nalgebra extensions shared by the estimator and projector

use nalgebra::{Quaternion, Vector3};

/// Mathematical constants
pub const DEG_TO_RAD: f32 = core::f32::consts::PI / 180.0;
pub const RAD_TO_DEG: f32 = 180.0 / core::f32::consts::PI;

/// Wrap an angle in degrees to the half-open range `(-180, 180]`.
///
/// This is the shortest signed path between two headings: a difference of
/// 340° becomes -20°.
///
/// # Example
/// ```
/// use sphere_capture::wrap_180;
///
/// assert_eq!(wrap_180(340.0), -20.0);
/// assert_eq!(wrap_180(-180.0), 180.0);
/// ```
pub fn wrap_180(angle: f32) -> f32 {
    let mut wrapped = angle % 360.0;
    if wrapped > 180.0 {
        wrapped -= 360.0;
    } else if wrapped <= -180.0 {
        wrapped += 360.0;
    }
    wrapped
}

/// Normalize an angle in degrees into `[0, 360)`.
///
/// Accepts any number of accumulated revolutions in either direction.
pub fn normalize_360(angle: f32) -> f32 {
    let normalized = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if normalized >= 360.0 { 0.0 } else { normalized }
}

/// Extension trait for raw sensor vectors
pub trait Vector3Ext {
    /// Whether every component is a finite number
    fn is_finite(&self) -> bool;

    /// Convert degrees to radians
    fn deg_to_rad(&self) -> Vector3<f32>;

    /// Convert radians to degrees
    fn rad_to_deg(&self) -> Vector3<f32>;
}

impl Vector3Ext for Vector3<f32> {
    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    fn deg_to_rad(&self) -> Vector3<f32> {
        *self * DEG_TO_RAD
    }

    fn rad_to_deg(&self) -> Vector3<f32> {
        *self * RAD_TO_DEG
    }
}

/// Extension trait for platform attitude quaternions
///
/// Platform fusion APIs report attitude as a (possibly slightly
/// non-normalized) quaternion. These helpers extract the two angles the
/// capture engine consumes, in degrees.
pub trait QuaternionExt {
    /// Pitch in degrees, `asin(clamp(2(qw·qy − qz·qx), −1, 1))`, range `[-90, 90]`
    fn attitude_pitch(&self) -> f32;

    /// Yaw in degrees, `atan2(2(qw·qz + qx·qy), 1 − 2(qy² + qz²))`, range `(-180, 180]`
    fn attitude_yaw(&self) -> f32;

    /// Whether every component is a finite number
    fn is_finite(&self) -> bool;
}

impl QuaternionExt for Quaternion<f32> {
    fn attitude_pitch(&self) -> f32 {
        let (qw, qx, qy, qz) = (self.w, self.i, self.j, self.k);
        let sin_pitch = (2.0 * (qw * qy - qz * qx)).clamp(-1.0, 1.0);
        sin_pitch.asin() * RAD_TO_DEG
    }

    fn attitude_yaw(&self) -> f32 {
        let (qw, qx, qy, qz) = (self.w, self.i, self.j, self.k);
        let siny_cosp = 2.0 * (qw * qz + qx * qy);
        let cosy_cosp = 1.0 - 2.0 * (qy * qy + qz * qz);
        siny_cosp.atan2(cosy_cosp) * RAD_TO_DEG
    }

    fn is_finite(&self) -> bool {
        self.w.is_finite() && self.i.is_finite() && self.j.is_finite() && self.k.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::UnitQuaternion;

    const EPSILON: f32 = 1e-4;

    #[test]
    fn test_wrap_180() {
        assert!((wrap_180(340.0) + 20.0).abs() < EPSILON);
        assert!((wrap_180(-340.0) - 20.0).abs() < EPSILON);
        assert!((wrap_180(180.0) - 180.0).abs() < EPSILON);
        assert!((wrap_180(-180.0) - 180.0).abs() < EPSILON);
        assert!((wrap_180(725.0) - 5.0).abs() < EPSILON);
        assert!(wrap_180(0.0).abs() < EPSILON);
    }

    #[test]
    fn test_normalize_360() {
        assert!((normalize_360(-10.0) - 350.0).abs() < EPSILON);
        assert!((normalize_360(1090.0) - 10.0).abs() < EPSILON);
        assert!(normalize_360(360.0).abs() < EPSILON);
        assert!(normalize_360(-1e-9) < 360.0);
    }

    #[test]
    fn test_vector_finiteness() {
        assert!(Vector3::new(0.0f32, 1.0, 2.0).is_finite());
        assert!(!Vector3::new(f32::NAN, 1.0, 2.0).is_finite());
        assert!(!Vector3::new(0.0, f32::INFINITY, 2.0).is_finite());
    }

    #[test]
    fn test_vector_angle_conversion() {
        let degrees = Vector3::new(180.0f32, -90.0, 45.0);
        let radians = degrees.deg_to_rad();
        assert!((radians.x - core::f32::consts::PI).abs() < EPSILON);
        assert!((radians.y + core::f32::consts::FRAC_PI_2).abs() < EPSILON);
        assert!((radians.rad_to_deg() - degrees).magnitude() < 1e-3);
    }

    #[test]
    fn test_attitude_angles_from_euler() {
        // nalgebra euler order is roll (x), pitch (y), yaw (z)
        let q = UnitQuaternion::from_euler_angles(0.0, 30.0 * DEG_TO_RAD, 60.0 * DEG_TO_RAD);
        let q = q.into_inner();

        assert!((q.attitude_pitch() - 30.0).abs() < EPSILON);
        assert!((q.attitude_yaw() - 60.0).abs() < EPSILON);
    }

    #[test]
    fn test_attitude_pitch_clamps_out_of_range() {
        // Slightly non-normalized input pushing sin(pitch) beyond 1
        let q = Quaternion::new(0.8, 0.0, 0.8, 0.0);
        assert!((q.attitude_pitch() - 90.0).abs() < EPSILON);
    }
}
