//! Gyroscope bias correction
//!
//! Yaw has no absolute reference, so any constant gyroscope bias turns
//! directly into heading drift over a capture session. While the device is
//! held still the measured rate is the bias; it is low-pass filtered and
//! subtracted from every subsequent sample.

use nalgebra::Vector3;

use crate::types::BiasSettings;

/// Gyroscope bias estimator
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use sphere_capture::{BiasSettings, GyroBias};
///
/// let mut bias = GyroBias::new(BiasSettings::default(), 50.0); // 50 Hz stream
/// let corrected = bias.update(Vector3::new(0.1, 0.2, 0.3));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct GyroBias {
    /// Low-pass coefficient per sample
    filter_coefficient: f32,
    /// Number of still samples required before estimating
    timeout: u32,
    /// Per-axis stillness threshold in deg/s
    threshold: f32,
    /// Consecutive still samples seen
    timer: u32,
    /// Current bias estimate in deg/s
    bias: Vector3<f32>,
}

impl GyroBias {
    /// Create a bias estimator for a stream sampled at `sample_rate` Hz
    pub fn new(settings: BiasSettings, sample_rate: f32) -> Self {
        // filterCoefficient = 2π × fc / fs
        let filter_coefficient =
            2.0 * core::f32::consts::PI * settings.cutoff_frequency / sample_rate;
        let timeout = (settings.timeout * sample_rate) as u32;

        Self {
            filter_coefficient,
            timeout,
            threshold: settings.threshold,
            timer: 0,
            bias: Vector3::zeros(),
        }
    }

    /// Return the bias-corrected rate and update the bias estimate.
    ///
    /// Any axis above the stillness threshold restarts the still timer. Once
    /// the device has been still for the whole timeout, each further still
    /// sample nudges the estimate toward the corrected rate.
    pub fn update(&mut self, gyroscope: Vector3<f32>) -> Vector3<f32> {
        let corrected = gyroscope - self.bias;

        if corrected.iter().any(|axis| axis.abs() > self.threshold) {
            self.timer = 0;
            return corrected;
        }

        if self.timer < self.timeout {
            self.timer += 1;
            return corrected;
        }

        self.bias += corrected * self.filter_coefficient;
        corrected
    }

    /// Current bias estimate in deg/s
    pub fn bias(&self) -> Vector3<f32> {
        self.bias
    }

    /// Whether the still timeout has elapsed and the estimate is updating
    pub fn is_active(&self) -> bool {
        self.timer >= self.timeout
    }

    /// Forget the estimate and restart the still timer
    pub fn reset(&mut self) {
        self.timer = 0;
        self.bias = Vector3::zeros();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 50.0;

    #[test]
    fn test_motion_resets_timer() {
        let mut bias = GyroBias::new(BiasSettings::default(), SAMPLE_RATE);

        bias.update(Vector3::new(0.5, 0.5, 0.5));
        bias.update(Vector3::new(0.5, 0.5, 0.5));
        assert_eq!(bias.timer, 2);

        // Turning the device faster than the threshold
        bias.update(Vector3::new(0.0, 40.0, 0.0));
        assert_eq!(bias.timer, 0);
        assert!(!bias.is_active());
    }

    #[test]
    fn test_no_correction_before_timeout() {
        let mut bias = GyroBias::new(BiasSettings::default(), SAMPLE_RATE);
        let still = Vector3::new(0.4, -0.2, 0.1);

        for _ in 0..bias.timeout {
            assert_eq!(bias.update(still), still);
        }
        assert_eq!(bias.bias(), Vector3::zeros());
        assert!(bias.is_active());
    }

    #[test]
    fn test_converges_toward_constant_bias() {
        let mut bias = GyroBias::new(BiasSettings::default(), SAMPLE_RATE);
        let true_bias = Vector3::new(0.5, -0.3, 0.2);

        // 5 s to activate, then two minutes of holding still
        for _ in 0..(125.0 * SAMPLE_RATE) as usize {
            bias.update(true_bias);
        }

        let error = (bias.bias() - true_bias).magnitude();
        assert!(error < true_bias.magnitude() * 0.5, "error {error}");

        // The corrected output approaches zero
        let corrected = bias.update(true_bias);
        assert!(corrected.magnitude() < true_bias.magnitude());
    }

    #[test]
    fn test_reset() {
        let mut bias = GyroBias::new(BiasSettings::default(), SAMPLE_RATE);
        for _ in 0..1000 {
            bias.update(Vector3::new(1.0, 1.0, 1.0));
        }
        assert!(bias.bias().magnitude() > 0.0);

        bias.reset();
        assert_eq!(bias.bias(), Vector3::zeros());
        assert!(!bias.is_active());
    }
}
