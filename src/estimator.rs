//! Orientation estimator fusing accelerometer and gyroscope samples

use nalgebra::{Quaternion, Vector3};

use crate::bias::GyroBias;
use crate::error::RejectedSample;
use crate::math::{QuaternionExt, RAD_TO_DEG, Vector3Ext, normalize_360, wrap_180};
use crate::sensors::SensorEvent;
use crate::types::{
    EstimatorDiagnostics, EstimatorFlags, EstimatorSettings, OrientationEstimate, PitchConvention,
};

/// Milliseconds per second, for gyroscope timestamps
const MILLIS_PER_SECOND: f64 = 1000.0;

/// Absolute pitch and roll derived from the latest accelerometer sample
#[derive(Debug, Clone, Copy, PartialEq)]
struct GravityReference {
    pitch: f32,
    roll: f32,
}

/// Orientation estimator
///
/// Implements a complementary filter: pitch and roll integrate the gyroscope
/// and are pulled toward the accelerometer's gravity reference on every
/// gyroscope sample. Yaw is integrated only, since there is no magnetometer;
/// it drifts slowly and is zeroed by [`OrientationEstimator::recenter`].
///
/// Platform attitude quaternions are accepted as an alternative input and
/// smoothed with an exponential low-pass filter.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use sphere_capture::OrientationEstimator;
///
/// let mut estimator = OrientationEstimator::new();
///
/// // Phone held upright: gravity reaction along +y
/// estimator.update_accelerometer(Vector3::new(0.0, 9.81, 0.0)).unwrap();
///
/// // First gyroscope sample only sets the timestamp baseline
/// assert_eq!(estimator.update_gyroscope(Vector3::zeros(), 1000.0).unwrap(), None);
///
/// // Turning right at 30 deg/s for 20 ms
/// let estimate = estimator
///     .update_gyroscope(Vector3::new(0.0, -30.0, 0.0), 1020.0)
///     .unwrap()
///     .unwrap();
///
/// assert!((estimate.pitch - 90.0).abs() < 1e-3); // Horizon
/// assert!((estimate.yaw - 0.6).abs() < 1e-4);
/// ```
#[derive(Debug, Clone)]
pub struct OrientationEstimator {
    /// Filter settings
    settings: EstimatorSettings,
    /// Pitch convention of the published estimate
    convention: PitchConvention,
    /// Latest published estimate
    estimate: OrientationEstimate,
    /// Latest accelerometer reference, if any arrived yet
    gravity: Option<GravityReference>,
    /// Timestamp of the previous accepted gyroscope sample, in ms
    last_timestamp: Option<f64>,
    /// Whether the estimate has been seeded from a first absolute reading
    seeded: bool,
    /// Optional gyroscope bias correction
    bias: Option<GyroBias>,
    /// Raw attitude yaw treated as zero, captured on the first attitude sample
    attitude_yaw_reference: Option<f32>,
    /// Rejected sample counters
    diagnostics: EstimatorDiagnostics,
}

impl OrientationEstimator {
    /// Create an estimator with default settings in the nadir-zero convention
    pub fn new() -> Self {
        Self::with_settings(EstimatorSettings::default(), PitchConvention::default())
    }

    /// Create an estimator with the given settings and pitch convention
    pub fn with_settings(settings: EstimatorSettings, convention: PitchConvention) -> Self {
        let mut estimator = OrientationEstimator {
            settings,
            convention,
            estimate: OrientationEstimate::default(),
            gravity: None,
            last_timestamp: None,
            seeded: false,
            bias: None,
            attitude_yaw_reference: None,
            diagnostics: EstimatorDiagnostics::default(),
        };
        estimator.initialise();
        estimator
    }

    /// Forget all sensor history and return to the initial state
    pub fn initialise(&mut self) {
        self.estimate = OrientationEstimate {
            pitch: self.convention.nadir(),
            roll: 0.0,
            yaw: 0.0,
        };
        self.gravity = None;
        self.last_timestamp = None;
        self.seeded = false;
        match self.bias.as_mut() {
            Some(bias) => bias.reset(),
            None => {
                self.bias = self
                    .settings
                    .bias_correction
                    .map(|bias| GyroBias::new(bias, self.settings.sample_rate));
            }
        }
        self.attitude_yaw_reference = None;
        self.diagnostics = EstimatorDiagnostics::default();
    }

    /// Current filter settings
    pub fn settings(&self) -> EstimatorSettings {
        self.settings
    }

    /// Pitch convention of published estimates
    pub fn convention(&self) -> PitchConvention {
        self.convention
    }

    /// Latest published estimate
    pub fn estimate(&self) -> OrientationEstimate {
        self.estimate
    }

    /// Re-zero the yaw reference, leaving pitch and roll untouched.
    ///
    /// On the attitude path the next sample becomes the new zero heading.
    pub fn recenter(&mut self) {
        self.estimate.yaw = 0.0;
        self.attitude_yaw_reference = None;
    }

    /// Feed any sensor event, logging and absorbing rejected samples.
    ///
    /// Returns the new estimate when the event publishes one (gyroscope and
    /// attitude samples).
    pub fn handle(&mut self, event: SensorEvent) -> Option<OrientationEstimate> {
        let outcome = match event {
            SensorEvent::Accelerometer(accelerometer) => {
                self.update_accelerometer(accelerometer).map(|_| None)
            }
            SensorEvent::Gyroscope { rate, timestamp_ms } => {
                self.update_gyroscope(rate, timestamp_ms)
            }
            SensorEvent::Attitude(attitude) => self.update_attitude(attitude).map(Some),
        };

        match outcome {
            Ok(estimate) => estimate,
            Err(rejection) => {
                tracing::debug!(sensor = %event.kind(), %rejection, "sensor sample rejected");
                None
            }
        }
    }

    /// Update the gravity reference from an accelerometer sample.
    ///
    /// Units do not matter, only the direction is used. The reference is never
    /// integrated; it only corrects pitch and roll on the next gyroscope
    /// sample.
    ///
    /// # Arguments
    /// * `accelerometer` - Gravity reaction in the device frame (m/s² or g)
    pub fn update_accelerometer(
        &mut self,
        accelerometer: Vector3<f32>,
    ) -> Result<(), RejectedSample> {
        let accelerometer = self.settings.device_axes.remap(accelerometer);

        if !accelerometer.is_finite() {
            return Err(self.reject(RejectedSample::NonFinite));
        }
        if accelerometer.magnitude_squared() == 0.0 {
            return Err(self.reject(RejectedSample::ZeroVector));
        }

        let (x, y, z) = (accelerometer.x, accelerometer.y, accelerometer.z);
        let reference = GravityReference {
            pitch: self.convention.from_gravity_pitch(y.atan2(z) * RAD_TO_DEG),
            roll: (-x).atan2((y * y + z * z).sqrt()) * RAD_TO_DEG,
        };
        self.gravity = Some(reference);

        // Start from the absolute reading instead of converging from nadir
        if !self.seeded {
            self.estimate.pitch = reference.pitch;
            self.estimate.roll = reference.roll;
            self.seeded = true;
        }

        Ok(())
    }

    /// Integrate a gyroscope sample and publish the fused estimate.
    ///
    /// The first sample after construction only sets the timestamp baseline
    /// and returns `Ok(None)`. Until the first accelerometer sample arrives,
    /// samples only advance yaw and also return `Ok(None)`. A sample with a
    /// non-positive or oversized time step is rejected, and its timestamp
    /// becomes the new baseline.
    ///
    /// # Arguments
    /// * `gyroscope` - Angular rate in degrees per second, device frame
    /// * `timestamp_ms` - Sample timestamp in milliseconds
    pub fn update_gyroscope(
        &mut self,
        gyroscope: Vector3<f32>,
        timestamp_ms: f64,
    ) -> Result<Option<OrientationEstimate>, RejectedSample> {
        let gyroscope = self.settings.device_axes.remap(gyroscope);

        if !gyroscope.is_finite() || !timestamp_ms.is_finite() {
            return Err(self.reject(RejectedSample::NonFinite));
        }

        let Some(previous) = self.last_timestamp.replace(timestamp_ms) else {
            return Ok(None);
        };

        let delta_time = ((timestamp_ms - previous) / MILLIS_PER_SECOND) as f32;
        if delta_time <= 0.0 {
            return Err(self.reject(RejectedSample::NonMonotonic { delta_time }));
        }
        if delta_time > self.settings.max_delta_time {
            return Err(self.reject(RejectedSample::Stall { delta_time }));
        }

        let rate = match self.bias.as_mut() {
            Some(bias) => bias.update(gyroscope),
            None => gyroscope,
        };

        // x is the pitch rate. +y turns left and +z rolls counter-clockwise,
        // so both are negated: yaw grows to the right, roll matches gravity.
        let yaw = self.estimate.yaw - rate.y * delta_time;

        // Pitch is meaningless until gravity has been seen once
        let Some(gravity) = self.gravity else {
            self.estimate.yaw = yaw;
            return Ok(None);
        };

        let gyro_pitch = self.estimate.pitch + rate.x * delta_time;
        let gyro_roll = self.estimate.roll - rate.z * delta_time;

        let alpha = self.settings.alpha;
        self.estimate = OrientationEstimate {
            pitch: alpha * gyro_pitch + (1.0 - alpha) * gravity.pitch,
            roll: alpha * gyro_roll + (1.0 - alpha) * gravity.roll,
            yaw,
        };
        Ok(Some(self.estimate))
    }

    /// Smooth a platform attitude quaternion into the estimate.
    ///
    /// Pitch and yaw are extracted in degrees, yaw is taken relative to the
    /// heading at the first sample (or the last recenter), and both are
    /// low-pass filtered. Yaw blends along the shortest arc so crossing
    /// 360°→0° does not sweep the estimate around the circle.
    pub fn update_attitude(
        &mut self,
        attitude: Quaternion<f32>,
    ) -> Result<OrientationEstimate, RejectedSample> {
        if !attitude.is_finite() {
            return Err(self.reject(RejectedSample::NonFinite));
        }
        if attitude.norm_squared() == 0.0 {
            return Err(self.reject(RejectedSample::ZeroVector));
        }
        let attitude = attitude.normalize();

        let pitch = self.convention.from_horizon_pitch(attitude.attitude_pitch());
        let raw_yaw = normalize_360(attitude.attitude_yaw());
        let reference = *self.attitude_yaw_reference.get_or_insert(raw_yaw);
        let yaw = normalize_360(raw_yaw - reference);

        if self.seeded {
            let alpha = self.settings.attitude_alpha;
            self.estimate.pitch += alpha * (pitch - self.estimate.pitch);
            let diff = wrap_180(yaw - self.estimate.yaw);
            self.estimate.yaw = normalize_360(self.estimate.yaw + alpha * diff);
        } else {
            self.estimate.pitch = pitch;
            self.estimate.yaw = yaw;
            self.seeded = true;
        }

        Ok(self.estimate)
    }

    /// Get estimator flags
    pub fn flags(&self) -> EstimatorFlags {
        EstimatorFlags {
            awaiting_baseline: self.last_timestamp.is_none(),
            accelerometer_reference: self.gravity.is_some(),
            bias_estimating: self.bias.is_some_and(|bias| bias.is_active()),
        }
    }

    /// Get rejected sample counters
    pub fn diagnostics(&self) -> EstimatorDiagnostics {
        self.diagnostics
    }

    /// Current gyroscope bias estimate, when bias correction is enabled
    pub fn gyroscope_bias(&self) -> Option<Vector3<f32>> {
        self.bias.map(|bias| bias.bias())
    }

    fn reject(&mut self, rejection: RejectedSample) -> RejectedSample {
        if rejection.is_timing_anomaly() {
            self.diagnostics.timing_anomalies += 1;
        } else {
            self.diagnostics.dropped_samples += 1;
        }
        rejection
    }
}

impl Default for OrientationEstimator {
    fn default() -> Self {
        Self::new()
    }
}
