//! Core types, conventions and settings for the capture engine

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::alignment::AlignmentCriterion;
use crate::axes::DeviceAxes;
use crate::error::{Error, Result};
use crate::layout::LayoutSpec;
use crate::math::normalize_360;
use crate::projector::{FieldOfView, ScreenSize};

/// Pitch convention
///
/// Defines where pitch zero lies. One convention is chosen per session and
/// applied uniformly by the estimator, the layout generator, the projector and
/// the alignment controller.
///
/// # Conventions
/// - **NadirZero**: nadir 0°, horizon 90°, zenith 180° (stitching pose format)
/// - **HorizonZero**: nadir -90°, horizon 0°, zenith 90°
///
/// # Example
/// ```
/// use sphere_capture::PitchConvention;
///
/// assert_eq!(PitchConvention::NadirZero.horizon(), 90.0);
/// assert_eq!(PitchConvention::HorizonZero.zenith(), 90.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PitchConvention {
    /// Camera pointing straight down is 0°, straight up is 180°
    #[default]
    NadirZero,
    /// Camera pointing at the horizon is 0°, straight up is 90°
    HorizonZero,
}

impl PitchConvention {
    /// Pitch of the camera pointing straight down
    pub fn nadir(self) -> f32 {
        match self {
            PitchConvention::NadirZero => 0.0,
            PitchConvention::HorizonZero => -90.0,
        }
    }

    /// Pitch of the camera pointing at the horizon
    pub fn horizon(self) -> f32 {
        self.nadir() + 90.0
    }

    /// Pitch of the camera pointing straight up
    pub fn zenith(self) -> f32 {
        self.nadir() + 180.0
    }

    /// Angular distance in degrees from `pitch` to the nearest pole
    pub fn distance_to_pole(self, pitch: f32) -> f32 {
        (pitch - self.nadir()).abs().min((self.zenith() - pitch).abs())
    }

    /// Express a gravity-derived pitch `atan2(y, z)` in this convention.
    ///
    /// `atan2` flips sign when the camera passes the zenith; folding into
    /// `[-90, 270)` keeps the zenith continuous.
    pub fn from_gravity_pitch(self, atan2_degrees: f32) -> f32 {
        let folded = if atan2_degrees < -90.0 {
            atan2_degrees + 360.0
        } else {
            atan2_degrees
        };
        folded + self.nadir()
    }

    /// Express a horizon-referenced pitch (`[-90, 90]`, as produced by
    /// attitude quaternions) in this convention.
    pub fn from_horizon_pitch(self, horizon_degrees: f32) -> f32 {
        horizon_degrees + self.horizon()
    }
}

/// Orientation estimate in degrees
///
/// Pitch and roll are gravity-referenced. Yaw is relative to the last
/// recenter and accumulates without bound; use [`OrientationEstimate::normalized_yaw`]
/// or wrap-aware subtraction before comparing headings.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OrientationEstimate {
    /// Rotation around the lateral axis, in the session's pitch convention
    pub pitch: f32,
    /// Rotation around the depth axis
    pub roll: f32,
    /// Accumulated rotation around the vertical axis, clockwise seen from above
    pub yaw: f32,
}

impl OrientationEstimate {
    /// Create an estimate from pitch, roll and yaw in degrees
    pub fn new(pitch: f32, roll: f32, yaw: f32) -> Self {
        Self { pitch, roll, yaw }
    }

    /// Yaw normalized into `[0, 360)`
    pub fn normalized_yaw(&self) -> f32 {
        normalize_360(self.yaw)
    }
}

/// Gyroscope bias correction settings
///
/// Configuration for the stationary bias estimator applied to the gyroscope
/// stream before integration.
///
/// # Example
/// ```
/// use sphere_capture::BiasSettings;
///
/// let settings = BiasSettings {
///     cutoff_frequency: 0.01, // Slower convergence
///     timeout: 10.0,          // 10 seconds to detect stationary
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiasSettings {
    /// Low-pass cutoff frequency of the bias estimate in Hz (typically 0.02)
    pub cutoff_frequency: f32,
    /// Seconds the device must stay still before the bias estimate updates
    pub timeout: f32,
    /// Per-axis rate in deg/s under which the device counts as still
    pub threshold: f32,
}

impl Default for BiasSettings {
    fn default() -> Self {
        Self {
            cutoff_frequency: 0.02,
            timeout: 5.0,
            threshold: 3.0,
        }
    }
}

/// Orientation estimator settings
///
/// # Example
/// ```
/// use sphere_capture::{EstimatorSettings, OrientationEstimator, PitchConvention};
///
/// let settings = EstimatorSettings {
///     alpha: 0.95, // Pull harder toward the accelerometer
///     ..Default::default()
/// };
/// let estimator = OrientationEstimator::with_settings(settings, PitchConvention::NadirZero);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorSettings {
    /// Complementary filter weight of the integrated gyroscope (typically 0.98)
    ///
    /// The remaining `1 - alpha` pulls pitch and roll toward the
    /// accelerometer reference on every gyroscope sample.
    pub alpha: f32,
    /// Low-pass weight applied to attitude quaternion samples (typically 0.15)
    ///
    /// Lower values are smoother but lag more.
    pub attitude_alpha: f32,
    /// Largest accepted gap between gyroscope samples, in seconds
    ///
    /// Longer gaps are treated as a stall: the sample re-baselines the
    /// timestamp instead of being integrated.
    pub max_delta_time: f32,
    /// Screen orientation used to remap sensor axes into the device frame
    pub device_axes: DeviceAxes,
    /// Expected gyroscope sample rate in Hz, used by bias correction
    pub sample_rate: f32,
    /// Gyroscope bias correction, disabled when `None`
    pub bias_correction: Option<BiasSettings>,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            alpha: 0.98,
            attitude_alpha: 0.15,
            max_delta_time: 0.5,
            device_axes: DeviceAxes::default(),
            sample_rate: 50.0,
            bias_correction: None,
        }
    }
}

impl EstimatorSettings {
    /// Check that every weight and limit is in range
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(Error::InvalidSettings(format!(
                "alpha must be within [0, 1], got {}",
                self.alpha
            )));
        }
        if !(self.attitude_alpha > 0.0 && self.attitude_alpha <= 1.0) {
            return Err(Error::InvalidSettings(format!(
                "attitude_alpha must be within (0, 1], got {}",
                self.attitude_alpha
            )));
        }
        if !(self.max_delta_time > 0.0) {
            return Err(Error::InvalidSettings(format!(
                "max_delta_time must be positive, got {}",
                self.max_delta_time
            )));
        }
        if self.bias_correction.is_some() && !(self.sample_rate > 0.0) {
            return Err(Error::InvalidSettings(format!(
                "sample_rate must be positive when bias correction is enabled, got {}",
                self.sample_rate
            )));
        }
        Ok(())
    }
}

/// Camera view geometry used by the projector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewSettings {
    /// Camera field of view in degrees
    pub fov: FieldOfView,
    /// Preview size in pixels
    pub screen: ScreenSize,
    /// Fraction of the field of view in which targets count as visible
    ///
    /// Values below 1 keep targets from popping in exactly at the frame edge.
    pub visible_fraction: f32,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            fov: FieldOfView::default(),
            screen: ScreenSize::default(),
            visible_fraction: 2.0 / 3.0,
        }
    }
}

/// Alignment predicate settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentSettings {
    /// How closely a target must match the view center
    pub criterion: AlignmentCriterion,
    /// Distance in degrees from a pole within which yaw is ignored
    pub pole_band: f32,
}

impl Default for AlignmentSettings {
    fn default() -> Self {
        Self {
            criterion: AlignmentCriterion::default(),
            pole_band: 10.0,
        }
    }
}

/// Capture state machine settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    /// Delay after a capture completes before the next one may fire, in ms
    pub debounce_ms: u64,
    /// Minimum spacing between alignment evaluations, in ms (0 evaluates every estimate)
    pub min_evaluation_interval_ms: u64,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            min_evaluation_interval_ms: 0,
        }
    }
}

impl ControllerSettings {
    /// Debounce interval as a [`Duration`]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Evaluation throttle as a [`Duration`]
    pub fn min_evaluation_interval(&self) -> Duration {
        Duration::from_millis(self.min_evaluation_interval_ms)
    }
}

/// Which sensor streams drive the estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    /// Accelerometer and gyroscope fused by the complementary filter
    #[default]
    Inertial,
    /// Attitude quaternions from a platform fusion API
    Attitude,
}

/// Complete session configuration
///
/// Every section falls back to its defaults when missing, so a JSON config
/// only needs the values it overrides.
///
/// # Example
/// ```
/// use sphere_capture::{PitchConvention, SessionSettings};
///
/// let settings = SessionSettings::from_json(r#"{
///     "convention": "horizon_zero",
///     "controller": { "debounce_ms": 750 }
/// }"#).unwrap();
///
/// assert_eq!(settings.convention, PitchConvention::HorizonZero);
/// assert_eq!(settings.controller.debounce_ms, 750);
/// assert_eq!(settings.alignment.pole_band, 10.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Pitch convention shared by every component
    pub convention: PitchConvention,
    /// Sensor streams to subscribe
    pub input: InputMode,
    /// Requested sensor sampling interval in ms (typically 20, i.e. 50 Hz)
    pub sensor_interval_ms: u64,
    /// Target constellation
    pub layout: LayoutSpec,
    /// Orientation filter
    pub estimator: EstimatorSettings,
    /// Projection geometry
    pub view: ViewSettings,
    /// Alignment predicate
    pub alignment: AlignmentSettings,
    /// Capture state machine
    pub controller: ControllerSettings,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            convention: PitchConvention::default(),
            input: InputMode::default(),
            sensor_interval_ms: 20,
            layout: LayoutSpec::default(),
            estimator: EstimatorSettings::default(),
            view: ViewSettings::default(),
            alignment: AlignmentSettings::default(),
            controller: ControllerSettings::default(),
        }
    }
}

impl SessionSettings {
    /// Parse settings from JSON, filling missing fields with defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: SessionSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Sensor sampling interval as a [`Duration`]
    pub fn sensor_interval(&self) -> Duration {
        Duration::from_millis(self.sensor_interval_ms)
    }

    /// Check every section for out-of-range values
    pub fn validate(&self) -> Result<()> {
        if self.sensor_interval_ms == 0 {
            return Err(Error::InvalidSettings(
                "sensor_interval_ms must be positive".into(),
            ));
        }
        self.estimator.validate()?;
        self.view.fov.validate()?;
        if !(self.view.screen.width > 0.0 && self.view.screen.height > 0.0) {
            return Err(Error::InvalidSettings(format!(
                "screen must have a positive size, got {}x{}",
                self.view.screen.width, self.view.screen.height
            )));
        }
        if !(self.view.visible_fraction > 0.0) {
            return Err(Error::InvalidSettings(format!(
                "visible_fraction must be positive, got {}",
                self.view.visible_fraction
            )));
        }
        self.alignment.criterion.validate()?;
        if !(0.0..=90.0).contains(&self.alignment.pole_band) {
            return Err(Error::InvalidSettings(format!(
                "pole_band must be within [0, 90], got {}",
                self.alignment.pole_band
            )));
        }
        Ok(())
    }
}

/// Orientation estimator flags
///
/// # Example
/// ```
/// use sphere_capture::OrientationEstimator;
///
/// let estimator = OrientationEstimator::new();
/// let flags = estimator.flags();
///
/// if flags.awaiting_baseline {
///     println!("Waiting for the first gyroscope timestamp...");
/// }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EstimatorFlags {
    /// True until a gyroscope timestamp baseline exists
    pub awaiting_baseline: bool,
    /// True once an accelerometer reference is available for correction
    pub accelerometer_reference: bool,
    /// True while gyroscope bias correction is actively updating its estimate
    pub bias_estimating: bool,
}

/// Orientation estimator diagnostics
///
/// Counters of samples the estimator refused. None of these are errors for
/// the caller; they only explain a stalled or jittery estimate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EstimatorDiagnostics {
    /// Non-finite or zero-magnitude samples dropped without touching state
    pub dropped_samples: u64,
    /// Gyroscope samples discarded for non-monotonic timestamps or stalls
    pub timing_anomalies: u64,
}
