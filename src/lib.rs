//! Sphere Capture - orientation tracking and alignment-triggered capture for guided photospheres
//!
//! This library turns a phone's motion sensors into a guided photosphere
//! capture. It tracks where the camera points, lays a constellation of target
//! directions over the whole sphere, projects them into the camera preview and
//! fires the camera exactly once per target as the user sweeps the device
//! over it.
//!
//! # Features
//!
//! - Complementary filter fusing accelerometer and gyroscope samples
//! - Optional platform attitude quaternion input with low-pass smoothing
//! - Optional gyroscope bias correction while the device is held still
//! - Preset or field-of-view derived sphere layouts
//! - Pixel or angular alignment with yaw ignored near the poles
//! - Debounced capture state machine with at most one capture in flight
//! - Stitching pose manifest of the captured photos
//! - Support for nadir-zero and horizon-zero pitch conventions
//!
//! # Quick Start
//!
//! ```rust
//! use std::time::Instant;
//! use nalgebra::Vector3;
//! use sphere_capture::{CaptureController, OrientationEstimator, SessionSettings};
//!
//! let settings = SessionSettings::default();
//! let layout = settings.layout.resolve().unwrap();
//! let mut controller = CaptureController::new(layout.generate(settings.convention), &settings);
//! let mut estimator = OrientationEstimator::with_settings(settings.estimator, settings.convention);
//!
//! // Phone held upright, facing the initial heading
//! estimator.update_accelerometer(Vector3::new(0.0, 9.81, 0.0)).unwrap();
//! estimator.update_gyroscope(Vector3::zeros(), 0.0).unwrap();
//! let estimate = estimator.update_gyroscope(Vector3::zeros(), 20.0).unwrap().unwrap();
//!
//! // The horizon target straight ahead is aligned
//! let request = controller.evaluate(&estimate, Instant::now()).unwrap();
//! assert_eq!(request.direction.pitch, 90.0);
//! ```
//!
//! For a running session driven by sensor streams and a camera, see
//! [`CaptureSession::start`].

mod alignment;
mod axes;
mod bias;
mod constellation;
mod controller;
mod error;
mod estimator;
mod layout;
mod math;
mod projector;
pub mod sensors;
mod session;
mod types;

// Re-export all public types and functions
pub use alignment::{AlignmentCriterion, is_aligned};
pub use axes::DeviceAxes;
pub use bias::GyroBias;
pub use constellation::{CapturedImage, Constellation, StitchPose, TargetId, TargetPoint};
pub use controller::{CaptureController, CaptureRequest, CaptureState};
pub use error::{CaptureError, Error, RejectedSample, Result, SensorError};
pub use estimator::OrientationEstimator;
pub use layout::{Density, LayoutSpec, SphereLayout};
pub use math::{DEG_TO_RAD, QuaternionExt, RAD_TO_DEG, Vector3Ext, normalize_360, wrap_180};
pub use projector::{Direction, FieldOfView, Projection, ScreenSize, project};
pub use sensors::{
    ManualSensorSource, SensorEvent, SensorFeeder, SensorKind, SensorSource, SubscriptionHandle,
};
pub use session::{CaptureSession, CaptureSink, SessionHandle, SessionSummary};
pub use types::*;
