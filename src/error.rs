//! Error types for the capture engine

use thiserror::Error;

use crate::sensors::SensorKind;

/// Result type for capture engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to the caller
///
/// Only [`Error::SensorUnavailable`] ends a running session. Capture failures
/// are absorbed by the controller and leave the target uncaptured; they only
/// appear here when a caller converts a [`CaptureError`] explicitly.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{sensor} sensor unavailable: {reason}")]
    SensorUnavailable { sensor: SensorKind, reason: String },

    /// Never raised by the session; lets callers driving a sink directly use `?`
    #[error("capture failed: {0}")]
    CaptureFailed(#[from] CaptureError),

    #[error("invalid sphere layout: {0}")]
    InvalidLayout(String),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("no target at index {0}")]
    UnknownTarget(usize),

    #[error("target {0} is already captured")]
    AlreadyCaptured(usize),

    #[error("capture session closed")]
    SessionClosed,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error reported by a capture sink
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct CaptureError {
    message: String,
}

impl CaptureError {
    /// Create a capture error with a human readable reason
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Reason reported by the sink
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Error reported by a sensor source when a subscription cannot be made
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct SensorError {
    message: String,
}

impl SensorError {
    /// Create a sensor error with a human readable reason
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Why the estimator refused a sample
///
/// Rejections are recovered locally: the sample is dropped, counted in the
/// estimator diagnostics and logged at debug level.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum RejectedSample {
    #[error("sample contains a non-finite component")]
    NonFinite,

    #[error("accelerometer sample has zero magnitude")]
    ZeroVector,

    #[error("non-monotonic gyroscope timestamp (dt = {delta_time} s)")]
    NonMonotonic { delta_time: f32 },

    #[error("gyroscope stalled for {delta_time} s")]
    Stall { delta_time: f32 },
}

impl RejectedSample {
    /// Whether this rejection is a timing anomaly rather than a malformed sample
    pub fn is_timing_anomaly(&self) -> bool {
        matches!(
            self,
            RejectedSample::NonMonotonic { .. } | RejectedSample::Stall { .. }
        )
    }
}
