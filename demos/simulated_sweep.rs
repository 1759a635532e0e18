//! Simulated photosphere sweep
//!
//! This example runs a complete capture session against simulated sensors.
//! A virtual user turns the phone ring by ring across the sphere while a fake
//! camera "takes" each photo, and the stitching pose manifest is printed at
//! the end.
//!
//! Features demonstrated:
//! - Loading session settings from JSON
//! - Driving a session through `ManualSensorSource`
//! - Watching the published orientation and constellation
//! - Exporting the stitching poses
//!
//! Run with: `RUST_LOG=info cargo run --example simulated_sweep [settings.json]`

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use nalgebra::{UnitQuaternion, Vector3};
use sphere_capture::{
    CaptureError, CaptureSession, CaptureSink, CapturedImage, InputMode, ManualSensorSource,
    PitchConvention, SessionSettings, Vector3Ext,
};
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

/// Samples per second delivered by the simulated sensors
const SAMPLE_RATE: u64 = 50;
/// Simulated time spent turning toward each target
const DWELL: Duration = Duration::from_millis(1200);

/// Camera that names photos sequentially and takes 150 ms per shot
#[derive(Default)]
struct SimulatedCamera {
    shots: Arc<AtomicUsize>,
}

#[async_trait]
impl CaptureSink for SimulatedCamera {
    async fn take_photo(&self) -> Result<CapturedImage, CaptureError> {
        let shot = self.shots.fetch_add(1, Ordering::SeqCst);
        sleep(Duration::from_millis(150)).await;
        Ok(CapturedImage::new(format!("photos/IMG_{shot:04}.jpg")))
    }
}

/// Attitude quaternion for a camera direction in the nadir-zero convention
fn attitude(pitch: f32, yaw: f32) -> UnitQuaternion<f32> {
    let angles = Vector3::new(0.0, pitch - 90.0, yaw).deg_to_rad();
    UnitQuaternion::from_euler_angles(angles.x, angles.y, angles.z)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Simulated time: the sweep runs instantly
    tokio::time::pause();

    let mut settings = match std::env::args().nth(1) {
        Some(path) => SessionSettings::from_json(&std::fs::read_to_string(path)?)?,
        None => SessionSettings::default(),
    };
    // The simulated phone reports attitude quaternions in nadir-zero pitch
    settings.input = InputMode::Attitude;
    settings.convention = PitchConvention::NadirZero;

    let source = ManualSensorSource::new();
    let feeder = source.feeder();
    let handle = CaptureSession::start(settings.clone(), source, SimulatedCamera::default())?;

    let targets: Vec<(f32, f32)> = handle
        .constellation()
        .borrow()
        .iter()
        .map(|point| (point.pitch(), point.yaw()))
        .collect();
    println!("Sweeping {} targets", targets.len());

    let orientation = handle.orientation();
    let samples_per_target = DWELL.as_millis() as u64 * SAMPLE_RATE / 1000;

    for (pitch, yaw) in targets {
        let quaternion = attitude(pitch, yaw).into_inner();
        for _ in 0..samples_per_target {
            feeder.attitude(quaternion).await;
            sleep(Duration::from_millis(1000 / SAMPLE_RATE)).await;
        }

        let estimate = *orientation.borrow();
        println!(
            "Target pitch {pitch:6.1} yaw {yaw:6.1} | estimate pitch {:6.1} yaw {:6.1} | {} captured",
            estimate.pitch,
            estimate.normalized_yaw(),
            handle.captured_count()
        );
    }

    let summary = handle.shutdown().await?;
    println!(
        "\nCaptured {}/{} targets ({} failed captures, {} rejected samples)",
        summary.constellation.captured_count(),
        summary.constellation.len(),
        summary.failed_captures,
        summary.diagnostics.dropped_samples + summary.diagnostics.timing_anomalies
    );

    for pose in summary.constellation.stitch_poses() {
        println!("{:<24} pitch {:6.1} yaw {:6.1}", pose.path.display(), pose.pitch, pose.yaw);
    }
    println!("\nposes.json: {}", summary.constellation.poses_json()?);

    Ok(())
}
