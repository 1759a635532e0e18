//! Sensor streams feeding the estimator
//!
//! A [`SensorSource`] delivers accelerometer, gyroscope or attitude samples
//! into an mpsc channel owned by the capture session. Each stream is
//! subscribed independently and arrives at its own pace.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use nalgebra::{Quaternion, Vector3};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::SensorError;

/// Kind of sensor stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Accelerometer,
    Gyroscope,
    /// Fused attitude quaternion from the platform
    Attitude,
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SensorKind::Accelerometer => "accelerometer",
            SensorKind::Gyroscope => "gyroscope",
            SensorKind::Attitude => "attitude",
        };
        f.write_str(name)
    }
}

/// One sample from a sensor stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorEvent {
    /// Gravity reaction in the device frame, any unit
    Accelerometer(Vector3<f32>),
    /// Angular rate in deg/s with its timestamp in ms
    Gyroscope { rate: Vector3<f32>, timestamp_ms: f64 },
    /// Attitude quaternion, `w` first
    Attitude(Quaternion<f32>),
}

impl SensorEvent {
    pub fn kind(&self) -> SensorKind {
        match self {
            SensorEvent::Accelerometer(_) => SensorKind::Accelerometer,
            SensorEvent::Gyroscope { .. } => SensorKind::Gyroscope,
            SensorEvent::Attitude(_) => SensorKind::Attitude,
        }
    }
}

/// Token returned by [`SensorSource::subscribe`], passed back to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    kind: SensorKind,
    id: u64,
}

impl SubscriptionHandle {
    pub fn new(kind: SensorKind, id: u64) -> Self {
        Self { kind, id }
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// A platform sensor API
///
/// Implementations push samples into `sender` until unsubscribed. Dropping
/// every sender ends the session's sensor stream.
pub trait SensorSource: Send + 'static {
    /// Start delivering `kind` samples roughly every `interval`
    fn subscribe(
        &mut self,
        kind: SensorKind,
        interval: Duration,
        sender: mpsc::Sender<SensorEvent>,
    ) -> Result<SubscriptionHandle, SensorError>;

    /// Stop a stream. Unknown or already released handles are ignored.
    fn unsubscribe(&mut self, handle: SubscriptionHandle);
}

#[derive(Debug)]
struct Subscription {
    id: u64,
    interval: Duration,
    sender: mpsc::Sender<SensorEvent>,
}

#[derive(Debug, Default)]
struct ManualState {
    next_id: u64,
    subscriptions: HashMap<SensorKind, Subscription>,
    refused: HashSet<SensorKind>,
}

fn lock(state: &Mutex<ManualState>) -> MutexGuard<'_, ManualState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory sensor source driven by a [`SensorFeeder`]
///
/// Used for replaying recorded samples, for tests and for the demo.
///
/// # Example
/// ```
/// use sphere_capture::{ManualSensorSource, SensorKind};
///
/// let source = ManualSensorSource::new().refuse(SensorKind::Attitude);
/// let feeder = source.feeder();
///
/// assert!(!feeder.is_subscribed(SensorKind::Accelerometer));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualSensorSource {
    state: Arc<Mutex<ManualState>>,
}

impl ManualSensorSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every subscription to `kind`, as a platform without that
    /// sensor or without permission would
    pub fn refuse(self, kind: SensorKind) -> Self {
        lock(&self.state).refused.insert(kind);
        self
    }

    /// Handle that pushes samples into the subscribed streams
    pub fn feeder(&self) -> SensorFeeder {
        SensorFeeder {
            state: Arc::clone(&self.state),
        }
    }
}

impl SensorSource for ManualSensorSource {
    fn subscribe(
        &mut self,
        kind: SensorKind,
        interval: Duration,
        sender: mpsc::Sender<SensorEvent>,
    ) -> Result<SubscriptionHandle, SensorError> {
        let mut state = lock(&self.state);
        if state.refused.contains(&kind) {
            return Err(SensorError::new("permission denied"));
        }
        if state.subscriptions.contains_key(&kind) {
            return Err(SensorError::new("already subscribed"));
        }

        let id = state.next_id;
        state.next_id += 1;
        state.subscriptions.insert(
            kind,
            Subscription {
                id,
                interval,
                sender,
            },
        );
        Ok(SubscriptionHandle::new(kind, id))
    }

    fn unsubscribe(&mut self, handle: SubscriptionHandle) {
        let mut state = lock(&self.state);
        if state
            .subscriptions
            .get(&handle.kind())
            .is_some_and(|subscription| subscription.id == handle.id())
        {
            state.subscriptions.remove(&handle.kind());
        }
    }
}

/// Pushes samples into a [`ManualSensorSource`]'s subscribed streams
#[derive(Debug, Clone)]
pub struct SensorFeeder {
    state: Arc<Mutex<ManualState>>,
}

impl SensorFeeder {
    /// Deliver one event to the stream of its kind.
    ///
    /// Waits while the session's channel is full. Returns `false` when the
    /// stream is not subscribed or the session has gone away.
    pub async fn send(&self, event: SensorEvent) -> bool {
        let sender = lock(&self.state)
            .subscriptions
            .get(&event.kind())
            .map(|subscription| subscription.sender.clone());

        match sender {
            Some(sender) => sender.send(event).await.is_ok(),
            None => false,
        }
    }

    pub async fn accelerometer(&self, accelerometer: Vector3<f32>) -> bool {
        self.send(SensorEvent::Accelerometer(accelerometer)).await
    }

    pub async fn gyroscope(&self, rate: Vector3<f32>, timestamp_ms: f64) -> bool {
        self.send(SensorEvent::Gyroscope { rate, timestamp_ms }).await
    }

    pub async fn attitude(&self, attitude: Quaternion<f32>) -> bool {
        self.send(SensorEvent::Attitude(attitude)).await
    }

    pub fn is_subscribed(&self, kind: SensorKind) -> bool {
        lock(&self.state).subscriptions.contains_key(&kind)
    }

    /// Number of streams currently subscribed
    pub fn active_subscriptions(&self) -> usize {
        lock(&self.state).subscriptions.len()
    }

    /// Interval the subscriber requested for `kind`
    pub fn requested_interval(&self, kind: SensorKind) -> Option<Duration> {
        lock(&self.state)
            .subscriptions
            .get(&kind)
            .map(|subscription| subscription.interval)
    }

    /// Drop every stream, ending the session's sensor input
    pub fn close(&self) {
        lock(&self.state).subscriptions.clear();
    }
}
