//! Capture session runtime
//!
//! A session task owns the estimator and the capture controller. It selects
//! over handle commands, capture completions, the debounce timer and the
//! sensor stream, publishing every new estimate on a `watch` channel.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::constellation::{CapturedImage, Constellation};
use crate::controller::{CaptureController, CaptureRequest};
use crate::error::{CaptureError, Error, Result};
use crate::estimator::OrientationEstimator;
use crate::sensors::{SensorEvent, SensorKind, SensorSource, SubscriptionHandle};
use crate::types::{EstimatorDiagnostics, InputMode, OrientationEstimate, SessionSettings};

/// Samples buffered between the sensor source and the session task
const SENSOR_CHANNEL_CAPACITY: usize = 64;

/// The camera
///
/// `take_photo` is called once per capture request and never concurrently.
#[async_trait]
pub trait CaptureSink: Send + Sync + 'static {
    async fn take_photo(&self) -> std::result::Result<CapturedImage, CaptureError>;
}

/// Final state of a session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    /// Constellation with every capture recorded during the session
    pub constellation: Constellation,
    /// Captures that the sink reported as failed
    pub failed_captures: u64,
    /// Samples the estimator refused
    pub diagnostics: EstimatorDiagnostics,
}

#[derive(Debug)]
enum Command {
    Recenter,
    Shutdown,
}

#[derive(Debug)]
struct Completion {
    index: usize,
    result: std::result::Result<CapturedImage, CaptureError>,
}

/// Entry point for running a capture session
pub struct CaptureSession;

impl CaptureSession {
    /// Validate `settings`, subscribe the sensor streams and spawn the
    /// session task on the current tokio runtime.
    ///
    /// Inertial input subscribes the accelerometer and the gyroscope, attitude
    /// input the attitude stream alone. If any subscription fails the ones
    /// already made are released and [`Error::SensorUnavailable`] is returned.
    ///
    /// # Panics
    /// When called outside a tokio runtime.
    pub fn start<S, C>(settings: SessionSettings, mut source: S, sink: C) -> Result<SessionHandle>
    where
        S: SensorSource,
        C: CaptureSink,
    {
        settings.validate()?;
        let constellation = settings.layout.resolve()?.generate(settings.convention);

        let kinds: &[SensorKind] = match settings.input {
            InputMode::Inertial => &[SensorKind::Accelerometer, SensorKind::Gyroscope],
            InputMode::Attitude => &[SensorKind::Attitude],
        };

        let (sensor_tx, sensor_rx) = mpsc::channel(SENSOR_CHANNEL_CAPACITY);
        let mut subscriptions = Vec::with_capacity(kinds.len());
        for &kind in kinds {
            match source.subscribe(kind, settings.sensor_interval(), sensor_tx.clone()) {
                Ok(handle) => subscriptions.push(handle),
                Err(err) => {
                    for handle in subscriptions {
                        source.unsubscribe(handle);
                    }
                    warn!(sensor = %kind, %err, "sensor subscription failed");
                    return Err(Error::SensorUnavailable {
                        sensor: kind,
                        reason: err.to_string(),
                    });
                }
            }
        }
        // Only the source holds senders now, so the stream ends when it drops them
        drop(sensor_tx);

        let estimator = OrientationEstimator::with_settings(settings.estimator, settings.convention);
        let (orientation_tx, orientation_rx) = watch::channel(estimator.estimate());
        let (constellation_tx, constellation_rx) = watch::channel(constellation.clone());
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (completion_tx, completion_rx) = mpsc::channel(1);

        info!(
            targets = constellation.len(),
            convention = ?settings.convention,
            input = ?settings.input,
            "capture session started"
        );

        let task = SessionTask {
            controller: CaptureController::new(constellation, &settings),
            estimator,
            source,
            subscriptions,
            sink: Arc::new(sink),
            sensor_rx,
            command_rx,
            completion_tx,
            completion_rx,
            orientation_tx,
            constellation_tx,
            failed_captures: 0,
        };

        Ok(SessionHandle {
            commands: command_tx,
            orientation: orientation_rx,
            constellation: constellation_rx,
            task: tokio::spawn(task.run()),
        })
    }
}

/// Handle to a running capture session
///
/// Dropping the handle shuts the session down without waiting for it.
#[derive(Debug)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    orientation: watch::Receiver<OrientationEstimate>,
    constellation: watch::Receiver<Constellation>,
    task: JoinHandle<SessionSummary>,
}

impl SessionHandle {
    /// Zero the yaw reference at the current heading
    pub fn recenter(&self) -> Result<()> {
        self.commands
            .send(Command::Recenter)
            .map_err(|_| Error::SessionClosed)
    }

    /// Receiver of every published orientation estimate
    pub fn orientation(&self) -> watch::Receiver<OrientationEstimate> {
        self.orientation.clone()
    }

    /// Receiver of the constellation, republished after every capture
    pub fn constellation(&self) -> watch::Receiver<Constellation> {
        self.constellation.clone()
    }

    pub fn captured_count(&self) -> usize {
        self.constellation.borrow().captured_count()
    }

    /// Whether the session task has stopped
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the session, release the sensor streams and return the final state.
    ///
    /// Also collects the summary of a session that already ended because its
    /// sensor stream closed.
    pub async fn shutdown(self) -> Result<SessionSummary> {
        // The task may already be gone if the sensor stream ended
        let _ = self.commands.send(Command::Shutdown);
        self.task.await.map_err(|_| Error::SessionClosed)
    }
}

struct SessionTask<S: SensorSource, C: CaptureSink> {
    controller: CaptureController,
    estimator: OrientationEstimator,
    source: S,
    subscriptions: Vec<SubscriptionHandle>,
    sink: Arc<C>,
    sensor_rx: mpsc::Receiver<SensorEvent>,
    command_rx: mpsc::UnboundedReceiver<Command>,
    completion_tx: mpsc::Sender<Completion>,
    completion_rx: mpsc::Receiver<Completion>,
    orientation_tx: watch::Sender<OrientationEstimate>,
    constellation_tx: watch::Sender<Constellation>,
    failed_captures: u64,
}

impl<S: SensorSource, C: CaptureSink> SessionTask<S, C> {
    async fn run(mut self) -> SessionSummary {
        loop {
            let release_at = self.controller.release_at().map(Instant::from_std);

            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(Command::Recenter) => {
                        debug!("recentering yaw");
                        self.estimator.recenter();
                    }
                    Some(Command::Shutdown) | None => break,
                },
                Some(completion) = self.completion_rx.recv() => self.on_completion(completion),
                _ = sleep_until(release_at.unwrap_or_else(Instant::now)), if release_at.is_some() => {
                    self.controller.tick(Instant::now().into_std());
                }
                event = self.sensor_rx.recv() => match event {
                    Some(event) => self.on_sensor_event(event),
                    None => {
                        info!("sensor stream ended");
                        break;
                    }
                },
            }
        }

        self.teardown()
    }

    fn on_sensor_event(&mut self, event: SensorEvent) {
        let Some(estimate) = self.estimator.handle(event) else {
            return;
        };
        self.orientation_tx.send_replace(estimate);

        if let Some(request) = self.controller.evaluate(&estimate, Instant::now().into_std()) {
            self.spawn_capture(request);
        }
    }

    fn spawn_capture(&self, request: CaptureRequest) {
        let sink = Arc::clone(&self.sink);
        let completions = self.completion_tx.clone();

        tokio::spawn(async move {
            let result = sink.take_photo().await;
            // The session may have shut down while the photo was taken
            let _ = completions
                .send(Completion {
                    index: request.index,
                    result,
                })
                .await;
        });
    }

    fn on_completion(&mut self, completion: Completion) {
        if completion.result.is_err() {
            self.failed_captures += 1;
        }

        let now = Instant::now().into_std();
        if self.controller.complete(completion.index, completion.result, now) {
            self.constellation_tx
                .send_replace(self.controller.constellation().clone());
        }
    }

    fn teardown(mut self) -> SessionSummary {
        for handle in self.subscriptions.drain(..) {
            self.source.unsubscribe(handle);
        }

        let summary = SessionSummary {
            failed_captures: self.failed_captures,
            diagnostics: self.estimator.diagnostics(),
            constellation: self.controller.into_constellation(),
        };
        info!(
            captured = summary.constellation.captured_count(),
            total = summary.constellation.len(),
            failed = summary.failed_captures,
            "capture session stopped"
        );
        summary
    }
}
