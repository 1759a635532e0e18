//! Alignment-triggered capture state machine

use std::time::Instant;

use tracing::{info, warn};

use crate::alignment::is_aligned;
use crate::constellation::{CapturedImage, Constellation, TargetId, TargetPoint};
use crate::error::CaptureError;
use crate::projector::{Direction, Projection, project};
use crate::types::{
    AlignmentSettings, ControllerSettings, OrientationEstimate, PitchConvention, SessionSettings,
    ViewSettings,
};

/// Capture state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    /// Waiting for a target to come into alignment
    #[default]
    Idle,
    /// A capture is in flight or its debounce has not elapsed
    Capturing,
}

/// Request for the capture sink to photograph one target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureRequest {
    /// Position of the target in the constellation
    pub index: usize,
    pub id: TargetId,
    pub direction: Direction,
}

/// Capture controller
///
/// Owns the constellation and decides, for each published orientation
/// estimate, whether to request a capture. At most one capture is in flight;
/// after it completes the controller waits out the debounce before
/// evaluating again. Time is passed in by the caller.
///
/// # Example
/// ```
/// use std::time::{Duration, Instant};
/// use sphere_capture::{
///     CaptureController, CapturedImage, Density, OrientationEstimate, PitchConvention,
///     SessionSettings, SphereLayout,
/// };
///
/// let settings = SessionSettings::default();
/// let constellation = SphereLayout::preset(Density::Standard).generate(PitchConvention::NadirZero);
/// let mut controller = CaptureController::new(constellation, &settings);
///
/// let now = Instant::now();
/// let looking_at_horizon = OrientationEstimate::new(90.0, 0.0, 0.0);
///
/// let request = controller.evaluate(&looking_at_horizon, now).unwrap();
/// assert_eq!(request.index, 7); // First point of the horizon ring
///
/// controller.complete(request.index, Ok(CapturedImage::new("7.jpg")), now);
/// assert_eq!(controller.captured_count(), 1);
///
/// // Released once the debounce has elapsed
/// assert!(controller.tick(now + Duration::from_millis(500)));
/// ```
#[derive(Debug, Clone)]
pub struct CaptureController {
    constellation: Constellation,
    convention: PitchConvention,
    view: ViewSettings,
    alignment: AlignmentSettings,
    settings: ControllerSettings,
    state: CaptureState,
    /// Index of the target whose capture is outstanding
    in_flight: Option<usize>,
    /// When the debounce after the last completion ends
    release_at: Option<Instant>,
    last_evaluation: Option<Instant>,
}

impl CaptureController {
    /// Create a controller over `constellation` using the session's view,
    /// alignment and timing settings
    pub fn new(constellation: Constellation, settings: &SessionSettings) -> Self {
        Self::with_settings(
            constellation,
            settings.view,
            settings.alignment,
            settings.controller,
        )
    }

    /// Create a controller from individual settings sections
    pub fn with_settings(
        constellation: Constellation,
        view: ViewSettings,
        alignment: AlignmentSettings,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            convention: constellation.convention(),
            constellation,
            view,
            alignment,
            settings,
            state: CaptureState::Idle,
            in_flight: None,
            release_at: None,
            last_evaluation: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn constellation(&self) -> &Constellation {
        &self.constellation
    }

    /// Consume the controller, keeping the constellation
    pub fn into_constellation(self) -> Constellation {
        self.constellation
    }

    pub fn captured_count(&self) -> usize {
        self.constellation.captured_count()
    }

    /// Index of the target whose capture has not completed yet
    pub fn in_flight(&self) -> Option<usize> {
        self.in_flight
    }

    /// When the current debounce ends, if one is running
    pub fn release_at(&self) -> Option<Instant> {
        self.release_at
    }

    /// Evaluate alignment for a newly published estimate.
    ///
    /// Returns a request for the first uncaptured target, in constellation
    /// order, that is aligned with the view. Returns `None` while
    /// [`CaptureState::Capturing`], once every target is captured, and when
    /// called sooner than the minimum evaluation interval.
    pub fn evaluate(&mut self, estimate: &OrientationEstimate, now: Instant) -> Option<CaptureRequest> {
        self.tick(now);

        if self.state == CaptureState::Capturing || self.constellation.is_complete() {
            return None;
        }

        let interval = self.settings.min_evaluation_interval();
        if self
            .last_evaluation
            .is_some_and(|last| now.saturating_duration_since(last) < interval)
        {
            return None;
        }
        self.last_evaluation = Some(now);

        let (index, target) = self.constellation.uncaptured().find(|(_, target)| {
            let projection = self.project(target, estimate);
            is_aligned(
                target.direction(),
                &projection,
                &self.alignment,
                &self.view,
                self.convention,
            )
        })?;

        let request = CaptureRequest {
            index,
            id: target.id(),
            direction: target.direction(),
        };

        self.state = CaptureState::Capturing;
        self.in_flight = Some(index);
        info!(
            id = %request.id,
            pitch = request.direction.pitch,
            yaw = request.direction.yaw,
            "target aligned, requesting capture"
        );

        Some(request)
    }

    /// Record the outcome of the capture for the target at `index`.
    ///
    /// A failed capture leaves the target uncaptured without retrying it.
    /// Either way the debounce starts at `now`. Completions for a target that
    /// is not in flight are ignored and `false` is returned.
    pub fn complete(
        &mut self,
        index: usize,
        result: Result<CapturedImage, CaptureError>,
        now: Instant,
    ) -> bool {
        if self.in_flight != Some(index) {
            warn!(index, "ignoring completion for a capture that is not in flight");
            return false;
        }
        self.in_flight = None;

        match result {
            Ok(image) => {
                let path = image.path.display().to_string();
                match self.constellation.mark_captured(index, image) {
                    Ok(()) => info!(
                        index,
                        %path,
                        captured = self.constellation.captured_count(),
                        total = self.constellation.len(),
                        "target captured"
                    ),
                    Err(err) => warn!(index, %err, "discarding capture result"),
                }
            }
            Err(err) => warn!(index, %err, "capture failed, target left uncaptured"),
        }

        let debounce = self.settings.debounce();
        if debounce.is_zero() {
            self.state = CaptureState::Idle;
            self.release_at = None;
        } else {
            self.release_at = Some(now + debounce);
        }

        if self.constellation.is_complete() {
            info!(total = self.constellation.len(), "all targets captured");
        }
        true
    }

    /// Return to [`CaptureState::Idle`] if the debounce has elapsed by `now`.
    ///
    /// Returns `true` when this call released the controller.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.release_at {
            Some(release_at) if self.in_flight.is_none() && now >= release_at => {
                self.state = CaptureState::Idle;
                self.release_at = None;
                true
            }
            _ => false,
        }
    }

    /// Project every target for drawing the preview overlay
    pub fn projections<'a>(
        &'a self,
        estimate: &'a OrientationEstimate,
    ) -> impl Iterator<Item = (&'a TargetPoint, Projection)> + 'a {
        self.constellation
            .iter()
            .map(move |target| (target, self.project(target, estimate)))
    }

    fn project(&self, target: &TargetPoint, estimate: &OrientationEstimate) -> Projection {
        project(
            target.direction(),
            estimate,
            self.view.fov,
            self.view.screen,
            self.view.visible_fraction,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{Density, SphereLayout};
    use std::time::Duration;

    const HORIZON: OrientationEstimate = OrientationEstimate {
        pitch: 90.0,
        roll: 0.0,
        yaw: 0.0,
    };

    fn controller() -> CaptureController {
        let constellation = SphereLayout::preset(Density::Standard).generate(PitchConvention::NadirZero);
        CaptureController::new(constellation, &SessionSettings::default())
    }

    fn image(index: usize) -> CapturedImage {
        CapturedImage::new(format!("/photos/{index}.jpg"))
    }

    #[test]
    fn test_aligned_target_emits_request() {
        let mut controller = controller();
        let request = controller.evaluate(&HORIZON, Instant::now()).unwrap();

        assert_eq!(request.index, 7);
        assert_eq!(request.direction, Direction::new(90.0, 0.0));
        assert_eq!(controller.state(), CaptureState::Capturing);
        assert_eq!(controller.in_flight(), Some(7));
    }

    #[test]
    fn test_no_request_when_nothing_aligned() {
        let mut controller = controller();
        // Between two horizon targets (45° apart)
        let estimate = OrientationEstimate::new(90.0, 0.0, 22.0);
        assert_eq!(controller.evaluate(&estimate, Instant::now()), None);
        assert_eq!(controller.state(), CaptureState::Idle);
    }

    #[test]
    fn test_at_most_one_in_flight() {
        let mut controller = controller();
        let now = Instant::now();

        let requests = (0..100)
            .filter_map(|i| controller.evaluate(&HORIZON, now + Duration::from_millis(i)))
            .count();
        assert_eq!(requests, 1);
    }

    #[test]
    fn test_debounce_holds_capturing() {
        let mut controller = controller();
        let start = Instant::now();
        let request = controller.evaluate(&HORIZON, start).unwrap();

        let done = start + Duration::from_millis(200);
        assert!(controller.complete(request.index, Ok(image(request.index)), done));
        assert_eq!(controller.state(), CaptureState::Capturing);
        assert_eq!(controller.release_at(), Some(done + Duration::from_millis(500)));

        // Still inside the debounce: a neighbouring target is aligned but ignored
        let neighbour = OrientationEstimate::new(90.0, 0.0, 45.0);
        assert_eq!(controller.evaluate(&neighbour, done + Duration::from_millis(499)), None);

        let request = controller.evaluate(&neighbour, done + Duration::from_millis(500)).unwrap();
        assert_eq!(request.index, 8);
    }

    #[test]
    fn test_captured_target_is_never_requested_again() {
        let mut controller = controller();
        let mut now = Instant::now();
        let request = controller.evaluate(&HORIZON, now).unwrap();
        controller.complete(request.index, Ok(image(request.index)), now);

        // Sustained identical orientation long after the debounce
        for _ in 0..50 {
            now += Duration::from_secs(1);
            assert_eq!(controller.evaluate(&HORIZON, now), None);
        }
        assert_eq!(controller.captured_count(), 1);
    }

    #[test]
    fn test_failed_capture_is_not_retried_immediately() {
        let mut controller = controller();
        let now = Instant::now();
        let request = controller.evaluate(&HORIZON, now).unwrap();

        controller.complete(request.index, Err(CaptureError::new("camera busy")), now);
        assert_eq!(controller.captured_count(), 0);
        assert!(!controller.constellation().get(7).unwrap().is_captured());
        assert_eq!(controller.evaluate(&HORIZON, now + Duration::from_millis(100)), None);

        // After the debounce the target is still eligible
        let retry = controller.evaluate(&HORIZON, now + Duration::from_millis(500));
        assert_eq!(retry.map(|request| request.index), Some(7));
    }

    #[test]
    fn test_stale_completion_ignored() {
        let mut controller = controller();
        let now = Instant::now();

        assert!(!controller.complete(3, Ok(image(3)), now));
        assert_eq!(controller.captured_count(), 0);
        assert_eq!(controller.state(), CaptureState::Idle);

        let request = controller.evaluate(&HORIZON, now).unwrap();
        assert!(!controller.complete(request.index + 1, Ok(image(8)), now));
        assert_eq!(controller.in_flight(), Some(request.index));
    }

    #[test]
    fn test_tick_waits_for_completion() {
        let mut controller = controller();
        let now = Instant::now();
        controller.evaluate(&HORIZON, now).unwrap();

        assert!(!controller.tick(now + Duration::from_secs(60)));
        assert_eq!(controller.state(), CaptureState::Capturing);
    }

    #[test]
    fn test_zero_debounce_releases_on_completion() {
        let settings = SessionSettings {
            controller: ControllerSettings {
                debounce_ms: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        let constellation = SphereLayout::preset(Density::Standard).generate(PitchConvention::NadirZero);
        let mut controller = CaptureController::new(constellation, &settings);
        let now = Instant::now();

        let request = controller.evaluate(&HORIZON, now).unwrap();
        controller.complete(request.index, Ok(image(request.index)), now);
        assert_eq!(controller.state(), CaptureState::Idle);
        assert_eq!(controller.release_at(), None);
    }

    #[test]
    fn test_evaluation_throttle() {
        let settings = SessionSettings {
            controller: ControllerSettings {
                min_evaluation_interval_ms: 100,
                ..Default::default()
            },
            ..Default::default()
        };
        let constellation = SphereLayout::preset(Density::Standard).generate(PitchConvention::NadirZero);
        let mut controller = CaptureController::new(constellation, &settings);
        let now = Instant::now();

        let off_target = OrientationEstimate::new(90.0, 0.0, 22.0);
        assert_eq!(controller.evaluate(&off_target, now), None);
        // Aligned, but too soon after the previous evaluation
        assert_eq!(controller.evaluate(&HORIZON, now + Duration::from_millis(50)), None);
        assert!(controller.evaluate(&HORIZON, now + Duration::from_millis(100)).is_some());
    }

    #[test]
    fn test_pole_target_captured_at_any_yaw() {
        let mut controller = controller();
        let looking_up = OrientationEstimate::new(179.5, 0.0, 233.0);

        let request = controller.evaluate(&looking_up, Instant::now()).unwrap();
        assert_eq!(request.index, 0);
    }

    #[test]
    fn test_complete_sweep_is_terminal() {
        let mut controller = CaptureController::new(
            SphereLayout::new(vec![1, 2, 1]).unwrap().generate(PitchConvention::NadirZero),
            &SessionSettings::default(),
        );
        let mut now = Instant::now();

        let poses = [
            OrientationEstimate::new(180.0, 0.0, 0.0),
            OrientationEstimate::new(90.0, 0.0, 0.0),
            OrientationEstimate::new(90.0, 0.0, 180.0),
            OrientationEstimate::new(0.0, 0.0, 0.0),
        ];
        for pose in poses {
            let request = controller.evaluate(&pose, now).unwrap();
            controller.complete(request.index, Ok(image(request.index)), now);
            now += Duration::from_secs(1);
        }

        assert!(controller.constellation().is_complete());
        for pose in poses {
            assert_eq!(controller.evaluate(&pose, now), None);
        }
    }

    #[test]
    fn test_projections_cover_every_target() {
        let controller = controller();
        let projections: Vec<_> = controller.projections(&HORIZON).collect();
        assert_eq!(projections.len(), 22);

        let visible = projections.iter().filter(|(_, projection)| projection.is_visible).count();
        // Only the horizon target straight ahead is within 2/3 of the view
        assert_eq!(visible, 1);
    }
}
