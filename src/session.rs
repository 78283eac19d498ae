//! # Journey Session
//!
//! Orchestrates one journey across its life: waypoint editing, route
//! composition, live tracking, completion, reset.
//!
//! ## Architecture
//!
//! All mutable journey state is owned by a single [`JourneySession`] and
//! mutated only through `&mut self` methods, so every transition happens on
//! one logical owner. Route composition runs elsewhere (it is async); the
//! session hands out [`ComposeRequest`] snapshots tagged with a revision
//! counter and discards any composition result whose revision no longer
//! matches. The stale-result guard is the sole concurrency-control
//! mechanism. Nothing here suspends or performs I/O.

use std::sync::Mutex;
use std::time::SystemTime;

use log::{debug, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::composer::MIN_WAYPOINTS;
use crate::error::{Result, TrackError};
use crate::eta::{estimate, Eta};
use crate::projection::project;
use crate::speed::SpeedEstimator;
use crate::{GeoPoint, PositionFix, Route, TrackerConfig};

/// Lifecycle states of a journey session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No route; waypoints absent or still too few.
    Idle,
    /// A composition request is in flight.
    Composing,
    /// Route composed; not yet consuming position updates.
    Ready,
    /// Consuming position updates, progress/speed/ETA live.
    Tracking,
    /// Destination reached; terminal until reset.
    Completed,
}

/// Snapshot handed out on waypoint mutation: the waypoint list to compose,
/// tagged with the session revision it belongs to. Feed it through
/// [`crate::composer::compose`] and hand the outcome back via
/// [`JourneySession::apply_composition`].
#[derive(Debug, Clone, PartialEq)]
pub struct ComposeRequest {
    pub revision: u64,
    pub waypoints: Vec<GeoPoint>,
}

/// Progress snapshot returned for each consumed position update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Traveled fraction in [0, 1].
    pub fraction: f64,
    /// Meters of route behind the user.
    pub traveled_distance: f64,
    /// Meters of route ahead of the user.
    pub remaining_distance: f64,
    /// Current smoothed speed in m/s.
    pub smoothed_speed: f64,
    /// Arrival estimate; `None` while unknown.
    pub eta: Option<Eta>,
    /// Whether the session has reached `Completed`.
    pub completed: bool,
}

/// State machine for one journey.
pub struct JourneySession {
    config: TrackerConfig,
    state: SessionState,
    waypoints: Vec<GeoPoint>,
    /// Bumped on every waypoint mutation and on reset; the stale-result
    /// guard for in-flight compositions.
    revision: u64,
    route: Option<Route>,
    speed: SpeedEstimator,
    last_speed_fix: Option<PositionFix>,
    traveled_fraction: f64,
    traveled_distance: f64,
    eta: Option<Eta>,
    started_at: Option<SystemTime>,
}

impl JourneySession {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            speed: SpeedEstimator::new(&config),
            config,
            state: SessionState::Idle,
            waypoints: Vec::new(),
            revision: 0,
            route: None,
            last_speed_fix: None,
            traveled_fraction: 0.0,
            traveled_distance: 0.0,
            eta: None,
            started_at: None,
        }
    }

    // ========================================================================
    // Waypoint editing
    // ========================================================================

    /// Append a waypoint. Returns a [`ComposeRequest`] when the resulting
    /// list is composable (two or more entries). Invalid coordinates are
    /// rejected at this boundary and leave the session untouched.
    pub fn add_waypoint(&mut self, point: GeoPoint) -> Option<ComposeRequest> {
        if self.journey_over() {
            return None;
        }
        if !point.is_valid() {
            warn!(
                "[session] rejecting invalid waypoint ({}, {})",
                point.latitude, point.longitude
            );
            return None;
        }
        self.waypoints.push(point);
        self.after_mutation()
    }

    /// Remove the waypoint at `index`; out-of-range indices are a no-op.
    pub fn remove_waypoint(&mut self, index: usize) -> Option<ComposeRequest> {
        if self.journey_over() || index >= self.waypoints.len() {
            return None;
        }
        self.waypoints.remove(index);
        self.after_mutation()
    }

    /// Drop all waypoints; the session returns to `Idle`.
    pub fn clear_waypoints(&mut self) {
        if self.journey_over() {
            return;
        }
        self.waypoints.clear();
        let _ = self.after_mutation();
    }

    /// `Completed` is terminal: waypoint edits are refused until an explicit
    /// reset starts the next journey.
    fn journey_over(&self) -> bool {
        if self.state == SessionState::Completed {
            debug!("[session] waypoint edit ignored; journey completed, reset first");
            true
        } else {
            false
        }
    }

    /// Snapshot of the current waypoint list for a composition retry,
    /// without mutating anything. `None` while the list is not composable.
    pub fn compose_request(&self) -> Option<ComposeRequest> {
        if self.waypoints.len() < MIN_WAYPOINTS {
            return None;
        }
        Some(ComposeRequest {
            revision: self.revision,
            waypoints: self.waypoints.clone(),
        })
    }

    fn after_mutation(&mut self) -> Option<ComposeRequest> {
        self.revision += 1;
        if self.waypoints.len() >= MIN_WAYPOINTS {
            self.state = SessionState::Composing;
            self.compose_request()
        } else {
            self.route = None;
            self.state = SessionState::Idle;
            None
        }
    }

    // ========================================================================
    // Composition results
    // ========================================================================

    /// Merge a finished composition back into the session.
    ///
    /// Returns `false` and leaves the session untouched when `revision` no
    /// longer matches the current waypoint list (the stale-result guard). A
    /// current success publishes the route atomically and moves to `Ready`;
    /// a current failure retains the previously published route if one
    /// exists.
    pub fn apply_composition(
        &mut self,
        revision: u64,
        outcome: Result<Route>,
    ) -> bool {
        if revision != self.revision {
            debug!(
                "[session] discarding stale composition (revision {} != {})",
                revision, self.revision
            );
            return false;
        }
        match outcome {
            Ok(route) => {
                self.route = Some(route);
                self.state = SessionState::Ready;
                self.traveled_fraction = 0.0;
                self.traveled_distance = 0.0;
                self.eta = None;
                self.started_at = None;
            }
            Err(err) => {
                warn!("[session] composition failed: {}", err);
                self.state = if self.route.is_some() {
                    SessionState::Ready
                } else {
                    SessionState::Idle
                };
            }
        }
        true
    }

    // ========================================================================
    // Tracking
    // ========================================================================

    /// Begin consuming position updates. Requires a composed route.
    pub fn start_tracking(&mut self, now: SystemTime) -> Result<()> {
        if self.state != SessionState::Ready || self.route.is_none() {
            return Err(TrackError::NoRouteAvailable);
        }
        self.state = SessionState::Tracking;
        self.started_at = Some(now);
        Ok(())
    }

    /// Consume one position fix.
    ///
    /// Projection runs on every accepted fix; the speed estimator is fed at
    /// most once per configured sampling interval. Fixes with an accuracy
    /// worse than the configured gate, or invalid coordinates, are ignored
    /// entirely. Once the traveled fraction reaches 1.0 the session is
    /// `Completed` and further updates are ignored.
    pub fn update_position(&mut self, fix: PositionFix) -> Result<ProgressUpdate> {
        match self.state {
            SessionState::Completed => return Ok(self.progress_update()),
            SessionState::Tracking => {}
            _ => return Err(TrackError::NoRouteAvailable),
        }
        let route = self.route.as_ref().ok_or(TrackError::NoRouteAvailable)?;

        if !fix.point.is_valid() {
            debug!("[session] ignoring fix with invalid coordinates");
            return Ok(self.progress_update());
        }
        if let (Some(max_accuracy), Some(accuracy)) = (self.config.max_accuracy_m, fix.accuracy) {
            if accuracy > max_accuracy {
                debug!(
                    "[session] ignoring fix with accuracy {:.0} m (gate {:.0} m)",
                    accuracy, max_accuracy
                );
                return Ok(self.progress_update());
            }
        }

        let total_distance = route.total_distance;
        let progress = project(route, &fix.point, self.config.arrival_threshold_m);
        self.traveled_fraction = progress.fraction;
        self.traveled_distance = progress.distance_traveled;

        self.observe_speed(&fix);

        self.eta = if total_distance > 0.0 {
            let remaining = total_distance * (1.0 - self.traveled_fraction);
            estimate(remaining, self.speed.smoothed_speed(), fix.timestamp)
        } else {
            // Zero-length route: remaining distance is meaningless, report
            // the estimate as unknown.
            None
        };

        if self.traveled_fraction >= 1.0 {
            self.state = SessionState::Completed;
        }
        Ok(self.progress_update())
    }

    /// Feed the speed estimator, throttled to the configured interval.
    /// Non-positive elapsed time and missing previous fixes are silent
    /// no-ops.
    fn observe_speed(&mut self, fix: &PositionFix) {
        let previous = match self.last_speed_fix {
            Some(previous) => previous,
            None => {
                self.last_speed_fix = Some(*fix);
                return;
            }
        };
        match fix.timestamp.duration_since(previous.timestamp) {
            Ok(elapsed) if elapsed >= self.config.min_speed_sample_interval => {
                self.speed.observe(&fix.point, Some(&previous.point), elapsed);
                self.last_speed_fix = Some(*fix);
            }
            Ok(_) => {
                // Inside the throttle window; keep the current anchor.
            }
            Err(_) => {
                debug!("[session] out-of-order fix ignored for speed");
            }
        }
    }

    /// Clear everything and return to `Idle`. Any in-flight composition
    /// becomes stale.
    pub fn reset(&mut self) {
        self.revision += 1;
        self.waypoints.clear();
        self.route = None;
        self.speed.reset();
        self.last_speed_fix = None;
        self.traveled_fraction = 0.0;
        self.traveled_distance = 0.0;
        self.eta = None;
        self.started_at = None;
        self.state = SessionState::Idle;
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn waypoints(&self) -> &[GeoPoint] {
        &self.waypoints
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn traveled_fraction(&self) -> f64 {
        self.traveled_fraction
    }

    pub fn traveled_distance(&self) -> f64 {
        self.traveled_distance
    }

    pub fn smoothed_speed(&self) -> f64 {
        self.speed.smoothed_speed()
    }

    pub fn speed_sample_count(&self) -> usize {
        self.speed.sample_count()
    }

    pub fn eta(&self) -> Option<Eta> {
        self.eta
    }

    pub fn started_at(&self) -> Option<SystemTime> {
        self.started_at
    }

    fn progress_update(&self) -> ProgressUpdate {
        let remaining_distance = self
            .route
            .as_ref()
            .map(|r| r.total_distance * (1.0 - self.traveled_fraction))
            .unwrap_or(0.0);
        ProgressUpdate {
            fraction: self.traveled_fraction,
            traveled_distance: self.traveled_distance,
            remaining_distance,
            smoothed_speed: self.speed.smoothed_speed(),
            eta: self.eta,
            completed: self.state == SessionState::Completed,
        }
    }
}

/// Process-wide session for embedders that want a single shared journey.
pub static SESSION: Lazy<Mutex<JourneySession>> =
    Lazy::new(|| Mutex::new(JourneySession::new(TrackerConfig::default())));

/// Run a closure against the shared session.
pub fn with_session<F, R>(f: F) -> R
where
    F: FnOnce(&mut JourneySession) -> R,
{
    let mut session = SESSION.lock().unwrap();
    f(&mut session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_utils::polyline_length;
    use crate::Bounds;
    use std::time::Duration;

    fn pt(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon)
    }

    fn composition_error() -> TrackError {
        TrackError::CompositionFailed {
            failures: vec![crate::error::LegFailure {
                leg_index: 0,
                origin: pt(0.0, 0.0),
                destination: pt(0.0, 0.02),
                cause: crate::error::RoutingFailure::NoRoute,
            }],
        }
    }

    fn fix(lat: f64, lon: f64, secs: u64) -> PositionFix {
        PositionFix {
            point: pt(lat, lon),
            timestamp: SystemTime::UNIX_EPOCH + Duration::from_secs(secs),
            accuracy: None,
        }
    }

    /// Straight equatorial route, ~2.2 km east, a vertex every ~111 m.
    fn straight_route(waypoints: Vec<GeoPoint>) -> Route {
        let polyline: Vec<GeoPoint> = (0..=20).map(|i| pt(0.0, i as f64 * 0.001)).collect();
        let total_distance = polyline_length(&polyline);
        Route {
            bounds: Bounds::from_points(&polyline),
            waypoint_offsets: vec![0.0, total_distance],
            expected_duration: total_distance / 1.4,
            total_distance,
            polyline,
            waypoints,
        }
    }

    /// Session in `Tracking` on the straight route, started at t=0.
    fn tracking_session() -> JourneySession {
        let mut session = JourneySession::new(TrackerConfig::default());
        assert!(session.add_waypoint(pt(0.0, 0.0)).is_none());
        let request = session.add_waypoint(pt(0.0, 0.02)).unwrap();
        let route = straight_route(request.waypoints.clone());
        assert!(session.apply_composition(request.revision, Ok(route)));
        session
            .start_tracking(SystemTime::UNIX_EPOCH)
            .unwrap();
        session
    }

    #[test]
    fn test_single_waypoint_stays_idle() {
        let mut session = JourneySession::new(TrackerConfig::default());
        assert!(session.add_waypoint(pt(0.0, 0.0)).is_none());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_two_waypoints_request_composition() {
        let mut session = JourneySession::new(TrackerConfig::default());
        assert!(session.add_waypoint(pt(0.0, 0.0)).is_none());
        let request = session.add_waypoint(pt(0.0, 0.02)).unwrap();
        assert_eq!(session.state(), SessionState::Composing);
        assert_eq!(request.waypoints.len(), 2);
    }

    #[test]
    fn test_invalid_waypoint_rejected_at_boundary() {
        let mut session = JourneySession::new(TrackerConfig::default());
        assert!(session.add_waypoint(pt(91.0, 0.0)).is_none());
        assert!(session.waypoints().is_empty());
    }

    #[test]
    fn test_remove_below_two_waypoints_clears_route() {
        let mut session = tracking_session();
        assert!(session.remove_waypoint(1).is_none());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.route().is_none());
    }

    #[test]
    fn test_stale_composition_discarded() {
        let mut session = JourneySession::new(TrackerConfig::default());
        assert!(session.add_waypoint(pt(0.0, 0.0)).is_none());
        let request = session.add_waypoint(pt(0.0, 0.02)).unwrap();
        // Waypoints change again while the first composition is in flight.
        assert!(session.add_waypoint(pt(0.0, 0.03)).is_some());
        let route = straight_route(request.waypoints.clone());
        assert!(!session.apply_composition(request.revision, Ok(route)));
        assert_eq!(session.state(), SessionState::Composing);
        assert!(session.route().is_none());
    }

    #[test]
    fn test_failed_composition_without_prior_route_goes_idle() {
        let mut session = JourneySession::new(TrackerConfig::default());
        assert!(session.add_waypoint(pt(0.0, 0.0)).is_none());
        let request = session.add_waypoint(pt(0.0, 0.02)).unwrap();
        let applied = session.apply_composition(request.revision, Err(composition_error()));
        assert!(applied);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_failed_recomposition_retains_prior_route() {
        let mut session = tracking_session();
        let request = session.add_waypoint(pt(0.0, 0.03)).unwrap();
        assert_eq!(session.state(), SessionState::Composing);
        session.apply_composition(request.revision, Err(composition_error()));
        assert_eq!(session.state(), SessionState::Ready);
        assert!(session.route().is_some());
    }

    #[test]
    fn test_start_tracking_requires_ready_route() {
        let mut session = JourneySession::new(TrackerConfig::default());
        assert_eq!(
            session.start_tracking(SystemTime::UNIX_EPOCH),
            Err(TrackError::NoRouteAvailable)
        );
    }

    #[test]
    fn test_update_position_requires_tracking() {
        let mut session = JourneySession::new(TrackerConfig::default());
        assert!(session.update_position(fix(0.0, 0.0, 0)).is_err());
    }

    #[test]
    fn test_progress_advances_along_route() {
        let mut session = tracking_session();
        let first = session.update_position(fix(0.0, 0.001, 0)).unwrap();
        let second = session.update_position(fix(0.0, 0.010, 60)).unwrap();
        assert!(second.fraction > first.fraction);
        assert!((second.fraction - 0.5).abs() < 0.03);
        assert!(second.traveled_distance > first.traveled_distance);
    }

    #[test]
    fn test_speed_updates_are_throttled() {
        let mut session = tracking_session();
        session.update_position(fix(0.0, 0.0, 0)).unwrap();
        // One second later: inside the 2 s sampling interval, no speed update
        let update = session.update_position(fix(0.0, 0.00002, 1)).unwrap();
        assert_eq!(session.speed_sample_count(), 0);
        assert_eq!(update.smoothed_speed, 1.4);
        // Five seconds after the anchor: sampled (~1.6 m/s over ~8 m)
        session.update_position(fix(0.0, 0.00007, 5)).unwrap();
        assert_eq!(session.speed_sample_count(), 1);
    }

    #[test]
    fn test_eta_uses_sampled_speed() {
        let mut session = tracking_session();
        session.update_position(fix(0.0, 0.0, 0)).unwrap();
        // ~111 m in 60 s -> ~1.85 m/s accepted sample
        let update = session.update_position(fix(0.0, 0.001, 60)).unwrap();
        let eta = update.eta.unwrap();
        let expected = update.remaining_distance / update.smoothed_speed;
        assert!((eta.remaining.as_secs_f64() - expected).abs() < 1.0);
        assert_eq!(session.speed_sample_count(), 1);
    }

    #[test]
    fn test_arrival_completes_the_session() {
        let mut session = tracking_session();
        // ~22 m short of the destination: the 50 m override fires
        let update = session.update_position(fix(0.0, 0.0198, 600)).unwrap();
        assert_eq!(update.fraction, 1.0);
        assert!(update.completed);
        assert_eq!(session.state(), SessionState::Completed);

        // Completed is terminal: further updates change nothing
        let after = session.update_position(fix(0.0, 0.010, 700)).unwrap();
        assert_eq!(after.fraction, 1.0);
        assert_eq!(session.state(), SessionState::Completed);
    }

    #[test]
    fn test_inaccurate_fix_ignored() {
        let mut session = tracking_session();
        session.update_position(fix(0.0, 0.001, 0)).unwrap();
        let before = session.traveled_fraction();
        let mut bad = fix(0.0, 0.015, 10);
        bad.accuracy = Some(120.0);
        let update = session.update_position(bad).unwrap();
        assert_eq!(update.fraction, before);
        assert_eq!(session.speed_sample_count(), 0);
    }

    #[test]
    fn test_zero_length_route_has_unknown_eta() {
        let mut session = JourneySession::new(TrackerConfig::default());
        let a = pt(0.0, 0.0);
        assert!(session.add_waypoint(a).is_none());
        let request = session.add_waypoint(a).unwrap();
        let route = Route {
            waypoints: request.waypoints.clone(),
            bounds: Bounds::from_points(&[a, a]),
            polyline: vec![a, a],
            total_distance: 0.0,
            expected_duration: 0.0,
            waypoint_offsets: vec![0.0, 0.0],
        };
        session.apply_composition(request.revision, Ok(route));
        session.start_tracking(SystemTime::UNIX_EPOCH).unwrap();

        let update = session.update_position(fix(0.0, 0.0, 10)).unwrap();
        assert_eq!(update.fraction, 0.0);
        assert!(update.eta.is_none());
    }

    #[test]
    fn test_completed_session_refuses_waypoint_edits() {
        let mut session = tracking_session();
        session.update_position(fix(0.0, 0.0199, 600)).unwrap();
        assert_eq!(session.state(), SessionState::Completed);

        assert!(session.add_waypoint(pt(0.0, 0.03)).is_none());
        session.clear_waypoints();
        assert_eq!(session.state(), SessionState::Completed);
        assert_eq!(session.waypoints().len(), 2);

        // Reset is the only way into the next journey
        session.reset();
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_reset_returns_to_idle_and_clears_history() {
        let mut session = tracking_session();
        session.update_position(fix(0.0, 0.0, 0)).unwrap();
        session.update_position(fix(0.0, 0.001, 60)).unwrap();
        assert_eq!(session.speed_sample_count(), 1);

        session.reset();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.waypoints().is_empty());
        assert!(session.route().is_none());
        assert_eq!(session.speed_sample_count(), 0);
        assert!(session.eta().is_none());
        assert_eq!(session.traveled_fraction(), 0.0);
    }

    #[test]
    fn test_reset_supersedes_inflight_composition() {
        let mut session = JourneySession::new(TrackerConfig::default());
        assert!(session.add_waypoint(pt(0.0, 0.0)).is_none());
        let request = session.add_waypoint(pt(0.0, 0.02)).unwrap();
        session.reset();
        let route = straight_route(request.waypoints.clone());
        assert!(!session.apply_composition(request.revision, Ok(route)));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.route().is_none());
    }

    #[test]
    fn test_first_sample_after_reset_is_fresh_observation() {
        let mut session = tracking_session();
        session.update_position(fix(0.0, 0.0, 0)).unwrap();
        session.update_position(fix(0.0, 0.001, 60)).unwrap();
        session.reset();

        // New journey over the same route
        assert!(session.add_waypoint(pt(0.0, 0.0)).is_none());
        let request = session.add_waypoint(pt(0.0, 0.02)).unwrap();
        let route = straight_route(request.waypoints.clone());
        session.apply_composition(request.revision, Ok(route));
        session
            .start_tracking(SystemTime::UNIX_EPOCH + Duration::from_secs(1000))
            .unwrap();

        // No previous fix exists, so this is a no-op for speed
        session.update_position(fix(0.0, 0.001, 1000)).unwrap();
        assert_eq!(session.speed_sample_count(), 0);
        assert_eq!(session.smoothed_speed(), 1.4);
    }
}
