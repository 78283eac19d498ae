//! Route composition: concurrent per-leg routing requests, joined and
//! assembled into a single traversable [`Route`].
//!
//! Every consecutive waypoint pair becomes one request against the external
//! routing service. All legs are requested in parallel and joined with a
//! barrier; a failing leg does not short-circuit its siblings, but any
//! failure makes the whole composition fail and no partial route is ever
//! published. Legs carry their origin waypoint index and are assembled in
//! that order, never in the order responses arrive.

use std::future::Future;

use futures::future::join_all;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{LegFailure, Result, RoutingFailure, TrackError};
use crate::{Bounds, GeoPoint, Route};

/// Minimum number of waypoints for a composable route.
pub const MIN_WAYPOINTS: usize = 2;

/// Travel mode passed to the routing service. This engine routes on foot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TravelMode {
    Pedestrian,
}

/// Routing-service output for a single leg: the routed polyline between two
/// consecutive waypoints, its length in meters, and the service's expected
/// duration in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutedPath {
    pub polyline: Vec<GeoPoint>,
    pub distance: f64,
    pub duration: f64,
}

/// The external routing service seam.
///
/// Implementations resolve a single origin/destination pair into a routed
/// path, or report why they could not. The engine never caches or retries;
/// that policy belongs to the implementation behind this trait.
pub trait RoutingService {
    fn route(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
        mode: TravelMode,
    ) -> impl Future<Output = std::result::Result<RoutedPath, RoutingFailure>> + Send;
}

/// Compose a route over the given waypoint list.
///
/// Fans out one routing request per consecutive waypoint pair, waits for
/// every leg to resolve, and concatenates the results in waypoint order.
/// Returns [`TrackError::InsufficientWaypoints`] for fewer than two
/// waypoints and an aggregate [`TrackError::CompositionFailed`] naming every
/// failed leg if any request failed.
pub async fn compose<S: RoutingService>(service: &S, waypoints: &[GeoPoint]) -> Result<Route> {
    if waypoints.len() < MIN_WAYPOINTS {
        return Err(TrackError::InsufficientWaypoints {
            count: waypoints.len(),
            minimum_required: MIN_WAYPOINTS,
        });
    }

    info!(
        "[compose] requesting {} leg(s) for {} waypoints",
        waypoints.len() - 1,
        waypoints.len()
    );

    let legs = join_all(waypoints.windows(2).enumerate().map(|(index, pair)| {
        let (origin, destination) = (pair[0], pair[1]);
        async move {
            let outcome = service.route(origin, destination, TravelMode::Pedestrian).await;
            (index, origin, destination, outcome)
        }
    }))
    .await;

    let mut routed = Vec::with_capacity(legs.len());
    let mut failures = Vec::new();
    for (index, origin, destination, outcome) in legs {
        match outcome {
            Ok(path) => routed.push((index, path)),
            Err(cause) => {
                warn!("[compose] leg {} failed: {}", index, cause);
                failures.push(LegFailure {
                    leg_index: index,
                    origin,
                    destination,
                    cause,
                });
            }
        }
    }

    if !failures.is_empty() {
        return Err(TrackError::CompositionFailed { failures });
    }

    // Assembly order is the origin waypoint index, not response arrival order.
    routed.sort_by_key(|leg| leg.0);

    let mut polyline = Vec::new();
    let mut waypoint_offsets = Vec::with_capacity(waypoints.len());
    let mut total_distance = 0.0;
    let mut expected_duration = 0.0;
    waypoint_offsets.push(0.0);
    for (_, leg) in &routed {
        polyline.extend_from_slice(&leg.polyline);
        total_distance += leg.distance;
        expected_duration += leg.duration;
        waypoint_offsets.push(total_distance);
    }

    info!(
        "[compose] route assembled: {:.0} m over {} vertices",
        total_distance,
        polyline.len()
    );

    Ok(Route {
        waypoints: waypoints.to_vec(),
        bounds: Bounds::from_points(&polyline),
        polyline,
        total_distance,
        expected_duration,
        waypoint_offsets,
    })
}
