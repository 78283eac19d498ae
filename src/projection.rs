//! Progress projection: map a live position onto the route polyline.
//!
//! This is a nearest-vertex projection: the position is matched to the
//! closest polyline vertex and credited with the cumulative route distance
//! up to that vertex. Precision is therefore bounded by the polyline's
//! vertex density; routed polylines are dense enough in practice. The
//! contract permits upgrading to a nearest-point-on-segment projection
//! without changing callers.

use serde::{Deserialize, Serialize};

use crate::geo_utils::haversine_distance;
use crate::{GeoPoint, Route};

/// Result of projecting a position onto a route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteProgress {
    /// Traveled fraction of the route, always in [0, 1].
    pub fraction: f64,
    /// Cumulative route distance up to the matched vertex, in meters.
    pub distance_traveled: f64,
    /// Straight-line distance from the position to the matched vertex,
    /// in meters.
    pub distance_to_route: f64,
}

/// Project a position onto the route and compute the traveled fraction.
///
/// A zero-length route (start equals destination) is degenerate: the
/// fraction is defined as 0 and the destination override below does not
/// apply. Otherwise, a position within `arrival_threshold_m` of the final
/// waypoint forces the fraction to exactly 1.0 regardless of the projection
/// result, masking GPS noise near the end of a route.
pub fn project(route: &Route, position: &GeoPoint, arrival_threshold_m: f64) -> RouteProgress {
    if route.total_distance <= 0.0 || route.polyline.is_empty() {
        let distance_to_route = route
            .polyline
            .first()
            .map(|p| haversine_distance(position, p))
            .unwrap_or(0.0);
        return RouteProgress {
            fraction: 0.0,
            distance_traveled: 0.0,
            distance_to_route,
        };
    }

    // Single walk: cumulative route distance per vertex, keeping the vertex
    // nearest to the position.
    let mut cumulative = 0.0;
    let mut best_distance = f64::INFINITY;
    let mut best_cumulative = 0.0;
    let mut previous: Option<&GeoPoint> = None;
    for vertex in &route.polyline {
        if let Some(prev) = previous {
            cumulative += haversine_distance(prev, vertex);
        }
        let distance = haversine_distance(position, vertex);
        if distance < best_distance {
            best_distance = distance;
            best_cumulative = cumulative;
        }
        previous = Some(vertex);
    }

    if let Some(destination) = route.waypoints.last() {
        if haversine_distance(position, destination) < arrival_threshold_m {
            return RouteProgress {
                fraction: 1.0,
                distance_traveled: route.total_distance,
                distance_to_route: best_distance,
            };
        }
    }

    RouteProgress {
        fraction: (best_cumulative / route.total_distance).clamp(0.0, 1.0),
        distance_traveled: best_cumulative,
        distance_to_route: best_distance,
    }
}
