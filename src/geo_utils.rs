//! Geographic utilities: great-circle distance and polyline arithmetic.
//!
//! All coordinates are WGS84 latitude/longitude in degrees, all distances
//! are meters. Inputs are assumed valid (`GeoPoint::is_valid`); validation
//! happens at the API boundary, not here.

use geo::{Distance, Haversine, Point};

use crate::GeoPoint;

/// Great-circle distance between two points in meters.
///
/// Symmetric, and zero (within floating tolerance) iff the points are equal.
pub fn haversine_distance(a: &GeoPoint, b: &GeoPoint) -> f64 {
    Haversine::distance(
        Point::new(a.longitude, a.latitude),
        Point::new(b.longitude, b.latitude),
    )
}

/// Total length of a polyline in meters.
pub fn polyline_length(points: &[GeoPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}
