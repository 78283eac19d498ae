//! # Route Progress
//!
//! Waypoint route composition and live GPS progress tracking.
//!
//! This library provides:
//! - Route composition from an ordered waypoint list, one concurrent routing
//!   request per leg, assembled in waypoint order
//! - Live-position projection onto the routed polyline (traveled fraction
//!   and distance)
//! - Rolling-window speed smoothing with outlier rejection
//! - Remaining-time / arrival estimation
//! - A journey session state machine tying it all together
//!
//! ## Features
//!
//! - **`http`** - Enable the HTTP routing client for OSRM-compatible servers
//!
//! ## Quick Start
//!
//! ```rust
//! use route_progress::{GeoPoint, JourneySession, TrackerConfig};
//!
//! let mut session = JourneySession::new(TrackerConfig::default());
//! assert!(session.add_waypoint(GeoPoint::new(47.3769, 8.5417)).is_none());
//!
//! // The second waypoint makes the list composable: the session hands back
//! // a ComposeRequest to drive through composer::compose with a
//! // RoutingService implementation.
//! let request = session.add_waypoint(GeoPoint::new(47.3667, 8.5500));
//! assert!(request.is_some());
//! ```

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

// Unified error handling
pub mod error;
pub use error::{LegFailure, Result, RoutingFailure, TrackError};

// Geographic utilities (great-circle distance, polyline length)
pub mod geo_utils;

// Rolling-window speed estimation
pub mod speed;
pub use speed::SpeedEstimator;

// Route composition over an external routing service
pub mod composer;
pub use composer::{compose, RoutedPath, RoutingService, TravelMode};

// Live-position projection onto the route
pub mod projection;
pub use projection::{project, RouteProgress};

// Arrival estimation
pub mod eta;
pub use eta::{estimate, Eta};

// Journey session state machine
pub mod session;
pub use session::{
    with_session, ComposeRequest, JourneySession, ProgressUpdate, SessionState, SESSION,
};

// HTTP routing client (OSRM-compatible)
#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub use http::OsrmClient;

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude in degrees (WGS84).
///
/// Equality is exact; proximity checks use great-circle distance
/// ([`geo_utils::haversine_distance`]), never equality.
///
/// # Example
/// ```
/// use route_progress::GeoPoint;
/// let point = GeoPoint::new(47.3769, 8.5417); // Zurich
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a new point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check that the coordinates are finite and in range.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Bounding box of a polyline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from points. Returns `None` for an empty slice.
    pub fn from_points(points: &[GeoPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lng = f64::MAX;
        let mut max_lng = f64::MIN;

        for p in points {
            min_lat = min_lat.min(p.latitude);
            max_lat = max_lat.max(p.latitude);
            min_lng = min_lng.min(p.longitude);
            max_lng = max_lng.max(p.longitude);
        }

        Some(Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        })
    }

    /// Center point of the bounds.
    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// One position sample from the location provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub point: GeoPoint,
    pub timestamp: SystemTime,
    /// Reported horizontal accuracy in meters, when the provider knows it.
    pub accuracy: Option<f32>,
}

/// A composed route: the concatenation of every leg for one waypoint list.
///
/// Only ever published whole: if any leg of a composition fails, no `Route`
/// exists for that waypoint list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// The waypoint list this route was composed from.
    pub waypoints: Vec<GeoPoint>,
    /// Leg polylines concatenated in waypoint order; interior duplicate
    /// endpoints are permitted.
    pub polyline: Vec<GeoPoint>,
    /// Sum of leg lengths in meters.
    pub total_distance: f64,
    /// Sum of the routing service's per-leg duration estimates, in seconds.
    pub expected_duration: f64,
    /// Cumulative route distance at each waypoint (prefix sums of leg
    /// lengths): first entry 0.0, last entry `total_distance`.
    pub waypoint_offsets: Vec<f64>,
    /// Bounding box of the full polyline, for framing a map view.
    pub bounds: Option<Bounds>,
}

/// Configuration for a journey session.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Smoothed speed reported before any sample has been accepted.
    /// Default: 1.4 m/s (typical walking pace)
    pub default_speed_mps: f64,

    /// Lower acceptance bound for instantaneous speed samples; anything at
    /// or below is stationary noise. Default: 0.1 m/s
    pub min_speed_mps: f64,

    /// Upper acceptance bound for instantaneous speed samples; anything at
    /// or above is a GPS jump for a pedestrian. Default: 10.0 m/s
    pub max_speed_mps: f64,

    /// Number of accepted samples kept for smoothing. Default: 10
    pub speed_history_len: usize,

    /// Straight-line distance to the final waypoint below which the journey
    /// counts as arrived. Default: 50 m
    pub arrival_threshold_m: f64,

    /// Minimum time between consecutive speed observations; position fixes
    /// arriving faster still drive projection, just not the speed filter.
    /// Default: 2 s
    pub min_speed_sample_interval: Duration,

    /// Fixes reporting an accuracy worse than this are ignored entirely.
    /// `None` disables the gate. Default: 50 m
    pub max_accuracy_m: Option<f32>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            default_speed_mps: 1.4,
            min_speed_mps: 0.1,
            max_speed_mps: 10.0,
            speed_history_len: 10,
            arrival_threshold_m: 50.0,
            min_speed_sample_interval: Duration::from_secs(2),
            max_accuracy_m: Some(50.0),
        }
    }
}
