//! Unified error handling for the route-progress library.
//!
//! This module provides a consistent error type for all tracking operations.
//! Composition failures are surfaced as a single aggregate error carrying
//! every failed leg; invalid speed samples are deliberately NOT an error
//! (they are a silent no-op at the estimator).

use std::fmt;

use crate::GeoPoint;

/// Why a single routing request failed.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutingFailure {
    /// The routing service errored (transport, HTTP status, malformed body).
    Service {
        message: String,
        status_code: Option<u16>,
    },
    /// The service answered but found no route between the two points.
    NoRoute,
}

impl fmt::Display for RoutingFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingFailure::Service {
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "routing service error ({}): {}", code, message)
                } else {
                    write!(f, "routing service error: {}", message)
                }
            }
            RoutingFailure::NoRoute => write!(f, "no route found"),
        }
    }
}

/// A failed leg of a composition, identified by its origin waypoint index.
#[derive(Debug, Clone, PartialEq)]
pub struct LegFailure {
    /// Index of the leg's origin in the waypoint list (leg i connects
    /// waypoint i to waypoint i + 1).
    pub leg_index: usize,
    pub origin: GeoPoint,
    pub destination: GeoPoint,
    pub cause: RoutingFailure,
}

impl fmt::Display for LegFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "leg {} ({:.5},{:.5} -> {:.5},{:.5}): {}",
            self.leg_index,
            self.origin.latitude,
            self.origin.longitude,
            self.destination.latitude,
            self.destination.longitude,
            self.cause
        )
    }
}

/// Unified error type for route-progress operations.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackError {
    /// A route needs at least two waypoints
    InsufficientWaypoints {
        count: usize,
        minimum_required: usize,
    },
    /// One or more legs of a composition failed; no partial route exists
    CompositionFailed { failures: Vec<LegFailure> },
    /// Progress or ETA was requested without a tracked route
    NoRouteAvailable,
}

impl fmt::Display for TrackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackError::InsufficientWaypoints {
                count,
                minimum_required,
            } => {
                write!(
                    f,
                    "route needs at least {} waypoints, got {}",
                    minimum_required, count
                )
            }
            TrackError::CompositionFailed { failures } => {
                write!(f, "route composition failed for {} leg(s): ", failures.len())?;
                for (i, failure) in failures.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{}", failure)?;
                }
                Ok(())
            }
            TrackError::NoRouteAvailable => write!(f, "no route is being tracked"),
        }
    }
}

impl std::error::Error for TrackError {}

/// Result type alias for route-progress operations.
pub type Result<T> = std::result::Result<T, TrackError>;
