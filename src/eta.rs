//! Arrival estimation from remaining distance and smoothed speed.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// A remaining-time / arrival-time estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Eta {
    /// Time still needed to reach the destination.
    pub remaining: Duration,
    /// Estimated arrival timestamp.
    pub arrival: SystemTime,
}

/// Estimate remaining time and arrival from the current pace.
///
/// Returns `None` while the smoothed speed is not positive: the estimate is
/// unknown, never a division by zero. The arrival is anchored at `now` on
/// every call rather than at the journey start, so the estimate reflects
/// current pace, not average pace since the journey began.
///
/// # Example
/// ```
/// use route_progress::eta::estimate;
/// use std::time::SystemTime;
///
/// let eta = estimate(700.0, 1.4, SystemTime::UNIX_EPOCH).unwrap();
/// assert_eq!(eta.remaining.as_secs(), 500);
/// ```
pub fn estimate(remaining_distance: f64, smoothed_speed: f64, now: SystemTime) -> Option<Eta> {
    if smoothed_speed <= 0.0 {
        return None;
    }
    let remaining = Duration::from_secs_f64(remaining_distance.max(0.0) / smoothed_speed);
    Some(Eta {
        remaining,
        arrival: now + remaining,
    })
}
