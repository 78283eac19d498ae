//! Rolling-window speed estimation from consecutive position fixes.
//!
//! Raw (distance, time) samples are converted to instantaneous speeds,
//! filtered against plausibility bounds, and smoothed with the arithmetic
//! mean of a bounded FIFO history. Rejected samples never touch the history.

use std::collections::VecDeque;
use std::time::Duration;

use log::debug;

use crate::geo_utils::haversine_distance;
use crate::{GeoPoint, TrackerConfig};

/// Rolling-window speed filter.
///
/// Before any sample is accepted, [`SpeedEstimator::smoothed_speed`] reports
/// the configured default walking speed, distinguishing "no data yet" from a
/// confirmed slow speed. The history lives for one journey session and is
/// cleared on reset.
#[derive(Debug, Clone)]
pub struct SpeedEstimator {
    history: VecDeque<f64>,
    capacity: usize,
    default_speed: f64,
    min_speed: f64,
    max_speed: f64,
}

impl SpeedEstimator {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            history: VecDeque::with_capacity(config.speed_history_len),
            capacity: config.speed_history_len,
            default_speed: config.default_speed_mps,
            min_speed: config.min_speed_mps,
            max_speed: config.max_speed_mps,
        }
    }

    /// Observe a pair of consecutive fixes.
    ///
    /// Returns the updated smoothed speed when the sample is accepted, or
    /// `None` for a no-op: missing previous fix, non-positive elapsed time,
    /// or an implied speed outside the acceptance bounds. The caller is
    /// expected to throttle calls to its sampling interval; no rate limit is
    /// imposed here.
    pub fn observe(
        &mut self,
        current: &GeoPoint,
        previous: Option<&GeoPoint>,
        elapsed: Duration,
    ) -> Option<f64> {
        let previous = previous?;
        let seconds = elapsed.as_secs_f64();
        if seconds <= 0.0 {
            return None;
        }

        let speed = haversine_distance(previous, current) / seconds;
        if speed <= self.min_speed || speed >= self.max_speed {
            debug!(
                "[speed] sample {:.2} m/s outside ({:.1}, {:.1}), ignored",
                speed, self.min_speed, self.max_speed
            );
            return None;
        }

        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(speed);
        Some(self.smoothed_speed())
    }

    /// Arithmetic mean of the accepted-sample history, or the configured
    /// default speed while the history is empty.
    pub fn smoothed_speed(&self) -> f64 {
        if self.history.is_empty() {
            self.default_speed
        } else {
            self.history.iter().sum::<f64>() / self.history.len() as f64
        }
    }

    /// Number of accepted samples currently in the history.
    pub fn sample_count(&self) -> usize {
        self.history.len()
    }

    /// Clear the history; the next call reports the default speed again.
    pub fn reset(&mut self) {
        self.history.clear();
    }
}
