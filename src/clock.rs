//! Simulated playback clock
//!
//! Tracks the simulated instant within a configured start/stop window and
//! advances it by wall-clock frame time scaled by the playback rate.

use chrono::{DateTime, Duration, Utc};

/// Simulated clock with a bounded playback window
#[derive(Debug, Clone)]
pub struct SimClock {
    /// Current simulated instant
    current: DateTime<Utc>,
    /// Start bound of the playback window
    start: DateTime<Utc>,
    /// Stop bound of the playback window
    stop: DateTime<Utc>,
    /// Playback rate multiplier (simulated seconds per wall second)
    pub rate: f64,
}

impl SimClock {
    pub fn new(start: DateTime<Utc>, stop: DateTime<Utc>) -> Self {
        Self {
            current: start,
            start,
            stop,
            rate: 1.0,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.current
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn stop(&self) -> DateTime<Utc> {
        self.stop
    }

    /// Total configured span of the playback window.
    pub fn span(&self) -> Duration {
        self.stop - self.start
    }

    /// Advance the simulated instant by a wall-clock frame delta (seconds)
    /// scaled by the playback rate.
    pub fn advance(&mut self, frame_dt_secs: f64) {
        let millis = (frame_dt_secs * self.rate * 1000.0).round() as i64;
        self.current += Duration::milliseconds(millis);
    }

    pub fn set_now(&mut self, instant: DateTime<Utc>) {
        self.current = instant;
    }

    pub fn reset_to_start(&mut self) {
        self.current = self.start;
    }

    /// True when the simulated instant has drifted farther from the stop
    /// bound than the whole configured span. The consumer resets the clock
    /// to the start bound when this fires.
    pub fn past_window(&self) -> bool {
        let distance = (self.current - self.stop).abs();
        distance > self.span()
    }

    pub fn format_utc(&self) -> String {
        self.current.format("%Y-%m-%d %H:%M:%S UTC").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> SimClock {
        let start = "2024-04-14T00:00:00Z".parse().unwrap();
        let stop = "2024-04-17T00:00:00Z".parse().unwrap();
        SimClock::new(start, stop)
    }

    #[test]
    fn test_advance_scales_by_rate() {
        let mut clock = window();
        clock.rate = 60.0;
        clock.advance(1.0);
        assert_eq!(clock.now(), clock.start() + Duration::seconds(60));
    }

    #[test]
    fn test_within_window_is_not_past() {
        let mut clock = window();
        assert!(!clock.past_window());
        clock.set_now("2024-04-16T23:00:00Z".parse().unwrap());
        assert!(!clock.past_window());
    }

    #[test]
    fn test_past_window_beyond_span() {
        let mut clock = window();
        // Distance from stop is 3 days + 1 second, span is 3 days.
        clock.set_now("2024-04-20T00:00:01Z".parse().unwrap());
        assert!(clock.past_window());
        clock.reset_to_start();
        assert_eq!(clock.now(), clock.start());
        assert!(!clock.past_window());
    }
}
