//! Earth orientation for the point collection
//!
//! Satellite samples arrive in an inertial frame with the polar axis mapped
//! to render-frame Y. Rendering against a fixed Earth mesh needs the whole
//! point collection rotated by Greenwich Mean Sidereal Time, recomputed at a
//! bounded rate by the consumer. When GMST cannot be evaluated for an
//! instant the previously computed matrix is kept (initially the identity,
//! i.e. an inertial frame).

use chrono::{DateTime, Utc};
use glam::Mat4;

const SECONDS_PER_DAY: f64 = 86_400.0;
const DAYS_PER_JULIAN_CENTURY: f64 = 36_525.0;
const GMST_BASE_DEG: f64 = 280.46061837;
const GMST_ROTATION_PER_DAY: f64 = 360.98564736629;
const GMST_CORRECTION: f64 = 0.000387933;

/// Greenwich Mean Sidereal Time in radians for a UTC instant.
pub fn greenwich_mean_sidereal_time(timestamp: DateTime<Utc>) -> f64 {
    // J2000.0 epoch: 2000-01-01T12:00:00Z
    let j2000 = DateTime::from_timestamp(946_728_000, 0).expect("J2000 epoch is representable");
    let days_since_j2000 =
        (timestamp - j2000).num_milliseconds() as f64 / (1000.0 * SECONDS_PER_DAY);
    let centuries = days_since_j2000 / DAYS_PER_JULIAN_CENTURY;
    let gmst_degrees = GMST_BASE_DEG
        + GMST_ROTATION_PER_DAY * days_since_j2000
        + GMST_CORRECTION * centuries * centuries
        - centuries * centuries * centuries / 38_710_000.0;
    gmst_degrees.rem_euclid(360.0).to_radians()
}

/// Cached whole-collection rotation from inertial into the pseudo-fixed
/// Earth frame. `refresh` replaces the cache; the consumer decides when.
pub struct EarthFrame {
    transform: Mat4,
    recomputes: u64,
}

impl Default for EarthFrame {
    fn default() -> Self {
        Self {
            transform: Mat4::IDENTITY,
            recomputes: 0,
        }
    }
}

impl EarthFrame {
    /// Current transform, uniform over the whole point collection.
    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    /// Number of times the transform was actually recomputed.
    pub fn recompute_count(&self) -> u64 {
        self.recomputes
    }

    /// Recompute the transform for `instant`. Keeps the previous matrix when
    /// the pseudo-fixed frame cannot be evaluated there.
    pub fn refresh(&mut self, instant: DateTime<Utc>) {
        match pseudo_fixed_rotation(instant) {
            Some(m) => {
                self.transform = m;
                self.recomputes += 1;
            }
            None => {
                log::debug!("Pseudo-fixed frame unavailable at {}, keeping previous", instant);
            }
        }
    }
}

/// Rotation taking inertial positions into the Earth-fixed render frame.
/// Polar axis is render Y; a negative rotation by GMST holds the Earth mesh
/// still while the sky turns.
fn pseudo_fixed_rotation(instant: DateTime<Utc>) -> Option<Mat4> {
    let gmst = greenwich_mean_sidereal_time(instant);
    if !gmst.is_finite() {
        return None;
    }
    Some(Mat4::from_rotation_y(-gmst as f32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gmst_at_j2000() {
        let j2000 = "2000-01-01T12:00:00Z".parse().unwrap();
        let gmst = greenwich_mean_sidereal_time(j2000);
        assert!((gmst - GMST_BASE_DEG.to_radians()).abs() < 1e-9);
    }

    #[test]
    fn test_gmst_advances_faster_than_solar_day() {
        let t0: DateTime<Utc> = "2024-04-14T00:00:00Z".parse().unwrap();
        let t1 = t0 + chrono::Duration::days(1);
        let g0 = greenwich_mean_sidereal_time(t0);
        let g1 = greenwich_mean_sidereal_time(t1);
        // Sidereal gain is ~0.9856 degrees per solar day.
        let gain = (g1 - g0).rem_euclid(2.0 * std::f64::consts::PI);
        assert!((gain.to_degrees() - 0.9856).abs() < 0.01);
    }

    #[test]
    fn test_refresh_updates_cache() {
        let mut frame = EarthFrame::default();
        assert_eq!(frame.transform(), Mat4::IDENTITY);
        assert_eq!(frame.recompute_count(), 0);

        frame.refresh("2024-04-14T00:00:00Z".parse().unwrap());
        assert_eq!(frame.recompute_count(), 1);
        assert_ne!(frame.transform(), Mat4::IDENTITY);
    }
}
