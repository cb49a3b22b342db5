//! Element registry
//!
//! Turns raw elements into backend-ready constants and dense, stable buffer
//! indices. Malformed elements are dropped, not fatal; real feeds always
//! contain a few. The surviving batch is registered with the backend in a
//! single call and described by per-satellite metadata whose `index` field
//! addresses every pipeline buffer for the set's lifetime.

use anyhow::{anyhow, ensure, Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::data::RawElement;

use super::backend::{OrbitalConstants, PropagationBackend, SetHandle};

const EARTH_RADIUS_KM: f64 = 6371.0;
const MU_EARTH_KM3_S2: f64 = 398600.4418;
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Immutable per-satellite description created at registration time.
/// `index` is the element's position in the filtered batch and maps 1:1 to
/// every buffer slot.
#[derive(Debug, Clone, PartialEq)]
pub struct SatelliteMetadata {
    pub name: String,
    pub catalog_id: u32,
    /// Reference epoch decoded from the element, as an absolute UTC instant
    pub epoch: DateTime<Utc>,
    pub index: usize,
    /// Mean orbital altitude estimated from the mean motion (km). Drives
    /// the point color assigned at creation.
    pub mean_altitude_km: f64,
}

/// Derive constants for the whole batch, dropping malformed elements, and
/// register the survivors with the backend in one call.
pub fn register(
    backend: &mut dyn PropagationBackend,
    raw: &[RawElement],
) -> Result<(SetHandle, Vec<SatelliteMetadata>)> {
    let mut constants = Vec::with_capacity(raw.len());
    let mut metadata = Vec::with_capacity(raw.len());
    let mut dropped = 0usize;

    for element in raw {
        match derive(element) {
            Ok((consts, mut meta)) => {
                meta.index = metadata.len();
                metadata.push(meta);
                constants.push(consts);
            }
            Err(e) => {
                dropped += 1;
                log::debug!("Dropping element {:?}: {}", element.name, e);
            }
        }
    }

    ensure!(
        !metadata.is_empty(),
        "No usable elements in batch of {}",
        raw.len()
    );
    if dropped > 0 {
        log::info!("Dropped {} malformed elements", dropped);
    }

    let handle = backend.register_set(constants)?;
    log::info!(
        "Registered set {:?} with {} satellites",
        handle,
        metadata.len()
    );

    Ok((handle, metadata))
}

/// Derive backend constants and metadata for one element.
/// The returned metadata's `index` is assigned by the caller.
fn derive(element: &RawElement) -> Result<(OrbitalConstants, SatelliteMetadata)> {
    let catalog_field = element.line1.get(2..7).context("Line 1 too short")?;
    let epoch_field = element.line1.get(18..32).context("Line 1 too short")?;

    let tle = satkit::TLE::load_2line(&element.line1, &element.line2)
        .map_err(|e| anyhow!("TLE parse: {}", e))?;

    let catalog_id: u32 = catalog_field.trim().parse().context("Bad catalog number")?;
    let epoch = decode_epoch(epoch_field)?;
    let mean_altitude_km = mean_altitude_km(tle.mean_motion)
        .context("Mean motion out of range")?;

    Ok((
        OrbitalConstants { tle },
        SatelliteMetadata {
            name: element.name.clone(),
            catalog_id,
            epoch,
            index: 0,
            mean_altitude_km,
        },
    ))
}

/// Decode an element epoch field (`YYDDD.FFFFFFFF`) into an absolute UTC
/// instant. Two-digit years pivot at 57: `< 57` is 2000-based, `>= 57` is
/// 1900-based. The day-of-year counts from 1, so `(day - 1)` whole days and
/// the day fraction are added to January 1st 00:00 UTC.
pub fn decode_epoch(field: &str) -> Result<DateTime<Utc>> {
    let field = field.trim();
    let (int_part, frac_part) = field.split_once('.').unwrap_or((field, "0"));
    ensure!(int_part.len() >= 4, "Epoch field too short: {:?}", field);

    let (year_str, day_str) = int_part.split_at(int_part.len() - 3);
    let two_digit_year: i32 = year_str.trim().parse().context("Bad epoch year")?;
    let day: u32 = day_str.parse().context("Bad epoch day")?;
    let frac: f64 = format!("0.{}", frac_part)
        .parse()
        .context("Bad epoch fraction")?;

    ensure!((1..=366).contains(&day), "Epoch day {} out of range", day);

    let year = if two_digit_year < 57 {
        2000 + two_digit_year
    } else {
        1900 + two_digit_year
    };

    let jan1 = NaiveDate::from_ymd_opt(year, 1, 1)
        .with_context(|| format!("Bad epoch year {}", year))?
        .and_hms_opt(0, 0, 0)
        .context("Bad epoch midnight")?
        .and_utc();

    let millis = ((day as f64 - 1.0 + frac) * SECONDS_PER_DAY * 1000.0).round() as i64;
    Ok(jan1 + Duration::milliseconds(millis))
}

/// Mean altitude above the surface implied by a mean motion in revs/day.
fn mean_altitude_km(mean_motion: f64) -> Option<f64> {
    if !mean_motion.is_finite() || mean_motion <= 0.0 {
        return None;
    }
    let n_rad_s = mean_motion * (2.0 * std::f64::consts::PI) / SECONDS_PER_DAY;
    let a_km = (MU_EARTH_KM3_S2 / (n_rad_s * n_rad_s)).cbrt();
    if !a_km.is_finite() {
        return None;
    }
    Some(a_km - EARTH_RADIUS_KM)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::backend::testing::ScriptedBackend;

    const ISS_L1: &str = "1 25544U 98067A   08264.51782528 -.00002182  00000-0 -11606-4 0  2927";
    const ISS_L2: &str = "2 25544  51.6416 247.4627 0006703 130.5360 325.0288 15.72125391563537";

    fn iss() -> RawElement {
        RawElement::new("ISS (ZARYA)", ISS_L1, ISS_L2)
    }

    fn garbage() -> RawElement {
        RawElement::new("BROKEN", "1 garbage", "2 garbage")
    }

    #[test]
    fn test_decode_epoch_vector() {
        let epoch = decode_epoch("24091.50000000").unwrap();
        let expected: DateTime<Utc> = "2024-03-31T12:00:00Z".parse().unwrap();
        assert_eq!(epoch, expected);
    }

    #[test]
    fn test_decode_epoch_pivot() {
        // 57 and above are 1900-based, below 57 are 2000-based.
        assert_eq!(
            decode_epoch("57001.00000000").unwrap(),
            "1957-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
        assert_eq!(
            decode_epoch("56366.00000000").unwrap(),
            "2056-12-31T00:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[test]
    fn test_decode_epoch_rejects_bad_day() {
        assert!(decode_epoch("24000.50000000").is_err());
        assert!(decode_epoch("24367.50000000").is_err());
        assert!(decode_epoch("xx").is_err());
    }

    #[test]
    fn test_register_drops_malformed_and_keeps_indices_dense() {
        let mut backend = ScriptedBackend::new(3);
        let batch = vec![iss(), garbage(), iss()];

        let (_, metadata) = register(&mut backend, &batch).unwrap();
        assert_eq!(metadata.len(), 2);
        assert_eq!(metadata[0].index, 0);
        assert_eq!(metadata[1].index, 1);
        assert_eq!(metadata[0].catalog_id, 25544);
    }

    #[test]
    fn test_register_is_repeatable() {
        let batch = vec![iss(), garbage(), iss()];

        let mut backend = ScriptedBackend::new(3);
        let (_, first) = register(&mut backend, &batch).unwrap();
        let mut backend = ScriptedBackend::new(3);
        let (_, second) = register(&mut backend, &batch).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_register_empty_batch_is_an_error() {
        let mut backend = ScriptedBackend::new(3);
        assert!(register(&mut backend, &[]).is_err());
        assert!(register(&mut backend, &[garbage()]).is_err());
    }

    #[test]
    fn test_iss_metadata_epoch_and_altitude() {
        let mut backend = ScriptedBackend::new(3);
        let (_, metadata) = register(&mut backend, &[iss()]).unwrap();

        // Epoch 08264.51782528: 2008, day 264 is Sep 20 (leap year).
        let epoch = metadata[0].epoch;
        assert_eq!(epoch.format("%Y-%m-%d").to_string(), "2008-09-20");

        // ~15.72 revs/day puts the ISS in LEO.
        let alt = metadata[0].mean_altitude_km;
        assert!(alt > 250.0 && alt < 500.0, "altitude {}", alt);
    }
}
