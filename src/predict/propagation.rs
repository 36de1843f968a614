use chrono::{DateTime, Duration, Utc};
use sgp4::{Constants, Elements};

use crate::predict::error::PredictError;
use crate::predict::ground_station::GroundStation;
use crate::predict::types::PassEvent;

const COARSE_STEP_SECONDS: i64 = 60; // 1 minute for initial scan
const FINE_STEP_SECONDS: i64 = 1; // 1 second for refinement
const MAX_LOOKBACK_MINUTES: i64 = 30;
const MAX_PASS_MINUTES: i64 = 60;

/// Source of rise/culmination/set events for one orbit as seen from a
/// station.
pub trait Propagator: Sync {
    type Elements: Sync;

    /// Returns the first pass whose set time lies after `after`, or `None`
    /// when no pass rises before `until`. A pass already in progress at
    /// `after` is reported with its real rise time.
    fn next_pass(
        &self,
        elements: &Self::Elements,
        station: &GroundStation,
        after: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Option<PassEvent>, PredictError>;

    /// Natural repeat period of the orbit, if known.
    fn period(&self, _elements: &Self::Elements) -> Option<Duration> {
        None
    }
}

/// Parsed TLE ready for SGP4 propagation.
pub struct Orbit {
    pub elements: Elements,
    pub constants: Constants,
}

impl Orbit {
    pub fn from_elements(elements: Elements) -> Result<Self, PredictError> {
        let constants = Constants::from_elements(&elements)
            .map_err(|e| PredictError::Propagation(e.to_string()))?;
        Ok(Self {
            elements,
            constants,
        })
    }

    pub fn from_tle(
        name: Option<String>,
        line1: &str,
        line2: &str,
    ) -> Result<Self, PredictError> {
        let elements = Elements::from_tle(name, line1.as_bytes(), line2.as_bytes())
            .map_err(|e| PredictError::Propagation(e.to_string()))?;
        Self::from_elements(elements)
    }

    pub fn period(&self) -> Option<Duration> {
        let revs_per_day = self.elements.mean_motion;
        if revs_per_day.is_finite() && revs_per_day > 0.0 {
            Some(Duration::seconds((86_400.0 / revs_per_day).round() as i64))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookAngles {
    pub azimuth_deg: f64,
    pub elevation_deg: f64,
}

/// Horizon-crossing search over SGP4 positions: coarse scan, then binary
/// search down to one second.
#[derive(Debug, Clone, Copy)]
pub struct Sgp4Propagator {
    coarse_step: Duration,
    max_lookback: Duration,
    max_pass: Duration,
}

impl Default for Sgp4Propagator {
    fn default() -> Self {
        Self {
            coarse_step: Duration::seconds(COARSE_STEP_SECONDS),
            max_lookback: Duration::minutes(MAX_LOOKBACK_MINUTES),
            max_pass: Duration::minutes(MAX_PASS_MINUTES),
        }
    }
}

impl Propagator for Sgp4Propagator {
    type Elements = std::sync::Arc<Orbit>;

    fn next_pass(
        &self,
        orbit: &Self::Elements,
        station: &GroundStation,
        after: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Option<PassEvent>, PredictError> {
        let horizon = station.horizon_deg;
        let mut cursor = after;

        let rise = if look_angles(station, orbit, cursor)?.elevation_deg >= horizon {
            self.find_rise_before(station, orbit, cursor)?
        } else {
            loop {
                let next = cursor + self.coarse_step;
                if next > until {
                    return Ok(None);
                }
                if look_angles(station, orbit, next)?.elevation_deg >= horizon {
                    break refine_crossing(station, orbit, cursor, next, true)?;
                }
                cursor = next;
            }
        };

        let rise_look = look_angles(station, orbit, rise)?;
        let mut max_el = rise_look.elevation_deg;
        let mut tca = rise;
        let limit = until + self.max_pass;
        let mut cursor = rise;

        let set = loop {
            let next = cursor + self.coarse_step;
            if next > limit {
                // Never set inside the search horizon (e.g. GEO); report the bound.
                break limit;
            }
            let look = look_angles(station, orbit, next)?;
            if look.elevation_deg < horizon {
                break refine_crossing(station, orbit, cursor, next, false)?;
            }
            if look.elevation_deg > max_el {
                max_el = look.elevation_deg;
                tca = next;
            }
            cursor = next;
        };

        let tca = refine_culmination(
            station,
            orbit,
            (tca - self.coarse_step).max(rise),
            (tca + self.coarse_step).min(set),
        )?;
        let culmination = look_angles(station, orbit, tca)?;
        let set_look = look_angles(station, orbit, set)?;

        Ok(Some(PassEvent {
            rise,
            culmination: tca,
            set,
            max_elevation_deg: culmination.elevation_deg.max(max_el),
            rise_azimuth_deg: rise_look.azimuth_deg,
            set_azimuth_deg: set_look.azimuth_deg,
        }))
    }

    fn period(&self, orbit: &Self::Elements) -> Option<Duration> {
        orbit.period()
    }
}

impl Sgp4Propagator {
    fn find_rise_before(
        &self,
        station: &GroundStation,
        orbit: &Orbit,
        visible_at: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, PredictError> {
        let earliest = visible_at - self.max_lookback;
        let mut above = visible_at;
        while above > earliest {
            let prev = above - self.coarse_step;
            if look_angles(station, orbit, prev)?.elevation_deg < station.horizon_deg {
                return refine_crossing(station, orbit, prev, above, true);
            }
            above = prev;
        }
        Ok(earliest)
    }
}

/// Binary search to find the horizon crossing between `before` and `after`.
/// Returns the instant on the visible side of the crossing.
fn refine_crossing(
    station: &GroundStation,
    orbit: &Orbit,
    before: DateTime<Utc>,
    after: DateTime<Utc>,
    is_rise: bool,
) -> Result<DateTime<Utc>, PredictError> {
    let mut low = before;
    let mut high = after;

    while (high - low).num_seconds() > FINE_STEP_SECONDS {
        let mid = low + (high - low) / 2;
        let above = look_angles(station, orbit, mid)?.elevation_deg >= station.horizon_deg;
        if above == is_rise {
            high = mid;
        } else {
            low = mid;
        }
    }

    Ok(if is_rise { high } else { low })
}

/// Ternary search for the elevation maximum inside `[low, high]`.
fn refine_culmination(
    station: &GroundStation,
    orbit: &Orbit,
    mut low: DateTime<Utc>,
    mut high: DateTime<Utc>,
) -> Result<DateTime<Utc>, PredictError> {
    while (high - low).num_seconds() > 2 * FINE_STEP_SECONDS {
        let third = (high - low) / 3;
        let m1 = low + third;
        let m2 = high - third;
        let e1 = look_angles(station, orbit, m1)?.elevation_deg;
        let e2 = look_angles(station, orbit, m2)?.elevation_deg;
        if e1 < e2 {
            low = m1;
        } else {
            high = m2;
        }
    }
    Ok(low + (high - low) / 2)
}

pub fn look_angles(
    station: &GroundStation,
    orbit: &Orbit,
    timestamp: DateTime<Utc>,
) -> Result<LookAngles, PredictError> {
    let minutes = orbit
        .elements
        .datetime_to_minutes_since_epoch(&timestamp.naive_utc())
        .map_err(|e| PredictError::Propagation(e.to_string()))?;

    let prediction = orbit
        .constants
        .propagate(minutes)
        .map_err(|e| PredictError::Propagation(e.to_string()))?;

    let sidereal =
        sgp4::iau_epoch_to_sidereal_time(sgp4::julian_years_since_j2000(&timestamp.naive_utc()));

    let sat_ecef = teme_to_ecef_position(prediction.position, sidereal);
    let sta_ecef = station.position_ecef_km();

    let dr = [
        sat_ecef[0] - sta_ecef[0],
        sat_ecef[1] - sta_ecef[1],
        sat_ecef[2] - sta_ecef[2],
    ];
    let range_km = (dr[0] * dr[0] + dr[1] * dr[1] + dr[2] * dr[2]).sqrt();

    let (east, north, up) = ecef_to_enu(dr, station.lat_rad(), station.lon_rad());
    let azimuth = east.atan2(north).to_degrees().rem_euclid(360.0);
    let elevation = if range_km > 0.0 {
        (up / range_km).asin().to_degrees()
    } else {
        0.0
    };

    Ok(LookAngles {
        azimuth_deg: azimuth,
        elevation_deg: elevation,
    })
}

pub fn teme_to_ecef_position(pos_teme: [f64; 3], gmst: f64) -> [f64; 3] {
    let cos_gmst = gmst.cos();
    let sin_gmst = gmst.sin();
    [
        pos_teme[0] * cos_gmst + pos_teme[1] * sin_gmst,
        -pos_teme[0] * sin_gmst + pos_teme[1] * cos_gmst,
        pos_teme[2],
    ]
}

pub fn ecef_to_enu(dr: [f64; 3], lat_rad: f64, lon_rad: f64) -> (f64, f64, f64) {
    let sin_lat = lat_rad.sin();
    let cos_lat = lat_rad.cos();
    let sin_lon = lon_rad.sin();
    let cos_lon = lon_rad.cos();

    let east = -sin_lon * dr[0] + cos_lon * dr[1];
    let north = -sin_lat * cos_lon * dr[0] - sin_lat * sin_lon * dr[1] + cos_lat * dr[2];
    let up = cos_lat * cos_lon * dr[0] + cos_lat * sin_lon * dr[1] + sin_lat * dr[2];
    (east, north, up)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;

    const ISS_NAME: &str = "ISS (ZARYA)";
    const ISS_LINE1: &str =
        "1 25544U 98067A   20194.88612269 -.00002218  00000-0 -31515-4 0  9992";
    const ISS_LINE2: &str =
        "2 25544  51.6461 221.2784 0001413  89.1723 280.4612 15.49507896236008";

    fn iss() -> Arc<Orbit> {
        Arc::new(Orbit::from_tle(Some(ISS_NAME.into()), ISS_LINE1, ISS_LINE2).unwrap())
    }

    #[test]
    fn orbital_period_from_mean_motion() {
        let period = iss().period().unwrap();
        // 86400 / 15.495 rev/day
        assert!((period.num_seconds() - 5576).abs() <= 1);
    }

    #[test]
    fn rejects_garbage_tle() {
        assert!(Orbit::from_tle(None, "1 garbage", "2 garbage").is_err());
    }

    #[test]
    fn finds_ordered_pass_near_epoch() {
        let station = GroundStation::from_coordinates("48.1351, 11.5820", Some(520.0)).unwrap();
        let propagator = Sgp4Propagator::default();
        let start = Utc.with_ymd_and_hms(2020, 7, 13, 0, 0, 0).unwrap();
        let end = start + Duration::days(1);

        let event = propagator
            .next_pass(&iss(), &station, start, end)
            .unwrap()
            .expect("ISS passes over Munich at least once a day");

        assert!(event.rise < event.culmination);
        assert!(event.culmination < event.set);
        assert!(event.set > start);
        assert!(event.max_elevation_deg > 0.0 && event.max_elevation_deg <= 90.0);
        assert!((event.set - event.rise) < Duration::minutes(20));
        assert!((0.0..360.0).contains(&event.rise_azimuth_deg));
    }

    #[test]
    fn enu_of_zenith_offset_is_up() {
        let (e, n, u) = ecef_to_enu([1.0, 0.0, 0.0], 0.0, 0.0);
        assert!(e.abs() < 1e-12);
        assert!(n.abs() < 1e-12);
        assert!((u - 1.0).abs() < 1e-12);
    }
}
