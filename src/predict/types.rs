use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Half-open scheduling window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn is_valid(&self) -> bool {
        self.start < self.end
    }
}

/// One satellite as seen by the pass generator: an orbit plus the
/// transmitter the observation would target.
#[derive(Debug, Clone)]
pub struct Satellite<E> {
    pub norad_id: u32,
    pub name: String,
    pub transmitter: Option<String>,
    pub mode: Option<String>,
    pub elements: E,
}

/// Raw rise/culmination/set triple as reported by a propagator, before
/// clipping or filtering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassEvent {
    pub rise: DateTime<Utc>,
    pub culmination: DateTime<Utc>,
    pub set: DateTime<Utc>,
    pub max_elevation_deg: f64,
    pub rise_azimuth_deg: f64,
    pub set_azimuth_deg: f64,
}

/// A candidate observation window for one satellite/transmitter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pass {
    pub norad_id: u32,
    pub satellite: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transmitter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub culmination: DateTime<Utc>,
    pub max_elevation_deg: f64,
    pub start_azimuth_deg: f64,
    pub end_azimuth_deg: f64,
    /// Cut to the scheduling window on at least one side.
    pub clipped: bool,
    #[serde(skip)]
    pub period: Option<Duration>,
}

impl Pass {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn has_valid_geometry(&self) -> bool {
        self.start < self.end
            && self.max_elevation_deg.is_finite()
            && self.max_elevation_deg > 0.0
            && self.max_elevation_deg <= 90.0
    }
}
