use chrono::{DateTime, Duration, SubsecRound, Utc};
use rayon::prelude::*;

use crate::predict::error::{PredictError, PropagationError};
use crate::predict::ground_station::GroundStation;
use crate::predict::propagation::Propagator;
use crate::predict::types::{Pass, PassEvent, Satellite, TimeWindow};

const DEFAULT_MIN_PASS_MINUTES: i64 = 3;
const RESUME_AFTER_SET_SECONDS: i64 = 60;

/// Turns propagator events into candidate passes for one station and window.
pub struct PassGenerator<P> {
    propagator: P,
    station: GroundStation,
    window: TimeWindow,
    min_elevation_deg: f64,
    min_pass_duration: Duration,
}

/// Merged output of a multi-satellite generation run.
#[derive(Debug, Default)]
pub struct Generated {
    pub passes: Vec<Pass>,
    pub failures: Vec<PropagationError>,
}

impl<P: Propagator> PassGenerator<P> {
    pub fn new(
        propagator: P,
        station: GroundStation,
        window: TimeWindow,
        min_elevation_deg: f64,
    ) -> Result<Self, PredictError> {
        if !window.is_valid() {
            return Err(PredictError::InvalidWindow {
                start: window.start.to_rfc3339(),
                end: window.end.to_rfc3339(),
            });
        }
        if !(0.0..=90.0).contains(&min_elevation_deg) {
            return Err(PredictError::InvalidElevation(min_elevation_deg));
        }
        Ok(Self {
            propagator,
            station,
            window,
            min_elevation_deg,
            min_pass_duration: Duration::minutes(DEFAULT_MIN_PASS_MINUTES),
        })
    }

    pub fn with_min_pass_duration(mut self, min_pass_duration: Duration) -> Self {
        self.min_pass_duration = min_pass_duration;
        self
    }

    /// Lazily walks the window for one satellite. Each call starts over.
    pub fn passes<'a>(&'a self, satellite: &'a Satellite<P::Elements>) -> PassIter<'a, P> {
        PassIter {
            generator: self,
            satellite,
            cursor: self.window.start,
            done: false,
        }
    }

    /// Runs every satellite on the rayon pool. A satellite whose propagation
    /// fails contributes no passes; its error is collected instead.
    pub fn generate(&self, satellites: &[Satellite<P::Elements>]) -> Generated {
        let results: Vec<Result<Vec<Pass>, PropagationError>> = satellites
            .par_iter()
            .map(|satellite| self.passes(satellite).collect())
            .collect();

        let mut generated = Generated::default();
        for result in results {
            match result {
                Ok(passes) => generated.passes.extend(passes),
                Err(e) => {
                    log::warn!("{}", e);
                    generated.failures.push(e);
                }
            }
        }

        log::debug!(
            "Generated {} passes for {} satellites ({} failed)",
            generated.passes.len(),
            satellites.len(),
            generated.failures.len()
        );
        generated
    }

    fn build_pass(&self, satellite: &Satellite<P::Elements>, event: &PassEvent) -> Option<Pass> {
        if event.max_elevation_deg < self.min_elevation_deg {
            return None;
        }

        let start = event.rise.max(self.window.start).trunc_subsecs(0);
        let end = event.set.min(self.window.end).trunc_subsecs(0);
        let clipped = event.rise < self.window.start || event.set > self.window.end;

        if end - start < self.min_pass_duration || end - start < Duration::seconds(2) {
            log::debug!(
                "Skipping short pass of {} at {} ({}s)",
                satellite.name,
                start,
                (end - start).num_seconds()
            );
            return None;
        }

        // A clipped pass may culminate outside the visible part; keep it inside.
        let culmination = clamp(
            event.culmination.trunc_subsecs(0),
            start + Duration::seconds(1),
            end - Duration::seconds(1),
        );

        Some(Pass {
            norad_id: satellite.norad_id,
            satellite: satellite.name.clone(),
            transmitter: satellite.transmitter.clone(),
            mode: satellite.mode.clone(),
            start,
            end,
            culmination,
            max_elevation_deg: round2(event.max_elevation_deg),
            start_azimuth_deg: round2(event.rise_azimuth_deg),
            end_azimuth_deg: round2(event.set_azimuth_deg),
            clipped,
            period: self.propagator.period(&satellite.elements),
        })
    }
}

pub struct PassIter<'a, P: Propagator> {
    generator: &'a PassGenerator<P>,
    satellite: &'a Satellite<P::Elements>,
    cursor: DateTime<Utc>,
    done: bool,
}

impl<P: Propagator> Iterator for PassIter<'_, P> {
    type Item = Result<Pass, PropagationError>;

    fn next(&mut self) -> Option<Self::Item> {
        let generator = self.generator;
        while !self.done {
            let event = match generator.propagator.next_pass(
                &self.satellite.elements,
                &generator.station,
                self.cursor,
                generator.window.end,
            ) {
                Ok(Some(event)) => event,
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(PropagationError {
                        norad_id: self.satellite.norad_id,
                        satellite: self.satellite.name.clone(),
                        message: e.to_string(),
                    }));
                }
            };

            // Stop on events that do not move forward or rise past the window.
            if event.set <= self.cursor || event.rise >= generator.window.end {
                self.done = true;
                return None;
            }
            self.cursor = event.set + Duration::seconds(RESUME_AFTER_SET_SECONDS);
            if self.cursor >= generator.window.end {
                self.done = true;
            }

            if let Some(pass) = generator.build_pass(self.satellite, &event) {
                return Some(Ok(pass));
            }
        }
        None
    }
}

fn clamp(value: DateTime<Utc>, low: DateTime<Utc>, high: DateTime<Utc>) -> DateTime<Utc> {
    value.max(low).min(high)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
