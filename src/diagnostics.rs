use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::predict::PropagationError;
use crate::priority::PriorityWarning;
use crate::scheduler::{RejectionReason, ScheduleResult};

/// Non-fatal problem recovered during a run and reported next to the result.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Diagnostic {
    #[error("{0}")]
    Propagation(PropagationError),
    #[error("invalid geometry for {satellite} ({norad_id}) at {start}: ends {end}, max elevation {max_elevation_deg}")]
    InvalidGeometry {
        norad_id: u32,
        satellite: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        max_elevation_deg: f64,
    },
    #[error("priority file {0}")]
    PriorityFile(PriorityWarning),
}

impl Diagnostic {
    pub fn from_result(result: &ScheduleResult) -> Vec<Diagnostic> {
        result
            .rejected_for(RejectionReason::InvalidGeometry)
            .map(|r| {
                let pass = &r.candidate.pass;
                Diagnostic::InvalidGeometry {
                    norad_id: pass.norad_id,
                    satellite: pass.satellite.clone(),
                    start: pass.start,
                    end: pass.end,
                    max_elevation_deg: pass.max_elevation_deg,
                }
            })
            .collect()
    }
}
