use chrono::Duration;
use serde::Serialize;

use crate::predict::TimeWindow;
use crate::priority::Candidate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum_macros::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RejectionReason {
    Conflict,
    BelowThreshold,
    DuplicateSatelliteWindow,
    InvalidGeometry,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub reason: RejectionReason,
}

#[derive(Debug, Clone)]
pub struct SelectOptions {
    /// Idle time required between two passes for rotator slew.
    pub buffer: Duration,
    pub fill_gaps: bool,
    pub min_elevation_deg: f64,
    /// Allow the same satellite twice within one revolution.
    pub allow_repeat: bool,
    pub min_priority: Option<f64>,
    /// Reject candidates without an explicit priority entry.
    pub only_priority: bool,
    /// Station time already booked elsewhere.
    pub reserved: Vec<TimeWindow>,
}

impl Default for SelectOptions {
    fn default() -> Self {
        Self {
            buffer: Duration::zero(),
            fill_gaps: false,
            min_elevation_deg: 0.0,
            allow_repeat: false,
            min_priority: None,
            only_priority: false,
            reserved: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScheduleResult {
    /// Sorted by start, separated by at least the buffer.
    pub selected: Vec<Candidate>,
    pub rejected: Vec<Rejection>,
}

/// Share of the covered span that is actually scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Utilization {
    pub scheduled_seconds: i64,
    pub span_seconds: i64,
    pub percent: f64,
}

impl ScheduleResult {
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty() && self.rejected.is_empty()
    }

    pub fn rejected_for(&self, reason: RejectionReason) -> impl Iterator<Item = &Rejection> {
        self.rejected.iter().filter(move |r| r.reason == reason)
    }

    pub fn candidate_count(&self) -> usize {
        self.selected.len() + self.rejected.len()
    }

    pub fn utilization(&self) -> Option<Utilization> {
        let first = self.selected.iter().map(|c| c.pass.start).min()?;
        let last = self.selected.iter().map(|c| c.pass.end).max()?;
        let scheduled: i64 = self
            .selected
            .iter()
            .map(|c| c.pass.duration().num_seconds())
            .sum();
        let span = (last - first).num_seconds();
        Some(Utilization {
            scheduled_seconds: scheduled,
            span_seconds: span,
            percent: if span > 0 {
                100.0 * scheduled as f64 / span as f64
            } else {
                0.0
            },
        })
    }
}
