use chrono::{DateTime, Duration, Utc};

use crate::predict::{Pass, TimeWindow};

/// True when `a` and `b` are closer than `buffer` or overlap. Two intervals
/// are compatible iff one starts at least `buffer` after the other ends.
pub fn conflicts(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
    buffer: Duration,
) -> bool {
    a_start < b_end + buffer && b_start < a_end + buffer
}

/// Two passes of one satellite inside the same revolution. Without a known
/// period only time-overlapping passes count.
pub fn same_revolution(a: &Pass, b: &Pass) -> bool {
    if a.norad_id != b.norad_id {
        return false;
    }
    match a.period.or(b.period) {
        Some(period) => {
            let gap = if a.culmination > b.culmination {
                a.culmination - b.culmination
            } else {
                b.culmination - a.culmination
            };
            gap < period / 2
        }
        None => a.start < b.end && b.start < a.end,
    }
}

/// Idle stretch between busy blocks; `None` bounds are open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
}

impl Gap {
    /// Holds `[start, end]` plus `buffer` on both sides.
    pub fn fits(&self, start: DateTime<Utc>, end: DateTime<Utc>, buffer: Duration) -> bool {
        self.after.map_or(true, |after| start >= after + buffer)
            && self.before.map_or(true, |before| end + buffer <= before)
    }
}

/// Merges busy blocks and returns the gaps between them, earliest first.
pub fn free_gaps(mut busy: Vec<TimeWindow>) -> Vec<Gap> {
    busy.sort_by_key(|w| (w.start, w.end));

    let mut merged: Vec<TimeWindow> = Vec::with_capacity(busy.len());
    for window in busy {
        match merged.last_mut() {
            Some(last) if window.start <= last.end => {
                last.end = last.end.max(window.end);
            }
            _ => merged.push(window),
        }
    }

    let mut gaps = Vec::with_capacity(merged.len() + 1);
    let mut after = None;
    for window in &merged {
        gaps.push(Gap {
            after,
            before: Some(window.start),
        });
        after = Some(window.end);
    }
    gaps.push(Gap {
        after,
        before: None,
    });
    gaps
}
