use std::cmp::Ordering;

use chrono::Duration;

use crate::predict::TimeWindow;
use crate::priority::{Candidate, Score, Tier};
use crate::scheduler::intervals::{conflicts, free_gaps, same_revolution};
use crate::scheduler::types::{Rejection, RejectionReason, ScheduleResult, SelectOptions};

/// Greedy priority-first selection for a single station, with an optional
/// second pass that fills idle time with earlier conflict rejects.
///
/// The greedy pass keeps a candidate out when it collides with any valid,
/// higher-ranked candidate, scheduled or not. Gap filling relaxes that: a
/// conflict reject whose blockers all lost is admitted into the idle time
/// they left, as long as it clears the accepted passes by the buffer.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    options: SelectOptions,
}

impl Scheduler {
    pub fn new(mut options: SelectOptions) -> Self {
        if options.buffer < Duration::zero() {
            log::warn!(
                "Negative buffer {}s treated as zero",
                options.buffer.num_seconds()
            );
            options.buffer = Duration::zero();
        }
        Self { options }
    }

    pub fn select(&self, mut candidates: Vec<Candidate>) -> ScheduleResult {
        let total = candidates.len();
        candidates.sort_by(priority_order);

        let mut accepted: Vec<Candidate> = Vec::new();
        let mut rejected: Vec<Rejection> = Vec::new();
        let mut conflicted: Vec<Candidate> = Vec::new();

        for candidate in candidates {
            if let Some(reason) = self.screen(&candidate) {
                rejected.push(Rejection { candidate, reason });
            } else if self.repeats_satellite(&accepted, &candidate) {
                rejected.push(Rejection {
                    candidate,
                    reason: RejectionReason::DuplicateSatelliteWindow,
                });
            } else if self.collides(accepted.iter().chain(&conflicted), &candidate) {
                conflicted.push(candidate);
            } else {
                accepted.push(candidate);
            }
        }

        for candidate in conflicted {
            let admit = self.options.fill_gaps
                && !self.repeats_satellite(&accepted, &candidate)
                && self.fits_gap(&accepted, &candidate);
            if admit {
                log::debug!(
                    "Filled gap with {} at {}",
                    candidate.pass.satellite,
                    candidate.pass.start
                );
                accepted.push(candidate);
            } else {
                rejected.push(Rejection {
                    candidate,
                    reason: RejectionReason::Conflict,
                });
            }
        }

        accepted.sort_by(|a, b| {
            a.pass
                .start
                .cmp(&b.pass.start)
                .then_with(|| priority_order(a, b))
        });
        rejected.sort_by(|a, b| {
            a.candidate
                .pass
                .start
                .cmp(&b.candidate.pass.start)
                .then_with(|| priority_order(&a.candidate, &b.candidate))
        });

        let result = ScheduleResult {
            selected: accepted,
            rejected,
        };
        match result.utilization() {
            Some(u) => log::info!(
                "{} passes selected out of {}, {} s out of {} s at {:.3}% efficiency",
                result.selected.len(),
                total,
                u.scheduled_seconds,
                u.span_seconds,
                u.percent
            ),
            None => log::info!("No appropriate passes found for scheduling."),
        }
        result
    }

    /// Reasons that disqualify a candidate before it competes for time.
    fn screen(&self, candidate: &Candidate) -> Option<RejectionReason> {
        let pass = &candidate.pass;
        if !pass.has_valid_geometry() {
            log::warn!(
                "Invalid geometry for {} ({}): {} - {}, max elevation {}",
                pass.satellite,
                pass.norad_id,
                pass.start,
                pass.end,
                pass.max_elevation_deg
            );
            return Some(RejectionReason::InvalidGeometry);
        }
        if pass.max_elevation_deg < self.options.min_elevation_deg {
            return Some(RejectionReason::BelowThreshold);
        }
        if self.options.only_priority && candidate.score.tier() == Tier::Fallback {
            return Some(RejectionReason::BelowThreshold);
        }
        match self.options.min_priority {
            Some(min) if normalized_priority(&candidate.score) < min => {
                Some(RejectionReason::BelowThreshold)
            }
            _ => None,
        }
    }

    fn repeats_satellite(&self, accepted: &[Candidate], candidate: &Candidate) -> bool {
        !self.options.allow_repeat
            && accepted
                .iter()
                .any(|a| same_revolution(&a.pass, &candidate.pass))
    }

    fn collides<'a>(
        &self,
        mut ranked_higher: impl Iterator<Item = &'a Candidate>,
        candidate: &Candidate,
    ) -> bool {
        let buffer = self.options.buffer;
        let (start, end) = (candidate.pass.start, candidate.pass.end);
        ranked_higher.any(|a| conflicts(a.pass.start, a.pass.end, start, end, buffer))
            || self
                .options
                .reserved
                .iter()
                .any(|r| conflicts(r.start, r.end, start, end, buffer))
    }

    fn fits_gap(&self, accepted: &[Candidate], candidate: &Candidate) -> bool {
        let busy: Vec<TimeWindow> = accepted
            .iter()
            .map(|a| TimeWindow::new(a.pass.start, a.pass.end))
            .chain(self.options.reserved.iter().copied())
            .collect();
        free_gaps(busy).iter().any(|gap| {
            gap.fits(
                candidate.pass.start,
                candidate.pass.end,
                self.options.buffer,
            )
        })
    }
}

/// Score on the `min_priority` scale: explicit weights as written, fallback
/// culmination elevation as a fraction of zenith.
fn normalized_priority(score: &Score) -> f64 {
    match *score {
        Score::Explicit { weight, .. } => weight,
        Score::Fallback { elevation } => elevation / 90.0,
    }
}

/// Tier, weight and rank first, then higher culmination, then earlier start.
/// The trailing keys make the order total so equal inputs sort identically.
fn priority_order(a: &Candidate, b: &Candidate) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| {
            b.pass
                .max_elevation_deg
                .total_cmp(&a.pass.max_elevation_deg)
        })
        .then_with(|| a.pass.start.cmp(&b.pass.start))
        .then_with(|| a.pass.norad_id.cmp(&b.pass.norad_id))
        .then_with(|| a.pass.transmitter.cmp(&b.pass.transmitter))
        .then_with(|| a.pass.end.cmp(&b.pass.end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::Pass;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, m, 0).unwrap()
    }

    fn pass(norad_id: u32, start: DateTime<Utc>, end: DateTime<Utc>, max_el: f64) -> Pass {
        Pass {
            norad_id,
            satellite: format!("SAT-{}", norad_id),
            transmitter: None,
            mode: None,
            start,
            end,
            culmination: start + (end - start) / 2,
            max_elevation_deg: max_el,
            start_azimuth_deg: 0.0,
            end_azimuth_deg: 180.0,
            clipped: false,
            period: Some(Duration::minutes(95)),
        }
    }

    fn explicit(pass: Pass, weight: f64) -> Candidate {
        Candidate {
            pass,
            score: Score::Explicit { weight, rank: 0 },
        }
    }

    fn fallback(pass: Pass) -> Candidate {
        let elevation = pass.max_elevation_deg;
        Candidate {
            pass,
            score: Score::Fallback { elevation },
        }
    }

    fn with_buffer(seconds: i64, fill_gaps: bool) -> Scheduler {
        Scheduler::new(SelectOptions {
            buffer: Duration::seconds(seconds),
            fill_gaps,
            ..SelectOptions::default()
        })
    }

    fn selected_ids(result: &ScheduleResult) -> Vec<u32> {
        result.selected.iter().map(|c| c.pass.norad_id).collect()
    }

    fn assert_separated(result: &ScheduleResult, buffer: Duration) {
        for pair in result.selected.windows(2) {
            assert!(pair[1].pass.start >= pair[0].pass.end + buffer);
        }
    }

    #[test]
    fn empty_input_yields_empty_result() {
        let result = with_buffer(60, true).select(Vec::new());
        assert_eq!(result, ScheduleResult::default());
        assert!(result.is_empty());
        assert!(result.utilization().is_none());
    }

    #[test]
    fn explicit_pass_wins_overlap_against_fallback() {
        let a = explicit(pass(1, at(10, 0), at(10, 10), 20.0), 1.0);
        let b = fallback(pass(2, at(10, 5), at(10, 15), 40.0));
        let result = with_buffer(0, false).select(vec![b, a]);

        assert_eq!(selected_ids(&result), vec![1]);
        assert_eq!(result.rejected.len(), 1);
        assert_eq!(result.rejected[0].candidate.pass.norad_id, 2);
        assert_eq!(result.rejected[0].reason, RejectionReason::Conflict);
    }

    #[test]
    fn tier_dominates_numeric_weight() {
        let a = explicit(pass(1, at(10, 0), at(10, 10), 5.0), 0.001);
        let b = fallback(pass(2, at(10, 0), at(10, 10), 89.0));
        let result = with_buffer(0, false).select(vec![b, a]);
        assert_eq!(selected_ids(&result), vec![1]);
    }

    #[test]
    fn higher_weight_wins_within_explicit_tier() {
        let a = explicit(pass(1, at(10, 0), at(10, 10), 80.0), 0.5);
        let b = explicit(pass(2, at(10, 5), at(10, 15), 20.0), 0.9);
        let result = with_buffer(0, false).select(vec![a, b]);
        assert_eq!(selected_ids(&result), vec![2]);
    }

    #[test]
    fn earlier_start_breaks_full_ties() {
        let a = fallback(pass(1, at(10, 5), at(10, 15), 30.0));
        let b = fallback(pass(2, at(10, 0), at(10, 10), 30.0));
        let result = with_buffer(0, false).select(vec![a, b]);
        assert_eq!(selected_ids(&result), vec![2]);
    }

    #[test]
    fn buffer_arithmetic_uses_literal_timestamps() {
        let candidates = || {
            vec![
                explicit(pass(1, at(10, 0), at(10, 10), 30.0), 1.0),
                explicit(pass(3, at(10, 30), at(10, 40), 30.0), 1.0),
                fallback(pass(4, at(10, 12), at(10, 18), 15.0)),
            ]
        };

        // 10:12 >= 10:10 + 60s and nothing else competes for D's slot.
        for fill_gaps in [false, true] {
            let result = with_buffer(60, fill_gaps).select(candidates());
            assert_eq!(selected_ids(&result), vec![1, 4, 3]);
            assert_separated(&result, Duration::seconds(60));
        }

        // 10:12 < 10:10 + 180s: D conflicts, and filling must not displace A.
        for fill_gaps in [false, true] {
            let result = with_buffer(180, fill_gaps).select(candidates());
            assert_eq!(selected_ids(&result), vec![1, 3]);
            let conflicts: Vec<_> = result
                .rejected_for(RejectionReason::Conflict)
                .map(|r| r.candidate.pass.norad_id)
                .collect();
            assert_eq!(conflicts, vec![4]);
        }
    }

    #[test]
    fn tight_fit_respects_buffer_on_both_sides() {
        let candidates = vec![
            explicit(pass(1, at(10, 0), at(10, 10), 30.0), 1.0),
            explicit(pass(2, at(10, 20), at(10, 30), 30.0), 1.0),
            fallback(pass(3, at(10, 11), at(10, 19), 60.0)),
            fallback(pass(4, at(10, 9), at(10, 21), 70.0)),
        ];
        let result = with_buffer(60, true).select(candidates);

        assert_eq!(selected_ids(&result), vec![1, 3, 2]);
        assert_separated(&result, Duration::seconds(60));
        assert_eq!(
            result.rejected_for(RejectionReason::Conflict).count(),
            1
        );
    }

    #[test]
    fn rejects_invalid_geometry_before_selection() {
        let inverted = explicit(pass(1, at(10, 10), at(10, 0), 30.0), 1.0);
        let flat = explicit(pass(2, at(11, 0), at(11, 10), 0.0), 1.0);
        let ok = fallback(pass(3, at(12, 0), at(12, 10), 30.0));
        let result = with_buffer(0, false).select(vec![inverted, flat, ok]);

        assert_eq!(selected_ids(&result), vec![3]);
        assert_eq!(
            result.rejected_for(RejectionReason::InvalidGeometry).count(),
            2
        );
    }

    #[test]
    fn rejects_passes_below_elevation_threshold() {
        let scheduler = Scheduler::new(SelectOptions {
            min_elevation_deg: 20.0,
            ..SelectOptions::default()
        });
        let low = explicit(pass(1, at(10, 0), at(10, 10), 19.9), 1.0);
        let high = fallback(pass(2, at(11, 0), at(11, 10), 20.0));
        let result = scheduler.select(vec![low, high]);

        assert_eq!(selected_ids(&result), vec![2]);
        assert_eq!(result.rejected[0].reason, RejectionReason::BelowThreshold);
        assert!(result
            .selected
            .iter()
            .all(|c| c.pass.max_elevation_deg >= 20.0));
    }

    #[test]
    fn priority_thresholds_reject_weak_candidates() {
        let only = Scheduler::new(SelectOptions {
            only_priority: true,
            ..SelectOptions::default()
        });
        let a = explicit(pass(1, at(10, 0), at(10, 10), 30.0), 0.2);
        let b = fallback(pass(2, at(11, 0), at(11, 10), 80.0));
        let result = only.select(vec![a.clone(), b.clone()]);
        assert_eq!(selected_ids(&result), vec![1]);
        assert_eq!(result.rejected[0].reason, RejectionReason::BelowThreshold);

        let min = Scheduler::new(SelectOptions {
            min_priority: Some(0.5),
            ..SelectOptions::default()
        });
        let result = min.select(vec![a, b]);
        assert_eq!(selected_ids(&result), vec![2]);
    }

    #[test]
    fn min_priority_scales_fallback_elevation_to_zenith() {
        let min = Scheduler::new(SelectOptions {
            min_priority: Some(0.5),
            ..SelectOptions::default()
        });
        // 20 deg is 0.22 of zenith; 45 deg sits exactly on the threshold.
        let low = fallback(pass(1, at(10, 0), at(10, 10), 20.0));
        let half = fallback(pass(2, at(11, 0), at(11, 10), 45.0));
        let weighted = explicit(pass(3, at(12, 0), at(12, 10), 15.0), 0.6);
        let result = min.select(vec![low, half, weighted]);

        assert_eq!(selected_ids(&result), vec![2, 3]);
        assert_eq!(result.rejected.len(), 1);
        assert_eq!(result.rejected[0].candidate.pass.norad_id, 1);
        assert_eq!(result.rejected[0].reason, RejectionReason::BelowThreshold);
    }

    #[test]
    fn gap_fill_admits_pass_whose_blocker_lost() {
        // B loses to A; D only collides with B, so it waits for the fill pass.
        let candidates = || {
            vec![
                fallback(pass(4, at(10, 15), at(10, 25), 30.0)),
                explicit(pass(2, at(10, 5), at(10, 20), 30.0), 0.5),
                explicit(pass(1, at(10, 0), at(10, 10), 30.0), 1.0),
            ]
        };
        let conflict_ids = |result: &ScheduleResult| -> Vec<u32> {
            result
                .rejected_for(RejectionReason::Conflict)
                .map(|r| r.candidate.pass.norad_id)
                .collect()
        };

        let strict = with_buffer(60, false).select(candidates());
        assert_eq!(selected_ids(&strict), vec![1]);
        assert_eq!(conflict_ids(&strict), vec![2, 4]);

        let filled = with_buffer(60, true).select(candidates());
        assert_eq!(selected_ids(&filled), vec![1, 4]);
        assert_eq!(conflict_ids(&filled), vec![2]);
        assert_separated(&filled, Duration::seconds(60));
    }

    #[test]
    fn suppresses_same_satellite_in_one_revolution() {
        let mut first = pass(1, at(10, 0), at(10, 10), 30.0);
        first.transmitter = Some("TX-A".into());
        let mut second = first.clone();
        second.transmitter = Some("TX-B".into());

        let result = with_buffer(0, true).select(vec![
            explicit(first.clone(), 1.0),
            fallback(second.clone()),
        ]);
        assert_eq!(result.selected.len(), 1);
        assert_eq!(
            result.selected[0].pass.transmitter.as_deref(),
            Some("TX-A")
        );
        assert_eq!(
            result.rejected[0].reason,
            RejectionReason::DuplicateSatelliteWindow
        );

        let repeat = Scheduler::new(SelectOptions {
            allow_repeat: true,
            ..SelectOptions::default()
        });
        let result = repeat.select(vec![explicit(first, 1.0), fallback(second)]);
        assert_eq!(result.rejected[0].reason, RejectionReason::Conflict);
    }

    #[test]
    fn next_revolution_of_same_satellite_is_allowed() {
        let a = explicit(pass(1, at(10, 0), at(10, 10), 30.0), 1.0);
        let b = explicit(pass(1, at(11, 35), at(11, 45), 30.0), 1.0);
        let result = with_buffer(60, false).select(vec![a, b]);
        assert_eq!(result.selected.len(), 2);
    }

    #[test]
    fn reserved_station_time_blocks_passes() {
        let scheduler = Scheduler::new(SelectOptions {
            buffer: Duration::seconds(60),
            fill_gaps: true,
            reserved: vec![TimeWindow::new(at(10, 0), at(10, 30))],
            ..SelectOptions::default()
        });
        let inside = explicit(pass(1, at(10, 5), at(10, 15), 30.0), 1.0);
        let tight = fallback(pass(2, at(10, 30), at(10, 40), 30.0));
        let clear = fallback(pass(3, at(10, 31), at(10, 41), 20.0));
        let result = scheduler.select(vec![inside, tight, clear]);

        assert_eq!(selected_ids(&result), vec![3]);
        assert_eq!(result.rejected_for(RejectionReason::Conflict).count(), 2);
    }

    #[test]
    fn negative_buffer_is_clamped() {
        let scheduler = with_buffer(-30, false);
        assert_eq!(scheduler.options.buffer, Duration::zero());
    }

    #[test]
    fn selection_is_deterministic_and_separated() {
        // Small LCG keeps the fixture reproducible without a rand dependency.
        let mut seed: u64 = 42;
        let mut next = move |modulo: u64| {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (seed >> 33) % modulo
        };

        let mut candidates = Vec::new();
        for i in 0..40u32 {
            let start = at(8, 0) + Duration::minutes(next(600) as i64);
            let end = start + Duration::minutes(3 + next(12) as i64);
            let p = pass(100 + i % 13, start, end, 5.0 + next(85) as f64);
            candidates.push(if i % 3 == 0 {
                explicit(p, (next(4) as f64) / 2.0)
            } else {
                fallback(p)
            });
        }

        let scheduler = Scheduler::new(SelectOptions {
            buffer: Duration::seconds(90),
            fill_gaps: true,
            min_elevation_deg: 10.0,
            ..SelectOptions::default()
        });
        let forward = scheduler.select(candidates.clone());
        candidates.reverse();
        let backward = scheduler.select(candidates);

        assert_eq!(forward, backward);
        assert_eq!(
            serde_json::to_string(&forward).unwrap(),
            serde_json::to_string(&backward).unwrap()
        );
        assert_eq!(forward.candidate_count(), 40);
        assert_separated(&forward, Duration::seconds(90));
        assert!(forward
            .selected
            .iter()
            .all(|c| c.pass.max_elevation_deg >= 10.0));
    }
}
