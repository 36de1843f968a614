use std::io::{self, Write};

use chrono::Duration;

use super::{EmitError, ScheduleEmitter};
use crate::planner::PlanReport;
use crate::predict::Pass;
use crate::priority::Candidate;
use crate::scheduler::{Rejection, RejectionReason};

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Fixed-width summary for terminals.
pub struct TableEmitter {
    pub show_rejected: bool,
}

fn format_duration(d: Duration) -> String {
    let secs = d.num_seconds().max(0);
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

fn write_header(out: &mut dyn Write, with_score: bool) -> io::Result<()> {
    write!(
        out,
        "{:3} | {:5} | {:19} | {:19} | {:>8} | AzR El AzS |",
        "Sch", "NORAD", "Start time", "End time", "Duration"
    )?;
    if with_score {
        write!(out, " {:>10} | {:8} |", "Priority", "Tier")?;
    }
    writeln!(out, " {:24} | {:11} | Satellite name", "Transmitter", "Mode")
}

fn write_pass(out: &mut dyn Write, flag: &str, pass: &Pass) -> io::Result<()> {
    write!(
        out,
        "{:3} | {:05} | {} | {} | {:>8} | {:3.0} {:2.0} {:3.0} |",
        flag,
        pass.norad_id,
        pass.start.format(TIME_FORMAT),
        pass.end.format(TIME_FORMAT),
        format_duration(pass.duration()),
        pass.start_azimuth_deg,
        pass.max_elevation_deg,
        pass.end_azimuth_deg,
    )
}

fn write_tail(out: &mut dyn Write, pass: &Pass) -> io::Result<()> {
    writeln!(
        out,
        " {:24} | {:11} | {}",
        pass.transmitter.as_deref().unwrap_or(""),
        pass.mode.as_deref().unwrap_or(""),
        pass.satellite
    )
}

/// Clipped passes get a `C` after the selection flag; their edges are the
/// window bounds, not a real rise or set.
fn write_candidate(out: &mut dyn Write, flag: &str, candidate: &Candidate) -> io::Result<()> {
    let flag = if candidate.pass.clipped {
        format!("{}C", flag)
    } else {
        flag.to_string()
    };
    write_pass(out, &flag, &candidate.pass)?;
    write!(
        out,
        " {:>10.6} | {:8} |",
        candidate.weight(),
        candidate.score.tier().to_string()
    )?;
    write_tail(out, &candidate.pass)
}

/// Unscored candidate list, as printed by `predict`.
pub fn write_passes(out: &mut dyn Write, passes: &[Pass]) -> io::Result<()> {
    write_header(out, false)?;
    for pass in passes {
        write_pass(out, if pass.clipped { "C" } else { "" }, pass)?;
        write_tail(out, pass)?;
    }
    writeln!(out, "{} passes", passes.len())
}

impl ScheduleEmitter for TableEmitter {
    fn emit(&self, report: &PlanReport, out: &mut dyn Write) -> Result<(), EmitError> {
        let result = &report.result;
        if let Some(station) = &report.station {
            write!(out, "Station {}, ", station)?;
        }
        writeln!(
            out,
            "Window {} - {}",
            report.window.start.format(TIME_FORMAT),
            report.window.end.format(TIME_FORMAT)
        )?;
        if result.is_empty() {
            writeln!(out, "No candidate passes in window")?;
            return write_diagnostics(out, report);
        }
        write_header(out, true)?;

        if self.show_rejected {
            let mut rows: Vec<(&str, &Candidate)> = result
                .selected
                .iter()
                .map(|c| ("Y", c))
                .chain(
                    result
                        .rejected
                        .iter()
                        .map(|Rejection { candidate, .. }| ("N", candidate)),
                )
                .collect();
            rows.sort_by_key(|(_, c)| (c.pass.start, c.pass.norad_id));
            for (flag, candidate) in rows {
                write_candidate(out, flag, candidate)?;
            }
        } else {
            for candidate in &result.selected {
                write_candidate(out, "Y", candidate)?;
            }
        }

        writeln!(out)?;
        write!(
            out,
            "{} of {} candidates scheduled",
            result.selected.len(),
            result.candidate_count()
        )?;
        let reasons = [
            RejectionReason::Conflict,
            RejectionReason::BelowThreshold,
            RejectionReason::DuplicateSatelliteWindow,
            RejectionReason::InvalidGeometry,
        ];
        for reason in reasons {
            let count = result.rejected_for(reason).count();
            if count > 0 {
                write!(out, ", {} {}", count, reason)?;
            }
        }
        writeln!(out)?;

        if let Some(u) = result.utilization() {
            writeln!(
                out,
                "Utilization: {} of {} ({:.1}%)",
                format_duration(Duration::seconds(u.scheduled_seconds)),
                format_duration(Duration::seconds(u.span_seconds)),
                u.percent
            )?;
        }

        write_diagnostics(out, report)
    }
}

fn write_diagnostics(out: &mut dyn Write, report: &PlanReport) -> Result<(), EmitError> {
    for diagnostic in &report.diagnostics {
        writeln!(out, "warning: {}", diagnostic)?;
    }
    Ok(())
}
