use std::io::Write;

use super::{EmitError, ScheduleEmitter};
use crate::planner::PlanReport;

pub struct YamlEmitter;

impl ScheduleEmitter for YamlEmitter {
    fn emit(&self, report: &PlanReport, out: &mut dyn Write) -> Result<(), EmitError> {
        serde_yaml::to_writer(&mut *out, report)?;
        Ok(())
    }
}

pub struct JsonEmitter {
    pub pretty: bool,
}

impl ScheduleEmitter for JsonEmitter {
    fn emit(&self, report: &PlanReport, out: &mut dyn Write) -> Result<(), EmitError> {
        if self.pretty {
            serde_json::to_writer_pretty(&mut *out, report)?;
        } else {
            serde_json::to_writer(&mut *out, report)?;
        }
        writeln!(out)?;
        Ok(())
    }
}
