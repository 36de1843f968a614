mod structured;
mod table;

use std::io::Write;

use thiserror::Error;

use crate::planner::PlanReport;

pub use structured::{JsonEmitter, YamlEmitter};
pub use table::{write_passes, TableEmitter};

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Writes a finished plan somewhere a human or another tool can read it.
pub trait ScheduleEmitter {
    fn emit(&self, report: &PlanReport, out: &mut dyn Write) -> Result<(), EmitError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Yaml,
    Json,
}

impl OutputFormat {
    pub fn emitter(self, show_rejected: bool) -> Box<dyn ScheduleEmitter> {
        match self {
            OutputFormat::Table => Box::new(TableEmitter { show_rejected }),
            OutputFormat::Yaml => Box::new(YamlEmitter),
            OutputFormat::Json => Box::new(JsonEmitter { pretty: true }),
        }
    }
}

/// Emits the report and flushes, so a failed final write is reported too.
pub fn write_report(
    emitter: &dyn ScheduleEmitter,
    report: &PlanReport,
    out: &mut dyn Write,
) -> Result<(), EmitError> {
    emitter.emit(report, out)?;
    out.flush()?;
    Ok(())
}
