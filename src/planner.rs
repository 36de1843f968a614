use chrono::Duration;
use serde::Serialize;
use thiserror::Error;

use crate::diagnostics::Diagnostic;
use crate::predict::{
    Generated, GroundStation, Pass, PassGenerator, PredictError, PropagationError, Propagator,
    Satellite, TimeWindow,
};
use crate::priority::{PriorityPolicy, PriorityWarning};
use crate::scheduler::{ScheduleResult, Scheduler, SelectOptions};

#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Predict(#[from] PredictError),
    #[error("Failed to build worker pool: {0}")]
    WorkerPool(String),
}

/// Everything the caller decides for one run; validated before any
/// propagation starts.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub station_name: Option<String>,
    pub station: GroundStation,
    pub window: TimeWindow,
    pub min_pass_duration: Duration,
    pub select: SelectOptions,
    /// Generation threads; `None` uses one per core.
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station: Option<String>,
    pub window: TimeWindow,
    #[serde(flatten)]
    pub result: ScheduleResult,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct Planner {
    request: PlanRequest,
    policy: PriorityPolicy,
    diagnostics: Vec<Diagnostic>,
}

impl Planner {
    pub fn new(request: PlanRequest, policy: PriorityPolicy) -> Self {
        Self {
            request,
            policy,
            diagnostics: Vec::new(),
        }
    }

    pub fn with_policy_warnings(mut self, warnings: Vec<PriorityWarning>) -> Self {
        self.diagnostics
            .extend(warnings.into_iter().map(Diagnostic::PriorityFile));
        self
    }

    /// Satellites dropped before generation, e.g. unparseable elements.
    pub fn with_load_failures(mut self, failures: Vec<PropagationError>) -> Self {
        self.diagnostics
            .extend(failures.into_iter().map(Diagnostic::Propagation));
        self
    }

    /// Candidate passes for the window, without scoring or selection.
    pub fn candidates<P: Propagator>(
        &self,
        propagator: P,
        satellites: &[Satellite<P::Elements>],
    ) -> Result<Generated, PlanError> {
        let generator = PassGenerator::new(
            propagator,
            self.request.station,
            self.request.window,
            self.request.select.min_elevation_deg,
        )?
        .with_min_pass_duration(self.request.min_pass_duration);

        match self.request.workers {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| PlanError::WorkerPool(e.to_string()))?;
                Ok(pool.install(|| generator.generate(satellites)))
            }
            None => Ok(generator.generate(satellites)),
        }
    }

    pub fn run<P: Propagator>(
        self,
        propagator: P,
        satellites: &[Satellite<P::Elements>],
    ) -> Result<PlanReport, PlanError> {
        let generated = self.candidates(propagator, satellites)?;
        log::info!(
            "Found {} candidate passes from {} satellites between {} and {}",
            generated.passes.len(),
            satellites.len(),
            self.request.window.start,
            self.request.window.end
        );

        let Planner {
            request,
            policy,
            mut diagnostics,
        } = self;
        let candidates = generated
            .passes
            .into_iter()
            .map(|pass: Pass| policy.assign(pass))
            .collect();

        let result = Scheduler::new(request.select).select(candidates);

        diagnostics.extend(generated.failures.into_iter().map(Diagnostic::Propagation));
        diagnostics.extend(Diagnostic::from_result(&result));

        Ok(PlanReport {
            station: request.station_name,
            window: request.window,
            result,
            diagnostics,
        })
    }
}
