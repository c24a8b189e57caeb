//! Job Launcher
//!
//! Entry point for running a registered job:
//! 1. Looks the job up by name
//! 2. Checks the launch parameters against its contract
//! 3. Walks the root flow with a fresh context
//! 4. Reports the run to the history sink, if one is configured
//!
//! A launcher is shared freely between threads; every launch owns its
//! context and timeline.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{ErrorDetail, LaunchError};
use crate::monitoring::{ExecutionTimeline, NodeTiming};
use crate::workflow::model::{NodeKind, Outcome, TerminalStatus};
use crate::workflow::parameters::validate_parameters;
use crate::workflow::registry::JobRegistry;

use super::context::{ExecutionContext, NodeVisit};
use super::engine::Engine;
use super::history::{HistorySink, RunRecord, StepOutcome};

/// Everything known about one finished run.
#[derive(Debug, Clone)]
pub struct JobRunResult {
    pub run_id: Uuid,
    pub job_name: String,
    pub status: TerminalStatus,

    /// Latest outcome of every executed node
    pub step_results: HashMap<String, Outcome>,

    /// Every executed node, in order
    pub visits: Vec<NodeVisit>,

    pub error: Option<ErrorDetail>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub timings: Vec<NodeTiming>,
    pub shared_data: HashMap<String, Value>,
}

impl JobRunResult {
    /// Names of executed steps in order, without deciders and containers.
    pub fn steps_executed(&self) -> Vec<&str> {
        self.visits
            .iter()
            .filter(|visit| visit.kind == NodeKind::Step)
            .map(|visit| visit.name.as_str())
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.status.is_completed()
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    /// History record of this run.
    pub fn to_record(&self) -> RunRecord {
        RunRecord {
            job_name: self.job_name.clone(),
            run_id: self.run_id,
            status: self.status.clone(),
            step_outcomes: self
                .visits
                .iter()
                .map(|visit| StepOutcome {
                    name: visit.name.clone(),
                    outcome: visit.outcome.label().to_string(),
                })
                .collect(),
            timings: self.timings.clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
            error: self.error.clone(),
        }
    }
}

/// Launches registered jobs.
pub struct JobLauncher {
    jobs: JobRegistry,
    engine: Engine,
    history: Option<Arc<dyn HistorySink>>,
}

impl JobLauncher {
    pub fn new(jobs: JobRegistry) -> Self {
        Self {
            jobs,
            engine: Engine::new(),
            history: None,
        }
    }

    /// Reports every finished run to `history`.
    pub fn with_history(mut self, history: Arc<dyn HistorySink>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn set_engine(&mut self, engine: Engine) {
        self.engine = engine;
    }

    pub fn jobs(&self) -> &JobRegistry {
        &self.jobs
    }

    /// Runs `job_name` with the given launch parameters.
    ///
    /// Returns `Err` only when the job is unknown or the parameters break
    /// its contract; in both cases nothing runs. Failures inside the run
    /// are reported on the returned [`JobRunResult`].
    pub fn launch(
        &self,
        job_name: &str,
        parameters: HashMap<String, String>,
    ) -> Result<JobRunResult, LaunchError> {
        self.launch_with_context(job_name, ExecutionContext::new(parameters))
    }

    /// Runs `job_name` starting from a prepared context.
    pub fn launch_with_context(
        &self,
        job_name: &str,
        mut ctx: ExecutionContext,
    ) -> Result<JobRunResult, LaunchError> {
        let job = self
            .jobs
            .get(job_name)
            .ok_or_else(|| LaunchError::UnknownJob(job_name.to_string()))?;

        if let Err(err) = validate_parameters(job.name(), job.parameters(), &ctx.job_parameters) {
            error!("{}", err);
            return Err(err.into());
        }

        let run_id = Uuid::new_v4();
        info!("Launching job '{}' (run {})", job.name(), run_id);

        let mut timeline = ExecutionTimeline::new();
        let started_at = timeline.start_time();
        let result = self.engine.execute_job(&job, &mut ctx, &mut timeline);
        let finished_at = Utc::now();

        match &result.error {
            Some(detail) => warn!("Job '{}' finished with {}: {}", job.name(), result.status, detail),
            None => info!("Job '{}' finished with {}", job.name(), result.status),
        }

        let visits = ctx.visits().to_vec();
        let ExecutionContext {
            step_results,
            shared_data,
            ..
        } = ctx;

        let run = JobRunResult {
            run_id,
            job_name: job.name().to_string(),
            status: result.status,
            step_results,
            visits,
            error: result.error,
            started_at,
            finished_at,
            timings: timeline.timings(),
            shared_data,
        };

        if let Some(history) = &self.history {
            if let Err(err) = history.record(&run.to_record()) {
                warn!("Could not record run {} of '{}': {}", run_id, job.name(), err);
            }
        }

        Ok(run)
    }
}
