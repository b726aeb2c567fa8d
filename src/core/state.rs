//! Execution state models

use crate::core::{failure::StepFailure, matrix::Configuration, step::StepKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of one configuration run
///
/// `Pending → Running(step) → Succeeded | Failed(step)`; the terminal
/// states have no outgoing transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    /// Run has not started
    Pending,
    /// Run is executing the step at `step_index`
    Running { step_index: usize },
    /// Every step succeeded or was skipped
    Succeeded,
    /// The step at `step_index` failed
    Failed { step_index: usize },
}

impl RunStatus {
    /// Check if the run is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Failed { .. })
    }

    /// Start the run at its first step
    pub fn begin(&mut self) {
        debug_assert_eq!(*self, RunStatus::Pending, "run already started");
        *self = RunStatus::Running { step_index: 0 };
    }

    /// Move on to the step at `step_index`
    pub fn enter_step(&mut self, step_index: usize) {
        debug_assert!(matches!(self, RunStatus::Running { .. }), "run is not running");
        *self = RunStatus::Running { step_index };
    }

    /// Mark the run as succeeded
    pub fn succeed(&mut self) {
        debug_assert!(matches!(self, RunStatus::Running { .. }), "run is not running");
        *self = RunStatus::Succeeded;
    }

    /// Mark the run as failed at the current step
    pub fn fail(&mut self) {
        match *self {
            RunStatus::Running { step_index } => *self = RunStatus::Failed { step_index },
            _ => debug_assert!(false, "run is not running"),
        }
    }
}

/// Outcome of a single step within a configuration run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    /// Command exited with status zero
    Succeeded {
        started_at: DateTime<Utc>,
        duration_ms: u64,
        output: String,
    },
    /// Command exited non-zero, could not start, or timed out
    Failed {
        failure: StepFailure,
        started_at: DateTime<Utc>,
        duration_ms: u64,
        output: String,
    },
    /// Guard did not hold; the command was not executed
    Skipped { reason: String },
    /// An earlier step failed
    NotRun,
}

impl StepOutcome {
    /// Did the step let the run continue
    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Succeeded { .. } | StepOutcome::Skipped { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, StepOutcome::Failed { .. })
    }

    /// Whether the step's command was actually executed
    pub fn was_executed(&self) -> bool {
        matches!(self, StepOutcome::Succeeded { .. } | StepOutcome::Failed { .. })
    }

    /// Captured output of an executed step
    pub fn output(&self) -> Option<&str> {
        match self {
            StepOutcome::Succeeded { output, .. } | StepOutcome::Failed { output, .. } => Some(output),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StepOutcome::Succeeded { .. } => "succeeded",
            StepOutcome::Failed { .. } => "failed",
            StepOutcome::Skipped { .. } => "skipped",
            StepOutcome::NotRun => "not run",
        }
    }
}

/// A step's outcome, tagged with the step it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: String,
    pub kind: StepKind,
    pub outcome: StepOutcome,
}

/// Result of running the step sequence for one configuration.
///
/// Built once by the engine when the run reaches a terminal state; it
/// exposes no way to change it afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    execution_id: Uuid,
    configuration: Configuration,
    steps: Vec<StepRecord>,
    status: RunStatus,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
}

impl RunResult {
    pub(crate) fn new(
        configuration: Configuration,
        steps: Vec<StepRecord>,
        status: RunStatus,
        started_at: DateTime<Utc>,
    ) -> Self {
        debug_assert!(status.is_terminal(), "run result built from a non-terminal run");
        Self {
            execution_id: Uuid::new_v4(),
            configuration,
            steps,
            status,
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn execution_id(&self) -> Uuid {
        self.execution_id
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    /// Outcome of a step by name
    pub fn outcome(&self, step_name: &str) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|s| s.name == step_name)
            .map(|s| &s.outcome)
    }

    /// The step that ended the run, if it failed
    pub fn failed_step(&self) -> Option<&StepRecord> {
        match self.status {
            RunStatus::Failed { step_index } => self.steps.get(step_index),
            _ => None,
        }
    }

    /// Names of the steps whose commands were executed, in order
    pub fn executed_steps(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.outcome.was_executed())
            .map(|s| s.name.as_str())
            .collect()
    }

    pub fn duration(&self) -> std::time::Duration {
        self.finished_at
            .signed_duration_since(self.started_at)
            .to_std()
            .unwrap_or_default()
    }
}

/// Aggregate result of running every configuration of a pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Unique execution ID
    pub execution_id: Uuid,

    /// Pipeline name
    pub pipeline_name: String,

    /// One result per configuration, in matrix order
    pub runs: Vec<RunResult>,

    /// Configurations whose run was lost before producing a result
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aborted: Vec<String>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PipelineReport {
    /// True if every configuration succeeded
    pub fn is_success(&self) -> bool {
        self.aborted.is_empty() && self.runs.iter().all(RunResult::is_success)
    }

    /// Process exit code: 0 iff every configuration succeeded
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    pub fn succeeded(&self) -> usize {
        self.runs.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.runs.len() - self.succeeded() + self.aborted.len()
    }

    pub fn failed_runs(&self) -> impl Iterator<Item = &RunResult> {
        self.runs.iter().filter(|r| !r.is_success())
    }
}
