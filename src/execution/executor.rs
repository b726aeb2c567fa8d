//! Step executor - runs individual steps through the command runner

use crate::{
    core::{RunContext, Step, StepFailure, StepOutcome},
    execution::runner::{CommandRunner, Invocation, RunnerError},
};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Settings shared by every step the executor runs
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    /// Directory steps run in and guards are resolved against
    pub workdir: PathBuf,

    /// Timeout applied to every step, overriding workflow values
    pub timeout_override_secs: Option<u64>,

    /// Environment applied on top of workflow and step env
    pub extra_env: BTreeMap<String, String>,
}

impl ExecutorSettings {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            timeout_override_secs: None,
            extra_env: BTreeMap::new(),
        }
    }
}

/// Executes a single step
pub struct StepExecutor<R> {
    runner: R,
    settings: ExecutorSettings,
}

impl<R: CommandRunner> StepExecutor<R> {
    pub fn new(runner: R, settings: ExecutorSettings) -> Self {
        Self { runner, settings }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn workdir(&self) -> &Path {
        &self.settings.workdir
    }

    /// Evaluate the step's guard; returns the skip reason if it does not hold
    pub fn skip_reason(&self, step: &Step, context: &RunContext) -> Option<String> {
        let guard = step.guard()?;
        let scoped = context.scoped_to(step);
        if guard.holds(&self.settings.workdir, &scoped) {
            None
        } else {
            Some(format!("{} does not exist", guard.render(&scoped)))
        }
    }

    /// Build the invocation for a step
    pub fn invocation(&self, step: &Step, context: &RunContext) -> Invocation {
        let scoped = context.scoped_to(step);
        let mut env = scoped.env.clone();
        env.extend(self.settings.extra_env.clone());

        Invocation {
            command: step.render_command(&scoped),
            workdir: self.settings.workdir.clone(),
            env,
            timeout: self
                .settings
                .timeout_override_secs
                .or(step.timeout_secs)
                .map(Duration::from_secs),
        }
    }

    /// Run the step's command unconditionally.
    ///
    /// Callers check `skip_reason` first; a guarded step whose file is absent
    /// must not reach this.
    pub async fn run(&self, step: &Step, context: &RunContext) -> StepOutcome {
        let invocation = self.invocation(step, context);
        info!("Executing step: {}", step.name);
        debug!("Command for step {}: {}", step.name, invocation.command);

        let started_at = Utc::now();
        let clock = Instant::now();
        let result = self.runner.run(&invocation).await;
        let duration_ms = clock.elapsed().as_millis() as u64;

        match result {
            Ok(output) if output.success() => {
                info!("Step {} succeeded in {}ms", step.name, duration_ms);
                StepOutcome::Succeeded {
                    started_at,
                    duration_ms,
                    output: output.combined(),
                }
            }
            Ok(output) => {
                let failure = StepFailure::from_exit(step.kind, output.exit_code);
                warn!("Step {} failed: {}", step.name, failure);
                StepOutcome::Failed {
                    failure,
                    started_at,
                    duration_ms,
                    output: output.combined(),
                }
            }
            Err(RunnerError::Timeout(seconds)) => {
                warn!("Step {} timed out after {}s", step.name, seconds);
                StepOutcome::Failed {
                    failure: StepFailure::Timeout { seconds },
                    started_at,
                    duration_ms,
                    output: format!("$ {}\nkilled after {}s without exiting", invocation.command, seconds),
                }
            }
            Err(e @ RunnerError::Spawn { .. }) => {
                warn!("Step {} could not start: {}", step.name, e);
                StepOutcome::Failed {
                    failure: StepFailure::SpawnFailure {
                        message: e.to_string(),
                    },
                    started_at,
                    duration_ms,
                    output: String::new(),
                }
            }
        }
    }
}
