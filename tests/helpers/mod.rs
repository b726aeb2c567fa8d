//! Test utility functions for ci-pipeline

#![allow(dead_code)]

use ci_pipeline::core::config::PipelineConfig;
use ci_pipeline::core::{Pipeline, PipelineReport, RunResult, RunStatus, StepFailure, StepOutcome};
use ci_pipeline::execution::{
    CommandOutput, CommandRunner, ExecutionEngine, ExecutorSettings, Invocation, RunnerError,
    SchedulingStrategy,
};

use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock runner that exits zero unless a command matches a scripted failure
#[derive(Clone, Default)]
pub struct MockRunner {
    failures: Arc<Vec<(String, i32)>>,
    delay: Option<Duration>,
    invocations: Arc<Mutex<Vec<Invocation>>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exit with `exit_code` for any command containing `fragment`
    pub fn fail_on(mut self, fragment: &str, exit_code: i32) -> Self {
        let mut failures = self.failures.as_ref().clone();
        failures.push((fragment.to_string(), exit_code));
        self.failures = Arc::new(failures);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every invocation received so far, in order
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    /// Rendered commands received so far, in order
    pub fn commands(&self) -> Vec<String> {
        self.invocations().into_iter().map(|i| i.command).collect()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, RunnerError> {
        self.invocations.lock().unwrap().push(invocation.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self
            .failures
            .iter()
            .find(|(fragment, _)| invocation.command.contains(fragment.as_str()));

        Ok(match failure {
            Some((fragment, exit_code)) => CommandOutput {
                exit_code: Some(*exit_code),
                stdout: String::new(),
                stderr: format!("MockRunner: '{}' failed", fragment),
            },
            None => CommandOutput {
                exit_code: Some(0),
                stdout: format!("ran: {}", invocation.command),
                stderr: String::new(),
            },
        })
    }
}

/// The built-in Python workflow with the given interpreter versions
pub fn builtin_pipeline(versions: &[&str]) -> Pipeline {
    let mut pipeline = PipelineConfig::builtin_python()
        .and_then(|config| config.to_pipeline())
        .unwrap_or_else(|e| panic!("Built-in workflow failed to load: {:#}", e));
    pipeline
        .override_axis("python-version", versions.iter().map(|v| v.to_string()).collect())
        .unwrap_or_else(|e| panic!("Invalid versions {:?}: {}", versions, e));
    pipeline
}

/// Parse a pipeline from YAML string
pub fn pipeline_from_yaml(yaml: &str) -> Pipeline {
    PipelineConfig::from_yaml(yaml)
        .and_then(|config| config.to_pipeline())
        .unwrap_or_else(|e| panic!("Failed to parse workflow YAML: {:#}", e))
}

/// Run a pipeline sequentially against a mock runner
pub async fn run_with_mock(pipeline: &Pipeline, workdir: &Path, runner: MockRunner) -> PipelineReport {
    run_with_strategy(pipeline, workdir, runner, SchedulingStrategy::Sequential).await
}

pub async fn run_with_strategy(
    pipeline: &Pipeline,
    workdir: &Path,
    runner: MockRunner,
    strategy: SchedulingStrategy,
) -> PipelineReport {
    let engine = ExecutionEngine::new(runner, ExecutorSettings::new(workdir), strategy);
    engine.execute(pipeline).await
}

/// Create a file (and its parent directories) under `dir`
pub fn touch(dir: &Path, name: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, "").unwrap();
}

/// Find the run for a configuration by its label
pub fn run_for<'a>(report: &'a PipelineReport, label: &str) -> &'a RunResult {
    report
        .runs
        .iter()
        .find(|r| r.configuration().label() == label)
        .unwrap_or_else(|| panic!("No run for configuration '{}'", label))
}

fn outcome<'a>(run: &'a RunResult, step: &str) -> &'a StepOutcome {
    run.outcome(step)
        .unwrap_or_else(|| panic!("Step '{}' not found in run {}", step, run.configuration().label()))
}

/// Assert a configuration run succeeded
pub fn assert_run_succeeded(run: &RunResult) {
    assert_eq!(
        run.status(),
        RunStatus::Succeeded,
        "Run {} should have succeeded: {:#?}",
        run.configuration().label(),
        run.steps()
    );
}

/// Assert a configuration run failed at the named step
pub fn assert_run_failed_at(run: &RunResult, step: &str) {
    assert!(
        matches!(run.status(), RunStatus::Failed { .. }),
        "Run {} should have failed, but was {:?}",
        run.configuration().label(),
        run.status()
    );
    let failed = run.failed_step().map(|s| s.name.as_str());
    assert_eq!(failed, Some(step), "Run failed at the wrong step");
}

/// Assert a step failed with the given classification
pub fn assert_step_failed(run: &RunResult, step: &str, expected: StepFailure) {
    match outcome(run, step) {
        StepOutcome::Failed { failure, .. } => assert_eq!(failure, &expected),
        other => panic!("Step '{}' should have failed, but was {:?}", step, other),
    }
}

/// Assert a step was skipped because its guard did not hold
pub fn assert_step_skipped(run: &RunResult, step: &str) {
    let outcome = outcome(run, step);
    assert!(
        matches!(outcome, StepOutcome::Skipped { .. }),
        "Step '{}' should have been skipped, but was {:?}",
        step,
        outcome
    );
}

/// Assert the given steps never ran
pub fn assert_steps_not_run(run: &RunResult, steps: &[&str]) {
    for step in steps {
        assert_eq!(
            outcome(run, step),
            &StepOutcome::NotRun,
            "Step '{}' should not have run",
            step
        );
    }
}

/// Assert exactly these steps executed, in this order
pub fn assert_execution_order(run: &RunResult, expected_order: &[&str]) {
    let actual_order = run.executed_steps();
    assert_eq!(
        actual_order, expected_order,
        "Expected execution order: {:?}\nActual: {:?}",
        expected_order, actual_order
    );
}
