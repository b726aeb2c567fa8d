//! Runs workflows through the real shell runner
#![cfg(unix)]

mod helpers;

use ci_pipeline::core::{StepFailure, StepOutcome};
use ci_pipeline::execution::{ExecutionEngine, ExecutorSettings, SchedulingStrategy, ShellRunner};
use helpers::*;

const WORKFLOW: &str = r#"
name: "Shell"
matrix:
  python-version: ["3.11", "3.12"]
env:
  GREETING: "hello"
steps:
  - name: "Record version"
    run: "echo {{ env.GREETING }} $MATRIX_PYTHON_VERSION >> versions.log"
  - name: "Install"
    kind: dependency-install
    if_exists: "requirements.txt"
    run: "cat requirements.txt"
  - name: "Test"
    kind: test
    run: "test {{ matrix.python-version }} != 3.12"
"#;

#[tokio::test]
async fn test_shell_workflow_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_from_yaml(WORKFLOW);

    let engine = ExecutionEngine::new(
        ShellRunner::new("sh"),
        ExecutorSettings::new(dir.path()),
        SchedulingStrategy::Sequential,
    );
    let report = engine.execute(&pipeline).await;

    let log = std::fs::read_to_string(dir.path().join("versions.log")).unwrap();
    assert_eq!(log, "hello 3.11\nhello 3.12\n");

    let ok = run_for(&report, "python-version=3.11");
    assert_run_succeeded(ok);
    assert_step_skipped(ok, "Install");

    let broken = run_for(&report, "python-version=3.12");
    assert_run_failed_at(broken, "Test");
    assert_step_failed(broken, "Test", StepFailure::TestFailure { exit_code: Some(1) });
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_guarded_step_sees_manifest() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("requirements.txt"), "pytest==8.0\n").unwrap();
    let mut pipeline = pipeline_from_yaml(WORKFLOW);
    pipeline
        .override_axis("python-version", vec!["3.11".to_string()])
        .unwrap();

    let engine = ExecutionEngine::new(
        ShellRunner::new("sh"),
        ExecutorSettings::new(dir.path()),
        SchedulingStrategy::Sequential,
    );
    let report = engine.execute(&pipeline).await;
    let run = &report.runs[0];

    assert_run_succeeded(run);
    assert_eq!(
        run.outcome("Install").and_then(StepOutcome::output),
        Some("pytest==8.0\n")
    );
}

#[tokio::test]
async fn test_step_timeout_fails_configuration() {
    let yaml = r#"
name: "Slow"
matrix:
  python-version: ["3"]
steps:
  - name: "Hang"
    kind: test
    timeout_secs: 1
    run: "sleep 10"
  - name: "After"
    run: "true"
"#;
    let dir = tempfile::tempdir().unwrap();
    let engine = ExecutionEngine::new(
        ShellRunner::new("sh"),
        ExecutorSettings::new(dir.path()),
        SchedulingStrategy::Sequential,
    );

    let report = engine.execute(&pipeline_from_yaml(yaml)).await;
    let run = &report.runs[0];

    assert_run_failed_at(run, "Hang");
    assert_step_failed(run, "Hang", StepFailure::Timeout { seconds: 1 });
    let output = run.outcome("Hang").and_then(StepOutcome::output).unwrap();
    assert!(output.contains("$ sleep 10"), "timeout output should name the command: {}", output);
    assert!(output.contains("after 1s"));
    assert_steps_not_run(run, &["After"]);
}

#[tokio::test]
async fn test_missing_shell_is_spawn_failure() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ExecutionEngine::new(
        ShellRunner::new("definitely-not-a-shell"),
        ExecutorSettings::new(dir.path()),
        SchedulingStrategy::Sequential,
    );

    let report = engine.execute(&pipeline_from_yaml(WORKFLOW)).await;

    for run in &report.runs {
        assert_run_failed_at(run, "Record version");
        match run.outcome("Record version") {
            Some(StepOutcome::Failed { failure, .. }) => {
                assert!(matches!(failure, StepFailure::SpawnFailure { .. }))
            }
            other => panic!("expected spawn failure, got {:?}", other),
        }
    }
}
