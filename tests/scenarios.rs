//! End-to-end behaviour of the built-in Python workflow against a scripted runner

mod helpers;

use ci_pipeline::core::{StepFailure, StepOutcome};
use ci_pipeline::execution::SchedulingStrategy;
use helpers::*;
use std::time::Duration;

const CHECKOUT: &str = "Checkout source";
const SETUP: &str = "Set up Python";
const INSTALL: &str = "Install dependencies";
const INSTALL_DEV: &str = "Install dev dependencies";
const HOOKS: &str = "Install pre-commit hooks";
const LINT: &str = "Run pre-commit";
const TESTS: &str = "Run tests";

/// Scenario A: no manifests, both installs skipped, everything else runs
#[tokio::test]
async fn test_no_manifests_skips_both_installs() {
    let dir = tempfile::tempdir().unwrap();
    let runner = MockRunner::new();
    let pipeline = builtin_pipeline(&["3.11"]);

    let report = run_with_mock(&pipeline, dir.path(), runner.clone()).await;
    let run = &report.runs[0];

    assert_run_succeeded(run);
    assert_step_skipped(run, INSTALL);
    assert_step_skipped(run, INSTALL_DEV);
    assert_execution_order(run, &[CHECKOUT, SETUP, HOOKS, LINT, TESTS]);
    assert_eq!(
        runner.commands(),
        vec![
            "git rev-parse --verify HEAD",
            "python3.11 --version",
            "pre-commit install",
            "pre-commit run --all-files",
            "make test",
        ]
    );
    assert_eq!(report.exit_code(), 0);
}

/// Scenario B: base manifest present, dev manifest absent
#[tokio::test]
async fn test_base_manifest_only() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "requirements.txt");
    let runner = MockRunner::new();
    let pipeline = builtin_pipeline(&["3.12"]);

    let report = run_with_mock(&pipeline, dir.path(), runner.clone()).await;
    let run = &report.runs[0];

    assert_run_succeeded(run);
    assert_step_skipped(run, INSTALL_DEV);
    assert_execution_order(run, &[CHECKOUT, SETUP, INSTALL, HOOKS, LINT, TESTS]);
    assert!(runner
        .commands()
        .contains(&"python3.12 -m pip install -r requirements.txt".to_string()));
    assert!(!runner.commands().iter().any(|c| c.contains("requirements-dev.txt")));
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn test_both_manifests_present() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "requirements.txt");
    touch(dir.path(), "requirements-dev.txt");
    let pipeline = builtin_pipeline(&["3.11"]);

    let report = run_with_mock(&pipeline, dir.path(), MockRunner::new()).await;

    assert_execution_order(
        &report.runs[0],
        &[CHECKOUT, SETUP, INSTALL, INSTALL_DEV, HOOKS, LINT, TESTS],
    );
}

/// Scenario C: the hook run fails, the test step never runs
#[tokio::test]
async fn test_lint_failure_stops_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let runner = MockRunner::new().fail_on("pre-commit run", 1);
    let pipeline = builtin_pipeline(&["3.11"]);

    let report = run_with_mock(&pipeline, dir.path(), runner.clone()).await;
    let run = &report.runs[0];

    assert_run_failed_at(run, LINT);
    assert_step_failed(run, LINT, StepFailure::LintFailure { exit_code: Some(1) });
    assert_steps_not_run(run, &[TESTS]);
    assert!(!runner.commands().contains(&"make test".to_string()));
    assert_ne!(report.exit_code(), 0);

    let output = run.outcome(LINT).and_then(StepOutcome::output).unwrap();
    assert!(output.contains("failed"), "failing output should be kept: {}", output);
}

/// Scenario D: one of two configurations fails
#[tokio::test]
async fn test_one_failing_configuration_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let runner = MockRunner::new().fail_on("python3.10 --version", 127);
    let pipeline = builtin_pipeline(&["3.10", "3.11"]);

    let report = run_with_mock(&pipeline, dir.path(), runner).await;

    assert_eq!(report.runs.len(), 2);
    let broken = run_for(&report, "python-version=3.10");
    assert_run_failed_at(broken, SETUP);
    assert_step_failed(
        broken,
        SETUP,
        StepFailure::InterpreterProvisionFailure { exit_code: Some(127) },
    );
    assert_steps_not_run(broken, &[INSTALL, INSTALL_DEV, HOOKS, LINT, TESTS]);

    assert_run_succeeded(run_for(&report, "python-version=3.11"));
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_dependency_failure_skips_hook_install() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "requirements.txt");
    touch(dir.path(), "requirements-dev.txt");
    let runner = MockRunner::new().fail_on("requirements.txt", 1);
    let pipeline = builtin_pipeline(&["3.11"]);

    let report = run_with_mock(&pipeline, dir.path(), runner.clone()).await;
    let run = &report.runs[0];

    assert_run_failed_at(run, INSTALL);
    assert_step_failed(run, INSTALL, StepFailure::DependencyInstallFailure { exit_code: Some(1) });
    assert_steps_not_run(run, &[INSTALL_DEV, HOOKS, LINT, TESTS]);
    assert_eq!(runner.commands().len(), 3);
}

#[tokio::test]
async fn test_test_failure_classified() {
    let dir = tempfile::tempdir().unwrap();
    let runner = MockRunner::new().fail_on("make test", 2);
    let pipeline = builtin_pipeline(&["3.11"]);

    let report = run_with_mock(&pipeline, dir.path(), runner).await;
    let run = &report.runs[0];

    assert_run_failed_at(run, TESTS);
    assert_step_failed(run, TESTS, StepFailure::TestFailure { exit_code: Some(2) });
    assert_eq!(
        run.failed_step().map(|s| s.outcome.label()),
        Some("failed")
    );
}

#[tokio::test]
async fn test_every_step_has_exactly_one_outcome() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "requirements.txt");
    let runner = MockRunner::new().fail_on("pre-commit install", 1);
    let pipeline = builtin_pipeline(&["3.10", "3.11", "3.12"]);

    let report = run_with_mock(&pipeline, dir.path(), runner).await;

    for run in &report.runs {
        let names: Vec<_> = run.steps().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec![CHECKOUT, SETUP, INSTALL, INSTALL_DEV, HOOKS, LINT, TESTS]);

        // Nothing after the failing step executed
        let failed_at = run.steps().iter().position(|s| s.outcome.is_failure()).unwrap();
        assert!(run.steps()[failed_at + 1..]
            .iter()
            .all(|s| s.outcome == StepOutcome::NotRun));
        assert!(run.steps()[..failed_at].iter().all(|s| s.outcome.is_success()));
    }
}

#[tokio::test]
async fn test_matrix_values_reach_the_environment() {
    let dir = tempfile::tempdir().unwrap();
    let runner = MockRunner::new();
    let pipeline = builtin_pipeline(&["3.13"]);

    run_with_mock(&pipeline, dir.path(), runner.clone()).await;

    let invocations = runner.invocations();
    assert!(!invocations.is_empty());
    for invocation in &invocations {
        assert_eq!(invocation.workdir, dir.path());
        assert_eq!(
            invocation.env.get("MATRIX_PYTHON_VERSION").map(String::as_str),
            Some("3.13")
        );
        assert_eq!(
            invocation.env.get("PIP_DISABLE_PIP_VERSION_CHECK").map(String::as_str),
            Some("1")
        );
        assert_eq!(invocation.timeout, None);
    }
}

#[tokio::test]
async fn test_interpreter_executable_per_version() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "requirements.txt");
    let runner = MockRunner::new();
    let pipeline = builtin_pipeline(&["pypy3.10", "3.13t"]);

    let report = run_with_mock(&pipeline, dir.path(), runner.clone()).await;
    assert_eq!(report.exit_code(), 0);

    let commands = runner.commands();
    for expected in [
        "pypy3.10 --version",
        "pypy3.10 -m pip install -r requirements.txt",
        "python3.13t --version",
        "python3.13t -m pip install -r requirements.txt",
    ] {
        assert!(commands.contains(&expected.to_string()), "missing '{}' in {:?}", expected, commands);
    }
    assert!(!commands.iter().any(|c| c.contains("pythonpypy")));
}

#[test]
fn test_unrunnable_version_rejected() {
    let mut pipeline = builtin_pipeline(&["3"]);
    for version in ["3.x", "3.13.0rc1", "pypy3.10t"] {
        assert!(
            pipeline
                .override_axis("python-version", vec![version.to_string()])
                .is_err(),
            "'{}' should not be accepted",
            version
        );
    }
}

#[tokio::test]
async fn test_guard_resolved_per_configuration() {
    let yaml = r#"
name: "Per-version manifests"
matrix:
  python-version: ["3.10", "3.11"]
steps:
  - name: "Install pinned"
    kind: dependency-install
    if_exists: "constraints/{{ matrix.python-version }}.txt"
    run: "pip install -c constraints/{{ matrix.python-version }}.txt ."
  - name: "Test"
    kind: test
    run: "pytest"
"#;
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "constraints/3.11.txt");
    let runner = MockRunner::new();

    let report = run_with_mock(&pipeline_from_yaml(yaml), dir.path(), runner.clone()).await;

    assert_step_skipped(run_for(&report, "python-version=3.10"), "Install pinned");
    assert_execution_order(run_for(&report, "python-version=3.11"), &["Install pinned", "Test"]);
    assert_eq!(
        runner.commands(),
        vec!["pytest", "pip install -c constraints/3.11.txt .", "pytest"]
    );
}

#[tokio::test]
async fn test_strategies_agree() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "requirements.txt");
    let pipeline = builtin_pipeline(&["3.9", "3.10", "3.11", "3.12"]);

    for strategy in [
        SchedulingStrategy::Sequential,
        SchedulingStrategy::Parallel,
        SchedulingStrategy::LimitedParallel(2),
    ] {
        let runner = MockRunner::new()
            .fail_on("python3.10 -m pip", 1)
            .with_delay(Duration::from_millis(5));
        let report = run_with_strategy(&pipeline, dir.path(), runner.clone(), strategy).await;

        let labels: Vec<_> = report.runs.iter().map(|r| r.configuration().label()).collect();
        assert_eq!(
            labels,
            vec![
                "python-version=3.9",
                "python-version=3.10",
                "python-version=3.11",
                "python-version=3.12"
            ],
            "results should stay in matrix order under {:?}",
            strategy
        );
        assert_run_failed_at(run_for(&report, "python-version=3.10"), INSTALL);
        assert_eq!(report.succeeded(), 3);
        assert_eq!(report.exit_code(), 1);
        // 4 configurations: 3 run all six non-skipped steps, one stops after three
        assert_eq!(runner.commands().len(), 3 * 6 + 3);
    }
}

#[test]
fn test_not_triggered_event() {
    let pipeline = builtin_pipeline(&["3"]);
    assert!(pipeline.is_triggered_by("push"));
    assert!(!pipeline.is_triggered_by("pull_request"));
}
