//! ci-pipeline - runs a workflow's step sequence over a build matrix

pub mod cli;
pub mod core;
pub mod execution;

// Re-export commonly used types
pub use core::{Configuration, Matrix, Pipeline, PipelineReport, RunResult, RunStatus, Step, StepFailure, StepOutcome};
pub use execution::{CommandRunner, ExecutionEngine, ExecutionEvent, ExecutorSettings, SchedulingStrategy, ShellRunner};
