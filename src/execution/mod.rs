//! Pipeline execution engine

pub mod engine;
pub mod executor;
pub mod runner;
pub mod scheduler;

pub use engine::{EventHandler, ExecutionEngine, ExecutionEvent};
pub use executor::{ExecutorSettings, StepExecutor};
pub use runner::{CommandOutput, CommandRunner, Invocation, RunnerError, ShellRunner};
pub use scheduler::SchedulingStrategy;
