//! Step failure taxonomy

use crate::core::step::StepKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

fn describe_exit(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

/// Why a step failed
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepFailure {
    #[error("checkout failed ({})", describe_exit(.exit_code))]
    CheckoutFailure { exit_code: Option<i32> },

    #[error("interpreter provisioning failed ({})", describe_exit(.exit_code))]
    InterpreterProvisionFailure { exit_code: Option<i32> },

    #[error("dependency install failed ({})", describe_exit(.exit_code))]
    DependencyInstallFailure { exit_code: Option<i32> },

    #[error("hook install failed ({})", describe_exit(.exit_code))]
    HookInstallFailure { exit_code: Option<i32> },

    #[error("lint failed ({})", describe_exit(.exit_code))]
    LintFailure { exit_code: Option<i32> },

    #[error("tests failed ({})", describe_exit(.exit_code))]
    TestFailure { exit_code: Option<i32> },

    #[error("command failed ({})", describe_exit(.exit_code))]
    CommandFailure { exit_code: Option<i32> },

    #[error("could not start command: {message}")]
    SpawnFailure { message: String },

    #[error("timed out after {seconds} seconds")]
    Timeout { seconds: u64 },
}

impl StepFailure {
    /// Classify a non-zero exit by the kind of step that produced it
    pub fn from_exit(kind: StepKind, exit_code: Option<i32>) -> Self {
        match kind {
            StepKind::Checkout => StepFailure::CheckoutFailure { exit_code },
            StepKind::ProvisionInterpreter => StepFailure::InterpreterProvisionFailure { exit_code },
            StepKind::DependencyInstall => StepFailure::DependencyInstallFailure { exit_code },
            StepKind::HookInstall => StepFailure::HookInstallFailure { exit_code },
            StepKind::Lint => StepFailure::LintFailure { exit_code },
            StepKind::Test => StepFailure::TestFailure { exit_code },
            StepKind::Command => StepFailure::CommandFailure { exit_code },
        }
    }

    /// Exit code of the child process, when it produced one
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            StepFailure::CheckoutFailure { exit_code }
            | StepFailure::InterpreterProvisionFailure { exit_code }
            | StepFailure::DependencyInstallFailure { exit_code }
            | StepFailure::HookInstallFailure { exit_code }
            | StepFailure::LintFailure { exit_code }
            | StepFailure::TestFailure { exit_code }
            | StepFailure::CommandFailure { exit_code } => *exit_code,
            StepFailure::SpawnFailure { .. } | StepFailure::Timeout { .. } => None,
        }
    }
}
