//! Step domain model

use crate::core::{condition::FileGuard, config::StepConfig, context::RunContext};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a step does, used to classify its failures
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
    /// Check out the source tree
    Checkout,
    /// Provision the interpreter for the configuration
    ProvisionInterpreter,
    /// Install dependencies from a manifest
    DependencyInstall,
    /// Install static-analysis hooks
    HookInstall,
    /// Run static-analysis checks
    Lint,
    /// Run the test suite
    Test,
    /// Any other command
    #[default]
    Command,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Checkout => "checkout",
            StepKind::ProvisionInterpreter => "provision-interpreter",
            StepKind::DependencyInstall => "dependency-install",
            StepKind::HookInstall => "hook-install",
            StepKind::Lint => "lint",
            StepKind::Test => "test",
            StepKind::Command => "command",
        }
    }
}

/// The command a step runs, optionally gated on a file existing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepAction {
    /// Always run the command
    Unconditional { command: String },
    /// Run the command only if the guarded file exists
    GuardedByFileExists { guard: FileGuard, command: String },
}

/// A single step in a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Step name, unique within the pipeline
    pub name: String,

    /// Step kind
    pub kind: StepKind,

    /// Command and optional guard
    pub action: StepAction,

    /// Timeout in seconds (None = no timeout)
    pub timeout_secs: Option<u64>,

    /// Extra environment for this step only
    pub env: BTreeMap<String, String>,
}

impl Step {
    /// Create a step from a step config
    pub fn from_config(config: &StepConfig, defaults: &StepDefaults) -> Self {
        let command = config.run.trim().to_string();
        let action = match &config.if_exists {
            Some(path) => StepAction::GuardedByFileExists {
                guard: FileGuard::new(path.clone()),
                command,
            },
            None => StepAction::Unconditional { command },
        };

        Step {
            name: config.name.clone(),
            kind: config.kind,
            action,
            timeout_secs: config.timeout_secs.or(defaults.timeout_secs),
            env: config.env.clone(),
        }
    }

    pub fn unconditional(name: impl Into<String>, kind: StepKind, command: impl Into<String>) -> Self {
        Step {
            name: name.into(),
            kind,
            action: StepAction::Unconditional {
                command: command.into(),
            },
            timeout_secs: None,
            env: BTreeMap::new(),
        }
    }

    pub fn guarded(
        name: impl Into<String>,
        kind: StepKind,
        path: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Step {
            name: name.into(),
            kind,
            action: StepAction::GuardedByFileExists {
                guard: FileGuard::new(path),
                command: command.into(),
            },
            timeout_secs: None,
            env: BTreeMap::new(),
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    /// The unrendered command template
    pub fn command(&self) -> &str {
        match &self.action {
            StepAction::Unconditional { command } => command,
            StepAction::GuardedByFileExists { command, .. } => command,
        }
    }

    /// The file guard, if the step is conditional
    pub fn guard(&self) -> Option<&FileGuard> {
        match &self.action {
            StepAction::Unconditional { .. } => None,
            StepAction::GuardedByFileExists { guard, .. } => Some(guard),
        }
    }

    /// Render the command with variable substitution
    pub fn render_command(&self, context: &RunContext) -> String {
        context.render(self.command())
    }
}

#[derive(Debug, Clone, Default)]
pub struct StepDefaults {
    pub timeout_secs: Option<u64>,
}
