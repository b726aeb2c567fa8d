//! Pipeline domain model

use crate::core::{
    config::PipelineConfig,
    context::RunContext,
    matrix::{Configuration, Matrix, MatrixError},
    step::{Step, StepDefaults, StepKind},
};
use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Shell used when a workflow does not name one
pub fn default_shell() -> &'static str {
    if cfg!(windows) {
        "cmd"
    } else {
        "sh"
    }
}

/// A workflow ready to run: matrix plus the ordered step sequence
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Workflow name
    pub name: String,

    /// Events that trigger the workflow
    pub triggers: Vec<String>,

    /// Build matrix
    pub matrix: Matrix,

    /// Steps, in execution order
    pub steps: Vec<Step>,

    /// Environment exported to every step
    pub env: BTreeMap<String, String>,

    /// Shell used to run step commands
    pub shell: String,

    /// Working directory relative to the runner's base directory
    pub working_directory: Option<PathBuf>,
}

impl Pipeline {
    /// Create a pipeline from configuration
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let defaults = StepDefaults {
            timeout_secs: config.default_timeout_secs,
        };

        let steps = config
            .steps
            .iter()
            .map(|step_config| Step::from_config(step_config, &defaults))
            .collect();

        Ok(Pipeline {
            name: config.name.clone(),
            triggers: config.on.clone(),
            matrix: config.matrix()?,
            steps,
            env: config.env.clone(),
            shell: config
                .shell
                .clone()
                .unwrap_or_else(|| default_shell().to_string()),
            working_directory: config.working_directory.as_ref().map(PathBuf::from),
        })
    }

    /// Create a pipeline directly from a matrix and steps
    pub fn new(name: impl Into<String>, matrix: Matrix, steps: Vec<Step>) -> Self {
        Pipeline {
            name: name.into(),
            triggers: vec!["push".to_string()],
            matrix,
            steps,
            env: BTreeMap::new(),
            shell: default_shell().to_string(),
            working_directory: None,
        }
    }

    /// Get a step by name
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Expand the matrix into independent configurations
    pub fn configurations(&self) -> Vec<Configuration> {
        self.matrix.expand()
    }

    /// Check whether an event triggers this workflow
    pub fn is_triggered_by(&self, event: &str) -> bool {
        self.triggers.iter().any(|t| t == event)
    }

    /// Replace (or add) a matrix axis
    pub fn override_axis(&mut self, axis: &str, values: Vec<String>) -> Result<(), MatrixError> {
        self.matrix = self.matrix.with_axis(axis, values)?;
        Ok(())
    }

    /// Resolve the directory steps run in
    pub fn resolve_workdir(&self, base: &Path) -> PathBuf {
        match &self.working_directory {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => base.join(dir),
            None => base.to_path_buf(),
        }
    }

    /// Create the run context for a configuration
    pub fn context_for(&self, configuration: &Configuration) -> RunContext {
        RunContext::for_configuration(&self.name, configuration, &self.env)
    }

    /// Describe what a run would do without executing anything
    pub fn plan(&self, workdir: &Path) -> Vec<ConfigurationPlan> {
        self.configurations()
            .into_iter()
            .map(|configuration| {
                let context = self.context_for(&configuration);
                let steps = self
                    .steps
                    .iter()
                    .map(|step| {
                        let scoped = context.scoped_to(step);
                        let guard = step.guard().map(|g| g.render(&scoped));
                        let will_run = step.guard().map_or(true, |g| g.holds(workdir, &scoped));
                        PlannedStep {
                            name: step.name.clone(),
                            kind: step.kind,
                            command: step.render_command(&scoped),
                            guard,
                            will_run,
                        }
                    })
                    .collect();

                ConfigurationPlan {
                    configuration,
                    steps,
                }
            })
            .collect()
    }
}

/// A step as it would run for one configuration
#[derive(Debug, Clone, Serialize)]
pub struct PlannedStep {
    pub name: String,
    pub kind: StepKind,
    pub command: String,
    /// Rendered guard path, for conditional steps
    pub guard: Option<String>,
    /// Whether the guard currently holds
    pub will_run: bool,
}

/// The planned step sequence for one configuration
#[derive(Debug, Clone, Serialize)]
pub struct ConfigurationPlan {
    pub configuration: Configuration,
    pub steps: Vec<PlannedStep>,
}
