//! Workflow configuration from YAML

use crate::core::{
    context::placeholders,
    matrix::{Matrix, MatrixAxis},
    step::StepKind,
    Pipeline,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Workflow used when no workflow file is given
pub const BUILTIN_PYTHON_WORKFLOW: &str = include_str!("../../workflows/python.yml");

/// Top-level workflow configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Workflow name
    pub name: String,

    /// Events this workflow responds to
    #[serde(default = "default_triggers")]
    pub on: Vec<String>,

    /// Build matrix: axis name -> list of values (kept in file order)
    #[serde(default)]
    matrix: Mapping,

    /// Shell used to run step commands
    #[serde(default)]
    pub shell: Option<String>,

    /// Working directory, relative to the directory the runner is started in
    #[serde(default)]
    pub working_directory: Option<String>,

    /// Default timeout for steps (in seconds)
    #[serde(default)]
    pub default_timeout_secs: Option<u64>,

    /// Environment exported to every step
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Workflow steps, in execution order
    pub steps: Vec<StepConfig>,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Human-readable step name, unique within the workflow
    pub name: String,

    /// Step kind, used to classify failures
    #[serde(default)]
    pub kind: StepKind,

    /// Shell command to run
    pub run: String,

    /// Only run the step if this file exists
    #[serde(default)]
    pub if_exists: Option<String>,

    /// Timeout for this step (overrides the workflow default)
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Extra environment for this step
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

fn default_triggers() -> Vec<String> {
    vec!["push".to_string()]
}

impl PipelineConfig {
    /// Load workflow configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read workflow file {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse workflow configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// The built-in Python workflow
    pub fn builtin_python() -> Result<Self> {
        Self::from_yaml(BUILTIN_PYTHON_WORKFLOW).context("Built-in workflow is invalid")
    }

    /// Validate the workflow configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Workflow name must not be empty");
        }

        if self.on.iter().any(|event| event.trim().is_empty()) {
            anyhow::bail!("Workflow 'on' must not contain empty event names");
        }

        if self.steps.is_empty() {
            anyhow::bail!("Workflow must define at least one step");
        }

        let matrix = self.matrix()?;

        // Check that all step names are unique
        let mut seen_names = HashSet::new();
        for step in &self.steps {
            if step.name.trim().is_empty() {
                anyhow::bail!("Step names must not be empty");
            }
            if !seen_names.insert(&step.name) {
                anyhow::bail!("Duplicate step name: {}", step.name);
            }
            if step.run.trim().is_empty() {
                anyhow::bail!("Step '{}' has an empty 'run' command", step.name);
            }
            if step.if_exists.as_deref().is_some_and(|path| path.trim().is_empty()) {
                anyhow::bail!("Step '{}' has an empty 'if_exists' path", step.name);
            }
        }

        // Check that every template placeholder names a known variable
        let mut known: HashSet<String> = HashSet::new();
        known.insert("workflow.name".to_string());
        for axis in matrix.axes() {
            known.insert(format!("matrix.{}", axis.name));
            if axis.is_version_axis() {
                known.insert(format!("matrix.{}.executable", axis.name));
            }
        }
        for key in self.env.keys() {
            known.insert(format!("env.{}", key));
        }

        for step in &self.steps {
            let mut step_known = known.clone();
            for key in step.env.keys() {
                step_known.insert(format!("env.{}", key));
            }

            let templates = std::iter::once(step.run.as_str())
                .chain(step.if_exists.as_deref())
                .chain(step.env.values().map(String::as_str));
            for template in templates {
                for name in placeholders(template) {
                    if !step_known.contains(&name) {
                        anyhow::bail!(
                            "Step '{}' references unknown variable '{{{{ {} }}}}'",
                            step.name,
                            name
                        );
                    }
                }
            }
        }

        Ok(())
    }

    /// Parse the matrix mapping into validated axes.
    ///
    /// Values must be strings: YAML reads an unquoted `3.10` as the number 3.1.
    pub fn matrix(&self) -> Result<Matrix> {
        let mut axes = Vec::with_capacity(self.matrix.len());

        for (key, value) in &self.matrix {
            let name = key
                .as_str()
                .context("Matrix axis names must be strings")?
                .to_string();

            let values = match value {
                Value::Sequence(items) => items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => Ok(s.clone()),
                        other => anyhow::bail!(
                            "Matrix axis '{}' has non-string value {}; quote it (e.g. \"3.10\")",
                            name,
                            serde_yaml::to_string(other).unwrap_or_default().trim()
                        ),
                    })
                    .collect::<Result<Vec<_>>>()?,
                Value::String(s) => vec![s.clone()],
                _ => anyhow::bail!("Matrix axis '{}' must be a list of strings", name),
            };

            axes.push(MatrixAxis { name, values });
        }

        Ok(Matrix::new(axes)?)
    }

    /// Convert config to a Pipeline domain model
    pub fn to_pipeline(&self) -> Result<Pipeline> {
        Pipeline::from_config(self)
    }
}
