//! Run context - template variables and environment for one configuration

use crate::core::{matrix::Configuration, step::Step};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

fn placeholder_pattern() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("placeholder pattern is valid")
    })
}

/// Names of all `{{ name }}` placeholders in a template, in order of appearance
pub fn placeholders(template: &str) -> Vec<String> {
    placeholder_pattern()
        .captures_iter(template)
        .map(|c| c[1].to_string())
        .collect()
}

/// Execution context for one configuration run
///
/// Holds the variables available to command templates and the environment
/// exported to each step's child process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunContext {
    /// Template variables (`workflow.name`, `matrix.<axis>`, `env.<KEY>`)
    pub variables: HashMap<String, String>,

    /// Environment exported to child processes
    pub env: BTreeMap<String, String>,
}

impl RunContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the context for a configuration of a workflow
    pub fn for_configuration(
        workflow_name: &str,
        configuration: &Configuration,
        env: &BTreeMap<String, String>,
    ) -> Self {
        let mut context = Self::new();
        context.set_variable("workflow.name".to_string(), workflow_name.to_string());
        context.variables.extend(configuration.variables());

        for (key, value) in env {
            context.set_env(key.clone(), value.clone());
        }
        context.env.extend(configuration.env_vars());

        context
    }

    /// Set a variable
    pub fn set_variable(&mut self, key: String, value: String) {
        self.variables.insert(key, value);
    }

    /// Get a variable
    pub fn get_variable(&self, key: &str) -> Option<&String> {
        self.variables.get(key)
    }

    /// Export an environment variable, also visible to templates as `env.<KEY>`
    pub fn set_env(&mut self, key: String, value: String) {
        self.variables.insert(format!("env.{}", key), value.clone());
        self.env.insert(key, value);
    }

    /// Context for a single step, with the step's own env layered on top
    pub fn scoped_to(&self, step: &Step) -> Self {
        let mut scoped = self.clone();
        for (key, value) in &step.env {
            let rendered = self.render(value);
            scoped.set_env(key.clone(), rendered);
        }
        scoped
    }

    /// Replace `{{ name }}` placeholders with variable values.
    ///
    /// Unknown placeholders are left untouched.
    pub fn render(&self, template: &str) -> String {
        placeholder_pattern()
            .replace_all(template, |caps: &Captures| {
                match self.variables.get(&caps[1]) {
                    Some(value) => value.clone(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::matrix::Matrix;
    use crate::core::step::StepKind;

    fn configuration(version: &str) -> Configuration {
        Matrix::single("python-version", [version]).unwrap().expand().remove(0)
    }

    #[test]
    fn test_context_variables() {
        let mut ctx = RunContext::new();
        ctx.set_variable("foo".to_string(), "bar".to_string());

        assert_eq!(ctx.get_variable("foo"), Some(&"bar".to_string()));
        assert_eq!(ctx.get_variable("baz"), None);
    }

    #[test]
    fn test_render_matrix_value() {
        let ctx = RunContext::for_configuration("ci", &configuration("3.11"), &BTreeMap::new());

        assert_eq!(
            ctx.render("python{{ matrix.python-version }} -m pip install -r requirements.txt"),
            "python3.11 -m pip install -r requirements.txt"
        );
        assert_eq!(ctx.render("echo {{workflow.name}}"), "echo ci");
        assert_eq!(ctx.env.get("MATRIX_PYTHON_VERSION"), Some(&"3.11".to_string()));
    }

    #[test]
    fn test_unknown_placeholder_left_alone() {
        let ctx = RunContext::new();
        assert_eq!(ctx.render("echo {{ missing }}"), "echo {{ missing }}");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(
            placeholders("{{ matrix.python-version }} and {{env.HOME}}"),
            vec!["matrix.python-version".to_string(), "env.HOME".to_string()]
        );
        assert!(placeholders("no templates here").is_empty());
    }

    #[test]
    fn test_scoped_to_step_env() {
        let mut workflow_env = BTreeMap::new();
        workflow_env.insert("MODE".to_string(), "ci".to_string());
        let ctx = RunContext::for_configuration("ci", &configuration("3.12"), &workflow_env);

        let mut step = Step::unconditional("Run tests", StepKind::Test, "make test");
        step.env.insert("MODE".to_string(), "strict".to_string());
        step.env.insert("PYTHON".to_string(), "python{{ matrix.python-version }}".to_string());

        let scoped = ctx.scoped_to(&step);
        assert_eq!(scoped.env.get("MODE"), Some(&"strict".to_string()));
        assert_eq!(scoped.env.get("PYTHON"), Some(&"python3.12".to_string()));
        assert_eq!(scoped.render("{{ env.MODE }}"), "strict");

        // Parent context is untouched
        assert_eq!(ctx.env.get("MODE"), Some(&"ci".to_string()));
    }
}
