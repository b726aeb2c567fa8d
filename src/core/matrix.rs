//! Build matrix and its expansion into configurations

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors raised while building a matrix
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatrixError {
    #[error("matrix must define at least one axis")]
    Empty,

    #[error("matrix axis '{0}' has no values")]
    EmptyAxis(String),

    #[error("matrix axis '{0}' is defined more than once")]
    DuplicateAxis(String),

    #[error("matrix axis '{axis}' lists '{value}' more than once")]
    DuplicateValue { axis: String, value: String },

    #[error("matrix axis '{axis}' has invalid interpreter version '{value}'")]
    InvalidVersion { axis: String, value: String },
}

/// One axis of the build matrix (e.g. `python-version`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixAxis {
    pub name: String,
    pub values: Vec<String>,
}

impl MatrixAxis {
    pub fn new<S: Into<String>>(name: impl Into<String>, values: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Axes whose name ends in `version` carry interpreter versions
    pub fn is_version_axis(&self) -> bool {
        is_version_axis_name(&self.name)
    }

    fn validate(&self) -> Result<(), MatrixError> {
        if self.values.is_empty() {
            return Err(MatrixError::EmptyAxis(self.name.clone()));
        }

        let mut seen = HashSet::new();
        for value in &self.values {
            if !seen.insert(value.as_str()) {
                return Err(MatrixError::DuplicateValue {
                    axis: self.name.clone(),
                    value: value.clone(),
                });
            }
            if self.is_version_axis() && !is_valid_version(value) {
                return Err(MatrixError::InvalidVersion {
                    axis: self.name.clone(),
                    value: value.clone(),
                });
            }
        }

        Ok(())
    }
}

/// Check an interpreter version string (`3`, `3.12`, `3.13t`, `pypy3.10`).
///
/// Only values that map onto an interpreter executable name are accepted.
pub fn is_valid_version(value: &str) -> bool {
    static VERSION: OnceLock<Regex> = OnceLock::new();
    VERSION
        .get_or_init(|| {
            Regex::new(r"^(?:\d+(?:\.\d+)?t?|pypy\d+(?:\.\d+)?)$").expect("version pattern is valid")
        })
        .is_match(value)
}

/// Interpreter executable for a version value: `3.11` runs `python3.11`,
/// `pypy3.10` runs `pypy3.10`
pub fn interpreter_executable(version: &str) -> String {
    if version.starts_with("pypy") {
        version.to_string()
    } else {
        format!("python{}", version)
    }
}

/// Axes whose name ends in `version` carry interpreter versions
pub fn is_version_axis_name(name: &str) -> bool {
    name.ends_with("version")
}

/// Validated, ordered set of matrix axes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Matrix {
    axes: Vec<MatrixAxis>,
}

impl Matrix {
    /// Build a matrix, rejecting empty or malformed axes
    pub fn new(axes: Vec<MatrixAxis>) -> Result<Self, MatrixError> {
        if axes.is_empty() {
            return Err(MatrixError::Empty);
        }

        let mut names = HashSet::new();
        for axis in &axes {
            if !names.insert(axis.name.as_str()) {
                return Err(MatrixError::DuplicateAxis(axis.name.clone()));
            }
            axis.validate()?;
        }

        Ok(Self { axes })
    }

    /// Single-axis matrix, the common case
    pub fn single<S: Into<String>>(
        axis: impl Into<String>,
        values: impl IntoIterator<Item = S>,
    ) -> Result<Self, MatrixError> {
        Self::new(vec![MatrixAxis::new(axis, values)])
    }

    pub fn axes(&self) -> &[MatrixAxis] {
        &self.axes
    }

    pub fn axis(&self, name: &str) -> Option<&MatrixAxis> {
        self.axes.iter().find(|a| a.name == name)
    }

    /// Number of configurations the matrix expands to
    pub fn len(&self) -> usize {
        self.axes.iter().map(|a| a.values.len()).product()
    }

    /// A validated matrix always has at least one configuration
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Replace the values of an axis, appending the axis if it is new
    pub fn with_axis<S: Into<String>>(
        &self,
        name: &str,
        values: impl IntoIterator<Item = S>,
    ) -> Result<Self, MatrixError> {
        let replacement = MatrixAxis::new(name, values);
        let mut axes = self.axes.clone();
        match axes.iter_mut().find(|a| a.name == name) {
            Some(axis) => *axis = replacement,
            None => axes.push(replacement),
        }
        Self::new(axes)
    }

    /// Expand into the cartesian product of all axes.
    ///
    /// The first axis varies slowest, so a single-axis matrix keeps the
    /// order in which its values were listed.
    pub fn expand(&self) -> Vec<Configuration> {
        let mut combinations: Vec<Vec<AxisValue>> = vec![Vec::new()];

        for axis in &self.axes {
            combinations = combinations
                .into_iter()
                .flat_map(|prefix| {
                    axis.values.iter().map(move |value| {
                        let mut combination = prefix.clone();
                        combination.push(AxisValue {
                            axis: axis.name.clone(),
                            value: value.clone(),
                        });
                        combination
                    })
                })
                .collect();
        }

        combinations
            .into_iter()
            .enumerate()
            .map(|(index, values)| Configuration { index, values })
            .collect()
    }
}

/// Value chosen for one axis in a configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisValue {
    pub axis: String,
    pub value: String,
}

/// One point of the build matrix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// Position in the expanded matrix
    pub index: usize,

    /// Axis values, in axis order
    pub values: Vec<AxisValue>,
}

impl Configuration {
    /// Get the value chosen for an axis
    pub fn get(&self, axis: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|v| v.axis == axis)
            .map(|v| v.value.as_str())
    }

    /// Human-readable label, e.g. `python-version=3.11`
    pub fn label(&self) -> String {
        self.values
            .iter()
            .map(|v| format!("{}={}", v.axis, v.value))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Template variables: `matrix.<axis>`, plus `matrix.<axis>.executable`
    /// for version axes
    pub fn variables(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.values.iter().flat_map(|v| {
            let executable = is_version_axis_name(&v.axis).then(|| {
                (
                    format!("matrix.{}.executable", v.axis),
                    interpreter_executable(&v.value),
                )
            });
            std::iter::once((format!("matrix.{}", v.axis), v.value.clone())).chain(executable)
        })
    }

    /// Environment variables exported to every step (`MATRIX_<AXIS>`)
    pub fn env_vars(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.values.iter().map(|v| (env_var_name(&v.axis), v.value.clone()))
    }
}

fn env_var_name(axis: &str) -> String {
    let normalized: String = axis
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("MATRIX_{}", normalized)
}
