//! CLI command definitions

use crate::core::{config::PipelineConfig, Pipeline};
use crate::execution::SchedulingStrategy;
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

/// Run a workflow
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to workflow YAML file (built-in Python workflow when omitted)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Directory to run in
    #[arg(long, default_value = ".")]
    pub workdir: PathBuf,

    /// Triggering event
    #[arg(long, default_value = "push")]
    pub event: String,

    /// Matrix axis overrides (axis=value, repeatable)
    #[arg(long, value_parser = parse_key_value)]
    pub matrix: Vec<(String, String)>,

    /// Extra environment for every step (KEY=VALUE, repeatable)
    #[arg(long, value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,

    /// Scheduling strategy
    #[arg(long, value_enum, default_value_t = SchedulingStrategyArg::Sequential)]
    pub strategy: SchedulingStrategyArg,

    /// Concurrent configurations for parallel-limited
    #[arg(long, default_value_t = 4)]
    pub max_parallel: usize,

    /// Timeout for every step in seconds, overriding the workflow
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Validate a workflow file
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show the expanded configurations and rendered steps
#[derive(Debug, Args, Clone)]
pub struct PlanCommand {
    /// Path to workflow YAML file (built-in Python workflow when omitted)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Directory guards are checked against
    #[arg(long, default_value = ".")]
    pub workdir: PathBuf,

    /// Matrix axis overrides (axis=value, repeatable)
    #[arg(long, value_parser = parse_key_value)]
    pub matrix: Vec<(String, String)>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Scheduling strategy argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SchedulingStrategyArg {
    Sequential,
    Parallel,
    #[clap(name = "parallel-limited")]
    ParallelLimited,
}

impl SchedulingStrategyArg {
    pub fn into_strategy(self, max_parallel: usize) -> SchedulingStrategy {
        match self {
            SchedulingStrategyArg::Sequential => SchedulingStrategy::Sequential,
            SchedulingStrategyArg::Parallel => SchedulingStrategy::Parallel,
            SchedulingStrategyArg::ParallelLimited => SchedulingStrategy::LimitedParallel(max_parallel),
        }
    }
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("Invalid key=value pair: {}", s)),
    }
}

/// Load the workflow file, or the built-in workflow when none is given
pub fn load_config(file: Option<&PathBuf>) -> Result<PipelineConfig> {
    match file {
        Some(path) => PipelineConfig::from_file(path),
        None => PipelineConfig::builtin_python(),
    }
}

/// Apply `--matrix` overrides, grouping repeated axes into one value list
pub fn apply_matrix_overrides(pipeline: &mut Pipeline, overrides: &[(String, String)]) -> Result<()> {
    let mut grouped: Vec<(&str, Vec<String>)> = Vec::new();
    for (axis, value) in overrides {
        match grouped.iter_mut().find(|(name, _)| *name == axis.as_str()) {
            Some((_, values)) => values.push(value.clone()),
            None => grouped.push((axis.as_str(), vec![value.clone()])),
        }
    }

    for (axis, values) in grouped {
        pipeline
            .override_axis(axis, values)
            .with_context(|| format!("Invalid --matrix override for '{}'", axis))?;
    }
    Ok(())
}
