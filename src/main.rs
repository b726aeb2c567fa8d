use ci_pipeline::cli::commands::{apply_matrix_overrides, load_config, PlanCommand, RunCommand, ValidateCommand};
use ci_pipeline::cli::output::*;
use ci_pipeline::cli::{Cli, Command};
use ci_pipeline::core::config::PipelineConfig;
use ci_pipeline::execution::{ExecutionEngine, ExecutionEvent, ExecutorSettings, ShellRunner};

use anyhow::{ensure, Context, Result};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_filter = if cli.verbose { "ci_pipeline=debug,info" } else { "ci_pipeline=info,warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    // Execute command
    let exit_code = match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd, cli.stream).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::Plan(cmd) => plan_pipeline(cmd)?,
    };

    std::process::exit(exit_code);
}

async fn run_pipeline(cmd: &RunCommand, stream: bool) -> Result<i32> {
    let config = load_config(cmd.file.as_ref()).context("Failed to load workflow")?;
    let mut pipeline = config.to_pipeline()?;
    apply_matrix_overrides(&mut pipeline, &cmd.matrix)?;

    if !pipeline.is_triggered_by(&cmd.event) {
        println!(
            "{} {} does not run on '{}' (triggers: {})",
            INFO,
            style(&pipeline.name).bold(),
            cmd.event,
            pipeline.triggers.join(", ")
        );
        return Ok(0);
    }

    let workdir = pipeline.resolve_workdir(&cmd.workdir);
    ensure!(
        workdir.is_dir(),
        "Working directory {} does not exist",
        workdir.display()
    );

    let mut settings = ExecutorSettings::new(&workdir);
    settings.timeout_override_secs = cmd.timeout;
    settings.extra_env.extend(cmd.env.iter().cloned());

    for (key, value) in &cmd.env {
        println!(
            "{} Env override: {} = {}",
            INFO,
            style(key).cyan(),
            style(value).dim()
        );
    }

    let strategy = cmd.strategy.into_strategy(cmd.max_parallel);
    let engine = ExecutionEngine::new(ShellRunner::new(pipeline.shell.clone()), settings, strategy);

    // Console output; JSON mode keeps stdout for the report alone
    if !cmd.json {
        engine
            .add_event_handler(move |event| {
                println!("{}", format_execution_event(&event));

                match &event {
                    ExecutionEvent::StepFailed { output, .. } if !output.trim().is_empty() => {
                        let shown = if stream {
                            output.trim_end().to_string()
                        } else {
                            format_output(output, FAILURE_OUTPUT_LINES)
                        };
                        println!("{}", indent(&shown, "    | "));
                    }
                    ExecutionEvent::StepSucceeded { output, .. } if stream && !output.trim().is_empty() => {
                        println!("{}", indent(output.trim_end(), "    | "));
                    }
                    _ => {}
                }
            })
            .await;
    }

    let report = engine.execute(&pipeline).await;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("\n{}", format_report(&report));
    }

    if !report.is_success() {
        for run in report.failed_runs() {
            if let Some(step) = run.failed_step() {
                error!(
                    "{}: step '{}' failed",
                    run.configuration().label(),
                    step.name
                );
            }
        }
    }

    Ok(report.exit_code())
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<i32> {
    if !cmd.json {
        println!("{} Validating workflow...", INFO);
    }

    let result = PipelineConfig::from_file(&cmd.file);
    println!("{}", format_validation(&result, cmd.json)?);

    Ok(if result.is_ok() { 0 } else { 1 })
}

fn plan_pipeline(cmd: &PlanCommand) -> Result<i32> {
    let config = load_config(cmd.file.as_ref()).context("Failed to load workflow")?;
    let mut pipeline = config.to_pipeline()?;
    apply_matrix_overrides(&mut pipeline, &cmd.matrix)?;

    let workdir = pipeline.resolve_workdir(&cmd.workdir);
    let plan = pipeline.plan(&workdir);

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(0);
    }

    println!(
        "{} {} in {} ({} configuration{})",
        ROCKET,
        style(&pipeline.name).bold(),
        style(workdir.display()).dim(),
        plan.len(),
        if plan.len() == 1 { "" } else { "s" }
    );
    for configuration in &plan {
        println!("\n{}", format_plan(configuration));
    }

    Ok(0)
}
