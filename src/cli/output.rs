//! CLI output formatting

use crate::{
    core::{config::PipelineConfig, ConfigurationPlan, PipelineReport, RunResult, RunStatus, StepOutcome},
    execution::ExecutionEvent,
};
use console::Emoji;
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Lines of failing step output shown without `--stream`
pub const FAILURE_OUTPUT_LINES: usize = 20;

/// Format a run status for display
pub fn format_status(status: RunStatus) -> String {
    match status {
        RunStatus::Pending => style("PENDING").dim().to_string(),
        RunStatus::Running { step_index } => style(format!("RUNNING (step {})", step_index + 1))
            .yellow()
            .to_string(),
        RunStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        RunStatus::Failed { step_index } => style(format!("FAILED (step {})", step_index + 1))
            .red()
            .to_string(),
    }
}

/// Format a step outcome for display
pub fn format_outcome(outcome: &StepOutcome) -> String {
    match outcome {
        StepOutcome::Succeeded { duration_ms, .. } => format!(
            "{} {}",
            style("succeeded").green(),
            style(format_duration(Duration::from_millis(*duration_ms))).dim()
        ),
        StepOutcome::Failed { failure, .. } => style(failure.to_string()).red().to_string(),
        StepOutcome::Skipped { reason } => format!("{} ({})", style("skipped").dim(), reason),
        StepOutcome::NotRun => style("not run").dim().to_string(),
    }
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_name,
            configurations,
        } => format!(
            "{} Starting {} with {} configuration{} ({})",
            ROCKET,
            style(pipeline_name).bold(),
            configurations,
            if *configurations == 1 { "" } else { "s" },
            style(&execution_id.to_string()[..8]).dim()
        ),
        ExecutionEvent::ConfigurationStarted { configuration } => {
            format!("\n{} {}", INFO, style(configuration).bold())
        }
        ExecutionEvent::StepStarted {
            configuration,
            step_index,
            step_name,
            command,
        } => format!(
            "{} [{}] {}. {} {}",
            SPINNER,
            style(configuration).dim(),
            step_index + 1,
            style(step_name).cyan(),
            style(format!("$ {}", command)).dim()
        ),
        ExecutionEvent::StepSkipped {
            configuration,
            step_name,
            reason,
        } => format!(
            "{} [{}] {} skipped: {}",
            SKIP,
            style(configuration).dim(),
            style(step_name).dim(),
            reason
        ),
        ExecutionEvent::StepSucceeded {
            configuration,
            step_name,
            duration_ms,
            ..
        } => format!(
            "{} [{}] {} {}",
            CHECK,
            style(configuration).dim(),
            style(step_name).green(),
            style(format_duration(Duration::from_millis(*duration_ms))).dim()
        ),
        ExecutionEvent::StepFailed {
            configuration,
            step_name,
            failure,
            ..
        } => format!(
            "{} [{}] {}: {}",
            CROSS,
            style(configuration).dim(),
            style(step_name).red(),
            style(failure).red()
        ),
        ExecutionEvent::StepsNotRun {
            configuration,
            step_names,
        } => format!(
            "{} [{}] not run: {}",
            WARN,
            style(configuration).dim(),
            style(step_names.join(", ")).dim()
        ),
        ExecutionEvent::ConfigurationFinished {
            configuration,
            status,
        } => format!(
            "{} {} {}",
            if *status == RunStatus::Succeeded { CHECK } else { CROSS },
            style(configuration).bold(),
            format_status(*status)
        ),
        ExecutionEvent::PipelineFinished {
            execution_id,
            succeeded,
            failed,
        } => format!(
            "\n{} Finished ({}): {} succeeded, {} failed",
            INFO,
            style(&execution_id.to_string()[..8]).dim(),
            style(succeeded).green(),
            style(failed).red()
        ),
    }
}

/// Format step output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.trim_end().to_string()
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{}... ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}

/// Indent every line of a block
pub fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| format!("{}{}", prefix, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Per-step summary of one configuration run
pub fn format_run_summary(run: &RunResult) -> String {
    let mut lines = vec![format!(
        "{} {} {} {}",
        if run.is_success() { CHECK } else { CROSS },
        style(run.configuration().label()).bold(),
        format_status(run.status()),
        style(format_duration(run.duration())).dim()
    )];

    for record in run.steps() {
        lines.push(format!(
            "    {:<28} {}",
            record.name,
            format_outcome(&record.outcome)
        ));
    }

    lines.join("\n")
}

/// Summary block printed after a run
pub fn format_report(report: &PipelineReport) -> String {
    let mut sections: Vec<String> = report.runs.iter().map(format_run_summary).collect();

    for label in &report.aborted {
        sections.push(format!(
            "{} {} {}",
            CROSS,
            style(label).bold(),
            style("ABORTED").red()
        ));
    }

    let verdict = if report.is_success() {
        format!(
            "{} {} completed {}",
            CHECK,
            style(&report.pipeline_name).bold(),
            style("successfully").green()
        )
    } else {
        format!(
            "{} {} {} ({} of {} configurations)",
            CROSS,
            style(&report.pipeline_name).bold(),
            style("failed").red(),
            report.failed(),
            report.runs.len() + report.aborted.len()
        )
    };
    sections.push(verdict);

    sections.join("\n")
}

/// Rendered plan for one configuration
pub fn format_plan(plan: &ConfigurationPlan) -> String {
    let mut lines = vec![format!("{} {}", INFO, style(plan.configuration.label()).bold())];

    for (index, step) in plan.steps.iter().enumerate() {
        let state = match (&step.guard, step.will_run) {
            (Some(guard), true) => format!("{} ({} exists)", style("would run").green(), guard),
            (Some(guard), false) => format!("{} ({} missing)", style("would skip").yellow(), guard),
            (None, _) => style("would run").green().to_string(),
        };
        lines.push(format!(
            "  {}. {} [{}] {}",
            index + 1,
            style(&step.name).cyan(),
            step.kind.as_str(),
            state
        ));
        lines.push(format!("       {}", style(format!("$ {}", step.command)).dim()));
    }

    lines.join("\n")
}

/// Result of `validate`: a styled summary, or a single JSON document with `json`
pub fn format_validation(result: &anyhow::Result<PipelineConfig>, json: bool) -> anyhow::Result<String> {
    match (result, json) {
        (Ok(config), true) => Ok(serde_json::to_string_pretty(config)?),
        (Err(e), true) => Ok(serde_json::to_string_pretty(&serde_json::json!({
            "valid": false,
            "error": format!("{:#}", e),
        }))?),
        (Ok(config), false) => Ok([
            format!("{} Workflow configuration is valid!", CHECK),
            format!("  Name: {}", style(&config.name).bold()),
            format!("  Triggers: {}", style(config.on.join(", ")).cyan()),
            format!("  Configurations: {}", style(config.matrix()?.len()).cyan()),
            format!("  Steps: {}", style(config.steps.len()).cyan()),
        ]
        .join("\n")),
        (Err(e), false) => Ok(format!(
            "{} Validation failed:\n  {}",
            CROSS,
            style(format!("{:#}", e)).red()
        )),
    }
}

pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    let secs = duration.as_secs();
    if secs == 0 {
        format!("{}ms", millis)
    } else if secs < 60 {
        format!("{:.1}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
