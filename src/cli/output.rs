//! CLI output formatting

use crate::{
    core::{CompiledWorkflow, RunReport, RunStatus, StepReport, StepStatus},
    execution::ExecutionEvent,
    persistence::RunSummary,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");
pub static BRANCH: Emoji<'_, '_> = Emoji("🔀 ", "? ");

/// Longest value shown inline before truncation
const MAX_VALUE_CHARS: usize = 60;

/// Create a progress bar
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a step status for display
pub fn format_step_status(status: StepStatus) -> String {
    match status {
        StepStatus::Pending => style("PENDING").dim().to_string(),
        StepStatus::Eligible => style("ELIGIBLE").dim().to_string(),
        StepStatus::Running => style("RUNNING").yellow().to_string(),
        StepStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        StepStatus::Failed => style("FAILED").red().to_string(),
        StepStatus::Skipped => style("SKIPPED").dim().to_string(),
        StepStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

/// Format a run status for display
pub fn format_status(status: RunStatus) -> String {
    match status {
        RunStatus::Pending => style("PENDING").dim().to_string(),
        RunStatus::Running => style("RUNNING").yellow().to_string(),
        RunStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        RunStatus::Failed => style("FAILED").red().to_string(),
        RunStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Format a run summary for display
pub fn format_run_summary(summary: &RunSummary) -> String {
    let status_icon = match summary.status {
        RunStatus::Succeeded => CHECK,
        RunStatus::Failed => CROSS,
        RunStatus::Running => SPINNER,
        _ => INFO,
    };

    format!(
        "{} {} - {} - {} ({}/{} succeeded, {} skipped) - {}",
        status_icon,
        style(short_id(&summary.run_id)).dim(),
        style(&summary.workflow).bold(),
        format_status(summary.status),
        summary.succeeded_steps,
        summary.total_steps,
        summary.skipped_steps,
        style(summary.started_at.format("%Y-%m-%d %H:%M:%S")).dim()
    )
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::RunStarted { run_id, workflow } => format!(
            "{} Starting workflow {} ({})",
            ROCKET,
            style(workflow).bold(),
            style(short_id(run_id)).dim()
        ),
        ExecutionEvent::StepStarted { step, .. } => format!("{} {}", SPINNER, style(step).cyan()),
        ExecutionEvent::StepSucceeded { step, outputs, .. } => {
            if outputs.is_empty() {
                format!("{} {}", CHECK, style(step).green())
            } else {
                let mut names: Vec<&String> = outputs.keys().collect();
                names.sort();
                let shown: Vec<String> = names
                    .into_iter()
                    .map(|name| format!("{}={}", name, format_value(&outputs[name])))
                    .collect();
                format!(
                    "{} {} {}",
                    CHECK,
                    style(step).green(),
                    style(shown.join(", ")).dim()
                )
            }
        }
        ExecutionEvent::StepFailed { step, error, .. } => {
            format!("{} {}: {}", CROSS, style(step).red(), style(error).dim())
        }
        ExecutionEvent::StepSkipped { step, reason, .. } => {
            format!("{} {} ({})", SKIP, style(step).dim(), reason)
        }
        ExecutionEvent::BranchSelected {
            guard,
            condition,
            activated,
            ..
        } => {
            let target = if activated.is_empty() {
                "no steps".to_string()
            } else {
                activated.join(", ")
            };
            format!(
                "{} {}: {} → {}",
                BRANCH,
                style(guard).dim(),
                condition,
                style(target).cyan()
            )
        }
        ExecutionEvent::RunCompleted { run_id, status } => {
            let status_str = match status {
                RunStatus::Succeeded => format!("{} completed", style("successfully").green()),
                RunStatus::Failed => style("failed").red().to_string(),
                other => format_status(*other),
            };
            format!("{} Run ({}) {}", INFO, style(short_id(run_id)).dim(), status_str)
        }
    }
}

/// Compact single-line rendering of a JSON value, truncated
pub fn format_value(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    if text.chars().count() <= MAX_VALUE_CHARS {
        text
    } else {
        let truncated: String = text.chars().take(MAX_VALUE_CHARS).collect();
        format!("{}...", truncated)
    }
}

fn format_step_line(step: &StepReport) -> String {
    let detail = match step.status {
        StepStatus::Failed => step.error.clone().unwrap_or_default(),
        StepStatus::Skipped | StepStatus::Cancelled => step.reason.clone().unwrap_or_default(),
        _ => String::new(),
    };
    format!(
        "  {:<24} {:<10} {}",
        step.name,
        format_step_status(step.status),
        style(detail).dim()
    )
}

/// Format a run report: status, timing and one line per step
pub fn format_report(report: &RunReport) -> String {
    let mut lines = vec![
        format!("  ID: {}", style(report.run_id).cyan()),
        format!("  Workflow: {}", style(&report.workflow).bold()),
        format!("  Status: {}", format_status(report.status)),
        format!("  Started: {}", style(report.started_at.to_rfc3339()).dim()),
    ];

    if let Some(completed) = report.completed_at {
        if let Ok(duration) = completed.signed_duration_since(report.started_at).to_std() {
            lines.push(format!("  Duration: {}", style(format_duration(duration)).dim()));
        }
    }
    if !report.submission_order.is_empty() {
        lines.push(format!(
            "  Executed: {}",
            style(report.submission_order.join(" → ")).dim()
        ));
    }

    lines.push(String::new());
    lines.extend(report.steps.iter().map(format_step_line));

    for error in &report.errors {
        lines.push(format!("{} {}", WARN, style(error).red()));
    }

    lines.join("\n")
}

/// Format the execution plan of a compiled workflow
pub fn format_plan(workflow: &CompiledWorkflow) -> String {
    let mut lines = vec![format!("  Order: {}", workflow.execution_order().join(" → "))];

    for branch in workflow.branch_points() {
        lines.push(format!("  Branch after {}:", style(&branch.step).bold()));
        for gated in &branch.conditions {
            let target = if gated.gated.is_empty() {
                "(nothing)".to_string()
            } else {
                gated.gated.join(", ")
            };
            lines.push(format!(
                "    if {} → {}",
                gated.condition.describe(),
                style(target).cyan()
            ));
        }
    }

    lines.join("\n")
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}.{:01}s", secs, duration.subsec_millis() / 100)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
