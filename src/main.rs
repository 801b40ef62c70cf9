use anyhow::{Context, Result};
use flowline::cli::commands::{HistoryCommand, ListCommand, RunCommand, ValidateCommand};
use flowline::cli::output::*;
use flowline::cli::{Cli, Command};
use flowline::core::{config::WorkflowConfig, RunArguments, RunReport, RunStatus};
use flowline::execution::{CoordinatorConfig, ExecutionEvent, RunCoordinator};
use flowline::persistence::{self, RunSummary};
use flowline::platform::LocalPlatform;
use std::sync::Arc;
use tracing::{warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG overrides the --verbose level
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    match &cli.command {
        Command::Run(cmd) => run_workflow(cmd).await?,
        Command::Validate(cmd) => validate_workflow(cmd)?,
        Command::List(cmd) => list_workflows(cmd).await?,
        Command::History(cmd) => show_history(cmd).await?,
    }

    Ok(())
}

async fn run_workflow(cmd: &RunCommand) -> Result<()> {
    let config = WorkflowConfig::from_file(&cmd.file).context("Failed to load workflow")?;
    let workflow = Arc::new(config.compile()?);

    if !cmd.json {
        println!("{} Loaded workflow: {}", INFO, style(&config.name).bold());
        for (key, value) in &cmd.arg {
            println!(
                "{} Argument: {} = {}",
                INFO,
                style(key).cyan(),
                style(format_value(value)).dim()
            );
        }
        println!();
    }

    let arguments: RunArguments = cmd.arg.iter().cloned().collect();

    let max_concurrency = cmd
        .max_concurrency
        .map(|n| n as usize)
        .or(config.max_concurrency);
    let coordinator_config = CoordinatorConfig { max_concurrency };

    let platform = LocalPlatform::from_config(&config);
    let mut coordinator = RunCoordinator::new(platform, coordinator_config);

    let progress = if cmd.json {
        None
    } else {
        Some(create_progress_bar(workflow.steps().len()))
    };
    if let Some(progress) = progress.clone() {
        coordinator = coordinator.with_event_handler(move |event| {
            progress.println(format_execution_event(&event));
            if matches!(
                event,
                ExecutionEvent::StepSucceeded { .. }
                    | ExecutionEvent::StepFailed { .. }
                    | ExecutionEvent::StepSkipped { .. }
            ) {
                progress.inc(1);
            }
        });
    }

    let report = coordinator.run(workflow, arguments).await;
    if let Some(progress) = progress {
        progress.finish_and_clear();
    }

    if !cmd.no_history {
        save_history(&report, cmd.json).await;
    }

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_run_result(&report);
    }

    if !report.is_success() {
        std::process::exit(1);
    }

    Ok(())
}

async fn save_history(report: &RunReport, quiet: bool) {
    let saved = async {
        let store = persistence::default_backend().await?;
        store.save_run(report).await
    }
    .await;

    match saved {
        Ok(()) if quiet => {}
        Ok(()) => println!(
            "\n{} Run saved to history (ID: {})",
            INFO,
            style(&report.run_id.to_string()[..8]).dim()
        ),
        Err(e) => warn!("Could not save run to history: {:#}", e),
    }
}

fn print_run_result(report: &RunReport) {
    println!("\n{}", format_report(report));

    match report.status {
        RunStatus::Succeeded => println!(
            "\n{} {} completed {}",
            CHECK,
            style(&report.workflow).bold(),
            style("successfully").green()
        ),
        status => println!(
            "\n{} {} {}",
            CROSS,
            style(&report.workflow).bold(),
            format_status(status)
        ),
    }
}

fn validate_workflow(cmd: &ValidateCommand) -> Result<()> {
    let result = WorkflowConfig::from_file(&cmd.file).and_then(|config| {
        let workflow = config.compile()?;
        Ok((config, workflow))
    });

    match result {
        Ok((config, workflow)) => {
            if cmd.json {
                let branches: Vec<_> = workflow
                    .branch_points()
                    .into_iter()
                    .map(|bp| {
                        serde_json::json!({
                            "step": bp.step,
                            "conditions": bp.conditions.iter().map(|c| serde_json::json!({
                                "condition": c.condition.describe(),
                                "run": c.gated,
                            })).collect::<Vec<_>>(),
                        })
                    })
                    .collect();
                let data = serde_json::json!({
                    "valid": true,
                    "name": config.name,
                    "execution_order": workflow.execution_order(),
                    "branch_points": branches,
                });
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                println!("{} Workflow configuration is valid!", CHECK);
                println!("  Name: {}", style(&config.name).bold());
                if let Some(description) = &config.description {
                    println!("  Description: {}", style(description).dim());
                }
                println!("  Steps: {}", style(config.steps.len()).cyan());
                println!("  Arguments: {}", style(config.arguments.len()).cyan());
                println!("{}", format_plan(&workflow));
            }
            Ok(())
        }
        Err(e) => {
            if cmd.json {
                let data = serde_json::json!({ "valid": false, "error": format!("{:#}", e) });
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                println!("{} Validation failed:", CROSS);
                println!("  {}", style(format!("{:#}", e)).red());
            }
            std::process::exit(1);
        }
    }
}

async fn list_workflows(cmd: &ListCommand) -> Result<()> {
    let store = persistence::default_backend().await?;
    let workflows = store.list_workflows().await?;

    if cmd.json {
        let mut json_data = Vec::new();
        for workflow in &workflows {
            let runs = store.list_runs(workflow).await?;
            json_data.push(serde_json::json!({
                "name": workflow,
                "run_count": runs.len(),
            }));
        }
        let data = serde_json::json!({ "workflows": json_data });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if workflows.is_empty() {
        println!("{} No workflows found in history", INFO);
        return Ok(());
    }

    println!("{} Workflows in history:", INFO);

    for workflow in &workflows {
        if cmd.with_counts {
            let runs = store.list_runs(workflow).await?;
            let succeeded = runs.iter().filter(|r| r.status == RunStatus::Succeeded).count();
            let failed = runs.iter().filter(|r| r.status == RunStatus::Failed).count();
            println!(
                "  {} ({} runs: {} succeeded, {} failed)",
                style(workflow).bold(),
                style(runs.len()).cyan(),
                style(succeeded).green(),
                style(failed).red()
            );
        } else {
            println!("  {}", style(workflow).bold());
        }
    }

    Ok(())
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = persistence::default_backend().await?;

    if let Some(run_id) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id).context("Invalid run ID format")?;
        match store.load_run(run_id).await? {
            Some(report) if cmd.json => println!("{}", serde_json::to_string_pretty(&report)?),
            Some(report) => {
                println!("{} Run Details", INFO);
                println!("{}", format_report(&report));
            }
            None => println!("{} Run not found", WARN),
        }
        return Ok(());
    }

    let mut runs: Vec<RunSummary> = match &cmd.workflow {
        Some(workflow) => store.list_runs(workflow).await?,
        None => {
            let mut all = Vec::new();
            for workflow in store.list_workflows().await? {
                all.extend(store.list_runs(&workflow).await?);
            }
            all.sort_by(|a, b| b.started_at.cmp(&a.started_at));
            all
        }
    };
    runs.truncate(cmd.limit);

    if cmd.json {
        let data = serde_json::json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(());
    }

    println!("{} Run history (showing latest {}):", INFO, cmd.limit);
    for summary in &runs {
        println!("  {}", format_run_summary(summary));
    }

    Ok(())
}
