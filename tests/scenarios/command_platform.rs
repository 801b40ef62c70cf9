//! Test: Local command platform - steps run as subprocesses speaking JSON
#![cfg(unix)]

use crate::helpers::*;
use flowline::core::config::WorkflowConfig;
use flowline::core::StepStatus;
use flowline::execution::{CoordinatorConfig, RunCoordinator};
use flowline::platform::LocalPlatform;
use flowline::RunReport;
use serde_json::json;
use std::sync::Arc;

const COMMANDS: &str = r#"
name: "commands"
arguments:
  input_value:
    default: 6
functions:
  measure:
    command: ["cat"]
  high:
    command: ["sh", "-c", "cat > /dev/null; echo '{\"label\": \"high\"}'"]
  low:
    command: ["sh", "-c", "cat > /dev/null; echo '{\"label\": \"low\"}'"]
  broken:
    command: ["sh", "-c", "echo 'no space left' >&2; exit 2"]
steps:
  - name: "func-a"
    function: "measure"
    inputs:
      value: "{{ args.input_value }}"
    outputs: [value]
  - name: "func-b"
    function: "high"
    outputs: [label]
  - name: "func-c"
    function: "low"
    outputs: [label]
  - name: "report"
    function: "identity"
    depends_on: ["func-b", "func-c"]
    inputs:
      source: "func-a"
    outputs: [source]
conditions:
  - step: "func-a"
    output: "value"
    operator: gt
    value: 5
    run: ["func-b"]
  - step: "func-a"
    output: "value"
    operator: le
    value: 5
    run: ["func-c"]
"#;

async fn run_commands(yaml: &str, arguments: serde_json::Value) -> RunReport {
    let config = WorkflowConfig::from_yaml(yaml).unwrap();
    let workflow = Arc::new(config.compile().unwrap());
    let coordinator = RunCoordinator::new(
        LocalPlatform::from_config(&config),
        CoordinatorConfig::default(),
    );
    coordinator.run(workflow, args(arguments)).await
}

#[tokio::test]
async fn test_default_argument_selects_high_branch() {
    let report = run_commands(COMMANDS, json!({})).await;

    assert_run_succeeded(&report);
    assert_output(&report, "func-a", "value", json!(6));
    assert_output(&report, "func-b", "label", json!("high"));
    assert_step_status(&report, "func-c", StepStatus::Skipped);
    assert_output(&report, "report", "source", json!("func-a"));
}

#[tokio::test]
async fn test_argument_selects_low_branch() {
    let report = run_commands(COMMANDS, json!({ "input_value": 2 })).await;

    assert_run_succeeded(&report);
    assert_submission_order(&report, &["func-a", "func-c", "report"]);
    assert_output(&report, "func-c", "label", json!("low"));
}

#[tokio::test]
async fn test_failing_command_fails_step() {
    let yaml = COMMANDS.replace("function: \"high\"", "function: \"broken\"");
    let report = run_commands(&yaml, json!({})).await;

    assert_run_failed(&report);
    let error = report.step("func-b").unwrap().error.clone().unwrap();
    assert!(error.contains("exited with code 2"), "error was: {}", error);
    assert!(error.contains("no space left"), "error was: {}", error);
    assert_step_status(&report, "report", StepStatus::Cancelled);
}
