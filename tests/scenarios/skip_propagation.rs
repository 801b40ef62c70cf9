//! Test: Skip propagation - skipped branches skip everything that depends only on them

use crate::helpers::*;
use flowline::core::StepStatus;
use serde_json::json;

const BRANCH_CHAINS: &str = r#"
name: "chains"
steps:
  - name: "gate"
    outputs: [value]
  - name: "left"
  - name: "left-2"
    depends_on: ["left"]
  - name: "left-3"
    depends_on: ["left-2"]
  - name: "right"
    outputs: [value]
  - name: "uses-right"
    depends_on: ["left-3", "right"]
    inputs:
      v: "{{ steps.right.outputs.value }}"
    outputs: [v]
  - name: "join"
    depends_on: ["left-3", "right"]
conditions:
  - step: "gate"
    output: "value"
    operator: eq
    value: "left"
    run: ["left"]
  - step: "gate"
    output: "value"
    operator: ne
    value: "left"
    run: ["right"]
"#;

/// Skips flow down chains whose only upstreams were skipped
#[tokio::test]
async fn test_skip_follows_chain() {
    let executor = ScriptedExecutor::new()
        .returns("gate", json!({ "value": "right" }))
        .returns("right", json!({ "value": 1 }));
    let report = run_yaml(BRANCH_CHAINS, executor, json!({})).await;

    assert_run_succeeded(&report);
    assert_step_status(&report, "left", StepStatus::Skipped);
    assert_step_status(&report, "left-2", StepStatus::Skipped);
    assert_step_status(&report, "left-3", StepStatus::Skipped);
    assert_step_status(&report, "right", StepStatus::Succeeded);
    assert_step_status(&report, "join", StepStatus::Succeeded);
    assert_step_status(&report, "uses-right", StepStatus::Succeeded);
    assert_output(&report, "uses-right", "v", json!(1));
    assert_submission_order(&report, &["gate", "right", "uses-right", "join"]);

    assert_eq!(
        report.step("left-2").unwrap().reason.as_deref(),
        Some("all upstream steps were skipped")
    );
}

/// A step reading an output of a skipped step is skipped even when another
/// upstream ran
#[tokio::test]
async fn test_input_from_skipped_step() {
    let executor = ScriptedExecutor::new().returns("gate", json!({ "value": "left" }));
    let report = run_yaml(BRANCH_CHAINS, executor, json!({})).await;

    assert_run_succeeded(&report);
    assert_step_status(&report, "left-3", StepStatus::Succeeded);
    assert_step_status(&report, "right", StepStatus::Skipped);
    assert_step_status(&report, "uses-right", StepStatus::Skipped);
    assert_eq!(
        report.step("uses-right").unwrap().reason.as_deref(),
        Some("input 'v' reads from skipped step 'right'")
    );
    assert_step_status(&report, "join", StepStatus::Succeeded);
}
