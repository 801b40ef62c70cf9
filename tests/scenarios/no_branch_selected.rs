//! Test: No branch selected - a guard output matching no condition fails the run

use crate::helpers::*;
use flowline::core::{RunError, StepStatus};
use serde_json::json;

const THRESHOLDS: &str = r#"
name: "thresholds"
steps:
  - name: "score"
    outputs: [value]
  - name: "promote"
  - name: "retrain"
  - name: "notify"
    depends_on: ["promote"]
conditions:
  - step: "score"
    output: "value"
    operator: gt
    value: 90
    run: ["promote"]
  - step: "score"
    output: "value"
    operator: lt
    value: 50
    run: ["retrain"]
"#;

#[tokio::test]
async fn test_gap_between_conditions_fails_run() {
    let executor = ScriptedExecutor::new().returns("score", json!({ "value": 70 }));
    let report = run_yaml(THRESHOLDS, executor.clone(), json!({})).await;

    assert_run_failed(&report);
    assert_eq!(
        report.errors,
        vec![RunError::NoBranchSelected {
            step: "score".to_string(),
            inspected: [("value".to_string(), json!(70))].into_iter().collect(),
        }]
    );

    assert_step_status(&report, "score", StepStatus::Succeeded);
    assert_step_status(&report, "promote", StepStatus::Skipped);
    assert_step_status(&report, "retrain", StepStatus::Skipped);
    assert_eq!(
        report.step("promote").unwrap().reason.as_deref(),
        Some("no branch selected after 'score'")
    );
    // Never submitted: the run stopped accepting work
    assert_step_status(&report, "notify", StepStatus::Cancelled);
    assert_eq!(executor.calls(), vec!["score"]);
}

/// A guard output of the wrong type matches nothing either
#[tokio::test]
async fn test_incomparable_value_fails_run() {
    let executor = ScriptedExecutor::new().returns("score", json!({ "value": "n/a" }));
    let report = run_yaml(THRESHOLDS, executor, json!({})).await;

    assert_run_failed(&report);
    assert!(matches!(
        report.errors.as_slice(),
        [RunError::NoBranchSelected { step, .. }] if step == "score"
    ));
}

/// Covering conditions never hit the error
#[tokio::test]
async fn test_matching_boundary_runs() {
    let executor = ScriptedExecutor::new().returns("score", json!({ "value": 95 }));
    let report = run_yaml(THRESHOLDS, executor, json!({})).await;

    assert_run_succeeded(&report);
    assert_submission_order(&report, &["score", "promote", "notify"]);
    assert_step_status(&report, "retrain", StepStatus::Skipped);
}
