//! Test: Conditional branching - exactly one branch runs after a guard step

use crate::helpers::*;
use flowline::core::StepStatus;
use flowline::execution::{CoordinatorConfig, ExecutionEvent, RunCoordinator};
use flowline::{Condition, Step, WorkflowDefinition};
use serde_json::json;
use std::sync::{Arc, Mutex};

const CONDITIONAL: &str = r#"
name: "conditional"
arguments:
  input_value:
steps:
  - name: "func-a"
    inputs:
      value: "{{ args.input_value }}"
    outputs: [value]
  - name: "func-b"
    inputs:
      value: "{{ steps.func-a.outputs.value }}"
    outputs: [value]
  - name: "func-c"
    inputs:
      value: "{{ steps.func-a.outputs.value }}"
    outputs: [value]
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

/// A value above the threshold runs B and skips C
#[tokio::test]
async fn test_high_value_takes_b() {
    let executor = ScriptedExecutor::new();
    let report = run_yaml(CONDITIONAL, executor.clone(), json!({ "input_value": 6 })).await;

    assert_run_succeeded(&report);
    assert_submission_order(&report, &["func-a", "func-b"]);
    assert_step_status(&report, "func-c", StepStatus::Skipped);
    assert_output(&report, "func-b", "value", json!(6));
    assert!(report.outputs.get("func-c").is_none());
    assert_eq!(executor.calls(), vec!["func-a", "func-b"]);
}

/// A value at or below the threshold runs C and skips B
#[tokio::test]
async fn test_low_value_takes_c() {
    let executor = ScriptedExecutor::new();
    let report = run_yaml(CONDITIONAL, executor.clone(), json!({ "input_value": 3 })).await;

    assert_run_succeeded(&report);
    assert_submission_order(&report, &["func-a", "func-c"]);
    assert_step_status(&report, "func-b", StepStatus::Skipped);
    assert_output(&report, "func-c", "value", json!(3));
    assert_eq!(
        report.step("func-b").unwrap().reason.as_deref(),
        Some("branch not selected after 'func-a'")
    );
}

/// Numeric strings are compared as numbers
#[tokio::test]
async fn test_numeric_string_output() {
    let executor = ScriptedExecutor::new().returns("func-a", json!({ "value": "10" }));
    let report = run_yaml(CONDITIONAL, executor, json!({ "input_value": 0 })).await;

    assert_run_succeeded(&report);
    assert_step_status(&report, "func-b", StepStatus::Succeeded);
    assert_step_status(&report, "func-c", StepStatus::Skipped);
}

/// Both branches join again; the join runs whichever branch was taken
#[tokio::test]
async fn test_branches_rejoin() {
    let mut def = WorkflowDefinition::new("rejoin");
    def.add_argument("mode", None);
    def.add_step(
        Step::new("classify", "classify")
            .with_argument_input("mode", "mode")
            .with_output("kind"),
    )
    .unwrap();
    def.add_step(Step::new("fast", "fast").with_output("result")).unwrap();
    def.add_step(Step::new("thorough", "thorough").with_output("result")).unwrap();
    def.add_step(Step::new("publish", "publish").depends_on("fast").depends_on("thorough"))
        .unwrap();
    def.add_condition(
        Condition::compare("classify", "kind", flowline::ComparisonOperator::Eq, json!("quick")),
        ["fast"],
    )
    .unwrap();
    def.add_condition(
        Condition::compare("classify", "kind", flowline::ComparisonOperator::Ne, json!("quick")),
        ["thorough"],
    )
    .unwrap();

    let executor = ScriptedExecutor::new()
        .computes("classify", |inputs| {
            let kind = inputs["mode"].as_str().unwrap_or("slow").to_string();
            Ok([("kind".to_string(), json!(kind))].into_iter().collect())
        })
        .returns("fast", json!({ "result": "f" }))
        .returns("thorough", json!({ "result": "t" }));

    let coordinator = RunCoordinator::new(executor, CoordinatorConfig::default());
    let report = coordinator
        .run_definition(&def, args(json!({ "mode": "quick" })))
        .await
        .unwrap();

    assert_run_succeeded(&report);
    assert_submission_order(&report, &["classify", "fast", "publish"]);
    assert_step_status(&report, "thorough", StepStatus::Skipped);
    assert!(report.errors.is_empty());
}

/// Observers see the branch decision and the skip
#[tokio::test]
async fn test_branch_events() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();

    let config = flowline::core::config::WorkflowConfig::from_yaml(CONDITIONAL).unwrap();
    let coordinator = RunCoordinator::new(ScriptedExecutor::new(), CoordinatorConfig::default())
        .with_event_handler(move |event| sink.lock().unwrap().push(event));
    coordinator
        .run(Arc::new(config.compile().unwrap()), args(json!({ "input_value": 9 })))
        .await;

    let events = events.lock().unwrap();
    let branch = events
        .iter()
        .find_map(|e| match e {
            ExecutionEvent::BranchSelected {
                guard,
                condition,
                activated,
                ..
            } => Some((guard.clone(), condition.clone(), activated.clone())),
            _ => None,
        })
        .unwrap();
    assert_eq!(branch.0, "func-a");
    assert_eq!(branch.1, "func-a.value > 5");
    assert_eq!(branch.2, vec!["func-b".to_string()]);

    let skipped: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            ExecutionEvent::StepSkipped { step, .. } => Some(step.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(skipped, vec!["func-c"]);
}
