//! Test: Concurrency - independent steps overlap unless limited

use crate::helpers::*;
use flowline::core::StepStatus;
use serde_json::json;

const FAN_OUT: &str = r#"
name: "fan-out"
steps:
  - name: "left"
  - name: "middle"
  - name: "right"
  - name: "join"
    depends_on: ["left", "middle", "right"]
"#;

fn delayed() -> ScriptedExecutor {
    ScriptedExecutor::new()
        .with_delay("left", 100)
        .with_delay("middle", 100)
        .with_delay("right", 100)
}

#[tokio::test]
async fn test_independent_steps_run_together() {
    let executor = delayed();
    let report = run_yaml(FAN_OUT, executor.clone(), json!({})).await;

    assert_run_succeeded(&report);
    assert!(
        executor.peak_concurrency() >= 2,
        "peak concurrency was {}",
        executor.peak_concurrency()
    );
    // The join only starts after all three upstreams finished
    assert_eq!(report.submission_order.last().map(String::as_str), Some("join"));
}

#[tokio::test]
async fn test_max_concurrency_limits_running_steps() {
    let yaml = format!("{}max_concurrency: 1\n", FAN_OUT);
    let executor = delayed();
    let report = run_yaml(&yaml, executor.clone(), json!({})).await;

    assert_run_succeeded(&report);
    assert_eq!(executor.peak_concurrency(), 1);
    assert_submission_order(&report, &["left", "middle", "right", "join"]);
    assert_eq!(report.count(StepStatus::Succeeded), 4);
}
