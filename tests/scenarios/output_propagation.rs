//! Test: Output propagation - arguments and outputs flow into downstream inputs

use crate::helpers::*;
use flowline::core::{Inputs, Outputs};
use serde_json::json;

const CHAIN: &str = r#"
name: "chain"
arguments:
  base:
  factor:
    default: 3
steps:
  - name: "scale"
    inputs:
      base: "{{ args.base }}"
      factor: "{{ args.factor }}"
    outputs: [value]
  - name: "offset"
    inputs:
      value: "{{ steps.scale.outputs.value }}"
      by: 10
    outputs: [value]
  - name: "describe"
    inputs:
      scaled: "{{ steps.scale.outputs.value }}"
      final: "{{ steps.offset.outputs.value }}"
      unit: "cm"
    outputs: [scaled, final, unit]
"#;

fn int(inputs: &Inputs, name: &str) -> Result<i64, String> {
    inputs
        .get(name)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| format!("input '{}' must be an integer", name))
}

fn arithmetic() -> ScriptedExecutor {
    ScriptedExecutor::new()
        .computes("scale", |inputs| {
            Ok(value(json!(int(inputs, "base")? * int(inputs, "factor")?)))
        })
        .computes("offset", |inputs| {
            Ok(value(json!(int(inputs, "value")? + int(inputs, "by")?)))
        })
}

#[tokio::test]
async fn test_values_flow_through_chain() {
    let report = run_yaml(CHAIN, arithmetic(), json!({ "base": 4 })).await;

    assert_run_succeeded(&report);
    assert_submission_order(&report, &["scale", "offset", "describe"]);
    assert_output(&report, "scale", "value", json!(12));
    assert_output(&report, "offset", "value", json!(22));
    assert_output(&report, "describe", "scaled", json!(12));
    assert_output(&report, "describe", "final", json!(22));
    assert_output(&report, "describe", "unit", json!("cm"));
}

#[tokio::test]
async fn test_supplied_argument_overrides_default() {
    let report = run_yaml(CHAIN, arithmetic(), json!({ "base": 4, "factor": 5 })).await;

    assert_run_succeeded(&report);
    assert_output(&report, "offset", "value", json!(30));
    assert_eq!(report.arguments.get("factor"), Some(&json!(5)));
}

/// Undeclared extra outputs are dropped
#[tokio::test]
async fn test_only_declared_outputs_are_kept() {
    let executor = arithmetic().computes("scale", |_| {
        let mut outputs: Outputs = value(json!(2));
        outputs.insert("debug".to_string(), json!("ignored"));
        Ok(outputs)
    });
    let report = run_yaml(CHAIN, executor, json!({ "base": 1 })).await;

    assert_run_succeeded(&report);
    assert_eq!(report.outputs["scale"].len(), 1);
    assert!(report.output("scale", "debug").is_none());
}
