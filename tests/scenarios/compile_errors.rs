//! Test: Compile errors - invalid workflows are rejected before any run

use flowline::core::config::WorkflowConfig;
use flowline::core::{DefinitionError, ReferenceKind};
use flowline::{Condition, Step, WorkflowDefinition};

fn compile_error(yaml: &str) -> DefinitionError {
    let err = WorkflowConfig::from_yaml(yaml).unwrap_err();
    err.downcast_ref::<DefinitionError>()
        .cloned()
        .unwrap_or_else(|| panic!("not a definition error: {:#}", err))
}

#[test]
fn test_cycle_reports_path() {
    let err = compile_error(
        r#"
name: "cycle"
steps:
  - name: "a"
    depends_on: ["b"]
  - name: "b"
    depends_on: ["a"]
"#,
    );
    assert_eq!(
        err,
        DefinitionError::CycleDetected {
            path: vec!["a".to_string(), "b".to_string(), "a".to_string()],
        }
    );
}

#[test]
fn test_duplicate_step() {
    let err = compile_error(
        r#"
name: "dup"
steps:
  - name: "a"
  - name: "a"
"#,
    );
    assert_eq!(err, DefinitionError::DuplicateStepName("a".to_string()));
}

#[test]
fn test_unknown_dependency() {
    let err = compile_error(
        r#"
name: "unknown"
steps:
  - name: "a"
    depends_on: ["ghost"]
"#,
    );
    assert_eq!(
        err,
        DefinitionError::UnknownStepReference {
            step: "a".to_string(),
            kind: ReferenceKind::Step,
            reference: "ghost".to_string(),
        }
    );
}

#[test]
fn test_input_from_unrelated_step() {
    let err = compile_error(
        r#"
name: "unrelated"
steps:
  - name: "a"
    outputs: [value]
  - name: "b"
    inputs:
      v: "{{ steps.a.outputs.value }}"
"#,
    );
    assert_eq!(
        err,
        DefinitionError::UnresolvedInput {
            step: "b".to_string(),
            input: "v".to_string(),
            reason: "step 'a' is not upstream".to_string(),
        }
    );
}

#[test]
fn test_undeclared_argument() {
    let err = compile_error(
        r#"
name: "args"
steps:
  - name: "a"
    inputs:
      v: "{{ args.missing }}"
"#,
    );
    assert!(matches!(err, DefinitionError::UnresolvedInput { ref input, .. } if input == "v"));
}

#[test]
fn test_step_gated_twice() {
    let err = compile_error(
        r#"
name: "twice"
steps:
  - name: "g"
    outputs: [value]
  - name: "h"
    outputs: [value]
  - name: "x"
conditions:
  - step: "g"
    output: "value"
    operator: eq
    value: 1
    run: ["x"]
  - step: "h"
    output: "value"
    operator: eq
    value: 1
    run: ["x"]
"#,
    );
    assert_eq!(
        err,
        DefinitionError::AlreadyGated {
            step: "x".to_string(),
            guard: "g".to_string(),
        }
    );
}

#[test]
fn test_invalid_pattern() {
    let err = compile_error(
        r#"
name: "pattern"
steps:
  - name: "g"
    outputs: [label]
  - name: "x"
conditions:
  - step: "g"
    output: "label"
    operator: matches
    value: "(["
    run: ["x"]
"#,
    );
    assert!(matches!(err, DefinitionError::InvalidPattern { ref step, .. } if step == "g"));
}

#[test]
fn test_condition_on_undeclared_output() {
    let mut def = WorkflowDefinition::new("undeclared");
    def.add_step(Step::new("g", "identity")).unwrap();
    def.add_step(Step::new("x", "identity")).unwrap();

    let err = def
        .add_condition(Condition::gt("g", "value", 5), ["x"])
        .unwrap_err();
    assert!(matches!(
        err,
        DefinitionError::UnknownStepReference { kind: ReferenceKind::Output, .. }
    ));
}

/// Compiling twice yields the same plan
#[test]
fn test_compile_is_repeatable() {
    let mut def = WorkflowDefinition::new("repeat");
    def.add_step(Step::new("a", "identity").with_output("value")).unwrap();
    def.add_step(Step::new("b", "identity").with_output_input("v", "a", "value"))
        .unwrap();
    def.add_step(Step::new("c", "identity")).unwrap();
    def.add_condition(Condition::gt("a", "value", 5), ["b"]).unwrap();

    let first = def.compile().unwrap();
    let second = def.compile().unwrap();
    assert_eq!(first.execution_order(), second.execution_order());
    assert_eq!(first.execution_order(), vec!["a", "b", "c"]);
    assert_eq!(second.guard_of("b"), Some("a"));
}
