//! Branch condition model

use crate::core::error::DefinitionError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison applied between a step output and a condition value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
    In,
    NotIn,
    Contains,
    Matches,
}

impl ComparisonOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOperator::Gt => ">",
            ComparisonOperator::Ge => ">=",
            ComparisonOperator::Lt => "<",
            ComparisonOperator::Le => "<=",
            ComparisonOperator::Eq => "==",
            ComparisonOperator::Ne => "!=",
            ComparisonOperator::In => "in",
            ComparisonOperator::NotIn => "not in",
            ComparisonOperator::Contains => "contains",
            ComparisonOperator::Matches => "matches",
        }
    }
}

/// Predicate over a single output value (not serializable due to Regex)
#[derive(Debug, Clone)]
pub enum Predicate {
    Compare {
        operator: ComparisonOperator,
        value: Value,
    },
    Matches(Regex),
}

impl PartialEq for Predicate {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Predicate::Compare { operator: a, value: va },
                Predicate::Compare { operator: b, value: vb },
            ) => a == b && va == vb,
            (Predicate::Matches(a), Predicate::Matches(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl Predicate {
    /// Evaluate against the actual output value
    pub fn evaluate(&self, actual: &Value) -> bool {
        match self {
            Predicate::Matches(regex) => regex.is_match(&value_to_string(actual)),
            Predicate::Compare { operator, value } => compare(*operator, actual, value),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Predicate::Matches(regex) => format!("matches /{}/", regex.as_str()),
            Predicate::Compare { operator, value } => format!("{} {}", operator.symbol(), value),
        }
    }
}

/// Guards a branch: a predicate over one output of a guard step
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// The guard step whose output is inspected
    pub step: String,

    /// The output name compared
    pub output: String,

    pub predicate: Predicate,
}

impl Condition {
    /// Build a condition, compiling the pattern for `matches`
    pub fn new(
        step: impl Into<String>,
        output: impl Into<String>,
        operator: ComparisonOperator,
        value: Value,
    ) -> Result<Self, DefinitionError> {
        let step = step.into();
        let predicate = match operator {
            ComparisonOperator::Matches => {
                let pattern = value_to_string(&value);
                let regex = Regex::new(&pattern).map_err(|e| DefinitionError::InvalidPattern {
                    step: step.clone(),
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
                Predicate::Matches(regex)
            }
            _ => Predicate::Compare { operator, value },
        };

        Ok(Self {
            step,
            output: output.into(),
            predicate,
        })
    }

    pub fn gt(step: impl Into<String>, output: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(step, output, ComparisonOperator::Gt, value.into())
    }

    pub fn le(step: impl Into<String>, output: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(step, output, ComparisonOperator::Le, value.into())
    }

    /// Build a non-regex condition
    pub fn compare(
        step: impl Into<String>,
        output: impl Into<String>,
        operator: ComparisonOperator,
        value: Value,
    ) -> Self {
        let predicate = match operator {
            // Treated as a literal; use `Condition::new` for real patterns
            ComparisonOperator::Matches => {
                let literal = regex::escape(&value_to_string(&value));
                Predicate::Matches(Regex::new(&literal).expect("escaped literal is a valid regex"))
            }
            _ => Predicate::Compare { operator, value },
        };
        Self {
            step: step.into(),
            output: output.into(),
            predicate,
        }
    }

    /// Evaluate against the guard step's output value
    pub fn evaluate(&self, actual: &Value) -> bool {
        self.predicate.evaluate(actual)
    }

    pub fn describe(&self) -> String {
        format!("{}.{} {}", self.step, self.output, self.predicate.describe())
    }
}

fn compare(operator: ComparisonOperator, actual: &Value, expected: &Value) -> bool {
    match operator {
        ComparisonOperator::Gt => numeric(actual, expected, |a, b| a > b),
        ComparisonOperator::Ge => numeric(actual, expected, |a, b| a >= b),
        ComparisonOperator::Lt => numeric(actual, expected, |a, b| a < b),
        ComparisonOperator::Le => numeric(actual, expected, |a, b| a <= b),
        ComparisonOperator::Eq => values_equal(actual, expected),
        ComparisonOperator::Ne => !values_equal(actual, expected),
        ComparisonOperator::In => contains(expected, actual),
        ComparisonOperator::NotIn => !contains(expected, actual),
        ComparisonOperator::Contains => contains(actual, expected),
        ComparisonOperator::Matches => value_to_string(actual) == value_to_string(expected),
    }
}

fn numeric(actual: &Value, expected: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (value_to_f64(actual), value_to_f64(expected)) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (value_to_f64(actual), value_to_f64(expected)) {
        (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
        _ => value_to_string(actual) == value_to_string(expected),
    }
}

/// Whether `haystack` contains `needle` (array membership or substring)
fn contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::Array(items) => items.iter().any(|item| values_equal(item, needle)),
        Value::String(s) => s.contains(&value_to_string(needle)),
        Value::Object(map) => map.contains_key(&value_to_string(needle)),
        _ => false,
    }
}

fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn value_to_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
