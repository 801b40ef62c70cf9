//! Error types for workflow definition and execution

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while building or compiling a workflow definition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("Duplicate step name: {0}")]
    DuplicateStepName(String),

    #[error("'{step}' references unknown {kind} '{reference}'")]
    UnknownStepReference {
        step: String,
        kind: ReferenceKind,
        reference: String,
    },

    #[error("Step '{step}' is already gated by a condition on '{guard}'")]
    AlreadyGated { step: String, guard: String },

    #[error("Cycle detected in workflow graph: {}", path.join(" -> "))]
    CycleDetected { path: Vec<String> },

    #[error("Step '{step}' input '{input}' cannot be resolved: {reason}")]
    UnresolvedInput {
        step: String,
        input: String,
        reason: String,
    },

    #[error("Invalid pattern '{pattern}' in condition on '{step}': {message}")]
    InvalidPattern {
        step: String,
        pattern: String,
        message: String,
    },
}

/// What an unknown reference was pointing at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Step,
    Output,
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceKind::Step => write!(f, "step"),
            ReferenceKind::Output => write!(f, "output"),
        }
    }
}

/// Errors that end a run
///
/// These are recorded in the run report, so they are serializable.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum RunError {
    #[error(
        "No branch selected after step '{step}': no condition matched {}",
        describe_outputs(.inspected)
    )]
    NoBranchSelected {
        step: String,
        /// Every output the conditions inspected, with the value seen
        inspected: BTreeMap<String, serde_json::Value>,
    },

    #[error("Step '{step}' failed: {error}")]
    StepFailed { step: String, error: String },

    #[error("Missing run argument '{0}'")]
    MissingArgument(String),

    #[error("Run cancelled: {0}")]
    Cancelled(String),

    #[error("Run {0} is not known to this coordinator")]
    UnknownRun(uuid::Uuid),

    #[error("Run {0} is still active")]
    RunActive(uuid::Uuid),
}

fn describe_outputs(inspected: &BTreeMap<String, serde_json::Value>) -> String {
    inspected
        .iter()
        .map(|(output, value)| format!("'{}' = {}", output, value))
        .collect::<Vec<_>>()
        .join(", ")
}
