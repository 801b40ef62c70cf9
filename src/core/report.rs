//! Run report returned to callers

use crate::core::{
    context::RunArguments,
    error::RunError,
    state::{RunStatus, StepState, StepStatus},
    step::Outputs,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Outcome of one step within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub name: String,
    pub function: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Outputs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Why the step was skipped or cancelled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl StepReport {
    pub fn from_state(name: &str, function: &str, state: &StepState) -> Self {
        let mut report = StepReport {
            name: name.to_string(),
            function: function.to_string(),
            status: state.status(),
            outputs: None,
            error: None,
            reason: None,
            started_at: None,
            completed_at: None,
        };

        match state {
            StepState::Pending | StepState::Eligible => {}
            StepState::Running { started_at } => report.started_at = Some(*started_at),
            StepState::Succeeded {
                outputs,
                started_at,
                completed_at,
            } => {
                report.outputs = Some(outputs.clone());
                report.started_at = Some(*started_at);
                report.completed_at = Some(*completed_at);
            }
            StepState::Failed {
                error,
                started_at,
                failed_at,
            } => {
                report.error = Some(error.clone());
                report.started_at = Some(*started_at);
                report.completed_at = Some(*failed_at);
            }
            StepState::Skipped { reason } | StepState::Cancelled { reason } => {
                report.reason = Some(reason.clone());
            }
        }

        report
    }
}

/// Final (or in-progress) view of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub workflow: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub arguments: RunArguments,
    /// Steps in topological order
    pub steps: Vec<StepReport>,
    /// Step names in submission order
    pub submission_order: Vec<String>,
    /// step -> output -> value, for every succeeded step
    pub outputs: HashMap<String, Outputs>,
    pub errors: Vec<RunError>,
}

impl RunReport {
    pub fn step(&self, name: &str) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn step_status(&self, name: &str) -> Option<StepStatus> {
        self.step(name).map(|s| s.status)
    }

    /// A named output of a succeeded step
    pub fn output(&self, step: &str, output: &str) -> Option<&Value> {
        self.outputs.get(step).and_then(|o| o.get(output))
    }

    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    /// Fraction of steps in a terminal state (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.steps.is_empty() {
            return 0.0;
        }
        let done = self.steps.iter().filter(|s| s.status.is_terminal()).count();
        done as f64 / self.steps.len() as f64
    }
}
