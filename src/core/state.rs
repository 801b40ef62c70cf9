//! Execution state models

use crate::core::step::Outputs;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run has not started
    Pending,
    /// Run is currently executing
    Running,
    /// Every executed step succeeded
    Succeeded,
    /// A step failed or no branch was selected
    Failed,
    /// Run was cancelled
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Succeeded | RunStatus::Failed | RunStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "Pending",
            RunStatus::Running => "Running",
            RunStatus::Succeeded => "Succeeded",
            RunStatus::Failed => "Failed",
            RunStatus::Cancelled => "Cancelled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "Running" => RunStatus::Running,
            "Succeeded" => RunStatus::Succeeded,
            "Failed" => RunStatus::Failed,
            "Cancelled" => RunStatus::Cancelled,
            _ => RunStatus::Pending,
        }
    }
}

/// Data-free view of a step state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Eligible,
    Running,
    Succeeded,
    Failed,
    Skipped,
    Cancelled,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Succeeded | StepStatus::Failed | StepStatus::Skipped | StepStatus::Cancelled
        )
    }

    /// Allowed moves of the step state machine
    ///
    /// `pending -> eligible -> running -> {succeeded | failed}`, `pending -> skipped`,
    /// and any non-terminal state may be cancelled.
    pub fn can_transition_to(&self, next: StepStatus) -> bool {
        match (self, next) {
            (StepStatus::Pending, StepStatus::Eligible | StepStatus::Skipped) => true,
            (StepStatus::Eligible, StepStatus::Running) => true,
            (StepStatus::Running, StepStatus::Succeeded | StepStatus::Failed) => true,
            (s, StepStatus::Cancelled) => !s.is_terminal(),
            _ => false,
        }
    }
}

/// State of a single step within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StepState {
    /// Waiting for upstream steps
    Pending,
    /// Upstreams are terminal and inputs resolvable; waiting for a slot
    Eligible,
    /// Submitted to the executor
    Running { started_at: DateTime<Utc> },
    /// Step completed successfully
    Succeeded {
        outputs: Outputs,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    },
    /// Step failed
    Failed {
        error: String,
        started_at: DateTime<Utc>,
        failed_at: DateTime<Utc>,
    },
    /// Step was not selected by its branch, or all its upstreams were skipped
    Skipped { reason: String },
    /// Step never finished because the run stopped
    Cancelled { reason: String },
}

impl StepState {
    pub fn status(&self) -> StepStatus {
        match self {
            StepState::Pending => StepStatus::Pending,
            StepState::Eligible => StepStatus::Eligible,
            StepState::Running { .. } => StepStatus::Running,
            StepState::Succeeded { .. } => StepStatus::Succeeded,
            StepState::Failed { .. } => StepStatus::Failed,
            StepState::Skipped { .. } => StepStatus::Skipped,
            StepState::Cancelled { .. } => StepStatus::Cancelled,
        }
    }

    /// Check if step is in a terminal state
    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Outputs of a succeeded step
    pub fn outputs(&self) -> Option<&Outputs> {
        match self {
            StepState::Succeeded { outputs, .. } => Some(outputs),
            _ => None,
        }
    }
}
