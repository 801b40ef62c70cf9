//! Mutable state of one run, owned by the coordinator

use crate::core::{
    context::RunContext,
    error::RunError,
    graph::CompiledWorkflow,
    report::{RunReport, StepReport},
    state::{RunStatus, StepState, StepStatus},
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

/// Overall run state
#[derive(Debug, Clone)]
pub struct RunState {
    /// Unique run ID
    pub run_id: Uuid,

    /// Workflow name
    pub workflow: String,

    /// Current run status
    pub status: RunStatus,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run reached a terminal status
    pub completed_at: Option<DateTime<Utc>>,

    /// Per-step state
    steps: HashMap<String, StepState>,

    /// Step names in the order they were submitted
    pub submission_order: Vec<String>,

    /// Errors that ended the run
    pub errors: Vec<RunError>,

    /// Arguments and completed outputs
    pub context: RunContext,
}

impl RunState {
    /// Create a run with every step pending
    pub fn new(run_id: Uuid, workflow: &CompiledWorkflow) -> Self {
        Self {
            run_id,
            workflow: workflow.name().to_string(),
            status: RunStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            steps: workflow
                .steps()
                .iter()
                .map(|s| (s.name.clone(), StepState::Pending))
                .collect(),
            submission_order: Vec::new(),
            errors: Vec::new(),
            context: RunContext::default(),
        }
    }

    /// Mark run as started
    pub fn start(&mut self, context: RunContext) {
        self.status = RunStatus::Running;
        self.started_at = Utc::now();
        self.context = context;
    }

    pub fn step_state(&self, step: &str) -> Option<&StepState> {
        self.steps.get(step)
    }

    pub fn step_status(&self, step: &str) -> Option<StepStatus> {
        self.steps.get(step).map(|s| s.status())
    }

    /// Move a step to a new state, refusing moves the state machine forbids
    pub fn transition(&mut self, step: &str, next: StepState) -> bool {
        let Some(current) = self.steps.get_mut(step) else {
            warn!("Ignoring transition for unknown step {}", step);
            return false;
        };

        let (from, to) = (current.status(), next.status());
        if !from.can_transition_to(to) {
            warn!("Refusing transition of step {} from {:?} to {:?}", step, from, to);
            return false;
        }

        if to == StepStatus::Running {
            self.submission_order.push(step.to_string());
        }
        if let StepState::Succeeded { outputs, .. } = &next {
            self.context.set_step_outputs(step, outputs.clone());
        }
        *current = next;
        true
    }

    /// Record a fatal error; the first one decides the run status
    pub fn fail(&mut self, error: RunError) {
        if self.status == RunStatus::Running {
            self.status = RunStatus::Failed;
        }
        self.errors.push(error);
    }

    /// Stop the run on user request
    pub fn cancel(&mut self, reason: &str) {
        if !self.status.is_terminal() {
            self.status = RunStatus::Cancelled;
        }
        self.errors.push(RunError::Cancelled(reason.to_string()));
    }

    /// Whether new steps may still be submitted
    pub fn is_accepting(&self) -> bool {
        self.status == RunStatus::Running
    }

    /// Cancel every step that has not reached a terminal state
    pub fn cancel_unfinished(&mut self, reason: &str) {
        let unfinished: Vec<String> = self
            .steps
            .iter()
            .filter(|(_, s)| !s.is_terminal())
            .map(|(name, _)| name.clone())
            .collect();
        for name in unfinished {
            self.transition(
                &name,
                StepState::Cancelled {
                    reason: reason.to_string(),
                },
            );
        }
    }

    /// Mark the run complete; a still-running run succeeded
    pub fn finish(&mut self) {
        if self.status == RunStatus::Running {
            self.status = RunStatus::Succeeded;
        }
        self.completed_at = Some(Utc::now());
    }

    /// Number of steps in the given status
    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.values().filter(|s| s.status() == status).count()
    }

    pub fn all_terminal(&self) -> bool {
        self.steps.values().all(|s| s.is_terminal())
    }

    /// Snapshot the run as a report
    pub fn to_report(&self, workflow: &CompiledWorkflow) -> RunReport {
        let steps = workflow
            .steps()
            .iter()
            .map(|step| {
                let state = self.steps.get(&step.name).cloned().unwrap_or(StepState::Pending);
                StepReport::from_state(&step.name, &step.function, &state)
            })
            .collect();

        RunReport {
            run_id: self.run_id,
            workflow: self.workflow.clone(),
            status: self.status,
            started_at: self.started_at,
            completed_at: self.completed_at,
            arguments: self.context.arguments.clone(),
            steps,
            submission_order: self.submission_order.clone(),
            outputs: self.context.step_outputs.clone(),
            errors: self.errors.clone(),
        }
    }
}
