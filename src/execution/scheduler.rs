//! Execution scheduler - determines which steps to run next

use crate::core::{CompiledWorkflow, InputBinding, RunState, Step, StepStatus};

/// Strategy for scheduling step execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulingStrategy {
    /// Execute all eligible steps at once
    #[default]
    Parallel,

    /// Limited parallelism (max N concurrent steps)
    LimitedParallel(usize),
}

/// What should happen to a pending step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Some upstream step is not terminal yet, or the run is failing
    Wait,
    /// Upstreams are done and the inputs can be resolved
    Eligible,
    /// The step can never run in this run
    Skip(String),
}

/// Scheduler for determining which steps to run
#[derive(Debug, Clone, Default)]
pub struct ExecutionScheduler {
    strategy: SchedulingStrategy,
}

impl ExecutionScheduler {
    pub fn new(strategy: SchedulingStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> SchedulingStrategy {
        self.strategy
    }

    /// Decide the fate of a pending step from the state of its upstreams
    pub fn readiness(&self, workflow: &CompiledWorkflow, run: &RunState, step: &Step) -> Readiness {
        let upstream = workflow.upstream(&step.name);
        let statuses: Vec<StepStatus> = upstream
            .iter()
            .map(|u| run.step_status(u).unwrap_or(StepStatus::Pending))
            .collect();

        if statuses.iter().any(|s| !s.is_terminal()) {
            return Readiness::Wait;
        }

        if let Some(guard) = workflow.guard_of(&step.name) {
            if run.step_status(guard) == Some(StepStatus::Skipped) {
                return Readiness::Skip(format!("guard step '{}' was skipped", guard));
            }
        }

        if statuses
            .iter()
            .any(|s| matches!(s, StepStatus::Failed | StepStatus::Cancelled))
        {
            return Readiness::Wait;
        }

        if !statuses.is_empty() && statuses.iter().all(|s| *s == StepStatus::Skipped) {
            return Readiness::Skip("all upstream steps were skipped".to_string());
        }

        let mut inputs: Vec<(&String, &InputBinding)> = step.inputs.iter().collect();
        inputs.sort_by(|a, b| a.0.cmp(b.0));
        for (input, binding) in inputs {
            if let Some(source) = binding.upstream_step() {
                if run.step_status(source) == Some(StepStatus::Skipped) {
                    return Readiness::Skip(format!(
                        "input '{}' reads from skipped step '{}'",
                        input, source
                    ));
                }
            }
        }

        Readiness::Eligible
    }

    /// How many more steps may start while `running` are in flight
    pub fn capacity(&self, running: usize) -> usize {
        match self.strategy {
            SchedulingStrategy::Parallel => usize::MAX,
            SchedulingStrategy::LimitedParallel(max) => max.max(1).saturating_sub(running),
        }
    }

    /// Eligible steps to submit now, in topological order
    pub fn next_steps(&self, workflow: &CompiledWorkflow, run: &RunState, running: usize) -> Vec<String> {
        workflow
            .steps()
            .iter()
            .filter(|s| run.step_status(&s.name) == Some(StepStatus::Eligible))
            .take(self.capacity(running))
            .map(|s| s.name.clone())
            .collect()
    }
}
