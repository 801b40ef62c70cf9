//! Run coordinator - drives runs of compiled workflows to completion

use crate::{
    core::{
        BranchPoint, CompiledWorkflow, DefinitionError, Outputs, RunArguments, RunContext, RunError,
        RunReport, RunState, RunStatus, StepState, StepStatus, WorkflowDefinition,
    },
    execution::{
        branch::BranchEvaluator,
        executor::{StepOutcome, StepRunner},
        scheduler::{ExecutionScheduler, Readiness, SchedulingStrategy},
    },
    platform::StepExecutor,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::runtime::Handle;
use tokio::task::{AbortHandle, Id as TaskId, JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Events that can occur during a run
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionEvent {
    RunStarted {
        run_id: Uuid,
        workflow: String,
    },
    StepStarted {
        run_id: Uuid,
        step: String,
    },
    StepSucceeded {
        run_id: Uuid,
        step: String,
        outputs: Outputs,
    },
    StepFailed {
        run_id: Uuid,
        step: String,
        error: String,
    },
    StepSkipped {
        run_id: Uuid,
        step: String,
        reason: String,
    },
    BranchSelected {
        run_id: Uuid,
        guard: String,
        condition: String,
        activated: Vec<String>,
    },
    RunCompleted {
        run_id: Uuid,
        status: RunStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Coordinator settings
#[derive(Debug, Clone, Default)]
pub struct CoordinatorConfig {
    /// Maximum number of steps running at once (unbounded if `None`)
    pub max_concurrency: Option<usize>,
}

impl CoordinatorConfig {
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = Some(max);
        self
    }

    fn strategy(&self) -> SchedulingStrategy {
        match self.max_concurrency {
            Some(max) => SchedulingStrategy::LimitedParallel(max),
            None => SchedulingStrategy::Parallel,
        }
    }
}

/// A run known to the coordinator, active or finished
struct RunSlot {
    workflow: Arc<CompiledWorkflow>,
    state: Arc<RwLock<RunState>>,
    cancel: watch::Sender<bool>,
}

/// Step tasks of one run: a running step's abort handle, and the step behind each task id
#[derive(Default)]
struct InFlight {
    aborts: HashMap<String, AbortHandle>,
    steps: HashMap<TaskId, String>,
}

impl InFlight {
    fn insert(&mut self, step: String, abort: AbortHandle) {
        self.steps.insert(abort.id(), step.clone());
        self.aborts.insert(step, abort);
    }

    fn remove(&mut self, id: TaskId) -> Option<String> {
        let step = self.steps.remove(&id)?;
        self.aborts.remove(&step);
        Some(step)
    }

    fn len(&self) -> usize {
        self.aborts.len()
    }
}

/// Settles a run whose driver is dropped before it finishes
///
/// Dropping the driver also drops its `JoinSet`, which aborts the step tasks;
/// this marks the registry entry so it does not stay `Running`.
struct AbandonGuard {
    state: Arc<RwLock<RunState>>,
    armed: bool,
}

const ABANDONED: &str = "run dropped before completion";

fn settle_abandoned(run: &mut RunState) {
    if run.status.is_terminal() {
        return;
    }
    warn!("Run {} abandoned while {:?}", run.run_id, run.status);
    run.cancel(ABANDONED);
    run.cancel_unfinished(ABANDONED);
    run.finish();
}

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match self.state.try_write() {
            Ok(mut run) => settle_abandoned(&mut run),
            Err(_) => {
                if let Ok(handle) = Handle::try_current() {
                    let state = self.state.clone();
                    handle.spawn(async move { settle_abandoned(&mut *state.write().await) });
                }
            }
        }
    }
}

/// Handle to a run started in the background
pub struct RunHandle {
    run_id: Uuid,
    handle: JoinHandle<RunReport>,
}

impl RunHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Wait for the run to reach a terminal status
    pub async fn wait(self) -> Result<RunReport, RunError> {
        self.handle
            .await
            .map_err(|e| RunError::Cancelled(format!("run task ended abnormally: {}", e)))
    }
}

/// Coordinates workflow runs
///
/// Cloning is cheap; clones share the executor, the handlers and the
/// registry of runs, so a clone can query or cancel runs started by another.
#[derive(Clone)]
pub struct RunCoordinator {
    runner: Arc<StepRunner>,
    scheduler: ExecutionScheduler,
    handlers: Arc<Vec<EventHandler>>,
    runs: Arc<RwLock<HashMap<Uuid, RunSlot>>>,
}

impl RunCoordinator {
    pub fn new<E: StepExecutor + 'static>(executor: E, config: CoordinatorConfig) -> Self {
        Self::with_executor(Arc::new(executor), config)
    }

    pub fn with_executor(executor: Arc<dyn StepExecutor>, config: CoordinatorConfig) -> Self {
        Self {
            runner: Arc::new(StepRunner::new(executor)),
            scheduler: ExecutionScheduler::new(config.strategy()),
            handlers: Arc::new(Vec::new()),
            runs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Add an event handler; handlers are called synchronously, in order
    pub fn with_event_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.handlers).push(Arc::new(handler));
        self
    }

    fn emit(&self, events: Vec<ExecutionEvent>) {
        for event in events {
            for handler in self.handlers.iter() {
                handler(event.clone());
            }
        }
    }

    /// Run a compiled workflow to completion
    pub async fn run(&self, workflow: Arc<CompiledWorkflow>, arguments: RunArguments) -> RunReport {
        let (run_id, state, cancel_rx) = self.register(&workflow).await;
        self.drive(run_id, workflow, state, arguments, cancel_rx).await
    }

    /// Compile a definition, then run it
    pub async fn run_definition(
        &self,
        definition: &WorkflowDefinition,
        arguments: RunArguments,
    ) -> Result<RunReport, DefinitionError> {
        let workflow = Arc::new(definition.compile()?);
        Ok(self.run(workflow, arguments).await)
    }

    /// Start a run in the background
    ///
    /// The run is registered before this returns, so `status` and `cancel`
    /// work immediately with the handle's run id.
    pub async fn start(&self, workflow: Arc<CompiledWorkflow>, arguments: RunArguments) -> RunHandle {
        let (run_id, state, cancel_rx) = self.register(&workflow).await;
        let coordinator = self.clone();
        let handle = tokio::spawn(async move {
            coordinator
                .drive(run_id, workflow, state, arguments, cancel_rx)
                .await
        });
        RunHandle { run_id, handle }
    }

    /// Snapshot of a run, partial while it is still executing
    pub async fn status(&self, run_id: Uuid) -> Result<RunReport, RunError> {
        let runs = self.runs.read().await;
        let slot = runs.get(&run_id).ok_or(RunError::UnknownRun(run_id))?;
        let state = slot.state.read().await;
        Ok(state.to_report(&slot.workflow))
    }

    /// Ask a run to stop; a finished run is left as it is
    pub async fn cancel(&self, run_id: Uuid) -> Result<(), RunError> {
        let runs = self.runs.read().await;
        let slot = runs.get(&run_id).ok_or(RunError::UnknownRun(run_id))?;
        info!("Cancellation requested for run {}", run_id);
        // The receiver is gone once the run has finished
        let _ = slot.cancel.send(true);
        Ok(())
    }

    /// Ids of all runs known to this coordinator
    pub async fn runs(&self) -> Vec<Uuid> {
        self.runs.read().await.keys().copied().collect()
    }

    /// Drop a finished run from the registry, returning its final report
    ///
    /// Active runs are kept; cancel them and wait first.
    pub async fn forget(&self, run_id: Uuid) -> Result<RunReport, RunError> {
        let mut runs = self.runs.write().await;
        let slot = runs.get(&run_id).ok_or(RunError::UnknownRun(run_id))?;
        let report = {
            let state = slot.state.read().await;
            if !state.status.is_terminal() {
                return Err(RunError::RunActive(run_id));
            }
            state.to_report(&slot.workflow)
        };
        runs.remove(&run_id);
        debug!("Forgot run {}", run_id);
        Ok(report)
    }

    async fn register(
        &self,
        workflow: &Arc<CompiledWorkflow>,
    ) -> (Uuid, Arc<RwLock<RunState>>, watch::Receiver<bool>) {
        let run_id = Uuid::new_v4();
        let state = Arc::new(RwLock::new(RunState::new(run_id, workflow)));
        let (cancel, cancel_rx) = watch::channel(false);

        self.runs.write().await.insert(
            run_id,
            RunSlot {
                workflow: workflow.clone(),
                state: state.clone(),
                cancel,
            },
        );

        (run_id, state, cancel_rx)
    }

    /// Main run loop
    async fn drive(
        &self,
        run_id: Uuid,
        workflow: Arc<CompiledWorkflow>,
        state: Arc<RwLock<RunState>>,
        arguments: RunArguments,
        mut cancel_rx: watch::Receiver<bool>,
    ) -> RunReport {
        let mut guard = AbandonGuard {
            state: state.clone(),
            armed: true,
        };
        info!("Starting run {} of workflow {}", run_id, workflow.name());
        self.emit(vec![ExecutionEvent::RunStarted {
            run_id,
            workflow: workflow.name().to_string(),
        }]);

        {
            let mut run = state.write().await;
            match RunContext::from_arguments(&workflow, arguments) {
                Ok(context) => run.start(context),
                Err(e) => {
                    error!("Run {} cannot start: {}", run_id, e);
                    run.start(RunContext::default());
                    run.fail(e);
                }
            }
        }

        let mut tasks: JoinSet<StepOutcome> = JoinSet::new();
        let mut in_flight = InFlight::default();
        let mut cancel_requested = false;

        loop {
            if !cancel_requested && *cancel_rx.borrow() {
                cancel_requested = true;
                self.cancel_run(&state, &in_flight).await;
            }

            let events = {
                let mut run = state.write().await;
                self.schedule(run_id, &workflow, &mut run, &mut tasks, &mut in_flight)
            };
            self.emit(events);

            if tasks.is_empty() {
                break;
            }

            tokio::select! {
                Ok(()) = cancel_rx.changed(), if !cancel_requested => {
                    if *cancel_rx.borrow() {
                        cancel_requested = true;
                        self.cancel_run(&state, &in_flight).await;
                    }
                }
                Some(joined) = tasks.join_next_with_id() => {
                    let (id, result) = match joined {
                        Ok((id, outcome)) => (id, Ok(outcome)),
                        Err(e) => (e.id(), Err(e)),
                    };
                    match in_flight.remove(id) {
                        Some(step) => {
                            let events = {
                                let mut run = state.write().await;
                                self.complete_step(run_id, &workflow, &mut run, &step, result)
                            };
                            self.emit(events);
                        }
                        None => error!("Run {} joined an unknown step task {}", run_id, id),
                    }
                }
                else => break,
            }
        }

        let report = {
            let mut run = state.write().await;
            let reason = match run.status {
                RunStatus::Cancelled => "run cancelled",
                RunStatus::Failed => "run failed before the step started",
                _ => {
                    if !run.all_terminal() {
                        error!("Run {} stalled with unfinished steps", run_id);
                    }
                    "run stalled"
                }
            };
            run.cancel_unfinished(reason);
            run.finish();
            run.to_report(&workflow)
        };

        info!(
            "Run {} of workflow {} finished: {:?}",
            run_id,
            workflow.name(),
            report.status
        );
        guard.armed = false;
        self.emit(vec![ExecutionEvent::RunCompleted {
            run_id,
            status: report.status,
        }]);

        report
    }

    /// Promote pending steps and submit eligible ones
    fn schedule(
        &self,
        run_id: Uuid,
        workflow: &CompiledWorkflow,
        run: &mut RunState,
        tasks: &mut JoinSet<StepOutcome>,
        in_flight: &mut InFlight,
    ) -> Vec<ExecutionEvent> {
        let mut events = Vec::new();
        if !run.is_accepting() {
            return events;
        }

        // Topological order: a skip applied here is seen by later steps in the same pass
        for step in workflow.steps() {
            if run.step_status(&step.name) != Some(StepStatus::Pending) {
                continue;
            }
            match self.scheduler.readiness(workflow, run, step) {
                Readiness::Wait => {}
                Readiness::Eligible => {
                    run.transition(&step.name, StepState::Eligible);
                }
                Readiness::Skip(reason) => {
                    debug!("Skipping step {}: {}", step.name, reason);
                    run.transition(&step.name, StepState::Skipped { reason: reason.clone() });
                    events.push(ExecutionEvent::StepSkipped {
                        run_id,
                        step: step.name.clone(),
                        reason,
                    });
                }
            }
        }

        for name in self.scheduler.next_steps(workflow, run, in_flight.len()) {
            let Some(step) = workflow.step(&name) else {
                continue;
            };

            let started_at = Utc::now();
            run.transition(&name, StepState::Running { started_at });

            let inputs = match run.context.resolve_inputs(step) {
                Ok(inputs) => inputs,
                Err(e) => {
                    error!("Cannot resolve inputs of step {}: {}", name, e);
                    run.transition(
                        &name,
                        StepState::Failed {
                            error: e.clone(),
                            started_at,
                            failed_at: Utc::now(),
                        },
                    );
                    run.fail(RunError::StepFailed {
                        step: name.clone(),
                        error: e.clone(),
                    });
                    events.push(ExecutionEvent::StepFailed {
                        run_id,
                        step: name,
                        error: e,
                    });
                    break;
                }
            };

            let runner = self.runner.clone();
            let step = step.clone();
            let abort = tasks.spawn(async move { runner.run(run_id, &step, inputs).await });
            in_flight.insert(name.clone(), abort);

            events.push(ExecutionEvent::StepStarted { run_id, step: name });
        }

        events
    }

    /// Record the result of a finished step task
    fn complete_step(
        &self,
        run_id: Uuid,
        workflow: &CompiledWorkflow,
        run: &mut RunState,
        step: &str,
        result: Result<StepOutcome, JoinError>,
    ) -> Vec<ExecutionEvent> {
        let mut events = Vec::new();
        let started_at = match run.step_state(step) {
            Some(StepState::Running { started_at }) => *started_at,
            _ => Utc::now(),
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => {
                debug!("Step {} aborted", step);
                run.transition(
                    step,
                    StepState::Cancelled {
                        reason: "run cancelled while the step was running".to_string(),
                    },
                );
                return events;
            }
            Err(e) => StepOutcome::Failed {
                error: format!("step task panicked: {}", e),
            },
        };

        match outcome {
            StepOutcome::Succeeded { outputs } => {
                info!("Step {} succeeded", step);
                run.transition(
                    step,
                    StepState::Succeeded {
                        outputs: outputs.clone(),
                        started_at,
                        completed_at: Utc::now(),
                    },
                );
                events.push(ExecutionEvent::StepSucceeded {
                    run_id,
                    step: step.to_string(),
                    outputs: outputs.clone(),
                });

                if let Some(branch) = workflow.branch_point(step) {
                    self.select_branch(run_id, run, branch, &outputs, &mut events);
                }
            }
            StepOutcome::Failed { error } => {
                warn!("Step {} failed: {}", step, error);
                run.transition(
                    step,
                    StepState::Failed {
                        error: error.clone(),
                        started_at,
                        failed_at: Utc::now(),
                    },
                );
                run.fail(RunError::StepFailed {
                    step: step.to_string(),
                    error: error.clone(),
                });
                events.push(ExecutionEvent::StepFailed {
                    run_id,
                    step: step.to_string(),
                    error,
                });
            }
        }

        events
    }

    fn select_branch(
        &self,
        run_id: Uuid,
        run: &mut RunState,
        branch: &BranchPoint,
        outputs: &Outputs,
        events: &mut Vec<ExecutionEvent>,
    ) {
        let (skipped, reason) = match BranchEvaluator::evaluate(branch, outputs) {
            Ok(decision) => {
                let condition = branch.conditions[decision.selected].condition.describe();
                info!(
                    "Branch after {} selected ({}): {:?}",
                    branch.step, condition, decision.activated
                );
                events.push(ExecutionEvent::BranchSelected {
                    run_id,
                    guard: decision.guard.clone(),
                    condition,
                    activated: decision.activated.clone(),
                });
                (
                    decision.skipped,
                    format!("branch not selected after '{}'", branch.step),
                )
            }
            Err(e) => {
                error!("{}", e);
                run.fail(e);
                (
                    branch.gated_steps().cloned().collect(),
                    format!("no branch selected after '{}'", branch.step),
                )
            }
        };

        for step in skipped {
            if run.transition(&step, StepState::Skipped { reason: reason.clone() }) {
                events.push(ExecutionEvent::StepSkipped {
                    run_id,
                    step,
                    reason: reason.clone(),
                });
            }
        }
    }

    async fn cancel_run(&self, state: &Arc<RwLock<RunState>>, in_flight: &InFlight) {
        let mut run = state.write().await;
        if run.status.is_terminal() {
            return;
        }
        warn!("Cancelling run {} ({} steps running)", run.run_id, in_flight.len());
        run.cancel("cancelled by request");
        for handle in in_flight.aborts.values() {
            handle.abort();
        }
    }
}
