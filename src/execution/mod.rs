//! Workflow execution: branch selection, scheduling and run coordination

pub mod branch;
pub mod coordinator;
pub mod executor;
pub mod scheduler;

pub use branch::{BranchDecision, BranchEvaluator};
pub use coordinator::{CoordinatorConfig, EventHandler, ExecutionEvent, RunCoordinator, RunHandle};
pub use executor::{StepOutcome, StepRunner};
pub use scheduler::{ExecutionScheduler, Readiness, SchedulingStrategy};
