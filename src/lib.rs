//! flowline - a conditional DAG workflow engine
//!
//! Workflows are built with [`WorkflowDefinition`] (or loaded from YAML with
//! [`core::config::WorkflowConfig`]), compiled into an immutable
//! [`CompiledWorkflow`] and executed by a [`RunCoordinator`] against a
//! [`StepExecutor`].

pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod platform;

// Re-export commonly used types
pub use core::{
    CompiledWorkflow, Condition, ComparisonOperator, DefinitionError, RunArguments, RunError,
    RunReport, RunStatus, Step, StepStatus, WorkflowDefinition,
};
pub use execution::{CoordinatorConfig, ExecutionEvent, RunCoordinator, RunHandle};
pub use platform::{ExecutorError, FunctionRegistry, LocalPlatform, StepExecutor, StepSubmission};
