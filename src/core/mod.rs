//! Core domain models for workflows
//!
//! This module defines the fundamental data structures that represent
//! workflow definitions, compiled graphs, conditions and run state.

pub mod condition;
pub mod config;
pub mod context;
pub mod error;
pub mod graph;
pub mod report;
pub mod run;
pub mod state;
pub mod step;
pub mod workflow;

pub use condition::{ComparisonOperator, Condition, Predicate};
pub use context::{RunArguments, RunContext};
pub use error::{DefinitionError, ReferenceKind, RunError};
pub use graph::{ArgumentSpec, BranchPoint, CompiledWorkflow, GatedCondition};
pub use report::{RunReport, StepReport};
pub use run::RunState;
pub use state::{RunStatus, StepState, StepStatus};
pub use step::{InputBinding, Inputs, Outputs, Step};
pub use workflow::WorkflowDefinition;
