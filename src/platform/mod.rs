//! Step execution platform
//!
//! The coordinator never runs user code itself: it hands each step with its
//! resolved inputs to a [`StepExecutor`] and waits for the outputs.

pub mod command;
pub mod error;
pub mod registry;

use crate::core::{config::WorkflowConfig, Inputs, Outputs};
use async_trait::async_trait;
pub use command::{CommandConfig, CommandExecutor};
pub use error::ExecutorError;
pub use registry::FunctionRegistry;
use uuid::Uuid;

/// A step submitted for execution
#[derive(Debug, Clone)]
pub struct StepSubmission {
    pub run_id: Uuid,
    pub step: String,
    pub function: String,
    pub inputs: Inputs,
}

/// Trait for step execution - allows for different platforms
///
/// Retries, if any, are the implementation's business.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Run a step and return its outputs
    async fn submit(&self, submission: &StepSubmission) -> Result<Outputs, ExecutorError>;
}

/// Local platform: configured commands first, then in-process functions
pub struct LocalPlatform {
    commands: CommandExecutor,
    functions: FunctionRegistry,
}

impl LocalPlatform {
    pub fn new(commands: CommandExecutor, functions: FunctionRegistry) -> Self {
        Self {
            commands,
            functions,
        }
    }

    /// Build the platform for a workflow file, with the built-in functions available
    pub fn from_config(config: &WorkflowConfig) -> Self {
        let mut commands = CommandExecutor::new();
        for (name, function) in &config.functions {
            commands.register(name.clone(), CommandConfig::from_function_config(function));
        }
        Self::new(commands, FunctionRegistry::with_builtins())
    }

    pub fn functions_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.functions
    }
}

#[async_trait]
impl StepExecutor for LocalPlatform {
    async fn submit(&self, submission: &StepSubmission) -> Result<Outputs, ExecutorError> {
        if self.commands.contains(&submission.function) {
            self.commands.submit(submission).await
        } else if self.functions.contains(&submission.function) {
            self.functions.submit(submission).await
        } else {
            Err(ExecutorError::UnknownFunction(submission.function.clone()))
        }
    }
}
