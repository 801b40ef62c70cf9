//! Run context - arguments and step outputs shared within one run

use crate::core::{
    error::RunError,
    graph::CompiledWorkflow,
    step::{InputBinding, Inputs, Outputs, Step},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

/// Concrete arguments for one run
pub type RunArguments = HashMap<String, Value>;

/// Execution context for a run
///
/// Holds the resolved run arguments and the outputs of completed steps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunContext {
    /// Resolved run arguments (supplied values merged with defaults)
    pub arguments: RunArguments,

    /// Outputs from completed steps (step -> output -> value)
    pub step_outputs: HashMap<String, Outputs>,
}

impl RunContext {
    /// Merge supplied arguments with the workflow's declared defaults
    pub fn from_arguments(
        workflow: &CompiledWorkflow,
        mut supplied: RunArguments,
    ) -> Result<Self, RunError> {
        let mut arguments = RunArguments::new();

        for spec in workflow.arguments() {
            match supplied.remove(&spec.name).or_else(|| spec.default.clone()) {
                Some(value) => {
                    arguments.insert(spec.name.clone(), value);
                }
                None => return Err(RunError::MissingArgument(spec.name.clone())),
            }
        }

        let mut extra: Vec<_> = supplied.into_keys().collect();
        extra.sort();
        for name in extra {
            warn!("Ignoring undeclared argument '{}' for workflow {}", name, workflow.name());
        }

        Ok(Self {
            arguments,
            step_outputs: HashMap::new(),
        })
    }

    /// Set the outputs of a step
    pub fn set_step_outputs(&mut self, step: &str, outputs: Outputs) {
        self.step_outputs.insert(step.to_string(), outputs);
    }

    /// Get the outputs of a step
    pub fn get_step_outputs(&self, step: &str) -> Option<&Outputs> {
        self.step_outputs.get(step)
    }

    /// Resolve every input binding of a step
    pub fn resolve_inputs(&self, step: &Step) -> Result<Inputs, String> {
        let mut inputs = Inputs::new();

        for (name, binding) in &step.inputs {
            let value = match binding {
                InputBinding::Literal(value) => value.clone(),
                InputBinding::Argument(arg) => self
                    .arguments
                    .get(arg)
                    .cloned()
                    .ok_or_else(|| format!("argument '{}' has no value", arg))?,
                InputBinding::Output { step: source, output } => self
                    .step_outputs
                    .get(source)
                    .and_then(|outputs| outputs.get(output))
                    .cloned()
                    .ok_or_else(|| format!("output '{}.{}' is not available", source, output))?,
            };
            inputs.insert(name.clone(), value);
        }

        Ok(inputs)
    }
}
