//! Step runner - submits individual steps to the platform

use crate::{
    core::{Inputs, Outputs, Step},
    platform::{StepExecutor, StepSubmission},
};
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Result of executing a step
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Step completed with every declared output
    Succeeded { outputs: Outputs },
    /// The platform reported an error, or a declared output was missing
    Failed { error: String },
}

/// Executes a single step
pub struct StepRunner {
    executor: Arc<dyn StepExecutor>,
}

impl StepRunner {
    pub fn new(executor: Arc<dyn StepExecutor>) -> Self {
        Self { executor }
    }

    /// Submit a step with its resolved inputs and check the outputs
    pub async fn run(&self, run_id: Uuid, step: &Step, inputs: Inputs) -> StepOutcome {
        info!("Executing step: {}", step.name);
        debug!("Inputs for step {}: {:?}", step.name, inputs);

        let submission = StepSubmission {
            run_id,
            step: step.name.clone(),
            function: step.function.clone(),
            inputs,
        };

        let produced = match self.executor.submit(&submission).await {
            Ok(outputs) => outputs,
            Err(e) => {
                error!("Step {} failed: {}", step.name, e);
                return StepOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        match step.collect_outputs(produced) {
            Ok(outputs) => {
                debug!("Outputs for step {}: {:?}", step.name, outputs);
                StepOutcome::Succeeded { outputs }
            }
            Err(e) => {
                error!("Step {} returned incomplete outputs: {}", step.name, e);
                StepOutcome::Failed { error: e }
            }
        }
    }
}
