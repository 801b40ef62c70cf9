//! Conditional branch evaluation

use crate::core::{BranchPoint, Outputs, RunError};
use serde_json::Value;
use tracing::{debug, warn};

/// The branch chosen at a branch point
#[derive(Debug, Clone, PartialEq)]
pub struct BranchDecision {
    /// Guard step whose outputs were inspected
    pub guard: String,

    /// Index of the selected condition, in declaration order
    pub selected: usize,

    /// Every condition that evaluated true
    pub matched: Vec<usize>,

    /// Steps gated by the selected condition
    pub activated: Vec<String>,

    /// Steps gated by every other condition
    pub skipped: Vec<String>,
}

/// Selects exactly one branch after a guard step completes
pub struct BranchEvaluator;

impl BranchEvaluator {
    /// Evaluate the conditions of a branch point in declaration order
    ///
    /// The first true condition wins. Returns `NoBranchSelected` when none
    /// holds; the caller decides what happens to the gated steps then.
    pub fn evaluate(branch: &BranchPoint, outputs: &Outputs) -> Result<BranchDecision, RunError> {
        let matched: Vec<usize> = branch
            .conditions
            .iter()
            .enumerate()
            .filter(|(_, gated)| {
                let actual = outputs.get(&gated.condition.output).unwrap_or(&Value::Null);
                gated.condition.evaluate(actual)
            })
            .map(|(i, _)| i)
            .collect();

        let Some(&selected) = matched.first() else {
            let inspected = branch
                .conditions
                .iter()
                .map(|gated| {
                    let output = gated.condition.output.clone();
                    let value = outputs.get(&output).cloned().unwrap_or(Value::Null);
                    (output, value)
                })
                .collect();
            return Err(RunError::NoBranchSelected {
                step: branch.step.clone(),
                inspected,
            });
        };

        if matched.len() > 1 {
            warn!(
                "Conditions {:?} after step {} overlap; using condition {} ({})",
                matched,
                branch.step,
                selected,
                branch.conditions[selected].condition.describe()
            );
        }

        let activated = branch.conditions[selected].gated.clone();
        let skipped = branch
            .conditions
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != selected)
            .flat_map(|(_, c)| c.gated.iter().cloned())
            .filter(|s| !activated.contains(s))
            .collect();

        debug!(
            "Branch after {} selected condition {}: run {:?}",
            branch.step, selected, activated
        );

        Ok(BranchDecision {
            guard: branch.step.clone(),
            selected,
            matched,
            activated,
            skipped,
        })
    }
}
