//! Workflow definition and compilation

use crate::core::{
    condition::Condition,
    error::{DefinitionError, ReferenceKind},
    graph::{ArgumentSpec, BranchPoint, CompiledWorkflow, GatedCondition},
    step::{InputBinding, Step},
};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};

/// A mutable workflow definition: steps, conditions and run arguments
///
/// Call [`WorkflowDefinition::compile`] to validate it and obtain a
/// [`CompiledWorkflow`].
#[derive(Debug, Clone, Default)]
pub struct WorkflowDefinition {
    /// Workflow name
    pub name: String,

    arguments: Vec<ArgumentSpec>,

    /// Steps in insertion order
    steps: Vec<Step>,

    index: HashMap<String, usize>,

    /// Conditions in declaration order
    conditions: Vec<GatedCondition>,

    /// gated step -> guard step
    gated_by: HashMap<String, String>,
}

impl WorkflowDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Declare a run argument, optionally with a default value
    pub fn add_argument(&mut self, name: impl Into<String>, default: Option<Value>) {
        let name = name.into();
        match self.arguments.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.default = default,
            None => self.arguments.push(ArgumentSpec { name, default }),
        }
    }

    /// Register a step
    pub fn add_step(&mut self, step: Step) -> Result<(), DefinitionError> {
        if self.index.contains_key(&step.name) {
            return Err(DefinitionError::DuplicateStepName(step.name));
        }
        self.index.insert(step.name.clone(), self.steps.len());
        self.steps.push(step);
        Ok(())
    }

    /// Attach a condition to its guard step, gating the given steps
    ///
    /// The guard step, its output and every gated step must already be registered.
    pub fn add_condition<I, S>(&mut self, condition: Condition, gated_steps: I) -> Result<(), DefinitionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let label = condition.describe();

        let guard = self
            .step(&condition.step)
            .ok_or_else(|| DefinitionError::UnknownStepReference {
                step: label.clone(),
                kind: ReferenceKind::Step,
                reference: condition.step.clone(),
            })?;

        if !guard.declares_output(&condition.output) {
            return Err(DefinitionError::UnknownStepReference {
                step: label,
                kind: ReferenceKind::Output,
                reference: condition.output.clone(),
            });
        }

        let mut gated: Vec<String> = Vec::new();
        for name in gated_steps {
            let name = name.into();
            if !self.index.contains_key(&name) {
                return Err(DefinitionError::UnknownStepReference {
                    step: label,
                    kind: ReferenceKind::Step,
                    reference: name,
                });
            }
            if let Some(guard) = self.gated_by.get(&name) {
                return Err(DefinitionError::AlreadyGated {
                    step: name,
                    guard: guard.clone(),
                });
            }
            if !gated.contains(&name) {
                gated.push(name);
            }
        }

        for name in &gated {
            self.gated_by.insert(name.clone(), condition.step.clone());
        }
        self.conditions.push(GatedCondition { condition, gated });

        Ok(())
    }

    /// Get a step by name
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.index.get(name).map(|&i| &self.steps[i])
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn conditions(&self) -> &[GatedCondition] {
        &self.conditions
    }

    pub fn arguments(&self) -> &[ArgumentSpec] {
        &self.arguments
    }

    /// Validate the definition and freeze it into an executable graph
    pub fn compile(&self) -> Result<CompiledWorkflow, DefinitionError> {
        for step in &self.steps {
            for dep in &step.dependencies {
                if !self.index.contains_key(dep) {
                    return Err(DefinitionError::UnknownStepReference {
                        step: step.name.clone(),
                        kind: ReferenceKind::Step,
                        reference: dep.clone(),
                    });
                }
            }
        }

        // Declared dependencies plus an implicit edge from each guard to the steps it gates
        let mut upstream: HashMap<String, Vec<String>> = self
            .steps
            .iter()
            .map(|s| (s.name.clone(), s.dependencies.clone()))
            .collect();
        for gc in &self.conditions {
            for gated in &gc.gated {
                let ups = upstream.entry(gated.clone()).or_default();
                if !ups.contains(&gc.condition.step) {
                    ups.push(gc.condition.step.clone());
                }
            }
        }

        let mut downstream: HashMap<String, Vec<String>> = self
            .steps
            .iter()
            .map(|s| (s.name.clone(), Vec::new()))
            .collect();
        for step in &self.steps {
            for up in &upstream[&step.name] {
                downstream.entry(up.clone()).or_default().push(step.name.clone());
            }
        }

        self.check_cycles(&downstream)?;
        let order = self.topological_order(&upstream, &downstream);

        let ancestors = Self::ancestors(&order, &upstream);
        for step in &self.steps {
            self.check_inputs(step, &ancestors[&step.name])?;
        }

        let mut branch_points: HashMap<String, BranchPoint> = HashMap::new();
        for gc in &self.conditions {
            branch_points
                .entry(gc.condition.step.clone())
                .or_insert_with(|| BranchPoint {
                    step: gc.condition.step.clone(),
                    conditions: Vec::new(),
                })
                .conditions
                .push(gc.clone());
        }

        let steps = order
            .iter()
            .map(|name| self.steps[self.index[name]].clone())
            .collect();

        Ok(CompiledWorkflow::new(
            self.name.clone(),
            self.arguments.clone(),
            steps,
            upstream,
            downstream,
            branch_points,
        ))
    }

    /// Depth-first search for a back edge, reporting the cycle path
    fn check_cycles(&self, downstream: &HashMap<String, Vec<String>>) -> Result<(), DefinitionError> {
        let mut visited = HashSet::new();
        let mut stack: Vec<String> = Vec::new();

        for step in &self.steps {
            if !visited.contains(&step.name) {
                Self::dfs_check(&step.name, downstream, &mut visited, &mut stack)?;
            }
        }

        Ok(())
    }

    fn dfs_check(
        step: &str,
        downstream: &HashMap<String, Vec<String>>,
        visited: &mut HashSet<String>,
        stack: &mut Vec<String>,
    ) -> Result<(), DefinitionError> {
        visited.insert(step.to_string());
        stack.push(step.to_string());

        for next in downstream.get(step).map(|v| v.as_slice()).unwrap_or(&[]) {
            if let Some(pos) = stack.iter().position(|s| s == next) {
                let mut path = stack[pos..].to_vec();
                path.push(next.clone());
                return Err(DefinitionError::CycleDetected { path });
            }
            if !visited.contains(next) {
                Self::dfs_check(next, downstream, visited, stack)?;
            }
        }

        stack.pop();
        Ok(())
    }

    /// Kahn's algorithm; insertion order breaks ties so the order is deterministic
    fn topological_order(
        &self,
        upstream: &HashMap<String, Vec<String>>,
        downstream: &HashMap<String, Vec<String>>,
    ) -> Vec<String> {
        let mut in_degree: HashMap<&str, usize> = self
            .steps
            .iter()
            .map(|s| (s.name.as_str(), upstream[&s.name].len()))
            .collect();

        let mut ready: BTreeSet<usize> = self
            .steps
            .iter()
            .enumerate()
            .filter(|(_, s)| in_degree[s.name.as_str()] == 0)
            .map(|(i, _)| i)
            .collect();

        let mut order = Vec::with_capacity(self.steps.len());
        while let Some(i) = ready.pop_first() {
            let name = &self.steps[i].name;
            order.push(name.clone());
            for next in &downstream[name] {
                if let Some(degree) = in_degree.get_mut(next.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(self.index[next]);
                    }
                }
            }
        }

        order
    }

    /// Transitive upstream set of every step
    fn ancestors(
        order: &[String],
        upstream: &HashMap<String, Vec<String>>,
    ) -> HashMap<String, HashSet<String>> {
        let mut ancestors: HashMap<String, HashSet<String>> = HashMap::new();
        for name in order {
            let mut set = HashSet::new();
            for up in &upstream[name] {
                set.insert(up.clone());
                if let Some(up_ancestors) = ancestors.get(up) {
                    set.extend(up_ancestors.iter().cloned());
                }
            }
            ancestors.insert(name.clone(), set);
        }
        ancestors
    }

    fn check_inputs(&self, step: &Step, ancestors: &HashSet<String>) -> Result<(), DefinitionError> {
        let mut names: Vec<&String> = step.inputs.keys().collect();
        names.sort();

        for input in names {
            let unresolved = |reason: String| DefinitionError::UnresolvedInput {
                step: step.name.clone(),
                input: input.clone(),
                reason,
            };

            match &step.inputs[input] {
                InputBinding::Literal(_) => {}
                InputBinding::Argument(arg) => {
                    if !self.arguments.iter().any(|a| &a.name == arg) {
                        return Err(unresolved(format!("argument '{}' is not declared", arg)));
                    }
                }
                InputBinding::Output { step: source, output } => {
                    let Some(source_step) = self.step(source) else {
                        return Err(unresolved(format!("step '{}' does not exist", source)));
                    };
                    if !ancestors.contains(source) {
                        return Err(unresolved(format!("step '{}' is not upstream", source)));
                    }
                    if !source_step.declares_output(output) {
                        return Err(unresolved(format!(
                            "step '{}' does not declare output '{}'",
                            source, output
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}
