//! Compiled workflow graph

use crate::core::{condition::Condition, step::Step};
use serde_json::Value;
use std::collections::HashMap;

/// A declared run argument
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentSpec {
    pub name: String,
    pub default: Option<Value>,
}

/// A condition together with the steps it gates
#[derive(Debug, Clone, PartialEq)]
pub struct GatedCondition {
    pub condition: Condition,
    pub gated: Vec<String>,
}

/// A guard step and its mutually exclusive conditions, in declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct BranchPoint {
    pub step: String,
    pub conditions: Vec<GatedCondition>,
}

impl BranchPoint {
    /// Every step gated by any condition of this branch point
    pub fn gated_steps(&self) -> impl Iterator<Item = &String> {
        self.conditions.iter().flat_map(|c| c.gated.iter())
    }
}

/// An immutable, validated workflow ready for execution
///
/// Steps are stored in topological order. The graph is shared read-only
/// across runs.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledWorkflow {
    name: String,
    arguments: Vec<ArgumentSpec>,
    steps: Vec<Step>,
    index: HashMap<String, usize>,
    /// step -> upstream steps (declared and implicit guard edges)
    upstream: HashMap<String, Vec<String>>,
    /// step -> downstream steps
    downstream: HashMap<String, Vec<String>>,
    /// guard step -> branch point
    branch_points: HashMap<String, BranchPoint>,
    /// gated step -> guard step
    gates: HashMap<String, String>,
}

impl CompiledWorkflow {
    pub(crate) fn new(
        name: String,
        arguments: Vec<ArgumentSpec>,
        steps: Vec<Step>,
        upstream: HashMap<String, Vec<String>>,
        downstream: HashMap<String, Vec<String>>,
        branch_points: HashMap<String, BranchPoint>,
    ) -> Self {
        let index = steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.clone(), i))
            .collect();

        let gates = branch_points
            .values()
            .flat_map(|bp| bp.gated_steps().map(move |g| (g.clone(), bp.step.clone())))
            .collect();

        Self {
            name,
            arguments,
            steps,
            index,
            upstream,
            downstream,
            branch_points,
            gates,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &[ArgumentSpec] {
        &self.arguments
    }

    /// Steps in topological order
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step(&self, name: &str) -> Option<&Step> {
        self.index.get(name).map(|&i| &self.steps[i])
    }

    /// Step names in topological order
    pub fn execution_order(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// Position of a step in the topological order
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Upstream steps of a step, including its guard
    pub fn upstream(&self, name: &str) -> &[String] {
        self.upstream.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn downstream(&self, name: &str) -> &[String] {
        self.downstream.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Steps with no upstream dependencies
    pub fn entry_steps(&self) -> Vec<&Step> {
        self.steps
            .iter()
            .filter(|s| self.upstream(&s.name).is_empty())
            .collect()
    }

    /// Check if a step has more than one upstream
    pub fn is_join_point(&self, name: &str) -> bool {
        self.upstream(name).len() > 1
    }

    pub fn branch_point(&self, guard: &str) -> Option<&BranchPoint> {
        self.branch_points.get(guard)
    }

    /// Branch points in topological order of their guard steps
    pub fn branch_points(&self) -> Vec<&BranchPoint> {
        self.steps
            .iter()
            .filter_map(|s| self.branch_points.get(&s.name))
            .collect()
    }

    /// The guard step gating this step, if any
    pub fn guard_of(&self, name: &str) -> Option<&str> {
        self.gates.get(name).map(|s| s.as_str())
    }
}
