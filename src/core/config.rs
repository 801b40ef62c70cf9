//! Workflow configuration from YAML

use crate::core::{
    condition::{ComparisonOperator, Condition},
    graph::CompiledWorkflow,
    step::{InputBinding, Step},
    workflow::WorkflowDefinition,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Top-level workflow configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Workflow name
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Declared run arguments (a null entry has no default)
    #[serde(default)]
    pub arguments: BTreeMap<String, Option<ArgumentConfig>>,

    /// Executable units referenced by steps
    #[serde(default)]
    pub functions: BTreeMap<String, FunctionConfig>,

    /// Workflow steps
    pub steps: Vec<StepConfig>,

    /// Branch conditions, in evaluation order
    #[serde(default)]
    pub conditions: Vec<ConditionConfig>,

    /// Maximum number of steps running at once (unbounded if absent)
    #[serde(default)]
    pub max_concurrency: Option<usize>,
}

/// Run argument declaration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArgumentConfig {
    #[serde(default)]
    pub default: Option<Value>,

    #[serde(default)]
    pub description: Option<String>,
}

/// A function backed by a local command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionConfig {
    /// Program followed by its arguments
    pub command: Vec<String>,

    /// Kill the command after this many seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Extra environment variables
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Working directory
    #[serde(default)]
    pub workdir: Option<String>,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Unique step name
    pub name: String,

    /// Function to run (defaults to the step name)
    #[serde(default)]
    pub function: Option<String>,

    /// Input name -> `{{ args.x }}`, `{{ steps.s.outputs.o }}` or a literal
    #[serde(default)]
    pub inputs: BTreeMap<String, Value>,

    /// Declared output names
    #[serde(default)]
    pub outputs: Vec<String>,

    /// Steps this step depends on
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// Condition configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionConfig {
    /// Guard step
    pub step: String,

    /// Output of the guard step to compare
    pub output: String,

    pub operator: ComparisonOperator,

    /// Value compared against (a regex for `matches`)
    #[serde(default)]
    pub value: Value,

    /// Steps gated by this condition
    #[serde(default)]
    pub run: Vec<String>,
}

impl WorkflowConfig {
    /// Load workflow configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse workflow configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: WorkflowConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration by compiling it
    pub fn validate(&self) -> Result<()> {
        for (name, function) in &self.functions {
            if function.command.is_empty() {
                anyhow::bail!("Function '{}' has an empty command", name);
            }
        }
        if self.max_concurrency == Some(0) {
            anyhow::bail!("max_concurrency must be at least 1");
        }
        self.compile()?;
        Ok(())
    }

    /// Build the workflow definition
    pub fn to_definition(&self) -> Result<WorkflowDefinition> {
        let mut def = WorkflowDefinition::new(self.name.clone());

        for (name, arg) in &self.arguments {
            def.add_argument(name.clone(), arg.as_ref().and_then(|a| a.default.clone()));
        }

        for step_config in &self.steps {
            def.add_step(step_config.to_step())?;
        }

        for cond in &self.conditions {
            let condition = Condition::new(
                cond.step.clone(),
                cond.output.clone(),
                cond.operator,
                cond.value.clone(),
            )?;
            def.add_condition(condition, cond.run.iter().cloned())?;
        }

        Ok(def)
    }

    /// Build and compile the workflow
    pub fn compile(&self) -> Result<CompiledWorkflow> {
        let def = self.to_definition()?;
        def.compile()
            .with_context(|| format!("Failed to compile workflow '{}'", self.name))
    }
}

impl StepConfig {
    pub fn to_step(&self) -> Step {
        let mut step = Step::new(
            self.name.clone(),
            self.function.clone().unwrap_or_else(|| self.name.clone()),
        );
        for (name, value) in &self.inputs {
            step = step.with_input(name.clone(), InputBinding::parse(value.clone()));
        }
        for output in &self.outputs {
            step = step.with_output(output.clone());
        }
        for dep in &self.depends_on {
            step = step.depends_on(dep.clone());
        }
        step
    }
}
