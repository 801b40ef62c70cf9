//! Step domain model

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// Named values produced by a step, keyed by declared output name
pub type Outputs = HashMap<String, Value>;

/// Named values passed to a step, keyed by input name
pub type Inputs = HashMap<String, Value>;

/// Where a step input gets its value from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputBinding {
    /// A run argument
    Argument(String),
    /// A named output of an upstream step
    Output { step: String, output: String },
    /// A fixed value
    Literal(Value),
}

fn reference_regex() -> &'static Regex {
    static REFERENCE: OnceLock<Regex> = OnceLock::new();
    REFERENCE.get_or_init(|| {
        Regex::new(r"^\{\{\s*(?:args\.([A-Za-z0-9_\-]+)|steps\.([A-Za-z0-9_\-]+)\.outputs\.([A-Za-z0-9_\-]+))\s*\}\}$")
            .expect("reference pattern is valid")
    })
}

impl InputBinding {
    /// Parse a configured input value
    ///
    /// `{{ args.<name> }}` binds a run argument, `{{ steps.<step>.outputs.<name> }}`
    /// binds an upstream output, anything else is a literal.
    pub fn parse(value: Value) -> Self {
        if let Value::String(text) = &value {
            if let Some(caps) = reference_regex().captures(text.trim()) {
                if let Some(arg) = caps.get(1) {
                    return InputBinding::Argument(arg.as_str().to_string());
                }
                if let (Some(step), Some(output)) = (caps.get(2), caps.get(3)) {
                    return InputBinding::Output {
                        step: step.as_str().to_string(),
                        output: output.as_str().to_string(),
                    };
                }
            }
        }
        InputBinding::Literal(value)
    }

    /// Upstream step this binding reads from, if any
    pub fn upstream_step(&self) -> Option<&str> {
        match self {
            InputBinding::Output { step, .. } => Some(step),
            _ => None,
        }
    }
}

/// A single step in a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Unique step name
    pub name: String,

    /// The executable unit this step runs
    pub function: String,

    /// Input name -> binding
    pub inputs: HashMap<String, InputBinding>,

    /// Declared output names, in declaration order
    pub outputs: Vec<String>,

    /// Names of steps this step depends on
    pub dependencies: Vec<String>,
}

impl Step {
    pub fn new(name: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            function: function.into(),
            inputs: HashMap::new(),
            outputs: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_input(mut self, name: impl Into<String>, binding: InputBinding) -> Self {
        self.inputs.insert(name.into(), binding);
        self
    }

    /// Bind an input to a run argument
    pub fn with_argument_input(self, name: impl Into<String>, argument: impl Into<String>) -> Self {
        self.with_input(name, InputBinding::Argument(argument.into()))
    }

    /// Bind an input to an upstream step output
    pub fn with_output_input(
        self,
        name: impl Into<String>,
        step: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        self.with_input(
            name,
            InputBinding::Output {
                step: step.into(),
                output: output.into(),
            },
        )
    }

    pub fn with_output(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.outputs.contains(&name) {
            self.outputs.push(name);
        }
        self
    }

    pub fn depends_on(mut self, step: impl Into<String>) -> Self {
        let step = step.into();
        if !self.dependencies.contains(&step) {
            self.dependencies.push(step);
        }
        self
    }

    /// Whether the step declares the given output
    pub fn declares_output(&self, output: &str) -> bool {
        self.outputs.iter().any(|o| o == output)
    }

    /// Check if all dependencies are in the given set
    pub fn dependencies_met(&self, terminal_steps: &HashSet<String>) -> bool {
        self.dependencies.iter().all(|dep| terminal_steps.contains(dep))
    }

    /// Keep only declared outputs, reporting the first missing one
    pub fn collect_outputs(&self, mut produced: Outputs) -> Result<Outputs, String> {
        let mut outputs = Outputs::new();
        for name in &self.outputs {
            match produced.remove(name) {
                Some(value) => {
                    outputs.insert(name.clone(), value);
                }
                None => return Err(format!("step did not produce declared output '{}'", name)),
            }
        }
        Ok(outputs)
    }
}
