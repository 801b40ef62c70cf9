//! Test utilities for flowline scenarios

use async_trait::async_trait;
use flowline::core::config::WorkflowConfig;
use flowline::core::{Inputs, Outputs, RunArguments, RunReport, RunStatus, StepStatus};
use flowline::execution::{CoordinatorConfig, RunCoordinator};
use flowline::platform::{ExecutorError, StepExecutor, StepSubmission};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Compute = Arc<dyn Fn(&Inputs) -> Result<Outputs, String> + Send + Sync>;

#[derive(Clone)]
struct Script {
    compute: Compute,
    delay: Option<Duration>,
}

/// Mock executor with a scripted response per function name
///
/// Unscripted functions echo their inputs. Clones share the call log and the
/// concurrency counters, so keep a clone to inspect after the run.
#[derive(Clone, Default)]
pub struct ScriptedExecutor {
    scripts: HashMap<String, Script>,
    calls: Arc<Mutex<Vec<String>>>,
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

/// Decrements the running counter even when the step task is aborted
struct RunningGuard(Arc<AtomicUsize>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(mut self, function: &str, compute: Compute) -> Self {
        let delay = self.scripts.get(function).and_then(|s| s.delay);
        self.scripts
            .insert(function.to_string(), Script { compute, delay });
        self
    }

    /// Compute outputs from inputs
    pub fn computes<F>(self, function: &str, f: F) -> Self
    where
        F: Fn(&Inputs) -> Result<Outputs, String> + Send + Sync + 'static,
    {
        self.script(function, Arc::new(f))
    }

    /// Always return the given JSON object
    pub fn returns(self, function: &str, outputs: Value) -> Self {
        let outputs: Outputs = match outputs {
            Value::Object(map) => map.into_iter().collect(),
            other => panic!("scripted outputs must be an object, got {}", other),
        };
        self.script(function, Arc::new(move |_| Ok(outputs.clone())))
    }

    /// Always fail with the given message
    pub fn fails(self, function: &str, error: &str) -> Self {
        let error = error.to_string();
        self.script(function, Arc::new(move |_| Err(error.clone())))
    }

    /// Sleep before answering
    pub fn with_delay(mut self, function: &str, millis: u64) -> Self {
        let delay = Some(Duration::from_millis(millis));
        match self.scripts.get_mut(function) {
            Some(script) => script.delay = delay,
            None => {
                self.scripts.insert(
                    function.to_string(),
                    Script {
                        compute: Arc::new(|inputs| Ok(inputs.clone())),
                        delay,
                    },
                );
            }
        }
        self
    }

    /// Steps submitted so far, in submission order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Highest number of steps in flight at once
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StepExecutor for ScriptedExecutor {
    async fn submit(&self, submission: &StepSubmission) -> Result<Outputs, ExecutorError> {
        self.calls.lock().unwrap().push(submission.step.clone());

        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = RunningGuard(self.running.clone());

        let script = self.scripts.get(&submission.function).cloned();
        if let Some(delay) = script.as_ref().and_then(|s| s.delay) {
            tokio::time::sleep(delay).await;
        }

        match script {
            Some(script) => (script.compute)(&submission.inputs).map_err(ExecutorError::Execution),
            None => Ok(submission.inputs.clone()),
        }
    }
}

/// Build run arguments from a JSON object
pub fn args(value: Value) -> RunArguments {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        Value::Null => RunArguments::new(),
        other => panic!("run arguments must be an object, got {}", other),
    }
}

/// Compile a YAML workflow and run it against the executor
pub async fn run_yaml(yaml: &str, executor: ScriptedExecutor, arguments: Value) -> RunReport {
    let config = WorkflowConfig::from_yaml(yaml).unwrap();
    let workflow = Arc::new(config.compile().unwrap());
    let coordinator = RunCoordinator::new(
        executor,
        CoordinatorConfig {
            max_concurrency: config.max_concurrency,
        },
    );
    coordinator.run(workflow, args(arguments)).await
}

pub fn assert_run_succeeded(report: &RunReport) {
    assert_eq!(
        report.status,
        RunStatus::Succeeded,
        "expected run to succeed, errors: {:?}",
        report.errors
    );
}

pub fn assert_run_failed(report: &RunReport) {
    assert_eq!(report.status, RunStatus::Failed, "report: {:#?}", report);
}

pub fn assert_step_status(report: &RunReport, step: &str, expected: StepStatus) {
    assert_eq!(
        report.step_status(step),
        Some(expected),
        "unexpected status for step '{}'",
        step
    );
}

pub fn assert_submission_order(report: &RunReport, expected: &[&str]) {
    assert_eq!(report.submission_order, expected, "unexpected submission order");
}

pub fn assert_output(report: &RunReport, step: &str, output: &str, expected: Value) {
    assert_eq!(
        report.output(step, output),
        Some(&expected),
        "unexpected value for {}.{}",
        step,
        output
    );
}

/// Outputs with a single `value` entry
pub fn value(v: Value) -> Outputs {
    let mut outputs = Outputs::new();
    outputs.insert("value".to_string(), v);
    outputs
}
