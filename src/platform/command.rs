//! Subprocess executor - runs a configured command per function

use crate::core::{config::FunctionConfig, Outputs};
use crate::platform::{ExecutorError, StepExecutor, StepSubmission};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Default command timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 3600;

/// Configuration for one command-backed function
#[derive(Debug, Clone)]
pub struct CommandConfig {
    /// Program to execute
    pub program: String,

    /// Arguments passed to the program
    pub args: Vec<String>,

    /// Timeout for the command in seconds
    pub timeout_secs: u64,

    /// Extra environment variables
    pub env: HashMap<String, String>,

    /// Working directory
    pub workdir: Option<String>,
}

impl CommandConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            env: HashMap::new(),
            workdir: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Build from a YAML function entry (`command` is non-empty after validation)
    pub fn from_function_config(config: &FunctionConfig) -> Self {
        let mut parts = config.command.iter().cloned();
        let program = parts.next().unwrap_or_default();
        Self {
            program,
            args: parts.collect(),
            timeout_secs: config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            env: config.env.clone(),
            workdir: config.workdir.clone(),
        }
    }
}

/// Executes functions as subprocesses
///
/// The resolved inputs are written to stdin as one JSON object; the command
/// must print a JSON object of outputs on stdout (either as the whole output
/// or as its last non-empty line).
#[derive(Debug, Clone, Default)]
pub struct CommandExecutor {
    commands: HashMap<String, CommandConfig>,
}

impl CommandExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, function: impl Into<String>, config: CommandConfig) {
        self.commands.insert(function.into(), config);
    }

    pub fn contains(&self, function: &str) -> bool {
        self.commands.contains_key(function)
    }

    async fn run(&self, config: &CommandConfig, submission: &StepSubmission) -> Result<Outputs, ExecutorError> {
        let payload = serde_json::to_vec(&submission.inputs)
            .map_err(|e| ExecutorError::Internal(format!("Failed to encode inputs: {}", e)))?;

        debug!(
            "Spawning {} for step {} ({} bytes of input)",
            config.program,
            submission.step,
            payload.len()
        );

        let mut command = Command::new(&config.program);
        command
            .args(&config.args)
            .envs(&config.env)
            .env("FLOWLINE_RUN_ID", submission.run_id.to_string())
            .env("FLOWLINE_STEP", &submission.step)
            .env("FLOWLINE_FUNCTION", &submission.function)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &config.workdir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| {
            ExecutorError::Execution(format!("Failed to spawn {}: {}", config.program, e))
        })?;

        // Feed stdin while stdout/stderr drain, all under one deadline
        let stdin = child.stdin.take();
        let step = submission.step.clone();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                // A child that exits without reading is judged by its exit status
                if let Err(e) = stdin.write_all(&payload).await {
                    debug!("Input of step {} not fully consumed: {}", step, e);
                }
            }
        };

        let (_, waited) = timeout(Duration::from_secs(config.timeout_secs), async move {
            tokio::join!(feed, child.wait_with_output())
        })
        .await
        .map_err(|_| {
            warn!("{} timed out after {}s", config.program, config.timeout_secs);
            ExecutorError::Timeout(config.timeout_secs)
        })?;
        let output = waited.map_err(|e| {
            ExecutorError::Internal(format!("Failed to wait for {}: {}", config.program, e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            warn!(
                "{} exited with code {}: {}",
                config.program,
                exit_code,
                stderr.trim()
            );
            return Err(ExecutorError::Execution(format!(
                "{} exited with code {}: {}",
                config.program,
                exit_code,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|e| ExecutorError::InvalidOutput(format!("stdout is not UTF-8: {}", e)))?;

        parse_outputs(&stdout)
    }
}

/// Parse command stdout into outputs
fn parse_outputs(stdout: &str) -> Result<Outputs, ExecutorError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Outputs::new());
    }

    let parsed = serde_json::from_str::<Value>(trimmed).or_else(|_| {
        let last = trimmed.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or_default();
        serde_json::from_str::<Value>(last.trim())
    });

    match parsed {
        Ok(Value::Object(map)) => Ok(map.into_iter().collect()),
        Ok(other) => Err(ExecutorError::InvalidOutput(format!(
            "expected a JSON object, got {}",
            other
        ))),
        Err(e) => Err(ExecutorError::InvalidOutput(e.to_string())),
    }
}

#[async_trait]
impl StepExecutor for CommandExecutor {
    async fn submit(&self, submission: &StepSubmission) -> Result<Outputs, ExecutorError> {
        let config = self
            .commands
            .get(&submission.function)
            .ok_or_else(|| ExecutorError::UnknownFunction(submission.function.clone()))?;
        self.run(config, submission).await
    }
}
