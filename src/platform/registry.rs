//! In-process function registry

use crate::core::{Inputs, Outputs};
use crate::platform::{ExecutorError, StepExecutor, StepSubmission};
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Outputs, ExecutorError>> + Send>>;

type Handler = Arc<dyn Fn(Inputs) -> HandlerFuture + Send + Sync>;

/// Functions executed inside the current process, looked up by name
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    handlers: HashMap<String, Handler>,
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `identity` function (outputs = inputs)
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_sync("identity", |inputs| Ok(inputs));
        registry
    }

    /// Register an async handler
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(Inputs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Outputs, ExecutorError>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |inputs: Inputs| -> HandlerFuture { Box::pin(handler(inputs)) });
        self.handlers.insert(name.into(), handler);
    }

    /// Register a blocking-free synchronous handler
    pub fn register_sync<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(Inputs) -> Result<Outputs, String> + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        self.register(name, move |inputs| {
            let handler = handler.clone();
            async move { handler(inputs).map_err(ExecutorError::Execution) }
        });
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered function names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }
}

#[async_trait]
impl StepExecutor for FunctionRegistry {
    async fn submit(&self, submission: &StepSubmission) -> Result<Outputs, ExecutorError> {
        let handler = self
            .handlers
            .get(&submission.function)
            .ok_or_else(|| ExecutorError::UnknownFunction(submission.function.clone()))?;

        debug!(
            "Running function {} for step {}",
            submission.function, submission.step
        );
        handler(submission.inputs.clone()).await
    }
}
