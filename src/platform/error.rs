//! Step executor error types

use thiserror::Error;

/// Error types for step execution
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Invalid output: {0}")]
    InvalidOutput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
