//! Gate execution error types.
//!
//! These distinguish "the check could not run" from "the check ran and
//! failed"; the latter is never an error, it is a `GateResult` with
//! `passed = false`.

use thiserror::Error;

/// Gate execution errors
#[derive(Debug, Error)]
pub enum GateError {
    /// The gate's hard deadline expired
    #[error("timeout exceeded")]
    Timeout,

    /// Execution was cancelled cooperatively (run aborted)
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// The check itself could not run
    #[error("gate execution failed: {0}")]
    ExecutionFailed(String),

    /// A required secret could not be resolved
    #[error("secret resolution failed: {0}")]
    Secret(#[from] crate::secrets::SecretError),
}

/// Result type for gate operations
pub type Result<T> = std::result::Result<T, GateError>;
