//! Error type for [`crate::LocalAgent::execute`] (§4.4).

use thiserror::Error;

/// Failure of a single executable or an entire chain run.
///
/// Only two variants ever cross the executor's public boundary
/// (`execute(chain) -> ... or raises ExecutionError ... or Cancelled`);
/// `exit_code` is `None` when the failure never reached a process exit
/// (I/O error enumerating outputs, mkdir failure).
#[derive(Debug, Clone, Error)]
pub enum ExecutorError {
    #[error("{message}")]
    ExecutionError {
        message: String,
        last_output: Option<String>,
        exit_code: Option<i32>,
    },
    #[error("cancelled")]
    Cancelled,
}

impl ExecutorError {
    /// The caller-classified error-kind tag passed to
    /// [`steep_resilience::RetryPolicy::is_retryable`] (§4.4 step 4).
    ///
    /// `Cancelled` is never retryable (§4.4: "Not subject to retry");
    /// exit-code failures are tagged `"nonzero_exit"`, I/O failures
    /// `"io"`.
    #[must_use]
    pub fn retry_kind(&self) -> &'static str {
        match self {
            ExecutorError::ExecutionError { exit_code: Some(_), .. } => "nonzero_exit",
            ExecutorError::ExecutionError { exit_code: None, .. } => "io",
            ExecutorError::Cancelled => "cancelled",
        }
    }
}

pub type Result<T> = std::result::Result<T, ExecutorError>;
