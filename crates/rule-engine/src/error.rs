//! The rule engine's single failure mode (§4.1, §7).

use steep_core::ServiceId;
use thiserror::Error;

/// Workflow/service schema is invalid. Raised once, before any chains are
/// emitted, and never retried (§7 — Validation errors fail the submission
/// at acceptance).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowValidationError {
    #[error("execute-action references unknown service {0}")]
    UnknownService(ServiceId),
    #[error("service {service} has no parameter named {parameter:?}")]
    UnknownParameter { service: ServiceId, parameter: String },
    #[error(
        "binding for parameter {parameter:?} of service {service} has kind {actual:?}, expected {expected:?}"
    )]
    ArgumentKindMismatch {
        service: ServiceId,
        parameter: String,
        expected: steep_model::ArgumentType,
        actual: steep_model::ArgumentType,
    },
    #[error("workflow has no actions")]
    EmptyWorkflow,
}
