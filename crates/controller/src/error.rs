use thiserror::Error;

/// Failures that abort one controller pass; an individual submission
/// driver logs and gives up its own work rather than propagating here.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("registry operation failed: {0}")]
    Registry(#[from] steep_registry::RegistryError),
    #[error("workflow validation failed: {0}")]
    Validation(#[from] steep_rule_engine::WorkflowValidationError),
}

pub type Result<T> = std::result::Result<T, ControllerError>;
