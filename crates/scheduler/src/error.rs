use thiserror::Error;

/// Failures that stop a scheduler tick from completing; individual
/// dispatch/allocation misses are not errors (§7 "Allocation miss — no
/// agent available. Not an error; chain remains REGISTERED").
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("registry operation failed: {0}")]
    Registry(#[from] steep_registry::RegistryError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
