use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentRegistryError {
    #[error("agent {0} is not advertised")]
    UnknownAgent(steep_core::AgentId),
}

pub type Result<T> = std::result::Result<T, AgentRegistryError>;
