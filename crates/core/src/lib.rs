//! # Steep Core
//!
//! Identifiers and capability vocabulary shared by every crate in the
//! Steep workspace. Kept deliberately tiny — crates that need more than
//! ids and capabilities depend on `steep-model` instead.

mod capability;
mod error;
mod id;

pub use capability::CapabilitySet;
pub use error::{CoreError, Result};
pub use id::{
    AgentId, ExecutableId, ProcessChainId, ServiceId, SubmissionId, UuidParseError, VariableId,
};
