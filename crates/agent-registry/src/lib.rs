//! # Steep Agent Registry
//!
//! The cluster-wide directory of `LocalAgent`s and the Scheduler's
//! candidate-selection algorithm (§4.3).

mod candidate;
mod error;
mod registry;

pub use candidate::{select, Demand};
pub use error::{AgentRegistryError, Result};
pub use registry::RemoteAgentRegistry;
