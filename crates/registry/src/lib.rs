//! # Steep Registry
//!
//! The durable store contract for submissions and process chains (§4.2),
//! plus an in-memory implementation for tests and single-node runs.

mod error;
mod memory;
mod traits;

pub use error::{RegistryError, Result};
pub use memory::InMemorySubmissionRegistry;
pub use traits::{ProcessChainStore, SubmissionRegistry, SubmissionStore};
