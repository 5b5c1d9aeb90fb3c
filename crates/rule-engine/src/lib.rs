//! # Steep Rule Engine
//!
//! Turns a [`Workflow`](steep_model::Workflow) plus the values known so far
//! into executable [`ProcessChain`](steep_model::ProcessChain)s, one call
//! at a time, resumable via [`ExecutionState`] (§4.1).

mod decompose;
mod error;
mod state;
mod validate;

pub use decompose::{decompose, DecomposeOutcome};
pub use error::WorkflowValidationError;
pub use state::{ExecutionState, ForEachWatch, KnownOutputs};
pub use validate::validate;
