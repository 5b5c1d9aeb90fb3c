//! # Steep Model
//!
//! The data model shared by every core subsystem: variables, executables,
//! process chains, workflows, and submissions (spec §3).

mod executable;
mod process_chain;
mod submission;
mod variable;
mod workflow;

pub use executable::{Argument, ArgumentType, DataType, Executable, Runtime};
pub use process_chain::{ProcessChain, ProcessChainStatus};
pub use submission::{Submission, SubmissionStatus};
pub use variable::{Value, Variable};
pub use workflow::{
    Action, Cardinality, ExecuteAction, ForEachAction, ParameterBinding, ServiceCatalog,
    ServiceDescriptor, ServiceParameter, Workflow,
};
