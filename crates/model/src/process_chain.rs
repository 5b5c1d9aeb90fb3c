//! Process chains: the unit of scheduling.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use steep_core::{CapabilitySet, ProcessChainId, SubmissionId, VariableId};

use crate::executable::Executable;
use crate::variable::Value;

/// Lifecycle of a process chain (§3).
///
/// `REGISTERED` is the only state the Scheduler picks from; transition to
/// `RUNNING` records the owning agent's address (see
/// [`ProcessChain::owner`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessChainStatus {
    Registered,
    Running,
    Success,
    Error,
    Cancelled,
}

impl ProcessChainStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Error | Self::Cancelled)
    }
}

/// A linear group of executables sharing data dependencies (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessChain {
    pub id: ProcessChainId,
    pub submission_id: SubmissionId,
    pub executables: Vec<Executable>,
    /// Concrete values for every `INPUT`/`ARGUMENT` variable referenced by
    /// this chain's executables, snapshotted at decompose time — by the
    /// time a chain is flushed, every value it needs is already known.
    pub bindings: HashMap<VariableId, Value>,
    pub required_capabilities: CapabilitySet,
    pub status: ProcessChainStatus,
    /// Address of the agent currently (or most recently) holding the
    /// `RUNNING` claim, set on the `Registered -> Running` transition.
    pub owner: Option<String>,
    pub start_time: Option<chrono::DateTime<chrono::Utc>>,
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    pub error_message: Option<String>,
    /// Strictly increasing insertion sequence within a submission; the
    /// registry's `fetchNext` dequeues in this order (§4.2, §5).
    pub sequence: u64,
}

impl ProcessChain {
    #[must_use]
    pub fn len(&self) -> usize {
        self.executables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.executables.is_empty()
    }
}
