//! The rule engine's resumable progress snapshot (§3 `executionState`).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use steep_core::VariableId;
use steep_model::{Action, Value};

/// Values known so far, fed in by the caller (controller) and grown across
/// calls as process chains complete (§4.1 Inputs).
pub type KnownOutputs = HashMap<VariableId, Value>;

/// A `for-each` that has already been unrolled into chains but whose
/// `output_collection` cannot yet be bound because not every iteration's
/// output is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForEachWatch {
    pub output_collection: VariableId,
    /// Per-iteration output variable ids, in submission order.
    pub per_iteration_outputs: Vec<VariableId>,
}

/// Resumable decomposition state (§3: "opaque snapshot of the rule
/// engine's progress").
///
/// `pending` doubles as both the frontier and the deferred list (§4.1
/// steps 1 and 3): every call walks it left to right; actions that become
/// producible are removed and turned into chains, actions that are not yet
/// producible (inputs unknown, or a `for-each` whose input collection is
/// unknown) stay in place for the next call, preserving workflow order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionState {
    pub pending: Vec<Action>,
    pub watching: Vec<ForEachWatch>,
    /// Monotonic counter used to mint deterministic variable ids for
    /// `for-each` iteration copies (§8 invariant 4: "same ids modulo a
    /// fresh-id seed" — fixing this counter's starting value fixes the
    /// ids exactly).
    pub fresh_id_seed: u64,
}

impl ExecutionState {
    #[must_use]
    pub fn initial(workflow: &steep_model::Workflow) -> Self {
        Self {
            pending: workflow.actions.clone(),
            watching: Vec::new(),
            fresh_id_seed: 0,
        }
    }

    pub(crate) fn next_fresh_id(&mut self) -> VariableId {
        let seed = self.fresh_id_seed;
        self.fresh_id_seed += 1;
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&seed.to_be_bytes());
        // Tag byte distinguishes engine-minted ids from user-authored ones
        // in debugging output without affecting equality/ordering.
        bytes[8] = 0xFE;
        VariableId::from_bytes(bytes)
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.pending.is_empty() && self.watching.is_empty()
    }
}
