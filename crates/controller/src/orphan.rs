//! Orphan scan (§4.6): RUNNING chains whose owner vanished from the
//! cluster are reclaimed for a later scheduler tick.

use steep_agent_registry::RemoteAgentRegistry;
use steep_core::AgentId;
use steep_model::ProcessChainStatus;
use steep_registry::SubmissionRegistry;
use tracing::{info, warn};

use crate::error::Result;

/// Reset every RUNNING chain whose owner isn't currently advertised back
/// to REGISTERED via CAS, so a peer's crash can never strand work.
pub async fn scan(registry: &dyn SubmissionRegistry, agents: &RemoteAgentRegistry) -> Result<usize> {
    let running = registry.find_by_status(ProcessChainStatus::Running).await?;
    let mut reclaimed = 0;

    for chain in running {
        let owner = chain.owner.clone();
        let alive = owner
            .as_deref()
            .and_then(|owner| owner.parse::<AgentId>().ok())
            .is_some_and(|id| agents.is_known(id));

        if alive {
            continue;
        }

        match registry
            .set_status_cas(chain.id, ProcessChainStatus::Running, ProcessChainStatus::Registered)
            .await
        {
            Ok(true) => {
                reclaimed += 1;
                warn!(chain = %chain.id, owner = ?owner, "reclaimed orphaned process chain");
            }
            Ok(false) => {
                // Owner finished between our read and the CAS; not an orphan.
            }
            Err(error) => return Err(error.into()),
        }
    }

    if reclaimed > 0 {
        info!(reclaimed, "orphan scan reclaimed process chains");
    }
    Ok(reclaimed)
}
