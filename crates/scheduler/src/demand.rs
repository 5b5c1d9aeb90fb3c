//! §4.5 step 1: group REGISTERED chains by required capability.

use std::collections::HashMap;

use steep_agent_registry::Demand;
use steep_model::ProcessChain;

#[must_use]
pub fn group_by_capability(chains: &[ProcessChain]) -> Vec<Demand> {
    let mut counts: HashMap<String, Demand> = HashMap::new();
    for chain in chains {
        counts
            .entry(chain.required_capabilities.key())
            .or_insert_with(|| Demand {
                required_capabilities: chain.required_capabilities.clone(),
                pending_count: 0,
            })
            .pending_count += 1;
    }
    counts.into_values().collect()
}

#[cfg(test)]
mod tests {
    use steep_core::{CapabilitySet, ProcessChainId, SubmissionId};
    use steep_model::ProcessChainStatus;

    use super::*;

    fn chain(capabilities: CapabilitySet) -> ProcessChain {
        ProcessChain {
            id: ProcessChainId::v4(),
            submission_id: SubmissionId::v4(),
            executables: vec![],
            bindings: HashMap::new(),
            required_capabilities: capabilities,
            status: ProcessChainStatus::Registered,
            owner: None,
            start_time: None,
            end_time: None,
            error_message: None,
            sequence: 0,
        }
    }

    #[test]
    fn groups_and_counts_by_capability_key() {
        let docker = CapabilitySet::from_iter(["docker"]);
        let gpu = CapabilitySet::from_iter(["gpu"]);
        let chains = vec![chain(docker.clone()), chain(docker.clone()), chain(gpu.clone())];

        let demand = group_by_capability(&chains);
        let docker_entry = demand.iter().find(|d| d.required_capabilities == docker).unwrap();
        let gpu_entry = demand.iter().find(|d| d.required_capabilities == gpu).unwrap();
        assert_eq!(docker_entry.pending_count, 2);
        assert_eq!(gpu_entry.pending_count, 1);
    }

    #[test]
    fn empty_input_yields_no_demand() {
        assert!(group_by_capability(&[]).is_empty());
    }
}
