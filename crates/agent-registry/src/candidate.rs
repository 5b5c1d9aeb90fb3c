//! Candidate selection (§4.3).

use steep_core::{AgentId, CapabilitySet};

/// One `(requiredCapabilities, pendingCount)` demand entry from the
/// Scheduler.
#[derive(Debug, Clone)]
pub struct Demand {
    pub required_capabilities: CapabilitySet,
    pub pending_count: usize,
}

/// Pick the single best demand entry and return the non-busy advertised
/// agents that satisfy it.
///
/// Scoring (§4.3): maximize `matching_agents * pending_count`; ties broken
/// by higher `pending_count`, then by lexicographic capability key. Returns
/// `None` if no demand entry has any matching agent.
pub fn select<'a>(
    demand: &[Demand],
    available: impl Iterator<Item = (AgentId, &'a CapabilitySet)> + Clone,
) -> Option<Vec<(CapabilitySet, AgentId)>> {
    let mut best: Option<(&Demand, usize)> = None;

    for entry in demand {
        let matching = available
            .clone()
            .filter(|(_, caps)| caps.satisfies(&entry.required_capabilities))
            .count();
        if matching == 0 {
            continue;
        }
        best = match best {
            None => Some((entry, matching)),
            Some((current, current_matching)) => {
                let current_score = current_matching * current.pending_count;
                let candidate_score = matching * entry.pending_count;
                let better = match candidate_score.cmp(&current_score) {
                    std::cmp::Ordering::Greater => true,
                    std::cmp::Ordering::Less => false,
                    std::cmp::Ordering::Equal => match entry.pending_count.cmp(&current.pending_count) {
                        std::cmp::Ordering::Greater => true,
                        std::cmp::Ordering::Less => false,
                        std::cmp::Ordering::Equal => {
                            entry.required_capabilities.key() < current.required_capabilities.key()
                        }
                    },
                };
                if better {
                    Some((entry, matching))
                } else {
                    Some((current, current_matching))
                }
            }
        };
    }

    let (winner, _) = best?;
    let candidates = available
        .filter(|(_, caps)| caps.satisfies(&winner.required_capabilities))
        .map(|(id, caps)| (caps.clone(), id))
        .collect();
    Some(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_entry_with_largest_match_times_pending_product() {
        let a = AgentId::v4();
        let b = AgentId::v4();
        let c = AgentId::v4();
        let docker = CapabilitySet::from_iter(["docker"]);
        let gpu = CapabilitySet::from_iter(["gpu"]);
        let agents = [(a, &docker), (b, &docker), (c, &gpu)];

        let demand = vec![
            Demand {
                required_capabilities: docker.clone(),
                pending_count: 1,
            },
            Demand {
                required_capabilities: gpu.clone(),
                pending_count: 10,
            },
        ];

        // docker: 2 matches * 1 pending = 2; gpu: 1 match * 10 pending = 10.
        let winners = select(&demand, agents.into_iter()).unwrap();
        assert_eq!(winners, vec![(gpu.clone(), c)]);
    }

    #[test]
    fn ties_break_by_higher_pending_count_then_capability_key() {
        let a = AgentId::v4();
        let docker = CapabilitySet::from_iter(["docker"]);
        let gpu = CapabilitySet::from_iter(["gpu"]);
        let agents = [(a, &docker)];

        // Both entries score 0 matches for gpu (no agent), 1 match * 5 for
        // docker — only docker has a match, so it trivially wins.
        let demand = vec![
            Demand { required_capabilities: gpu, pending_count: 100 },
            Demand { required_capabilities: docker.clone(), pending_count: 5 },
        ];
        let winners = select(&demand, agents.into_iter()).unwrap();
        assert_eq!(winners, vec![(docker, a)]);
    }

    #[test]
    fn no_matching_agent_returns_none() {
        let a = AgentId::v4();
        let docker = CapabilitySet::from_iter(["docker"]);
        let gpu = CapabilitySet::from_iter(["gpu"]);
        let agents = [(a, &docker)];
        let demand = vec![Demand {
            required_capabilities: gpu,
            pending_count: 1,
        }];
        assert!(select(&demand, agents.into_iter()).is_none());
    }
}
