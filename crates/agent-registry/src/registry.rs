use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::json;
use steep_core::{AgentId, CapabilitySet};
use steep_eventbus::{addresses, EventBus};
use tracing::{debug, info};

use crate::candidate::{select, Demand};

/// Cluster-wide directory of advertised agents, plus the caller-observed
/// advisory busy state used to filter candidates before every allocation
/// attempt (§4.3). Leasing itself is enforced at the agent, not here — this
/// registry's view of "busy" can be stale between a crash and the next
/// orphan scan, which is expected and tolerated by design.
///
/// Takes the same bus `Arc` every `LocalAgent` registers itself on, so a
/// `tryAllocate` request actually reaches the agent's handler rather than a
/// second, independent bus instance.
pub struct RemoteAgentRegistry {
    directory: DashMap<AgentId, CapabilitySet>,
    busy_until: DashMap<AgentId, Instant>,
    bus: Arc<EventBus>,
}

impl RemoteAgentRegistry {
    #[must_use]
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            directory: DashMap::new(),
            busy_until: DashMap::new(),
            bus,
        }
    }

    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Advertise an agent's capabilities and announce it cluster-wide.
    pub fn announce(&self, id: AgentId, capabilities: CapabilitySet) {
        self.directory.insert(id, capabilities);
        self.bus.publish(addresses::CLUSTER_NODE_ADDED, json!(id.to_string()));
        info!(%id, "agent advertised");
    }

    /// Withdraw an agent, e.g. on graceful shutdown or orphan detection.
    pub fn withdraw(&self, id: AgentId) {
        self.directory.remove(&id);
        self.busy_until.remove(&id);
        self.bus.publish(addresses::CLUSTER_NODE_LEFT, json!(id.to_string()));
        info!(%id, "agent withdrawn");
    }

    /// Whether `id` is currently advertised — used by the controller's
    /// orphan scan to tell a live agent's lease from a crashed one's.
    #[must_use]
    pub fn is_known(&self, id: AgentId) -> bool {
        self.directory.contains_key(&id)
    }

    fn is_busy(&self, id: AgentId) -> bool {
        self.busy_until
            .get(&id)
            .is_some_and(|expires| Instant::now() < *expires)
    }

    /// §4.3 step 1-4: filter busy agents, score demand entries, return the
    /// winning entry's non-busy advertised candidates.
    #[must_use]
    pub fn select_candidates(&self, demand: &[Demand]) -> Vec<(CapabilitySet, AgentId)> {
        let available: Vec<(AgentId, CapabilitySet)> = self
            .directory
            .iter()
            .filter(|entry| !self.is_busy(*entry.key()))
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        select(demand, available.iter().map(|(id, caps)| (*id, caps))).unwrap_or_default()
    }

    /// `tryAllocate` (§4.3): request/reply with the agent; on a positive
    /// reply, mark it busy for `busy_timeout` in our advisory bookkeeping.
    /// A timeout or negative reply is reported as "no agent" — `false`,
    /// never an error the caller needs to distinguish from "already busy".
    pub async fn try_allocate(
        &self,
        id: AgentId,
        busy_timeout: Duration,
        request_timeout: Duration,
    ) -> bool {
        let address = addresses::agent(id);
        let reply = self
            .bus
            .request(&address, json!({"action": "allocate"}), request_timeout)
            .await;

        match reply {
            Ok(value) if value.get("ok").and_then(serde_json::Value::as_bool) == Some(true) => {
                self.busy_until.insert(id, Instant::now() + busy_timeout);
                debug!(%id, "allocation granted");
                true
            }
            Ok(_) => {
                debug!(%id, "allocation refused, agent already leased");
                false
            }
            Err(error) => {
                debug!(%id, %error, "allocation request failed");
                false
            }
        }
    }

    /// Explicit deallocation on normal chain completion (§4.3).
    pub fn release(&self, id: AgentId) {
        self.busy_until.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newly_announced_agent_is_not_busy() {
        let registry = RemoteAgentRegistry::new(Arc::new(EventBus::new()));
        let id = AgentId::v4();
        registry.announce(id, CapabilitySet::from_iter(["docker"]));
        assert!(!registry.is_busy(id));
    }

    #[test]
    fn withdrawn_agent_is_no_longer_known() {
        let registry = RemoteAgentRegistry::new(Arc::new(EventBus::new()));
        let id = AgentId::v4();
        registry.announce(id, CapabilitySet::new());
        assert!(registry.is_known(id));
        registry.withdraw(id);
        assert!(!registry.is_known(id));
    }

    #[test]
    fn select_candidates_excludes_busy_agents() {
        let registry = RemoteAgentRegistry::new(Arc::new(EventBus::new()));
        let a = AgentId::v4();
        let b = AgentId::v4();
        let docker = CapabilitySet::from_iter(["docker"]);
        registry.announce(a, docker.clone());
        registry.announce(b, docker.clone());
        registry.busy_until.insert(a, Instant::now() + Duration::from_secs(60));

        let demand = vec![Demand {
            required_capabilities: docker,
            pending_count: 1,
        }];
        let candidates = registry.select_candidates(&demand);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].1, b);
    }

    #[tokio::test]
    async fn try_allocate_returns_false_with_no_agent_listening() {
        let registry = RemoteAgentRegistry::new(Arc::new(EventBus::new()));
        let id = AgentId::v4();
        registry.announce(id, CapabilitySet::new());
        let ok = registry
            .try_allocate(id, Duration::from_secs(30), Duration::from_millis(20))
            .await;
        assert!(!ok);
    }

    #[tokio::test]
    async fn try_allocate_marks_agent_busy_on_positive_reply() {
        let registry = RemoteAgentRegistry::new(Arc::new(EventBus::new()));
        let id = AgentId::v4();
        registry.announce(id, CapabilitySet::new());

        let mut rx = registry.bus().register(&addresses::agent(id), 4).unwrap();
        tokio::spawn(async move {
            let req = rx.recv().await.unwrap();
            req.reply(json!({"ok": true}));
        });

        let ok = registry
            .try_allocate(id, Duration::from_secs(30), Duration::from_secs(1))
            .await;
        assert!(ok);
        assert!(registry.is_busy(id));

        registry.release(id);
        assert!(!registry.is_busy(id));
    }
}
