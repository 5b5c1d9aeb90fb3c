//! The controller itself: submission pickup, orphan scan, cancellation
//! (§4.6, §5 Cancellation).

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use steep_agent_registry::RemoteAgentRegistry;
use steep_core::{AgentId, SubmissionId};
use steep_eventbus::{addresses, EventBus};
use steep_model::{ProcessChainStatus, ServiceCatalog, SubmissionStatus};
use steep_registry::{SubmissionRegistry, SubmissionStore};
use tracing::warn;

use crate::driver;
use crate::error::Result;
use crate::orphan;

#[derive(Debug, Clone, Copy)]
pub struct ControllerOptions {
    pub lookup_interval: Duration,
    pub lookup_orphans_interval: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            lookup_interval: Duration::from_secs(2),
            lookup_orphans_interval: Duration::from_secs(5 * 60),
        }
    }
}

/// Drives every submission's lifecycle and reclaims crashed agents' work
/// (§4.6). One `drive` task per RUNNING submission; the controller itself
/// only picks work up and scans for orphans.
pub struct Controller {
    registry: Arc<dyn SubmissionRegistry>,
    agents: Arc<RemoteAgentRegistry>,
    bus: Arc<EventBus>,
    catalog: Arc<ServiceCatalog>,
    options: ControllerOptions,
}

impl Controller {
    #[must_use]
    pub fn new(
        registry: Arc<dyn SubmissionRegistry>,
        agents: Arc<RemoteAgentRegistry>,
        bus: Arc<EventBus>,
        catalog: Arc<ServiceCatalog>,
        options: ControllerOptions,
    ) -> Self {
        Self { registry, agents, bus, catalog, options }
    }

    /// Runs the submission-pickup loop and the orphan-scan loop
    /// concurrently until the task is dropped or aborted.
    pub async fn run(self: Arc<Self>) {
        let submissions = Arc::clone(&self);
        let orphans = Arc::clone(&self);
        tokio::join!(submissions.submission_loop(), orphans.orphan_loop());
    }

    async fn submission_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.options.lookup_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(error) = self.pick_up_once().await {
                warn!(%error, "submission pickup failed, retrying next tick");
            }
        }
    }

    /// Claims every ACCEPTED submission currently available and spawns a
    /// driver task per submission.
    async fn pick_up_once(&self) -> Result<()> {
        loop {
            let claimed = self
                .registry
                .fetch_next(SubmissionStatus::Accepted, SubmissionStatus::Running)
                .await?;
            let Some(mut submission) = claimed else {
                return Ok(());
            };
            self.registry
                .set_start_time(submission.id, chrono::Utc::now())
                .await?;
            submission.start_time = Some(chrono::Utc::now());

            let registry = Arc::clone(&self.registry);
            let bus = Arc::clone(&self.bus);
            let catalog = Arc::clone(&self.catalog);
            tokio::spawn(async move {
                driver::drive(registry, bus, catalog, submission).await;
            });
        }
    }

    async fn orphan_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.options.lookup_orphans_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(error) = orphan::scan(self.registry.as_ref(), self.agents.as_ref()).await {
                warn!(%error, "orphan scan failed, retrying next interval");
            }
        }
    }

    /// §5 Cancellation: atomically mark CANCELLED, bulk-flip every
    /// still-REGISTERED chain to CANCELLED, and interrupt every RUNNING
    /// chain's owning agent.
    pub async fn cancel_submission(&self, id: SubmissionId) -> Result<()> {
        SubmissionStore::set_status(self.registry.as_ref(), id, SubmissionStatus::Cancelled).await?;
        self.registry
            .set_all_status_by_submission(id, ProcessChainStatus::Registered, ProcessChainStatus::Cancelled)
            .await?;

        let chains = self.registry.find_by_submission_id(id).await?;
        for chain in chains.into_iter().filter(|c| c.status == ProcessChainStatus::Running) {
            let Some(agent_id) = chain.owner.as_deref().and_then(|o| o.parse::<AgentId>().ok()) else {
                continue;
            };
            let payload = json!({ "action": "cancel", "chainId": chain.id.to_string() });
            if let Err(error) = self.bus.request(&addresses::agent(agent_id), payload, Duration::from_secs(5)).await {
                warn!(chain = %chain.id, %agent_id, %error, "cancel request failed, relying on orphan scan");
            }
        }

        SubmissionStore::set_end_time(self.registry.as_ref(), id, chrono::Utc::now()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use steep_core::{CapabilitySet, ProcessChainId};
    use steep_model::{ProcessChain, Submission, Workflow};
    use steep_registry::InMemorySubmissionRegistry;

    use super::*;

    fn chain(submission_id: SubmissionId, status: ProcessChainStatus, owner: Option<String>) -> ProcessChain {
        ProcessChain {
            id: ProcessChainId::v4(),
            submission_id,
            executables: vec![],
            bindings: HashMap::new(),
            required_capabilities: CapabilitySet::new(),
            status,
            owner,
            start_time: None,
            end_time: None,
            error_message: None,
            sequence: 0,
        }
    }

    fn controller() -> (Arc<Controller>, Arc<dyn SubmissionRegistry>) {
        let registry: Arc<dyn SubmissionRegistry> = Arc::new(InMemorySubmissionRegistry::new());
        let bus = Arc::new(EventBus::new());
        let agents = Arc::new(RemoteAgentRegistry::new(Arc::clone(&bus)));
        let catalog = Arc::new(ServiceCatalog::new());
        let controller = Arc::new(Controller::new(
            Arc::clone(&registry),
            agents,
            bus,
            catalog,
            ControllerOptions::default(),
        ));
        (controller, registry)
    }

    #[tokio::test]
    async fn pick_up_once_claims_accepted_submissions_and_runs_them_to_completion() {
        let (controller, registry) = controller();
        let submission = Submission::new(SubmissionId::v4(), Workflow { actions: vec![] });
        let id = submission.id;
        registry.add(submission).await.unwrap();

        controller.pick_up_once().await.unwrap();
        // The driver task runs on a spawned task; give it a beat.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let done = registry.find_by_id(id).await.unwrap();
        assert_eq!(done.status, SubmissionStatus::Success);
    }

    #[tokio::test]
    async fn cancel_submission_flips_registered_chains_and_sets_status() {
        let (controller, registry) = controller();
        let submission = Submission::new(SubmissionId::v4(), Workflow { actions: vec![] });
        let id = submission.id;
        registry.add(submission).await.unwrap();
        registry.set_status(id, SubmissionStatus::Running).await.unwrap();
        registry
            .add_many(id, vec![chain(id, ProcessChainStatus::Registered, None)])
            .await
            .unwrap();

        controller.cancel_submission(id).await.unwrap();

        let done = registry.find_by_id(id).await.unwrap();
        assert_eq!(done.status, SubmissionStatus::Cancelled);
        let cancelled = registry.find_by_status(ProcessChainStatus::Cancelled).await.unwrap();
        assert_eq!(cancelled.len(), 1);
    }
}
