//! The dispatch loop itself (§4.5).

use std::sync::Arc;
use std::time::Duration;

use steep_agent_registry::RemoteAgentRegistry;
use steep_eventbus::addresses;
use steep_model::ProcessChainStatus;
use steep_registry::SubmissionRegistry;
use tracing::warn;

use crate::demand;
use crate::dispatch;
use crate::error::Result;

/// Tuning knobs, mirroring `steep-config`'s `SchedulerConfig`/`AgentConfig`
/// without this crate depending on the config crate directly.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerOptions {
    pub tick_interval: Duration,
    pub busy_timeout: Duration,
    pub allocate_timeout: Duration,
    pub dispatch_timeout: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(20),
            busy_timeout: Duration::from_secs(30),
            allocate_timeout: Duration::from_secs(5),
            dispatch_timeout: Duration::from_secs(3600),
        }
    }
}

/// Dispatches REGISTERED process chains to agents by capability (§4.5).
pub struct Scheduler {
    registry: Arc<dyn SubmissionRegistry>,
    agents: Arc<RemoteAgentRegistry>,
    options: SchedulerOptions,
}

impl Scheduler {
    #[must_use]
    pub fn new(
        registry: Arc<dyn SubmissionRegistry>,
        agents: Arc<RemoteAgentRegistry>,
        options: SchedulerOptions,
    ) -> Self {
        Self { registry, agents, options }
    }

    /// Runs until the task is dropped or aborted: a periodic tick plus an
    /// early wake on `processchain.registered` (§4.5 "two triggers").
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(self.options.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut notifications = self.agents.bus().subscribe(addresses::PROCESS_CHAIN_REGISTERED);

        loop {
            tokio::select! {
                _ = interval.tick() => {},
                result = notifications.recv() => {
                    if result.is_err() {
                        // Lagged or the bus's last sender dropped; the
                        // periodic tick alone still makes progress.
                        continue;
                    }
                },
            }
            if let Err(error) = self.tick().await {
                warn!(%error, "scheduler tick failed, retrying next tick");
            }
        }
    }

    /// One pass of §4.5 steps 1-4.
    pub async fn tick(&self) -> Result<()> {
        let registered = self.registry.find_by_status(ProcessChainStatus::Registered).await?;
        if registered.is_empty() {
            return Ok(());
        }

        let demand = demand::group_by_capability(&registered);
        for (capabilities, agent_id) in self.agents.select_candidates(&demand) {
            let allocated = self
                .agents
                .try_allocate(agent_id, self.options.busy_timeout, self.options.allocate_timeout)
                .await;
            if !allocated {
                // §4.5 step 4: allocation failed, nothing was fetched.
                continue;
            }

            let filter = move |chain: &steep_model::ProcessChain| chain.required_capabilities == capabilities;
            let claimed = self
                .registry
                .fetch_next(ProcessChainStatus::Registered, ProcessChainStatus::Running, &filter)
                .await?;

            let Some(mut chain) = claimed else {
                // Allocated an agent but nothing still matched by the time
                // we fetched (another tick raced us); don't strand the
                // lease until busyTimeout for no reason.
                self.agents.release(agent_id);
                continue;
            };

            let owner = agent_id.to_string();
            self.registry.set_owner(chain.id, owner.clone()).await?;
            let start = chrono::Utc::now();
            self.registry.set_start_time(chain.id, start).await?;
            chain.owner = Some(owner);
            chain.start_time = Some(start);

            let registry = Arc::clone(&self.registry);
            let agents = Arc::clone(&self.agents);
            let timeout = self.options.dispatch_timeout;
            tokio::spawn(async move {
                if let Err(error) = dispatch::dispatch(registry.as_ref(), agents.as_ref(), chain, agent_id, timeout).await {
                    warn!(%error, "failed to persist dispatch outcome");
                }
            });
        }
        Ok(())
    }
}
