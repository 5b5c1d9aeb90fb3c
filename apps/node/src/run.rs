use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use steep_agent_registry::RemoteAgentRegistry;
use steep_config::SteepConfig;
use steep_controller::{Controller, ControllerOptions};
use steep_core::{AgentId, CapabilitySet, SubmissionId, VariableId};
use steep_eventbus::EventBus;
use steep_executor::LocalAgent;
use steep_model::{ServiceCatalog, ServiceDescriptor, Submission, Value, Workflow};
use steep_registry::{InMemorySubmissionRegistry, SubmissionRegistry, SubmissionStore};
use steep_scheduler::{Scheduler, SchedulerOptions};
use tracing::info;

/// §4.6 "submission created by external API" has no API surface in this
/// crate (§1 Out of scope); this CLI stands in for that caller, submitting
/// directly into the registry it also owns.
pub async fn run(
    config: SteepConfig,
    workflow_path: PathBuf,
    catalog_path: PathBuf,
    bindings_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let workflow = read_json::<Workflow>(&workflow_path)?;
    let descriptors = read_json::<Vec<ServiceDescriptor>>(&catalog_path)?;
    let initial_bindings = match bindings_path {
        Some(path) => read_json::<HashMap<VariableId, Value>>(&path)?,
        None => HashMap::new(),
    };

    let mut catalog = ServiceCatalog::new();
    for descriptor in descriptors {
        catalog.register(descriptor);
    }
    let catalog = Arc::new(catalog);

    let registry: Arc<dyn SubmissionRegistry> = Arc::new(InMemorySubmissionRegistry::new());
    let bus = Arc::new(EventBus::new());
    let agents = Arc::new(RemoteAgentRegistry::new(Arc::clone(&bus)));

    if config.agent.enabled {
        spawn_local_agent(&config, &bus, &agents)?;
    }

    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&registry),
        Arc::clone(&agents),
        SchedulerOptions {
            tick_interval: Duration::from_millis(config.scheduler.lookup_interval_milliseconds),
            ..SchedulerOptions::default()
        },
    ));
    tokio::spawn(async move { scheduler.run().await });

    let controller = Arc::new(Controller::new(
        Arc::clone(&registry),
        Arc::clone(&agents),
        Arc::clone(&bus),
        Arc::clone(&catalog),
        ControllerOptions {
            lookup_interval: Duration::from_millis(config.controller.lookup_interval_milliseconds),
            lookup_orphans_interval: Duration::from_millis(config.controller.lookup_orphans_interval_milliseconds),
        },
    ));
    tokio::spawn(controller.run());

    let submission = Submission::with_bindings(SubmissionId::v4(), workflow, initial_bindings);
    let submission_id = submission.id;
    registry.add(submission).await.context("submitting workflow")?;
    info!(%submission_id, "workflow submitted");

    let finished = await_termination(registry.as_ref(), submission_id).await?;
    println!("{}", serde_json::to_string_pretty(&finished)?);
    Ok(())
}

fn spawn_local_agent(config: &SteepConfig, bus: &Arc<EventBus>, agents: &Arc<RemoteAgentRegistry>) -> anyhow::Result<()> {
    let agent_id = config
        .agent
        .id
        .as_deref()
        .map(str::parse)
        .transpose()
        .context("parsing agent.id")?
        .unwrap_or_else(AgentId::v4);

    let local_agent = Arc::new(LocalAgent::with_busy_timeout(
        agent_id,
        Arc::clone(bus),
        config.out_path.display().to_string(),
        config.agent.output_lines_to_collect,
        Duration::from_secs(config.agent.busy_timeout),
    ));
    tokio::spawn(Arc::clone(&local_agent).serve());

    let capabilities = CapabilitySet::from_iter(config.agent.capabilities.clone());
    agents.announce(agent_id, capabilities);
    info!(%agent_id, "local agent started");
    Ok(())
}

async fn await_termination(registry: &dyn SubmissionRegistry, id: SubmissionId) -> anyhow::Result<Submission> {
    loop {
        let current = registry.find_by_id(id).await?;
        if current.status.is_terminal() {
            return Ok(current);
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use steep_model::SubmissionStatus;

    use super::*;

    fn write_fixture(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[tokio::test]
    async fn empty_workflow_submits_and_terminates_as_success() {
        let dir = tempfile::tempdir().unwrap();
        let workflow = write_fixture(&dir, "workflow.json", r#"{"actions": []}"#);
        let catalog = write_fixture(&dir, "catalog.json", "[]");

        let mut config = SteepConfig::default();
        config.agent.enabled = false;
        config.scheduler.lookup_interval_milliseconds = 50;
        config.controller.lookup_interval_milliseconds = 50;

        run(config, workflow, catalog, None).await.unwrap();
    }

    #[test]
    fn read_json_rejects_malformed_input() {
        let dir = tempfile::tempdir().unwrap();
        let bad = write_fixture(&dir, "bad.json", "not json");
        let result: anyhow::Result<Workflow> = read_json(&bad);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn await_termination_polls_until_status_flips() {
        let registry: Arc<dyn SubmissionRegistry> = Arc::new(InMemorySubmissionRegistry::new());
        let submission = Submission::new(SubmissionId::v4(), Workflow { actions: vec![] });
        let id = submission.id;
        registry.add(submission).await.unwrap();

        let registry_clone = Arc::clone(&registry);
        let poller = tokio::spawn(async move { await_termination(registry_clone.as_ref(), id).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        registry.set_status(id, SubmissionStatus::Success).await.unwrap();

        let finished = poller.await.unwrap().unwrap();
        assert_eq!(finished.status, SubmissionStatus::Success);
    }
}
