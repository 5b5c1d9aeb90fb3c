//! Drives one ACCEPTED→RUNNING submission to a terminal state (§4.6).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use steep_eventbus::{addresses, EventBus};
use steep_model::{ProcessChain, ProcessChainStatus, Submission, SubmissionStatus};
use steep_registry::SubmissionRegistry;
use steep_rule_engine::{decompose, ExecutionState, KnownOutputs};
use tracing::{info, warn};

use crate::known::fold_results;

/// How often the driver re-reads a submission's chains while waiting for
/// the next one to complete; the spec leaves the wait mechanism open
/// ("via a registered bus handler or polling") and polling keeps this
/// crate's surface small.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub async fn drive(
    registry: Arc<dyn SubmissionRegistry>,
    bus: Arc<EventBus>,
    catalog: Arc<steep_model::ServiceCatalog>,
    mut submission: Submission,
) {
    let submission_id = submission.id;
    let mut state = submission
        .execution_state
        .take()
        .and_then(|snapshot| serde_json::from_value(snapshot).ok())
        .unwrap_or_else(|| ExecutionState::initial(&submission.workflow));

    let mut known: KnownOutputs = submission.initial_bindings.clone();
    let mut folded = std::collections::HashSet::new();
    if let Err(error) = fold_completed(&registry, submission_id, &mut known, &mut folded).await {
        warn!(%submission_id, %error, "failed to read existing chain results");
        return;
    }

    loop {
        let outcome = match decompose(submission_id, &submission.workflow, &known, &catalog, state) {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(%submission_id, %error, "workflow validation failed, aborting submission");
                let _ = registry.set_error_message(submission_id, error.to_string()).await;
                let _ = registry.set_status(submission_id, SubmissionStatus::Error).await;
                let _ = registry.set_end_time(submission_id, chrono::Utc::now()).await;
                return;
            }
        };
        state = outcome.state;
        known.extend(outcome.derived_bindings);

        if !outcome.chains.is_empty() {
            if let Err(error) = registry.add_many(submission_id, outcome.chains).await {
                warn!(%submission_id, %error, "failed to persist decomposed chains");
                return;
            }
            bus.publish(addresses::PROCESS_CHAIN_REGISTERED, serde_json::json!({}));
        }

        let snapshot = match serde_json::to_value(&state) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(%submission_id, %error, "failed to serialize execution state");
                return;
            }
        };
        if let Err(error) = registry.set_execution_state(submission_id, snapshot).await {
            warn!(%submission_id, %error, "failed to persist execution state");
            return;
        }

        let Ok(chains) = registry.find_by_submission_id(submission_id).await else {
            warn!(%submission_id, "failed to read chains for termination check");
            return;
        };
        let all_terminal = chains.iter().all(|c| c.status.is_terminal());
        if all_terminal {
            finalize(&registry, submission_id, &chains).await;
            return;
        }

        loop {
            tokio::time::sleep(POLL_INTERVAL).await;

            match registry.find_by_id(submission_id).await {
                Ok(current) if current.status != SubmissionStatus::Running => {
                    info!(%submission_id, status = ?current.status, "submission left RUNNING externally, stopping driver");
                    return;
                }
                Ok(_) => {}
                Err(error) => {
                    warn!(%submission_id, %error, "failed to re-read submission, stopping driver");
                    return;
                }
            }

            let Ok(chains) = registry.find_by_submission_id(submission_id).await else {
                continue;
            };
            let newly_completed = chains
                .iter()
                .filter(|c| c.status.is_terminal() && !folded.contains(&c.id))
                .count();
            if newly_completed > 0 {
                if let Err(error) = fold_completed(&registry, submission_id, &mut known, &mut folded).await {
                    warn!(%submission_id, %error, "failed to read completed chain results");
                    return;
                }
                break;
            }
            if chains.iter().all(|c| c.status.is_terminal()) {
                finalize(&registry, submission_id, &chains).await;
                return;
            }
        }
    }
}

async fn fold_completed(
    registry: &Arc<dyn SubmissionRegistry>,
    submission_id: steep_core::SubmissionId,
    known: &mut KnownOutputs,
    folded: &mut std::collections::HashSet<steep_core::ProcessChainId>,
) -> steep_registry::Result<()> {
    for chain in registry.find_by_submission_id(submission_id).await? {
        if chain.status != ProcessChainStatus::Success || folded.contains(&chain.id) {
            continue;
        }
        if let Some(results) = registry.get_results(chain.id).await? {
            fold_results(known, &results);
        }
        folded.insert(chain.id);
    }
    Ok(())
}

/// §3: SUCCESS if every chain (if any) succeeded, PARTIAL_SUCCESS if some
/// succeeded and some didn't, ERROR if none did. An empty chain list (a
/// workflow with no actions) trivially succeeds.
fn compute_status(chains: &[ProcessChain]) -> SubmissionStatus {
    if chains.is_empty() {
        return SubmissionStatus::Success;
    }
    let succeeded = chains.iter().any(|c| c.status == ProcessChainStatus::Success);
    let failed = chains
        .iter()
        .any(|c| matches!(c.status, ProcessChainStatus::Error | ProcessChainStatus::Cancelled));
    match (succeeded, failed) {
        (true, true) => SubmissionStatus::PartialSuccess,
        (true, false) => SubmissionStatus::Success,
        (false, _) => SubmissionStatus::Error,
    }
}

async fn finalize(registry: &Arc<dyn SubmissionRegistry>, submission_id: steep_core::SubmissionId, chains: &[ProcessChain]) {
    let status = compute_status(chains);

    let mut results = HashMap::new();
    for chain in chains.iter().filter(|c| c.status == ProcessChainStatus::Success) {
        if let Ok(Some(chain_results)) = registry.get_results(chain.id).await {
            results.extend(chain_results);
        }
    }
    if !results.is_empty() {
        let _ = registry.set_results(submission_id, results).await;
    }

    let _ = registry.set_status(submission_id, status).await;
    let _ = registry.set_end_time(submission_id, chrono::Utc::now()).await;
    info!(%submission_id, ?status, "submission reached a terminal state");
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap as Map;

    use steep_core::{CapabilitySet, ProcessChainId, SubmissionId};
    use steep_model::{ProcessChain, Workflow};
    use steep_registry::InMemorySubmissionRegistry;

    use super::*;

    fn chain(submission_id: SubmissionId, status: ProcessChainStatus) -> ProcessChain {
        ProcessChain {
            id: ProcessChainId::v4(),
            submission_id,
            executables: vec![],
            bindings: Map::new(),
            required_capabilities: CapabilitySet::new(),
            status,
            owner: None,
            start_time: None,
            end_time: None,
            error_message: None,
            sequence: 0,
        }
    }

    #[test]
    fn empty_workflow_is_a_trivial_success() {
        assert_eq!(compute_status(&[]), SubmissionStatus::Success);
    }

    #[test]
    fn mixed_success_and_error_is_partial_success() {
        let sub_id = SubmissionId::v4();
        let chains = vec![
            chain(sub_id, ProcessChainStatus::Success),
            chain(sub_id, ProcessChainStatus::Error),
        ];
        assert_eq!(compute_status(&chains), SubmissionStatus::PartialSuccess);
    }

    #[test]
    fn all_error_is_error() {
        let sub_id = SubmissionId::v4();
        let chains = vec![chain(sub_id, ProcessChainStatus::Error)];
        assert_eq!(compute_status(&chains), SubmissionStatus::Error);
    }

    #[tokio::test]
    async fn driving_an_empty_workflow_finalizes_as_success() {
        let registry: Arc<dyn SubmissionRegistry> = Arc::new(InMemorySubmissionRegistry::new());
        let bus = Arc::new(EventBus::new());
        let catalog = Arc::new(steep_model::ServiceCatalog::new());

        let submission = Submission::new(SubmissionId::v4(), Workflow { actions: vec![] });
        let id = submission.id;
        registry.add(submission.clone()).await.unwrap();
        registry
            .set_status(id, SubmissionStatus::Running)
            .await
            .unwrap();

        drive(Arc::clone(&registry), bus, catalog, submission).await;

        let done = registry.find_by_id(id).await.unwrap();
        assert_eq!(done.status, SubmissionStatus::Success);
        assert!(done.end_time.is_some());
    }
}
