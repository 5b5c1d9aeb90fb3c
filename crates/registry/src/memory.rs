//! In-memory `SubmissionRegistry` implementation.
//!
//! Used by tests and by single-node `steep-node` runs. Linearizability of
//! `fetch_next` (§4.2) is implemented the way `nebula-resource`'s pool
//! guards serialize acquisition: a small ordered queue protected by a
//! `parking_lot::Mutex`, so only one caller can ever pop a given sequence
//! number, combined with per-entity CAS on the `dashmap` entry itself.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use steep_core::{ProcessChainId, SubmissionId, VariableId};
use steep_model::{ProcessChain, ProcessChainStatus, Submission, SubmissionStatus, Value};
use tracing::trace;

use crate::error::{RegistryError, Result};
use crate::traits::{ProcessChainStore, SubmissionStore};

#[derive(Default)]
pub struct InMemorySubmissionRegistry {
    submissions: DashMap<SubmissionId, Submission>,
    submission_queue: Mutex<BTreeMap<u64, SubmissionId>>,
    submission_seq: AtomicU64,
    submission_results: DashMap<SubmissionId, HashMap<VariableId, Vec<Value>>>,

    chains: DashMap<ProcessChainId, ProcessChain>,
    chain_queue: Mutex<BTreeMap<u64, ProcessChainId>>,
    chain_seq: AtomicU64,
    chain_results: DashMap<ProcessChainId, HashMap<VariableId, Vec<Value>>>,
}

impl InMemorySubmissionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubmissionStore for InMemorySubmissionRegistry {
    async fn add(&self, submission: Submission) -> Result<()> {
        let seq = self.submission_seq.fetch_add(1, Ordering::SeqCst);
        let id = submission.id;
        self.submissions.insert(id, submission);
        self.submission_queue.lock().insert(seq, id);
        Ok(())
    }

    async fn find_by_id(&self, id: SubmissionId) -> Result<Submission> {
        self.submissions
            .get(&id)
            .map(|s| s.clone())
            .ok_or(RegistryError::NotFound)
    }

    async fn find_by_status(&self, status: SubmissionStatus) -> Result<Vec<Submission>> {
        Ok(self
            .submissions
            .iter()
            .filter(|e| e.status == status)
            .map(|e| e.clone())
            .collect())
    }

    async fn count(&self, status: SubmissionStatus) -> Result<usize> {
        Ok(self.submissions.iter().filter(|e| e.status == status).count())
    }

    async fn set_status(&self, id: SubmissionId, status: SubmissionStatus) -> Result<()> {
        let mut entry = self.submissions.get_mut(&id).ok_or(RegistryError::NotFound)?;
        entry.status = status;
        Ok(())
    }

    async fn set_start_time(
        &self,
        id: SubmissionId,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<()> {
        let mut entry = self.submissions.get_mut(&id).ok_or(RegistryError::NotFound)?;
        entry.start_time = Some(at);
        Ok(())
    }

    async fn set_end_time(
        &self,
        id: SubmissionId,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<()> {
        let mut entry = self.submissions.get_mut(&id).ok_or(RegistryError::NotFound)?;
        entry.end_time = Some(at);
        Ok(())
    }

    async fn set_results(
        &self,
        id: SubmissionId,
        results: HashMap<VariableId, Vec<Value>>,
    ) -> Result<()> {
        if !self.submissions.contains_key(&id) {
            return Err(RegistryError::NotFound);
        }
        self.submission_results.insert(id, results);
        Ok(())
    }

    async fn get_results(&self, id: SubmissionId) -> Result<Option<HashMap<VariableId, Vec<Value>>>> {
        Ok(self.submission_results.get(&id).map(|r| r.clone()))
    }

    async fn set_error_message(&self, id: SubmissionId, message: String) -> Result<()> {
        let mut entry = self.submissions.get_mut(&id).ok_or(RegistryError::NotFound)?;
        entry.error_message = Some(message);
        Ok(())
    }

    async fn set_execution_state(&self, id: SubmissionId, state: serde_json::Value) -> Result<()> {
        let mut entry = self.submissions.get_mut(&id).ok_or(RegistryError::NotFound)?;
        entry.execution_state = Some(state);
        Ok(())
    }

    async fn get_execution_state(&self, id: SubmissionId) -> Result<Option<serde_json::Value>> {
        Ok(self
            .submissions
            .get(&id)
            .ok_or(RegistryError::NotFound)?
            .execution_state
            .clone())
    }

    async fn fetch_next(
        &self,
        current_status: SubmissionStatus,
        new_status: SubmissionStatus,
    ) -> Result<Option<Submission>> {
        let mut queue = self.submission_queue.lock();
        let candidate_seq = queue
            .iter()
            .find(|(_, id)| {
                self.submissions
                    .get(*id)
                    .is_some_and(|s| s.status == current_status)
            })
            .map(|(seq, id)| (*seq, *id));

        let Some((seq, id)) = candidate_seq else {
            return Ok(None);
        };
        queue.remove(&seq);
        drop(queue);

        let mut entry = self.submissions.get_mut(&id).ok_or(RegistryError::NotFound)?;
        if entry.status != current_status {
            // Lost the race to a direct `set_status` call; not expected in
            // practice since the controller owns one submission at a time.
            return Ok(None);
        }
        entry.status = new_status;
        trace!(submission_id = %id, "fetched next submission");
        Ok(Some(entry.clone()))
    }
}

#[async_trait]
impl ProcessChainStore for InMemorySubmissionRegistry {
    async fn add_many(&self, submission_id: SubmissionId, chains: Vec<ProcessChain>) -> Result<()> {
        if !self.submissions.contains_key(&submission_id) {
            return Err(RegistryError::Conflict(format!(
                "unknown submission {submission_id}"
            )));
        }
        let mut queue = self.chain_queue.lock();
        for mut chain in chains {
            let seq = self.chain_seq.fetch_add(1, Ordering::SeqCst);
            chain.sequence = seq;
            let id = chain.id;
            self.chains.insert(id, chain);
            queue.insert(seq, id);
        }
        Ok(())
    }

    async fn find_by_submission_id(&self, submission_id: SubmissionId) -> Result<Vec<ProcessChain>> {
        let mut chains: Vec<ProcessChain> = self
            .chains
            .iter()
            .filter(|e| e.submission_id == submission_id)
            .map(|e| e.clone())
            .collect();
        chains.sort_by_key(|c| c.sequence);
        Ok(chains)
    }

    async fn find_by_status(&self, status: ProcessChainStatus) -> Result<Vec<ProcessChain>> {
        Ok(self
            .chains
            .iter()
            .filter(|e| e.status == status)
            .map(|e| e.clone())
            .collect())
    }

    async fn count_by_status(&self, status: ProcessChainStatus) -> Result<usize> {
        Ok(self.chains.iter().filter(|e| e.status == status).count())
    }

    async fn fetch_next(
        &self,
        current_status: ProcessChainStatus,
        new_status: ProcessChainStatus,
        filter: &(dyn for<'a> Fn(&'a ProcessChain) -> bool + Sync),
    ) -> Result<Option<ProcessChain>> {
        let mut queue = self.chain_queue.lock();
        let candidate_seq = queue
            .iter()
            .find(|(_, id)| {
                self.chains
                    .get(*id)
                    .is_some_and(|c| c.status == current_status && filter(&*c))
            })
            .map(|(seq, id)| (*seq, *id));

        let Some((seq, id)) = candidate_seq else {
            return Ok(None);
        };
        queue.remove(&seq);
        drop(queue);

        let mut entry = self.chains.get_mut(&id).ok_or(RegistryError::NotFound)?;
        if entry.status != current_status {
            return Ok(None);
        }
        entry.status = new_status;
        Ok(Some(entry.clone()))
    }

    async fn set_status(&self, id: ProcessChainId, status: ProcessChainStatus) -> Result<()> {
        let mut entry = self.chains.get_mut(&id).ok_or(RegistryError::NotFound)?;
        entry.status = status;
        Ok(())
    }

    async fn set_status_cas(
        &self,
        id: ProcessChainId,
        expected: ProcessChainStatus,
        new_status: ProcessChainStatus,
    ) -> Result<bool> {
        let mut entry = self.chains.get_mut(&id).ok_or(RegistryError::NotFound)?;
        if entry.status == expected {
            entry.status = new_status;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn set_all_status_by_submission(
        &self,
        submission_id: SubmissionId,
        expected: ProcessChainStatus,
        new_status: ProcessChainStatus,
    ) -> Result<usize> {
        let mut count = 0;
        for mut entry in self.chains.iter_mut() {
            if entry.submission_id == submission_id && entry.status == expected {
                entry.status = new_status;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn set_start_time(
        &self,
        id: ProcessChainId,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<()> {
        let mut entry = self.chains.get_mut(&id).ok_or(RegistryError::NotFound)?;
        entry.start_time = Some(at);
        Ok(())
    }

    async fn set_end_time(
        &self,
        id: ProcessChainId,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<()> {
        let mut entry = self.chains.get_mut(&id).ok_or(RegistryError::NotFound)?;
        entry.end_time = Some(at);
        Ok(())
    }

    async fn set_results(
        &self,
        id: ProcessChainId,
        results: HashMap<VariableId, Vec<Value>>,
    ) -> Result<()> {
        if !self.chains.contains_key(&id) {
            return Err(RegistryError::NotFound);
        }
        self.chain_results.insert(id, results);
        Ok(())
    }

    async fn get_results(&self, id: ProcessChainId) -> Result<Option<HashMap<VariableId, Vec<Value>>>> {
        Ok(self.chain_results.get(&id).map(|r| r.clone()))
    }

    async fn set_error_message(&self, id: ProcessChainId, message: String) -> Result<()> {
        let mut entry = self.chains.get_mut(&id).ok_or(RegistryError::NotFound)?;
        entry.error_message = Some(message);
        Ok(())
    }

    async fn owner(&self, id: ProcessChainId) -> Result<Option<String>> {
        Ok(self.chains.get(&id).ok_or(RegistryError::NotFound)?.owner.clone())
    }

    async fn set_owner(&self, id: ProcessChainId, owner: String) -> Result<()> {
        let mut entry = self.chains.get_mut(&id).ok_or(RegistryError::NotFound)?;
        entry.owner = Some(owner);
        Ok(())
    }
}
