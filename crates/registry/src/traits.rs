//! The `SubmissionRegistry` contract (§4.2).
//!
//! A narrow, storage-agnostic interface the rest of the core treats as an
//! abstract store. The in-memory implementation in [`crate::memory`] is the
//! only one shipped here; relational/document backends are external
//! collaborators (§1 Out of scope) represented only by `db.driver` config.

use std::collections::HashMap;

use async_trait::async_trait;
use steep_core::{ProcessChainId, SubmissionId, VariableId};
use steep_model::{ProcessChain, ProcessChainStatus, Submission, SubmissionStatus, Value};

use crate::error::Result;

/// Submission-level operations.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn add(&self, submission: Submission) -> Result<()>;
    async fn find_by_id(&self, id: SubmissionId) -> Result<Submission>;
    async fn find_by_status(&self, status: SubmissionStatus) -> Result<Vec<Submission>>;
    async fn count(&self, status: SubmissionStatus) -> Result<usize>;
    async fn set_status(&self, id: SubmissionId, status: SubmissionStatus) -> Result<()>;
    async fn set_start_time(
        &self,
        id: SubmissionId,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<()>;
    async fn set_end_time(&self, id: SubmissionId, at: chrono::DateTime<chrono::Utc>)
    -> Result<()>;
    async fn set_results(
        &self,
        id: SubmissionId,
        results: HashMap<VariableId, Vec<Value>>,
    ) -> Result<()>;
    async fn get_results(&self, id: SubmissionId) -> Result<Option<HashMap<VariableId, Vec<Value>>>>;
    async fn set_error_message(&self, id: SubmissionId, message: String) -> Result<()>;
    async fn set_execution_state(&self, id: SubmissionId, state: serde_json::Value) -> Result<()>;
    async fn get_execution_state(&self, id: SubmissionId) -> Result<Option<serde_json::Value>>;

    /// Atomically claim one submission in `current_status`, moving it to
    /// `new_status`. Linearizable: two concurrent callers never receive the
    /// same submission (§8 invariant 2, specialized to submissions).
    async fn fetch_next(
        &self,
        current_status: SubmissionStatus,
        new_status: SubmissionStatus,
    ) -> Result<Option<Submission>>;
}

/// Process-chain-level operations.
#[async_trait]
pub trait ProcessChainStore: Send + Sync {
    /// Atomically register `chains`; rejects the whole batch if
    /// `submission_id` is unknown.
    async fn add_many(
        &self,
        submission_id: SubmissionId,
        chains: Vec<ProcessChain>,
    ) -> Result<()>;
    async fn find_by_submission_id(&self, submission_id: SubmissionId) -> Result<Vec<ProcessChain>>;
    async fn find_by_status(&self, status: ProcessChainStatus) -> Result<Vec<ProcessChain>>;
    async fn count_by_status(&self, status: ProcessChainStatus) -> Result<usize>;

    /// Atomically claim one chain in `current_status` matching `filter`
    /// (e.g. a required-capability key), moving it to `new_status`,
    /// dequeued in insertion-sequence order (§4.2, §5).
    async fn fetch_next(
        &self,
        current_status: ProcessChainStatus,
        new_status: ProcessChainStatus,
        filter: &(dyn for<'a> Fn(&'a ProcessChain) -> bool + Sync),
    ) -> Result<Option<ProcessChain>>;

    /// Unconditional status write.
    async fn set_status(&self, id: ProcessChainId, status: ProcessChainStatus) -> Result<()>;

    /// Compare-and-swap status write; returns whether the swap happened.
    async fn set_status_cas(
        &self,
        id: ProcessChainId,
        expected: ProcessChainStatus,
        new_status: ProcessChainStatus,
    ) -> Result<bool>;

    /// Conditionally update every chain of `submission_id` currently in
    /// `expected` to `new_status`; returns the number updated.
    async fn set_all_status_by_submission(
        &self,
        submission_id: SubmissionId,
        expected: ProcessChainStatus,
        new_status: ProcessChainStatus,
    ) -> Result<usize>;

    async fn set_start_time(
        &self,
        id: ProcessChainId,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<()>;
    async fn set_end_time(
        &self,
        id: ProcessChainId,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<()>;
    async fn set_results(
        &self,
        id: ProcessChainId,
        results: HashMap<VariableId, Vec<Value>>,
    ) -> Result<()>;
    async fn get_results(&self, id: ProcessChainId) -> Result<Option<HashMap<VariableId, Vec<Value>>>>;
    async fn set_error_message(&self, id: ProcessChainId, message: String) -> Result<()>;
    async fn owner(&self, id: ProcessChainId) -> Result<Option<String>>;
    async fn set_owner(&self, id: ProcessChainId, owner: String) -> Result<()>;
}

/// Full submission registry: the union of both stores (§4.2).
pub trait SubmissionRegistry: SubmissionStore + ProcessChainStore {}
impl<T: SubmissionStore + ProcessChainStore> SubmissionRegistry for T {}
