//! Submissions: a user-submitted workflow and its lifecycle record.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use steep_core::{SubmissionId, VariableId};

use crate::variable::Value;
use crate::workflow::Workflow;

/// Lifecycle status of a submission (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    Accepted,
    Running,
    Cancelled,
    Success,
    PartialSuccess,
    Error,
}

impl SubmissionStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::Success | Self::PartialSuccess | Self::Error
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub workflow: Workflow,
    /// Literal values for the workflow's top-level INPUT variables (§4.1
    /// "a known outputs map" — the workflow itself is purely structural,
    /// so whoever submits it is the only source for these).
    pub initial_bindings: HashMap<VariableId, Value>,
    pub status: SubmissionStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub results: Option<HashMap<VariableId, Vec<Value>>>,
    pub error_message: Option<String>,
    /// Opaque snapshot of the rule engine's progress (§3); `None` until the
    /// engine has run at least once for this submission.
    pub execution_state: Option<serde_json::Value>,
}

impl Submission {
    #[must_use]
    pub fn new(id: SubmissionId, workflow: Workflow) -> Self {
        Self::with_bindings(id, workflow, HashMap::new())
    }

    #[must_use]
    pub fn with_bindings(
        id: SubmissionId,
        workflow: Workflow,
        initial_bindings: HashMap<VariableId, Value>,
    ) -> Self {
        Self {
            id,
            workflow,
            initial_bindings,
            status: SubmissionStatus::Accepted,
            start_time: None,
            end_time: None,
            results: None,
            error_message: None,
            execution_state: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_submission_is_accepted() {
        let s = Submission::new(SubmissionId::v4(), Workflow { actions: vec![] });
        assert_eq!(s.status, SubmissionStatus::Accepted);
        assert!(!s.status.is_terminal());
    }

    #[test]
    fn terminal_statuses() {
        assert!(SubmissionStatus::Success.is_terminal());
        assert!(SubmissionStatus::PartialSuccess.is_terminal());
        assert!(SubmissionStatus::Error.is_terminal());
        assert!(SubmissionStatus::Cancelled.is_terminal());
        assert!(!SubmissionStatus::Accepted.is_terminal());
        assert!(!SubmissionStatus::Running.is_terminal());
    }
}
