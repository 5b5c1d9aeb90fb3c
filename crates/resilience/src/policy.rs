use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Per-executable retry policy (§4.4 step 4).
///
/// `retry_on` is a set of caller-defined error-kind tags, the same
/// string-tag shape as [`steep_core::CapabilitySet`] — the resilience
/// crate doesn't know what "kinds" of error an executor can raise, so
/// callers classify their own errors into tags and list the retryable
/// ones here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// `1` means no retry: one attempt, no re-tries on failure.
    pub max_attempts: u32,
    pub delay: Duration,
    pub exponential_backoff: bool,
    pub retry_on: BTreeSet<String>,
}

impl Default for RetryPolicy {
    /// §4.4: "Default: single attempt."
    fn default() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::from_secs(1),
            exponential_backoff: false,
            retry_on: BTreeSet::new(),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn is_retryable(&self, kind: &str) -> bool {
        self.retry_on.contains(kind)
    }

    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if self.exponential_backoff {
            self.delay.saturating_mul(1u32 << attempt.min(16))
        } else {
            self.delay
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_never_retries() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 1);
        assert!(!policy.is_retryable("anything"));
    }

    #[test]
    fn exponential_backoff_doubles_each_attempt() {
        let policy = RetryPolicy {
            delay: Duration::from_millis(100),
            exponential_backoff: true,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
    }

    #[test]
    fn fixed_delay_ignores_attempt_number() {
        let policy = RetryPolicy {
            delay: Duration::from_millis(50),
            exponential_backoff: false,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(50));
    }
}
