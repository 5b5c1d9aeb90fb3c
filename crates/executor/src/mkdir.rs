//! Parent-directory precreation for a chain's OUTPUT arguments (§4.4 step 1).

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex as SyncMutex;
use steep_core::{ProcessChainId, SubmissionId, VariableId};

/// Chains with more than this many distinct parent directories are split
/// into multiple `mkdir -p` executables (§4.4 step 1: "≤100 paths each").
pub const MAX_BATCH_SIZE: usize = 100;

/// The destination directory for one OUTPUT variable.
///
/// OUTPUT arguments carry no literal path in the workflow (unlike
/// INPUT/ARGUMENT, they aren't in [`steep_model::ProcessChain::bindings`] —
/// see the steep-model design note); the agent synthesizes a path from the
/// configured `outPath` root plus the submission, chain, and variable ids,
/// which is stable and collision-free across concurrent submissions.
#[must_use]
pub fn output_dir(
    out_path: &str,
    submission_id: SubmissionId,
    chain_id: ProcessChainId,
    variable_id: VariableId,
) -> String {
    format!("{out_path}/{submission_id}/{chain_id}/{variable_id}")
}

/// Short-lived, node-local memo of directories already created.
///
/// Safe under concurrent access since a missed cache hit only re-issues an
/// idempotent `mkdir -p` (§5: "safe under concurrent reads as writes are
/// idempotent").
pub struct MkdirCache {
    seen: SyncMutex<LruCache<String, Instant>>,
    ttl: Duration,
}

impl MkdirCache {
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            seen: SyncMutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// ~1-minute TTL, per §4.4 step 1.
    #[must_use]
    pub fn with_default_ttl(capacity: usize) -> Self {
        Self::new(capacity, Duration::from_secs(60))
    }

    /// Returns the subset of `paths` not already recorded as created
    /// within the TTL window, and records all of `paths` as created.
    pub fn filter_new(&self, paths: Vec<String>) -> Vec<String> {
        let now = Instant::now();
        let mut seen = self.seen.lock();
        let mut fresh = Vec::new();
        for path in paths {
            let expired = match seen.get(&path) {
                Some(recorded) => now.duration_since(*recorded) > self.ttl,
                None => true,
            };
            if expired {
                fresh.push(path.clone());
            }
            seen.put(path, now);
        }
        fresh
    }
}

/// Split `paths` into chunks of at most [`MAX_BATCH_SIZE`].
#[must_use]
pub fn batch(paths: Vec<String>) -> Vec<Vec<String>> {
    paths
        .chunks(MAX_BATCH_SIZE)
        .map(|chunk| chunk.to_vec())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_dir_is_stable_for_same_ids() {
        let submission = SubmissionId::v4();
        let chain = ProcessChainId::v4();
        let var = VariableId::v4();
        let a = output_dir("/out", submission, chain, var);
        let b = output_dir("/out", submission, chain, var);
        assert_eq!(a, b);
        assert!(a.starts_with("/out/"));
    }

    #[test]
    fn batches_respect_max_size() {
        let paths: Vec<String> = (0..250).map(|i| format!("/d{i}")).collect();
        let batches = batch(paths);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), MAX_BATCH_SIZE);
        assert_eq!(batches[2].len(), 50);
    }

    #[test]
    fn cache_filters_already_created_dirs() {
        let cache = MkdirCache::new(16, Duration::from_secs(60));
        let first = cache.filter_new(vec!["/a".into(), "/b".into()]);
        assert_eq!(first, vec!["/a".to_string(), "/b".to_string()]);

        let second = cache.filter_new(vec!["/a".into(), "/c".into()]);
        assert_eq!(second, vec!["/c".to_string()]);
    }

    #[test]
    fn cache_reissues_after_ttl_expiry() {
        let cache = MkdirCache::new(16, Duration::from_millis(0));
        cache.filter_new(vec!["/a".into()]);
        std::thread::sleep(Duration::from_millis(2));
        let again = cache.filter_new(vec!["/a".into()]);
        assert_eq!(again, vec!["/a".to_string()]);
    }
}
