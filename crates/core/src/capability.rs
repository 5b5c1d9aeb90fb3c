//! Capability tags: the vocabulary agents advertise and chains require.
//!
//! A capability is a plain string (`"docker"`, `"gpu"`, `"matlab"`, ...).
//! Matching between a chain's required set and an agent's advertised set is
//! always set inclusion — there is no hierarchy or wildcarding.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// An ordered, deduplicated set of capability tags.
///
/// `BTreeSet` gives capability sets a canonical, comparable ordering, which
/// the scheduler's candidate-selection tie-break ("lexicographic capability
/// key", §4.3) relies on directly.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CapabilitySet(BTreeSet<String>);

impl CapabilitySet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_iter<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(tags.into_iter().map(Into::into).collect())
    }

    pub fn insert(&mut self, tag: impl Into<String>) -> bool {
        self.0.insert(tag.into())
    }

    /// `true` if every tag in `required` is present in `self`.
    #[must_use]
    pub fn satisfies(&self, required: &CapabilitySet) -> bool {
        required.0.is_subset(&self.0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Union of `self` and `other`, used when merging the required
    /// capabilities of executables flushed into the same process chain.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self(self.0.union(&other.0).cloned().collect())
    }

    /// Canonical string key (`"a,b,c"`) used for grouping and as the
    /// lexicographic tie-break key in candidate selection.
    #[must_use]
    pub fn key(&self) -> String {
        self.0.iter().cloned().collect::<Vec<_>>().join(",")
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.key())
    }
}

impl FromIterator<String> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn satisfies_is_subset_check() {
        let agent = CapabilitySet::from_iter(["docker", "gpu"]);
        let required = CapabilitySet::from_iter(["docker"]);
        assert!(agent.satisfies(&required));

        let required_gpu_and_tpu = CapabilitySet::from_iter(["gpu", "tpu"]);
        assert!(!agent.satisfies(&required_gpu_and_tpu));
    }

    #[test]
    fn empty_required_is_always_satisfied() {
        let agent = CapabilitySet::new();
        assert!(agent.satisfies(&CapabilitySet::new()));
    }

    #[test]
    fn key_is_sorted_and_stable() {
        let a = CapabilitySet::from_iter(["b", "a", "c"]);
        assert_eq!(a.key(), "a,b,c");
    }

    #[test]
    fn union_deduplicates() {
        let a = CapabilitySet::from_iter(["docker"]);
        let b = CapabilitySet::from_iter(["docker", "gpu"]);
        assert_eq!(a.union(&b).key(), "docker,gpu");
    }

    #[test]
    fn ordering_is_lexicographic_by_key() {
        let a = CapabilitySet::from_iter(["docker"]);
        let b = CapabilitySet::from_iter(["gpu"]);
        assert!(a < b);
    }
}
