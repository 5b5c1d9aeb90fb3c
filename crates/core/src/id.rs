//! Strongly-typed identifiers for Steep entities.
//!
//! Each identifier wraps a UUID behind a [`domain-key`](https://crates.io/crates/domain-key)
//! domain marker, so a `SubmissionId` and a `ProcessChainId` cannot be
//! confused at compile time even though both are 16-byte UUIDs underneath.

use domain_key::define_uuid;

pub use domain_key::UuidParseError;

define_uuid!(pub SubmissionIdDomain => SubmissionId);
define_uuid!(pub ProcessChainIdDomain => ProcessChainId);
define_uuid!(pub VariableIdDomain => VariableId);
define_uuid!(pub ExecutableIdDomain => ExecutableId);
define_uuid!(pub AgentIdDomain => AgentId);
define_uuid!(pub ServiceIdDomain => ServiceId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types_but_same_representation() {
        let sub = SubmissionId::v4();
        let chain = ProcessChainId::v4();
        assert_ne!(sub.to_string(), "");
        assert_ne!(chain.to_string(), "");
    }

    #[test]
    fn nil_is_zero_uuid() {
        let id = ProcessChainId::nil();
        assert_eq!(id.to_string(), "00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn parse_roundtrips() {
        let id = SubmissionId::v4();
        let parsed = SubmissionId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn serde_roundtrip() {
        let id = AgentId::v4();
        let json = serde_json::to_string(&id).unwrap();
        let back: AgentId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
