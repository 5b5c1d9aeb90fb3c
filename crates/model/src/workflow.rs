//! Workflows: the user-supplied description of work.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use steep_core::{ServiceId, VariableId};

use crate::executable::ArgumentType;

/// One parameter binding of an execute-action to a service parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterBinding {
    pub parameter_name: String,
    pub variable: VariableId,
    pub kind: ArgumentType,
}

/// A reference to a service plus its parameter bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteAction {
    pub service_id: ServiceId,
    pub bindings: Vec<ParameterBinding>,
}

/// `for-each`: unroll `inner` once per element of `input_collection`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForEachAction {
    pub input_collection: VariableId,
    pub iteration_variable: VariableId,
    pub inner: Vec<Action>,
    /// Variable that receives the collected per-iteration outputs, in
    /// submission order, once every iteration's chain succeeds.
    pub output_collection: Option<VariableId>,
    /// Explicit yield target, if the collection binds to something other
    /// than `output_collection` (§3).
    pub yield_target: Option<VariableId>,
}

/// One step of a [`Workflow`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Action {
    Execute(ExecuteAction),
    ForEach(ForEachAction),
}

/// Ordered list of actions submitted by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub actions: Vec<Action>,
}

/// A service's declared parameter schema, used by the rule engine to
/// synthesize executables from an [`ExecuteAction`]'s bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceParameter {
    pub name: String,
    pub data_type: String,
    pub kind: ArgumentType,
    pub cardinality: Cardinality,
}

/// Declared cardinality of a service parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    One,
    Many,
}

/// A registered service: path/label, runtime, capability requirements, and
/// parameter schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub id: ServiceId,
    pub path: String,
    pub runtime: crate::executable::Runtime,
    pub required_capabilities: steep_core::CapabilitySet,
    pub parameters: Vec<ServiceParameter>,
}

/// `serviceId -> descriptor` lookup the rule engine validates workflows
/// against.
#[derive(Debug, Clone, Default)]
pub struct ServiceCatalog {
    services: HashMap<ServiceId, ServiceDescriptor>,
}

impl ServiceCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, service: ServiceDescriptor) {
        self.services.insert(service.id, service);
    }

    #[must_use]
    pub fn get(&self, id: ServiceId) -> Option<&ServiceDescriptor> {
        self.services.get(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_register_and_get() {
        let mut catalog = ServiceCatalog::new();
        let id = ServiceId::v4();
        catalog.register(ServiceDescriptor {
            id,
            path: "/usr/bin/cp".into(),
            runtime: crate::executable::Runtime::Other,
            required_capabilities: steep_core::CapabilitySet::new(),
            parameters: vec![],
        });
        assert!(catalog.get(id).is_some());
        assert!(catalog.get(ServiceId::v4()).is_none());
    }
}
