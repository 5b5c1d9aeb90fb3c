//! Schema validation (§4.1 "Validation is a front gate"): confirms that a
//! workflow's execute-actions reference real services and that every
//! binding matches that service's declared parameter kind. This does not
//! attempt full dataflow reachability analysis — an action whose inputs can
//! never become known simply sits on the frontier forever, surfaced to
//! operators as a stalled submission rather than a validation failure.

use steep_model::{Action, ExecuteAction, ForEachAction, ServiceCatalog, Workflow};

use crate::error::WorkflowValidationError;

pub fn validate(
    workflow: &Workflow,
    catalog: &ServiceCatalog,
) -> Result<(), WorkflowValidationError> {
    if workflow.actions.is_empty() {
        return Err(WorkflowValidationError::EmptyWorkflow);
    }
    for action in &workflow.actions {
        validate_action(action, catalog)?;
    }
    Ok(())
}

fn validate_action(action: &Action, catalog: &ServiceCatalog) -> Result<(), WorkflowValidationError> {
    match action {
        Action::Execute(exec) => validate_execute(exec, catalog),
        Action::ForEach(foreach) => validate_foreach(foreach, catalog),
    }
}

fn validate_execute(
    exec: &ExecuteAction,
    catalog: &ServiceCatalog,
) -> Result<(), WorkflowValidationError> {
    let service = catalog
        .get(exec.service_id)
        .ok_or(WorkflowValidationError::UnknownService(exec.service_id))?;

    for binding in &exec.bindings {
        let param = service
            .parameters
            .iter()
            .find(|p| p.name == binding.parameter_name)
            .ok_or_else(|| WorkflowValidationError::UnknownParameter {
                service: service.id,
                parameter: binding.parameter_name.clone(),
            })?;

        if param.kind != binding.kind {
            return Err(WorkflowValidationError::ArgumentKindMismatch {
                service: service.id,
                parameter: binding.parameter_name.clone(),
                expected: param.kind,
                actual: binding.kind,
            });
        }
    }
    Ok(())
}

fn validate_foreach(
    foreach: &ForEachAction,
    catalog: &ServiceCatalog,
) -> Result<(), WorkflowValidationError> {
    for inner in &foreach.inner {
        validate_action(inner, catalog)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use steep_core::{CapabilitySet, ServiceId, VariableId};
    use steep_model::{ArgumentType, Cardinality, ParameterBinding, ServiceDescriptor, ServiceParameter};

    fn catalog_with_one_service() -> (ServiceId, ServiceCatalog) {
        let id = ServiceId::v4();
        let mut catalog = ServiceCatalog::new();
        catalog.register(ServiceDescriptor {
            id,
            path: "/bin/true".into(),
            runtime: steep_model::Runtime::Other,
            required_capabilities: CapabilitySet::new(),
            parameters: vec![ServiceParameter {
                name: "in".into(),
                data_type: "file".into(),
                kind: ArgumentType::Input,
                cardinality: Cardinality::One,
            }],
        });
        (id, catalog)
    }

    #[test]
    fn empty_workflow_is_rejected() {
        let (_, catalog) = catalog_with_one_service();
        let err = validate(&Workflow { actions: vec![] }, &catalog).unwrap_err();
        assert_eq!(err, WorkflowValidationError::EmptyWorkflow);
    }

    #[test]
    fn unknown_service_is_rejected() {
        let (_, catalog) = catalog_with_one_service();
        let workflow = Workflow {
            actions: vec![Action::Execute(ExecuteAction {
                service_id: ServiceId::v4(),
                bindings: vec![],
            })],
        };
        assert!(matches!(
            validate(&workflow, &catalog),
            Err(WorkflowValidationError::UnknownService(_))
        ));
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let (id, catalog) = catalog_with_one_service();
        let workflow = Workflow {
            actions: vec![Action::Execute(ExecuteAction {
                service_id: id,
                bindings: vec![ParameterBinding {
                    parameter_name: "in".into(),
                    variable: VariableId::v4(),
                    kind: ArgumentType::Output,
                }],
            })],
        };
        assert!(matches!(
            validate(&workflow, &catalog),
            Err(WorkflowValidationError::ArgumentKindMismatch { .. })
        ));
    }

    #[test]
    fn valid_workflow_passes() {
        let (id, catalog) = catalog_with_one_service();
        let workflow = Workflow {
            actions: vec![Action::Execute(ExecuteAction {
                service_id: id,
                bindings: vec![ParameterBinding {
                    parameter_name: "in".into(),
                    variable: VariableId::v4(),
                    kind: ArgumentType::Input,
                }],
            })],
        };
        assert!(validate(&workflow, &catalog).is_ok());
    }

    #[test]
    fn nested_for_each_actions_are_validated() {
        let (_, catalog) = catalog_with_one_service();
        let workflow = Workflow {
            actions: vec![Action::ForEach(ForEachAction {
                input_collection: VariableId::v4(),
                iteration_variable: VariableId::v4(),
                inner: vec![Action::Execute(ExecuteAction {
                    service_id: ServiceId::v4(),
                    bindings: vec![],
                })],
                output_collection: None,
                yield_target: None,
            })],
        };
        assert!(matches!(
            validate(&workflow, &catalog),
            Err(WorkflowValidationError::UnknownService(_))
        ));
    }
}
