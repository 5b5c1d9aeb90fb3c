//! The decomposition algorithm itself (§4.1).

use std::collections::{HashMap, HashSet};

use steep_core::{CapabilitySet, ProcessChainId, SubmissionId, VariableId};
use steep_model::{
    Action, ArgumentType, Executable, ExecuteAction, ForEachAction, ProcessChain,
    ProcessChainStatus, ServiceCatalog, Value,
};
use tracing::{debug, warn};

use crate::error::WorkflowValidationError;
use crate::state::{ExecutionState, ForEachWatch, KnownOutputs};
use crate::validate::validate;

/// Everything one call to [`decompose`] produces.
pub struct DecomposeOutcome {
    /// Newly registrable process chains, in deterministic emission order.
    pub chains: Vec<ProcessChain>,
    /// The updated snapshot to pass into the next call.
    pub state: ExecutionState,
    /// Variables the engine itself derived this call (e.g. a `for-each`'s
    /// assembled `output_collection`) — the caller must fold these into
    /// the `known` map it passes next time.
    pub derived_bindings: KnownOutputs,
    /// No further chains can ever be produced.
    pub done: bool,
}

/// In-progress accumulation of executables into one process chain.
struct ChainBuilder {
    capabilities: CapabilitySet,
    executables: Vec<Executable>,
    bindings: HashMap<VariableId, Value>,
    produced: HashSet<VariableId>,
}

impl ChainBuilder {
    fn new(capabilities: CapabilitySet) -> Self {
        Self {
            capabilities,
            executables: Vec::new(),
            bindings: HashMap::new(),
            produced: HashSet::new(),
        }
    }

    fn finish(self, submission_id: SubmissionId) -> ProcessChain {
        ProcessChain {
            id: ProcessChainId::v4(),
            submission_id,
            executables: self.executables,
            bindings: self.bindings,
            required_capabilities: self.capabilities,
            status: ProcessChainStatus::Registered,
            owner: None,
            start_time: None,
            end_time: None,
            error_message: None,
            sequence: 0,
        }
    }
}

/// The result of resolving one `ExecuteAction` against known values.
struct Resolved {
    executable: Executable,
    input_values: HashMap<VariableId, Value>,
    input_vars: HashSet<VariableId>,
    output_vars: HashSet<VariableId>,
}

/// Try to resolve an execute-action into a concrete [`Executable`].
///
/// Returns `None` if any `INPUT`/`ARGUMENT` binding's value is not yet in
/// `known` — the action stays on the frontier (§4.1 step 2).
///
/// `allocate_fresh_outputs`: `true` inside a `for-each` iteration, where
/// every iteration needs its own distinct identity for the variables it
/// produces (§4.1 step 3); `false` at the top level, where the workflow
/// author's own variable id is the stable, final one.
fn try_resolve(
    action: &ExecuteAction,
    known: &KnownOutputs,
    catalog: &ServiceCatalog,
    state: &mut ExecutionState,
    allocate_fresh_outputs: bool,
) -> Option<Resolved> {
    let service = catalog
        .get(action.service_id)
        .expect("validated before decomposition");

    let mut args = Vec::with_capacity(action.bindings.len());
    let mut input_values = HashMap::new();
    let mut input_vars = HashSet::new();
    let mut output_vars = HashSet::new();

    for binding in &action.bindings {
        let param = service
            .parameters
            .iter()
            .find(|p| p.name == binding.parameter_name)
            .expect("validated before decomposition");

        let variable = match binding.kind {
            ArgumentType::Input | ArgumentType::Argument => {
                let value = known.get(&binding.variable)?;
                input_values.insert(binding.variable, value.clone());
                input_vars.insert(binding.variable);
                binding.variable
            }
            ArgumentType::Output => {
                let id = if allocate_fresh_outputs {
                    state.next_fresh_id()
                } else {
                    binding.variable
                };
                output_vars.insert(id);
                id
            }
        };

        args.push(steep_model::Argument {
            label: Some(binding.parameter_name.clone()),
            variable,
            kind: binding.kind,
            data_type: param.data_type.clone(),
        });
    }

    Some(Resolved {
        executable: Executable {
            path: service.path.clone(),
            args,
            runtime: service.runtime.clone(),
            service_id: service.id,
            retries: 1,
        },
        input_values,
        input_vars,
        output_vars,
    })
}

/// Append `resolved` to `builder`, flushing into `chains` first if a chain
/// boundary is crossed (§4.1 step 2/4): different required capabilities, or
/// no dataflow dependency on anything the chain has produced so far.
fn append_or_flush(
    builder: &mut Option<ChainBuilder>,
    resolved: Resolved,
    required_capabilities: CapabilitySet,
    submission_id: SubmissionId,
    chains: &mut Vec<ProcessChain>,
) {
    let needs_new_chain = match builder {
        None => true,
        Some(b) => {
            b.capabilities != required_capabilities
                || (!b.executables.is_empty()
                    && resolved.input_vars.is_disjoint(&b.produced))
        }
    };

    if needs_new_chain {
        if let Some(b) = builder.take() {
            if !b.executables.is_empty() {
                chains.push(b.finish(submission_id));
            }
        }
        *builder = Some(ChainBuilder::new(required_capabilities));
    }

    let b = builder.as_mut().expect("just ensured Some");
    b.bindings.extend(resolved.input_values);
    b.produced.extend(resolved.output_vars);
    b.executables.push(resolved.executable);
}

fn flush(builder: &mut Option<ChainBuilder>, submission_id: SubmissionId, chains: &mut Vec<ProcessChain>) {
    if let Some(b) = builder.take() {
        if !b.executables.is_empty() {
            chains.push(b.finish(submission_id));
        }
    }
}

/// Attempt to unroll a `for-each` whose input collection is known.
///
/// Returns `true` if it was unrolled (removed from the frontier), `false`
/// if it must stay deferred.
fn try_unroll_foreach(
    action: &ForEachAction,
    known: &KnownOutputs,
    catalog: &ServiceCatalog,
    state: &mut ExecutionState,
    submission_id: SubmissionId,
    chains: &mut Vec<ProcessChain>,
) -> bool {
    let Some(collection) = known.get(&action.input_collection) else {
        return false;
    };
    let Some(elements) = collection.as_list() else {
        warn!("for-each input collection is not a list; deferring");
        return false;
    };

    let mut per_iteration_outputs = Vec::with_capacity(elements.len());

    for element in elements {
        let mut iteration_known = known.clone();
        iteration_known.insert(action.iteration_variable, element.clone());

        let mut iter_builder: Option<ChainBuilder> = None;
        let mut last_output: Option<VariableId> = None;

        for inner in &action.inner {
            match inner {
                Action::Execute(exec) => {
                    // Every binding in a for-each's inner action must be
                    // resolvable now (either the iteration variable or an
                    // already-known value) — partial iteration unrolling
                    // is not supported, matching the "all elements or
                    // none" shape of §8 scenario 6.
                    let Some(resolved) =
                        try_resolve(exec, &iteration_known, catalog, state, true)
                    else {
                        debug!("for-each iteration not fully resolvable; deferring whole loop");
                        return false;
                    };
                    if let Some(&out) = resolved.output_vars.iter().next() {
                        last_output = Some(out);
                    }
                    let service = catalog.get(exec.service_id).expect("validated");
                    append_or_flush(
                        &mut iter_builder,
                        resolved,
                        service.required_capabilities.clone(),
                        submission_id,
                        chains,
                    );
                }
                Action::ForEach(_) => {
                    warn!("nested for-each is not supported; skipping inner action");
                }
            }
        }
        flush(&mut iter_builder, submission_id, chains);

        if let Some(out) = last_output {
            per_iteration_outputs.push(out);
        }
    }

    if let Some(output_collection) = action.output_collection.or(action.yield_target) {
        state.watching.push(ForEachWatch {
            output_collection,
            per_iteration_outputs,
        });
    }
    true
}

/// Decompose `workflow` one step further, given everything learned so far.
///
/// Deterministic given the same `(workflow, known, state)` (§8 invariant 4).
pub fn decompose(
    submission_id: SubmissionId,
    workflow: &steep_model::Workflow,
    known: &KnownOutputs,
    catalog: &ServiceCatalog,
    mut state: ExecutionState,
) -> Result<DecomposeOutcome, WorkflowValidationError> {
    // An empty workflow has nothing to validate against the catalog and
    // nothing to decompose; it finalizes as a trivial SUCCESS downstream
    // (§3 Open Questions) rather than erroring out of `validate`'s
    // `EmptyWorkflow` check, which exists to reject a *non-empty* workflow
    // whose actions never got populated, not this case.
    if workflow.actions.is_empty() {
        return Ok(DecomposeOutcome {
            chains: Vec::new(),
            state,
            derived_bindings: KnownOutputs::new(),
            done: true,
        });
    }

    validate(workflow, catalog)?;

    let mut known_local = known.clone();
    let mut derived = KnownOutputs::new();

    let mut still_watching = Vec::with_capacity(state.watching.len());
    for watch in state.watching.drain(..) {
        if watch
            .per_iteration_outputs
            .iter()
            .all(|v| known_local.contains_key(v))
        {
            let values: Vec<Value> = watch
                .per_iteration_outputs
                .iter()
                .map(|v| known_local[v].clone())
                .collect();
            let list = Value::List(values);
            known_local.insert(watch.output_collection, list.clone());
            derived.insert(watch.output_collection, list);
        } else {
            still_watching.push(watch);
        }
    }
    state.watching = still_watching;

    let mut chains = Vec::new();
    let mut builder: Option<ChainBuilder> = None;
    let pending_actions = std::mem::take(&mut state.pending);
    let mut remaining = Vec::with_capacity(pending_actions.len());

    for action in pending_actions {
        match &action {
            Action::Execute(exec) => {
                match try_resolve(exec, &known_local, catalog, &mut state, false) {
                    Some(resolved) => {
                        let service = catalog.get(exec.service_id).expect("validated");
                        append_or_flush(
                            &mut builder,
                            resolved,
                            service.required_capabilities.clone(),
                            submission_id,
                            &mut chains,
                        );
                    }
                    None => remaining.push(action),
                }
            }
            Action::ForEach(foreach) => {
                // A for-each is always a chain boundary, whether or not it
                // unrolls this call (§4.1 step 2).
                flush(&mut builder, submission_id, &mut chains);
                let unrolled = try_unroll_foreach(
                    foreach,
                    &known_local,
                    catalog,
                    &mut state,
                    submission_id,
                    &mut chains,
                );
                if !unrolled {
                    remaining.push(action);
                }
            }
        }
    }
    flush(&mut builder, submission_id, &mut chains);
    state.pending = remaining;

    let done = state.is_done();
    Ok(DecomposeOutcome {
        chains,
        state,
        derived_bindings: derived,
        done,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use steep_core::ServiceId;
    use steep_model::{
        Cardinality, ParameterBinding, ServiceDescriptor, ServiceParameter, Workflow,
    };

    fn svc(id: ServiceId, caps: &[&str]) -> ServiceDescriptor {
        ServiceDescriptor {
            id,
            path: "/bin/svc".into(),
            runtime: steep_model::Runtime::Other,
            required_capabilities: CapabilitySet::from_iter(caps.iter().copied()),
            parameters: vec![
                ServiceParameter {
                    name: "in".into(),
                    data_type: "file".into(),
                    kind: ArgumentType::Input,
                    cardinality: Cardinality::One,
                },
                ServiceParameter {
                    name: "out".into(),
                    data_type: "file".into(),
                    kind: ArgumentType::Output,
                    cardinality: Cardinality::One,
                },
            ],
        }
    }

    #[test]
    fn single_execute_action_yields_one_chain() {
        let service_id = ServiceId::v4();
        let mut catalog = ServiceCatalog::new();
        catalog.register(svc(service_id, &["docker"]));

        let x = VariableId::v4();
        let y = VariableId::v4();
        let workflow = Workflow {
            actions: vec![Action::Execute(ExecuteAction {
                service_id,
                bindings: vec![
                    ParameterBinding {
                        parameter_name: "in".into(),
                        variable: x,
                        kind: ArgumentType::Input,
                    },
                    ParameterBinding {
                        parameter_name: "out".into(),
                        variable: y,
                        kind: ArgumentType::Output,
                    },
                ],
            })],
        };

        let mut known = KnownOutputs::new();
        known.insert(x, Value::Scalar("1".into()));

        let outcome = decompose(
            SubmissionId::v4(),
            &workflow,
            &known,
            &catalog,
            ExecutionState::initial(&workflow),
        )
        .unwrap();

        assert_eq!(outcome.chains.len(), 1);
        assert_eq!(outcome.chains[0].executables.len(), 1);
        assert!(outcome.done);
    }

    #[test]
    fn unknown_input_defers_action() {
        let service_id = ServiceId::v4();
        let mut catalog = ServiceCatalog::new();
        catalog.register(svc(service_id, &[]));

        let x = VariableId::v4();
        let y = VariableId::v4();
        let workflow = Workflow {
            actions: vec![Action::Execute(ExecuteAction {
                service_id,
                bindings: vec![
                    ParameterBinding {
                        parameter_name: "in".into(),
                        variable: x,
                        kind: ArgumentType::Input,
                    },
                    ParameterBinding {
                        parameter_name: "out".into(),
                        variable: y,
                        kind: ArgumentType::Output,
                    },
                ],
            })],
        };

        let outcome = decompose(
            SubmissionId::v4(),
            &workflow,
            &KnownOutputs::new(),
            &catalog,
            ExecutionState::initial(&workflow),
        )
        .unwrap();

        assert!(outcome.chains.is_empty());
        assert!(!outcome.done);
        assert_eq!(outcome.state.pending.len(), 1);
    }

    #[test]
    fn capability_mismatch_flushes_new_chain() {
        let a = ServiceId::v4();
        let b = ServiceId::v4();
        let mut catalog = ServiceCatalog::new();
        catalog.register(svc(a, &["docker"]));
        catalog.register(svc(b, &["gpu"]));

        let x = VariableId::v4();
        let y = VariableId::v4();
        let z = VariableId::v4();
        let workflow = Workflow {
            actions: vec![
                Action::Execute(ExecuteAction {
                    service_id: a,
                    bindings: vec![
                        ParameterBinding { parameter_name: "in".into(), variable: x, kind: ArgumentType::Input },
                        ParameterBinding { parameter_name: "out".into(), variable: y, kind: ArgumentType::Output },
                    ],
                }),
                Action::Execute(ExecuteAction {
                    service_id: b,
                    bindings: vec![
                        ParameterBinding { parameter_name: "in".into(), variable: y, kind: ArgumentType::Input },
                        ParameterBinding { parameter_name: "out".into(), variable: z, kind: ArgumentType::Output },
                    ],
                }),
            ],
        };

        let mut known = KnownOutputs::new();
        known.insert(x, Value::Scalar("1".into()));

        let outcome = decompose(
            SubmissionId::v4(),
            &workflow,
            &known,
            &catalog,
            ExecutionState::initial(&workflow),
        )
        .unwrap();

        assert_eq!(outcome.chains.len(), 2);
    }

    #[test]
    fn determinism_for_fixed_seed() {
        let service_id = ServiceId::v4();
        let mut catalog = ServiceCatalog::new();
        catalog.register(svc(service_id, &[]));

        let x = VariableId::v4();
        let y = VariableId::v4();
        let workflow = Workflow {
            actions: vec![Action::Execute(ExecuteAction {
                service_id,
                bindings: vec![
                    ParameterBinding { parameter_name: "in".into(), variable: x, kind: ArgumentType::Input },
                    ParameterBinding { parameter_name: "out".into(), variable: y, kind: ArgumentType::Output },
                ],
            })],
        };
        let mut known = KnownOutputs::new();
        known.insert(x, Value::Scalar("1".into()));

        let run = || {
            decompose(
                SubmissionId::nil(),
                &workflow,
                &known,
                &catalog,
                ExecutionState::initial(&workflow),
            )
            .unwrap()
        };
        let a = run();
        let b = run();
        assert_eq!(a.chains.len(), b.chains.len());
        assert_eq!(
            a.chains[0].executables[0].args,
            b.chains[0].executables[0].args
        );
    }

    #[test]
    fn for_each_unrolls_one_chain_per_element_and_watches_output() {
        let service_id = ServiceId::v4();
        let mut catalog = ServiceCatalog::new();
        catalog.register(svc(service_id, &[]));

        let collection = VariableId::v4();
        let iter_var = VariableId::v4();
        let per_item_out = VariableId::v4();
        let output_collection = VariableId::v4();

        let workflow = Workflow {
            actions: vec![Action::ForEach(ForEachAction {
                input_collection: collection,
                iteration_variable: iter_var,
                inner: vec![Action::Execute(ExecuteAction {
                    service_id,
                    bindings: vec![
                        ParameterBinding {
                            parameter_name: "in".into(),
                            variable: iter_var,
                            kind: ArgumentType::Input,
                        },
                        ParameterBinding {
                            parameter_name: "out".into(),
                            variable: per_item_out,
                            kind: ArgumentType::Output,
                        },
                    ],
                })],
                output_collection: Some(output_collection),
                yield_target: None,
            })],
        };

        let mut known = KnownOutputs::new();
        known.insert(
            collection,
            Value::List(vec![
                Value::Scalar("a".into()),
                Value::Scalar("b".into()),
                Value::Scalar("c".into()),
            ]),
        );

        let outcome = decompose(
            SubmissionId::v4(),
            &workflow,
            &known,
            &catalog,
            ExecutionState::initial(&workflow),
        )
        .unwrap();

        assert_eq!(outcome.chains.len(), 3);
        assert!(!outcome.done, "still watching for the output collection");
        assert_eq!(outcome.state.watching.len(), 1);
        assert_eq!(outcome.state.watching[0].per_iteration_outputs.len(), 3);

        // Every iteration minted its own fresh output id, not the
        // workflow-declared placeholder.
        let minted: HashSet<_> = outcome.state.watching[0]
            .per_iteration_outputs
            .iter()
            .copied()
            .collect();
        assert_eq!(minted.len(), 3);
        assert!(!minted.contains(&per_item_out));
    }

    #[test]
    fn empty_workflow_decomposes_to_done_with_no_chains() {
        let workflow = Workflow { actions: vec![] };
        let catalog = ServiceCatalog::new();

        let outcome = decompose(
            SubmissionId::v4(),
            &workflow,
            &KnownOutputs::new(),
            &catalog,
            ExecutionState::initial(&workflow),
        )
        .unwrap();

        assert!(outcome.chains.is_empty());
        assert!(outcome.done);
    }
}
