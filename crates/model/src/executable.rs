//! Executables: one external command invocation within a process chain.

use serde::{Deserialize, Serialize};
use steep_core::{ServiceId, VariableId};

/// How an [`Argument`] participates in an executable's invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArgumentType {
    Input,
    Output,
    Argument,
}

/// The declared data type of an argument, used by the rule engine to
/// validate service-parameter bindings and by the executor's output
/// adapters to pick a plugin (§4.4, §9 Open Question 3).
pub type DataType = String;

/// One binding of a [`Variable`](crate::Variable) into an executable's
/// command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    /// Optional CLI flag/label (e.g. `--input`), `None` for positional args.
    pub label: Option<String>,
    pub variable: VariableId,
    #[serde(rename = "type")]
    pub kind: ArgumentType,
    pub data_type: DataType,
}

/// Which adapter invokes an executable's command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Runtime {
    /// Built-in container runtime.
    Docker,
    /// Built-in "run this binary directly" runtime.
    Other,
    /// A plugin-provided runtime, looked up by name in the executor's
    /// runtime registry.
    Plugin(String),
}

/// One external command invocation within a [`ProcessChain`](crate::ProcessChain).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Executable {
    pub path: String,
    pub args: Vec<Argument>,
    pub runtime: Runtime,
    pub service_id: ServiceId,
    /// Maximum retry attempts for this executable (§4.4); `1` = no retry.
    pub retries: u32,
}

impl Executable {
    /// Arguments whose [`ArgumentType`] is `Output`.
    pub fn outputs(&self) -> impl Iterator<Item = &Argument> {
        self.args.iter().filter(|a| a.kind == ArgumentType::Output)
    }

    /// Arguments whose [`ArgumentType`] is `Input`.
    pub fn inputs(&self) -> impl Iterator<Item = &Argument> {
        self.args.iter().filter(|a| a.kind == ArgumentType::Input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_exec(kinds: &[ArgumentType]) -> Executable {
        Executable {
            path: "/bin/true".into(),
            args: kinds
                .iter()
                .map(|k| Argument {
                    label: None,
                    variable: VariableId::v4(),
                    kind: *k,
                    data_type: "string".into(),
                })
                .collect(),
            runtime: Runtime::Other,
            service_id: ServiceId::v4(),
            retries: 1,
        }
    }

    #[test]
    fn outputs_filters_by_kind() {
        let exec = make_exec(&[ArgumentType::Input, ArgumentType::Output, ArgumentType::Output]);
        assert_eq!(exec.outputs().count(), 2);
        assert_eq!(exec.inputs().count(), 1);
    }
}
