//! Folding a chain's stored `{outputVarId: list of values}` results into
//! the rule engine's `KnownOutputs` map (single `Value` per variable).

use std::collections::HashMap;

use steep_core::VariableId;
use steep_model::Value;
use steep_rule_engine::KnownOutputs;

/// A single produced value binds directly; more than one is wrapped in a
/// `Value::List` so a downstream `for-each` can iterate it unchanged.
pub fn fold_results(known: &mut KnownOutputs, results: &HashMap<VariableId, Vec<Value>>) {
    for (variable, values) in results {
        let value = match values.as_slice() {
            [single] => single.clone(),
            many => Value::List(many.to_vec()),
        };
        known.insert(*variable, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_value_binds_unwrapped() {
        let mut known = KnownOutputs::new();
        let var = VariableId::v4();
        let mut results = HashMap::new();
        results.insert(var, vec![Value::Path("/tmp/a".into())]);

        fold_results(&mut known, &results);
        assert_eq!(known.get(&var), Some(&Value::Path("/tmp/a".into())));
    }

    #[test]
    fn multiple_values_wrap_in_list() {
        let mut known = KnownOutputs::new();
        let var = VariableId::v4();
        let mut results = HashMap::new();
        results.insert(var, vec![Value::Path("/tmp/a".into()), Value::Path("/tmp/b".into())]);

        fold_results(&mut known, &results);
        assert_eq!(
            known.get(&var),
            Some(&Value::List(vec![Value::Path("/tmp/a".into()), Value::Path("/tmp/b".into())]))
        );
    }
}
