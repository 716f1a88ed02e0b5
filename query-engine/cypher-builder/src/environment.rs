use std::{
    fmt,
    sync::{self, atomic::AtomicUsize},
};

use graph_value::GraphValue;

use crate::ast::{Param, Variable};

/// The logical role a generated variable plays in a pattern or projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableRole {
    Node,
    Relationship,
    Value,
}

impl fmt::Display for VariableRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableRole::Node => f.write_str("this"),
            VariableRole::Relationship => f.write_str("edge"),
            VariableRole::Value => f.write_str("var"),
        }
    }
}

/// Naming authority of one compilation.
///
/// Every name is `{prefix}{role}{counter}`. The counters are shared by all prefixes, so
/// names stay unique even when two traversal paths render to the same prefix.
#[derive(Debug, Default)]
pub struct Environment {
    variable_counter: AtomicUsize,
    param_counter: AtomicUsize,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_variable(&self, prefix: &str, role: VariableRole) -> Variable {
        let n = self.variable_counter.fetch_add(1, sync::atomic::Ordering::SeqCst);
        Variable::named(format!("{prefix}{role}{n}"))
    }

    pub fn next_node(&self, prefix: &str) -> Variable {
        self.next_variable(prefix, VariableRole::Node)
    }

    pub fn next_relationship(&self, prefix: &str) -> Variable {
        self.next_variable(prefix, VariableRole::Relationship)
    }

    pub fn next_value(&self, prefix: &str) -> Variable {
        self.next_variable(prefix, VariableRole::Value)
    }

    pub fn next_param_name(&self, prefix: &str) -> String {
        let n = self.param_counter.fetch_add(1, sync::atomic::Ordering::SeqCst);
        format!("{prefix}param{n}")
    }

    pub fn next_param(&self, prefix: &str, value: impl Into<GraphValue>) -> Param {
        Param::new(self.next_param_name(prefix), value)
    }

    /// Number of variable names handed out so far.
    pub fn variables_issued(&self) -> usize {
        self.variable_counter.load(sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_never_repeat_across_prefixes() {
        let env = Environment::new();
        let mut seen = HashSet::new();

        for prefix in ["", "this_", "this_", "this_actors_"] {
            for role in [VariableRole::Node, VariableRole::Relationship, VariableRole::Value] {
                assert!(seen.insert(env.next_variable(prefix, role).to_string()));
            }
            assert!(seen.insert(env.next_param_name(prefix)));
        }

        assert_eq!(env.variables_issued(), 12);
    }

    #[test]
    fn parameters_count_independently_of_variables() {
        let env = Environment::new();

        assert_eq!(env.next_node("").to_string(), "this0");
        assert_eq!(env.next_relationship("this_").to_string(), "this_edge1");
        assert_eq!(env.next_param("", 1).name(), "param0");
        assert_eq!(env.next_value("").to_string(), "var2");
    }
}
