use std::{borrow::Cow, fmt};

use graph_value::GraphValue;

/// A query variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Variable {
    Named(Cow<'static, str>),
    /// A slot resolved by an enclosing [`Clause::Rebind`](crate::ast::Clause::Rebind) or
    /// [`IsolatedSubquery`](crate::ast::IsolatedSubquery) when rendered.
    External(Cow<'static, str>),
}

impl Variable {
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Variable::Named(name.into())
    }

    pub fn external(slot: impl Into<Cow<'static, str>>) -> Self {
        Variable::External(slot.into())
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variable::Named(name) => f.write_str(name),
            Variable::External(slot) => write!(f, "<{slot}>"),
        }
    }
}

impl From<&Variable> for Variable {
    fn from(v: &Variable) -> Self {
        v.clone()
    }
}

/// A bound parameter, rendered as `$name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Param {
    name: String,
    value: GraphValue,
}

impl Param {
    pub fn new(name: impl Into<String>, value: impl Into<GraphValue>) -> Self {
        Param {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &GraphValue {
        &self.value
    }
}
