use std::borrow::Cow;

use cypher_builder::ast::Variable;

/// Parameter holding the values produced by callbacks after the query is assembled.
pub const RESOLVED_CALLBACKS: &str = "resolvedCallbacks";

/// Prefix of the message a failed cardinality check aborts with.
pub const RELATIONSHIP_REQUIRED: &str = "@graph-compiler/RELATIONSHIP-REQUIRED: ";

pub(crate) const AUTH_FORBIDDEN: &str = "@graph-compiler/FORBIDDEN";

pub(crate) const CURSOR_PREFIX: &str = "arrayconnection:";

pub(crate) const ROOT_SLOT: &str = "root";

pub(crate) const DATA: &str = "data";
pub(crate) const META: &str = "meta";

const FIELD_SEPARATOR: &str = "_";

/// The variable every root operation matches or creates.
pub fn root_node() -> Variable {
    Variable::named("this")
}

/// Names derived from an external slot use the slot name itself.
fn path_segment(variable: &Variable) -> &str {
    match variable {
        Variable::Named(name) | Variable::External(name) => name,
    }
}

/// Name prefix for everything generated below `field` of the node bound to `parent`.
pub(crate) fn nested_prefix(parent: &Variable, field: &str) -> String {
    format!("{}{FIELD_SEPARATOR}{field}{FIELD_SEPARATOR}", path_segment(parent))
}

/// Name prefix for everything generated while writing the node bound to `variable`.
pub(crate) fn node_prefix(variable: &Variable) -> String {
    format!("{}{FIELD_SEPARATOR}", path_segment(variable))
}

/// Key of a callback result inside the resolved callbacks parameter.
pub(crate) fn callback_key(variable: &Variable, field: &str, callback: &str) -> Cow<'static, str> {
    format!("{}{FIELD_SEPARATOR}{field}{FIELD_SEPARATOR}{callback}", path_segment(variable)).into()
}

pub(crate) fn resolved_callback(key: &str) -> String {
    format!("{RESOLVED_CALLBACKS}.{key}")
}

pub(crate) fn external_root() -> Variable {
    Variable::external(ROOT_SLOT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_follow_the_traversal_path() {
        let movie = Variable::named("this0");

        assert_eq!(nested_prefix(&movie, "actors"), "this0_actors_");
        assert_eq!(node_prefix(&movie), "this0_");
        assert_eq!(nested_prefix(&external_root(), "actors"), "root_actors_");
        assert_eq!(resolved_callback(&callback_key(&movie, "id", "uuid")), "resolvedCallbacks.this0_id_uuid");
    }
}
