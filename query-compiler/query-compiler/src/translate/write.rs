//! Mutations: creates, updates and deletes with their nested relationship operations.
//!
//! Every nested operation runs in its own `CALL` subquery importing the node it hangs off,
//! preceded by `WITH *` since Cypher wants a projection between writes and subqueries.

mod connect;
mod create;
mod delete;
mod disconnect;
mod unwind_create;
mod update;

use cypher_builder::ast::{
    Clause, Comparable, Expr, MapEntry, Match, NodePattern, Projection, ProjectionItem, Variable,
};
use graph_value::GraphValue;
use itertools::Itertools;
use schema_model::{
    Cardinality, Filter, NodeDescriptor, RelationField, ScalarField, Selection, WriteOperation,
};

use crate::{
    CardinalityViolation, CompileError, CompileResult,
    binding::{DATA, RESOLVED_CALLBACKS, callback_key, nested_prefix, resolved_callback},
    translate::{
        Translator, auth::validate, connection::connection_member_where, expect_object, extract_node_filter,
        filter::extract_connection_filter, member_where, object_entries, projection::NodeProjection, traversal,
    },
};

/// The nested operations accepted per relationship field, in the order they are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RelationOperation {
    Update,
    Connect,
    Disconnect,
    Create,
    Delete,
}

impl RelationOperation {
    pub(crate) const ALL: [RelationOperation; 5] = [
        RelationOperation::Update,
        RelationOperation::Connect,
        RelationOperation::Disconnect,
        RelationOperation::Create,
        RelationOperation::Delete,
    ];

    pub(crate) fn key(self) -> &'static str {
        match self {
            RelationOperation::Update => "update",
            RelationOperation::Connect => "connect",
            RelationOperation::Disconnect => "disconnect",
            RelationOperation::Create => "create",
            RelationOperation::Delete => "delete",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.key() == key)
    }
}

/// Input of one relationship field, split per concrete target.
pub(crate) type RelationInput<'n, 'a, 'v> = (&'n RelationField, &'a NodeDescriptor, &'v GraphValue);

/// Entries of a list argument, or the value itself when a single object was given.
pub(crate) fn items(value: &GraphValue) -> &[GraphValue] {
    match value {
        GraphValue::Null => &[],
        GraphValue::List(values) => values,
        other => std::slice::from_ref(other),
    }
}

/// Splits a write input into scalar assignments and relationship inputs.
#[allow(clippy::type_complexity)]
pub(crate) fn split_input<'n, 'v>(
    node: &'n NodeDescriptor,
    input: &'v [(String, GraphValue)],
) -> CompileResult<(Vec<(&'n ScalarField, &'v GraphValue)>, Vec<(&'n RelationField, &'v GraphValue)>)> {
    let mut scalars = Vec::new();
    let mut relations = Vec::new();

    for (key, value) in input {
        if let Some(field) = node.find_field(key) {
            scalars.push((writable(field)?, value));
        } else if let Some(field) = node.find_relation_field(key) {
            if !value.is_null() {
                relations.push((field, value));
            }
        } else {
            return Err(CompileError::unknown(&node.name, key));
        }
    }

    Ok((scalars, relations))
}

/// Fields of relationship properties named by an `edge` input.
pub(crate) fn edge_input<'f, 'v>(
    owner: &str,
    fields: &'f [ScalarField],
    input: &'v [(String, GraphValue)],
) -> CompileResult<Vec<(&'f ScalarField, &'v GraphValue)>> {
    input
        .iter()
        .map(|(key, value)| {
            let field = fields
                .iter()
                .find(|f| &f.name == key)
                .ok_or_else(|| CompileError::unknown(owner, key))?;

            Ok((writable(field)?, value))
        })
        .collect()
}

fn writable(field: &ScalarField) -> CompileResult<&ScalarField> {
    if field.is_computed() || field.is_generated() {
        return Err(CompileError::invalid_argument(&field.name, "the field cannot be written"));
    }

    Ok(field)
}

/// `WITH *`
pub(crate) fn with_all() -> Clause {
    Projection::star().into_with()
}

/// `RETURN count(*) AS var`, closing unit subqueries so they keep the row count.
fn return_count(variable: Variable) -> Clause {
    Projection::new([ProjectionItem::aliased(Expr::count_star(), variable)]).into_return()
}

/// A subscription event for a node created in this query.
pub(crate) fn create_event(node: &NodeDescriptor, variable: &Variable) -> Expr {
    Expr::map([
        ("event", Expr::string("create")),
        ("id", Expr::function("id", [Expr::from(variable)])),
        (
            "properties",
            Expr::map([
                ("old", Expr::null()),
                ("new", Expr::map_projection(variable, vec![MapEntry::AllProperties])),
            ]),
        ),
        ("timestamp", Expr::function("timestamp", std::iter::empty())),
        ("typename", Expr::string(node.name.clone())),
    ])
}

impl<'a> Translator<'a> {
    /// Values the server fills in: timestamps and callback results.
    pub(crate) fn generated_assignments(
        &self,
        fields: &[ScalarField],
        variable: &Variable,
        input: &GraphValue,
        operation: WriteOperation,
    ) -> Vec<(Expr, Expr)> {
        fields
            .iter()
            .filter_map(|field| {
                let target = Expr::property(variable, field.db_name());

                if field.has_timestamp_for(operation) {
                    return Some((target, Expr::function("datetime", std::iter::empty())));
                }

                let callback = field.callback_for(operation)?;
                let key = callback_key(variable, &field.name, callback);

                self.bucket
                    .add(callback, input.clone(), vec![RESOLVED_CALLBACKS.into(), key.as_ref().into()]);

                Some((target, Expr::ParamRef(resolved_callback(&key))))
            })
            .collect()
    }

    /// `SET` of request values plus generated ones.
    pub(crate) fn assignments(
        &self,
        fields: &[(&ScalarField, &GraphValue)],
        generated_from: &[ScalarField],
        variable: &Variable,
        input: &GraphValue,
        operation: WriteOperation,
        prefix: &str,
    ) -> Clause {
        let mut assignments: Vec<_> = fields
            .iter()
            .map(|(field, value)| (Expr::property(variable, field.db_name()), self.bind(field, value, prefix)))
            .collect();

        assignments.extend(self.generated_assignments(generated_from, variable, input, operation));

        Clause::set(assignments)
    }

    /// Concrete targets of a relationship input. Abstract targets key their input by member.
    pub(crate) fn relation_targets<'v>(
        &self,
        field: &RelationField,
        value: &'v GraphValue,
    ) -> CompileResult<Vec<(&'a NodeDescriptor, &'v GraphValue)>> {
        let targets = self.targets(field)?;

        if !self.schema.is_abstract_target(field) {
            return Ok(vec![(targets[0], value)]);
        }

        expect_object(value, &field.name)?
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| {
                let member = targets
                    .iter()
                    .find(|member| &member.name == key)
                    .ok_or_else(|| CompileError::unknown(&field.target, key))?;

                Ok((*member, value))
            })
            .collect()
    }

    /// Flattens `{ field: [items] }` of `node` into one entry per item and target.
    pub(crate) fn relation_items<'n, 'v>(
        &self,
        node: &'n NodeDescriptor,
        value: &'v GraphValue,
        argument: &str,
    ) -> CompileResult<Vec<RelationInput<'n, 'a, 'v>>> {
        let mut inputs = Vec::new();

        for (key, value) in object_entries(Some(value), argument)? {
            let field = node
                .find_relation_field(key)
                .ok_or_else(|| CompileError::unknown(&node.name, key))?;

            for (target, value) in self.relation_targets(field, value)? {
                inputs.extend(items(value).iter().map(|item| (field, target, item)));
            }
        }

        Ok(inputs)
    }

    /// Filter of a nested `where: { node, edge }`, narrowed to `target` for abstract fields.
    pub(crate) fn relation_filter(
        &self,
        field: &RelationField,
        target: &NodeDescriptor,
        where_arg: Option<&GraphValue>,
    ) -> CompileResult<Filter> {
        match where_arg {
            None | Some(GraphValue::Null) => Ok(Filter::Empty),
            Some(value) if self.schema.is_abstract_target(field) => {
                extract_connection_filter(self.schema, field, target, &connection_member_where(value, &target.name))
            }
            Some(value) => extract_connection_filter(self.schema, field, target, value),
        }
    }

    /// Filter of `where: { node }` used to pick nodes to connect.
    pub(crate) fn candidate_filter(
        &self,
        field: &RelationField,
        target: &NodeDescriptor,
        where_arg: Option<&GraphValue>,
    ) -> CompileResult<Filter> {
        let Some(node) = where_arg.and_then(|value| value.get("node")).filter(|v| !v.is_null()) else {
            return Ok(Filter::Empty);
        };

        if self.schema.is_abstract_target(field) {
            extract_node_filter(self.schema, target, &member_where(node, &target.name))
        } else {
            extract_node_filter(self.schema, target, node)
        }
    }

    /// Aborts the query when a single relationship of `node` is missing or doubled.
    ///
    /// `CALL { WITH n MATCH (n)-[r:T]-(:L) WITH count(r) AS c CALL apoc.util.validate(...) RETURN c }`
    pub(crate) fn cardinality_checks(&self, node: &NodeDescriptor, variable: &Variable) -> CompileResult<Vec<Clause>> {
        let mut checks = Vec::new();

        for field in &node.relation_fields {
            let Cardinality::One { required } = field.cardinality() else {
                continue;
            };

            let prefix = nested_prefix(variable, &field.name);
            let relationship = self.env.next_relationship(&prefix);
            let count = self.env.next_value(&prefix);

            let target = match self.targets(field)?.as_slice() {
                [target] if !self.schema.is_abstract_target(field) => {
                    NodePattern::anonymous().labels(target.labels.iter().cloned())
                }
                _ => NodePattern::anonymous(),
            };

            let allowed = if required {
                Expr::from(&count).equals(Expr::int(1))
            } else {
                Expr::from(&count).less_than_or_equals(Expr::int(1))
            };

            let violation = CardinalityViolation {
                node: node.name.clone(),
                field: field.name.clone(),
                required,
            };

            let body = Clause::sequence([
                Match::new(traversal(variable, field, true, Some(&relationship), target)).into(),
                Projection::new([ProjectionItem::aliased(Expr::count(&relationship), count.clone())]).into_with(),
                validate(allowed.negate(), violation.message()),
                Projection::variables([&count]).into_return(),
            ]);

            checks.push(Clause::call_with([variable], body));
        }

        if !checks.is_empty() {
            checks.insert(0, with_all());
        }

        Ok(checks)
    }

    /// The selection of the mutated nodes, `createMovies { movies { ... } }`.
    pub(crate) fn mutation_projection(
        &self,
        node: &NodeDescriptor,
        variable: &Variable,
        selection: &Selection,
    ) -> CompileResult<Option<NodeProjection>> {
        selection
            .nested(&node.plural)
            .map(|nested| self.project_node(node, variable, nested))
            .transpose()
    }

    /// `RETURN collect(DISTINCT n { ... }) AS data`, after the projection subqueries.
    pub(crate) fn collected_result(
        &self,
        node: &NodeDescriptor,
        variable: &Variable,
        selection: &Selection,
    ) -> CompileResult<Vec<Clause>> {
        let Some(projection) = self.mutation_projection(node, variable, selection)? else {
            return Ok(vec![empty_result()]);
        };

        let mut clauses = Vec::new();

        if !projection.subqueries.is_empty() {
            clauses.push(with_all());
            clauses.extend(projection.subqueries);
        }

        let collected = Expr::collect_distinct(Expr::map_projection(variable, projection.entries));
        clauses.push(Projection::new([ProjectionItem::aliased(collected, Variable::named(DATA))]).into_return());

        Ok(clauses)
    }

    /// Applies the nested operations of one relationship item, `{ where, update, connect, ... }`.
    pub(crate) fn relation_operations(
        &self,
        parent: &NodeDescriptor,
        parent_var: &Variable,
        field: &RelationField,
        target: &'a NodeDescriptor,
        item: &GraphValue,
    ) -> CompileResult<Vec<Clause>> {
        let entries = expect_object(item, &field.name)?;

        let unknown = entries
            .iter()
            .map(|(key, _)| key.as_str())
            .filter(|key| *key != "where" && RelationOperation::from_key(key).is_none())
            .map(|key| format!("`{key}`"))
            .join(", ");

        if !unknown.is_empty() {
            return Err(CompileError::invalid_argument(&field.name, format!("unknown operations {unknown}")));
        }

        let where_arg = item.get("where");
        let mut clauses = Vec::new();

        for operation in RelationOperation::ALL {
            let Some(value) = item.get(operation.key()).filter(|v| !v.is_null()) else {
                continue;
            };

            match operation {
                RelationOperation::Update => {
                    clauses.extend(self.nested_update(parent_var, field, target, where_arg, value)?);
                }
                RelationOperation::Delete => {
                    let branches = items(value).iter().map(|item| (field, target, item)).collect();
                    clauses.extend(self.delete_branches(parent_var, branches)?);
                }
                _ => {
                    for item in items(value) {
                        clauses.extend(self.relation_operation(operation, parent, parent_var, field, target, item)?);
                    }
                }
            }
        }

        Ok(clauses)
    }

    /// One `connect`, `disconnect` or `create` item below `parent_var`.
    pub(crate) fn relation_operation(
        &self,
        operation: RelationOperation,
        parent: &NodeDescriptor,
        parent_var: &Variable,
        field: &RelationField,
        target: &'a NodeDescriptor,
        item: &GraphValue,
    ) -> CompileResult<Vec<Clause>> {
        match operation {
            RelationOperation::Connect => self.connect(parent, parent_var, field, target, item),
            RelationOperation::Disconnect => self.disconnect(parent, parent_var, field, target, item),
            RelationOperation::Create => self.create_related(parent_var, field, target, item, &mut Vec::new()),
            RelationOperation::Update | RelationOperation::Delete => Err(CompileError::InvalidOperationDispatch(format!(
                "`{}` takes a where clause and is not applied per item",
                operation.key()
            ))),
        }
    }
}

/// `RETURN [] AS data` for mutations selecting nothing of the written nodes.
pub(crate) fn empty_result() -> Clause {
    Projection::new([ProjectionItem::aliased(Expr::List(Vec::new()), Variable::named(DATA))]).into_return()
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::CompileContext;
    use cypher_builder::visitor::Cypher;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn single_relationships_are_counted_after_writes() {
        let schema = test_schema::movies();
        let context = CompileContext::default();
        let translator = Translator::new(&schema, &context);
        let movie = schema.find_node("Movie").unwrap();

        let checks = translator.cardinality_checks(movie, &Variable::named("this")).unwrap();
        let rendered = Cypher::build(&Clause::sequence(checks), &translator.env).unwrap();

        assert_eq!(
            rendered.text,
            indoc! {r#"
                WITH *
                CALL {
                    WITH this
                    MATCH (this)<-[this_director_edge0:DIRECTED]-(:`Director`)
                    WITH count(this_director_edge0) AS this_director_var1
                    CALL apoc.util.validate(NOT (this_director_var1 = 1), "@graph-compiler/RELATIONSHIP-REQUIRED: Movie.director required exactly once", [0])
                    RETURN this_director_var1
                }"#}
        );
    }

    #[test]
    fn generated_fields_cannot_be_written() {
        let schema = test_schema::movies();
        let movie = schema.find_node("Movie").unwrap();
        let input: GraphValue = r#"{ "id": "1" }"#.parse().unwrap();

        assert!(matches!(
            split_input(movie, input.as_object().unwrap()),
            Err(CompileError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn operations_run_in_a_fixed_order() {
        let keys: Vec<_> = RelationOperation::ALL.iter().map(|op| op.key()).collect();

        assert_eq!(keys, ["update", "connect", "disconnect", "create", "delete"]);
    }
}
