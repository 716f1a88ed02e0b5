//! Selection sets to nested map projections.
//!
//! Scalars become entries of the map projection of the current node. Relationship,
//! connection and aggregate fields each compile to a `CALL` subquery run before the
//! projection, whose result variable the projection then refers to.

use cypher_builder::ast::{
    CallImports, Clause, Expr, MapEntry, Match, Projection, ProjectionItem, Union, Variable,
};
use schema_model::{AuthOperation, Cardinality, Filter, NodeDescriptor, RelationField, ScalarField, Selection};

use crate::{
    CompileError, CompileResult,
    binding::nested_prefix,
    translate::{
        Translator, extract_node_filter, is_directed, member_where, node_pattern,
        options::{ensure_entry, read_options},
        traversal,
    },
};

/// Key naming the concrete type of members of interface and union targets.
pub(crate) const RESOLVE_TYPE: &str = "__resolveType";

const TYPENAME: &str = "__typename";

/// A node's share of the result: subqueries to run first, then the map projection entries.
#[derive(Debug, Default)]
pub(crate) struct NodeProjection {
    pub(crate) subqueries: Vec<Clause>,
    pub(crate) entries: Vec<MapEntry>,
}

impl NodeProjection {
    pub(crate) fn resolve_type(mut self, node: &NodeDescriptor) -> Self {
        self.entries
            .insert(0, MapEntry::Keyed(RESOLVE_TYPE.to_owned(), Expr::string(node.name.clone())));
        self
    }

    /// `variable { ... } AS variable`
    pub(crate) fn item(entries: Vec<MapEntry>, variable: &Variable) -> ProjectionItem {
        ProjectionItem::aliased(Expr::map_projection(variable, entries), variable.clone())
    }
}

/// `collect(n)` for list fields, `head(collect(n))` for single ones.
pub(crate) fn collect_for(field: &RelationField, variable: &Variable) -> Expr {
    match field.cardinality() {
        Cardinality::Many => Expr::collect(variable),
        Cardinality::One { .. } => Expr::head(Expr::collect(variable)),
    }
}

impl Translator<'_> {
    pub(crate) fn project_node(
        &self,
        node: &NodeDescriptor,
        variable: &Variable,
        selection: &Selection,
    ) -> CompileResult<NodeProjection> {
        let mut projection = NodeProjection::default();

        for nested in selection.fields_for(&node.name) {
            let key = nested.response_key();

            if nested.name == TYPENAME {
                projection
                    .entries
                    .push(MapEntry::Keyed(key.to_owned(), Expr::string(node.name.clone())));
                continue;
            }

            if let Some(field) = node.find_field(&nested.name) {
                projection.entries.push(project_scalar(field, key, variable));
                continue;
            }

            let (subquery, result) = if let Some(field) = node.find_relation_field(&nested.name) {
                self.project_relation(variable, field, nested)?
            } else if let Some(field) = node.find_connection_field(&nested.name) {
                self.project_connection(&node.name, variable, field, nested)?
            } else if let Some(field) = node.find_aggregate_field(&nested.name) {
                self.project_aggregate(variable, field, nested)?
            } else {
                return Err(CompileError::unknown(&node.name, &nested.name));
            };

            projection.subqueries.push(subquery);
            projection.entries.push(MapEntry::Keyed(key.to_owned(), Expr::from(result)));
        }

        Ok(projection)
    }

    /// `CALL { WITH parent MATCH (parent)-[:T]-(n) ... RETURN collect(n { ... }) AS var }`
    pub(crate) fn project_relation(
        &self,
        parent: &Variable,
        field: &RelationField,
        selection: &Selection,
    ) -> CompileResult<(Clause, Variable)> {
        let prefix = nested_prefix(parent, selection.response_key());
        let targets = self.targets(field)?;
        let directed = is_directed(field, selection);
        let options = read_options(&targets, selection)?;
        let where_arg = selection.get_argument("where");

        let related = self.env.next_node(&prefix);

        if !self.schema.is_abstract_target(field) {
            let target = targets[0];
            let filter = match where_arg {
                Some(value) => extract_node_filter(self.schema, target, value)?,
                None => Filter::Empty,
            };

            let predicate = self.guarded_predicate(target, AuthOperation::Read, &filter, &related, None, &prefix)?;
            let projection = self.project_node(target, &related, selection)?;
            let result = self.env.next_value(&prefix);

            let mut body = vec![Match::new(traversal(parent, field, directed, None, node_pattern(&related, target)))
                .filter(predicate)
                .into()];

            if !options.is_empty() {
                body.push(options.apply(Projection::variables([&related]), &related).into_with());
            }

            body.extend(projection.subqueries);
            body.push(Projection::new([NodeProjection::item(projection.entries, &related)]).into_with());
            body.push(
                Projection::new([ProjectionItem::aliased(collect_for(field, &related), result.clone())]).into_return(),
            );

            return Ok((Clause::call_with([parent], Clause::sequence(body)), result));
        }

        let branches = targets
            .iter()
            .map(|member| {
                let filter = match where_arg {
                    Some(value) => extract_node_filter(self.schema, member, &member_where(value, &member.name))?,
                    None => Filter::Empty,
                };

                let predicate = self.guarded_predicate(member, AuthOperation::Read, &filter, &related, None, &prefix)?;
                let mut projection = self.project_node(member, &related, selection)?.resolve_type(member);

                for order_by in &options.sort {
                    ensure_entry(&mut projection.entries, &related, &order_by.field);
                }

                Ok(Clause::sequence([
                    Projection::variables([parent]).into_with(),
                    Match::new(traversal(parent, field, directed, None, node_pattern(&related, member)))
                        .filter(predicate)
                        .into(),
                    Clause::sequence(projection.subqueries),
                    Projection::new([NodeProjection::item(projection.entries, &related)]).into_return(),
                ]))
            })
            .collect::<CompileResult<Vec<_>>>()?;

        let result = self.env.next_value(&prefix);

        let mut body = vec![Clause::call(CallImports::None, Union::new(branches).into())];

        if !options.is_empty() {
            body.push(options.apply_projected(Projection::variables([&related]), &related).into_with());
        }

        body.push(
            Projection::new([ProjectionItem::aliased(collect_for(field, &related), result.clone())]).into_return(),
        );

        Ok((Clause::call_with([parent], Clause::sequence(body)), result))
    }
}

fn project_scalar(field: &ScalarField, key: &str, variable: &Variable) -> MapEntry {
    if let Some(statement) = &field.custom_statement {
        let body = Clause::Raw(statement.clone());

        let value = if field.is_list {
            Expr::isolated_many("this", variable.clone(), body)
        } else {
            Expr::isolated("this", variable.clone(), body)
        };

        return MapEntry::Keyed(key.to_owned(), value);
    }

    if key == field.db_name() {
        MapEntry::Property(key.to_owned())
    } else {
        MapEntry::Keyed(key.to_owned(), Expr::property(variable, field.db_name()))
    }
}
