//! Aggregate selections, `moviesAggregate` at the root and `actorsAggregate` below a node.

use cypher_builder::ast::{Clause, Comparable, Expr, Match, Projection, ProjectionItem, Variable};
use schema_model::{
    AuthOperation, Filter, NodeDescriptor, RelationField, RelationshipProperties, ScalarField, Selection,
};

use crate::{
    CompileError, CompileResult,
    binding::{nested_prefix, root_node},
    translate::{Translator, extract_node_filter, is_directed, node_pattern, traversal},
};

const TYPENAME: &str = "__typename";

/// What an aggregate selection may ask for next to `count`.
#[derive(Clone, Copy)]
enum AggregateScope<'r> {
    /// Root aggregates select node fields directly.
    Root,
    /// Nested aggregates group them under `node` and `edge`.
    Related(Option<(&'r Variable, &'r RelationshipProperties)>),
}

impl<'a> Translator<'a> {
    pub(crate) fn translate_root_aggregate(
        &self,
        node: &'a NodeDescriptor,
        selection: &Selection,
    ) -> CompileResult<Clause> {
        let this = root_node();

        let filter = match selection.get_argument("where") {
            Some(value) => extract_node_filter(self.schema, node, value)?,
            None => Filter::Empty,
        };

        let predicate = self.guarded_predicate(node, AuthOperation::Read, &filter, &this, None, "")?;
        let value = self.aggregate_selection(selection, node, &this, AggregateScope::Root, "")?;

        Ok(Clause::sequence([
            self.root_match(node, &this, predicate),
            Projection::new([ProjectionItem::aliased(value, this.clone())]).into_return(),
        ]))
    }

    /// `CALL { WITH parent MATCH (parent)-[e:T]-(n) RETURN { count: count(n), ... } AS var }`
    pub(crate) fn project_aggregate(
        &self,
        parent: &Variable,
        field: &RelationField,
        selection: &Selection,
    ) -> CompileResult<(Clause, Variable)> {
        let prefix = nested_prefix(parent, selection.response_key());

        let target = match self.targets(field)?.as_slice() {
            [target] if !self.schema.is_abstract_target(field) => *target,
            _ => return Err(CompileError::unknown(&field.target, field.aggregate_name())),
        };

        let properties = self.schema.relationship_properties(field);
        let directed = is_directed(field, selection);
        let node = self.env.next_node(&prefix);
        let edge = properties.map(|properties| (self.env.next_relationship(&prefix), properties));
        let edge_variable = edge.as_ref().map(|(variable, _)| variable);

        let filter = match selection.get_argument("where") {
            Some(value) => extract_node_filter(self.schema, target, value)?,
            None => Filter::Empty,
        };

        let predicate = self.guarded_predicate(target, AuthOperation::Read, &filter, &node, None, &prefix)?;
        let scope = AggregateScope::Related(edge.as_ref().map(|(variable, properties)| (variable, *properties)));
        let value = self.aggregate_selection(selection, target, &node, scope, &prefix)?;
        let result = self.env.next_value(&prefix);

        let body = Clause::sequence([
            Match::new(traversal(parent, field, directed, edge_variable, node_pattern(&node, target)))
                .filter(predicate)
                .into(),
            Projection::new([ProjectionItem::aliased(value, result.clone())]).into_return(),
        ]);

        Ok((Clause::call_with([parent], body), result))
    }

    fn aggregate_selection(
        &self,
        selection: &Selection,
        target: &NodeDescriptor,
        node: &Variable,
        scope: AggregateScope<'_>,
        prefix: &str,
    ) -> CompileResult<Expr> {
        let entries = selection
            .selection
            .iter()
            .map(|nested| {
                let value = match (nested.name.as_str(), scope) {
                    ("count", _) => Expr::count(node),
                    (TYPENAME, _) => Expr::string(format!("{}AggregateSelection", target.name)),
                    ("node", AggregateScope::Related(_)) => {
                        self.field_aggregates(nested, node, &target.fields, &target.name, prefix)?
                    }
                    ("edge", AggregateScope::Related(Some((edge, properties)))) => {
                        self.field_aggregates(nested, edge, &properties.fields, &properties.name, prefix)?
                    }
                    (name, AggregateScope::Root) => {
                        let field = aggregatable(&target.fields, name)
                            .ok_or_else(|| CompileError::unknown(&target.name, name))?;
                        self.field_aggregate(nested, node, field, prefix)?
                    }
                    (name, AggregateScope::Related(_)) => {
                        return Err(CompileError::unknown(selection.response_key(), name));
                    }
                };

                Ok((nested.response_key().to_owned(), value))
            })
            .collect::<CompileResult<Vec<_>>>()?;

        Ok(Expr::map(entries))
    }

    fn field_aggregates(
        &self,
        selection: &Selection,
        owner: &Variable,
        fields: &[ScalarField],
        type_name: &str,
        prefix: &str,
    ) -> CompileResult<Expr> {
        let entries = selection
            .selection
            .iter()
            .map(|nested| {
                let value = match nested.name.as_str() {
                    TYPENAME => Expr::string(format!("{type_name}AggregateSelection")),
                    name => {
                        let field = aggregatable(fields, name).ok_or_else(|| CompileError::unknown(type_name, name))?;
                        self.field_aggregate(nested, owner, field, prefix)?
                    }
                };

                Ok((nested.response_key().to_owned(), value))
            })
            .collect::<CompileResult<Vec<_>>>()?;

        Ok(Expr::map(entries))
    }

    /// `{ min, max, average, sum, shortest, longest }` of one field, as far as its type allows.
    fn field_aggregate(
        &self,
        selection: &Selection,
        owner: &Variable,
        field: &ScalarField,
        prefix: &str,
    ) -> CompileResult<Expr> {
        let property = Expr::property(owner, field.db_name());
        let kind = &field.type_identifier;

        let entries = selection
            .selection
            .iter()
            .map(|nested| {
                let value = match nested.name.as_str() {
                    "min" | "max" if kind.is_orderable() => Expr::function(nested.name.clone(), [property.clone()]),
                    "average" if kind.is_numeric() => Expr::function("avg", [property.clone()]),
                    "sum" if kind.is_numeric() => Expr::function("sum", [property.clone()]),
                    "shortest" if kind.is_textual() => self.extreme_length(&property, false, prefix),
                    "longest" if kind.is_textual() => self.extreme_length(&property, true, prefix),
                    name => return Err(CompileError::unknown(&field.name, name)),
                };

                Ok((nested.response_key().to_owned(), value))
            })
            .collect::<CompileResult<Vec<_>>>()?;

        Ok(Expr::map(entries))
    }

    /// The shortest or longest value itself, not only its length.
    fn extreme_length(&self, property: &Expr, longest: bool, prefix: &str) -> Expr {
        let accumulator = self.env.next_value(prefix);
        let current = self.env.next_value(prefix);

        let keep_current = if longest {
            Expr::size(&current).greater_than(Expr::size(&accumulator))
        } else {
            Expr::size(&current).less_than(Expr::size(&accumulator))
        };

        Expr::reduce(
            accumulator.clone(),
            Expr::head(Expr::collect(property.clone())),
            current.clone(),
            Expr::collect(property.clone()),
            Expr::case(keep_current, &current, &accumulator),
        )
    }
}

fn aggregatable<'f>(fields: &'f [ScalarField], name: &str) -> Option<&'f ScalarField> {
    fields.iter().find(|f| f.name == name && !f.is_list && !f.is_computed())
}
