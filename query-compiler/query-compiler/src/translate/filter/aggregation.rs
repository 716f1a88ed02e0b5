//! `<rel>Aggregate` filters, decided by an isolated sub-query over the related set.

use cypher_builder::ast::{Clause, CompareOp, Expr, Match, Predicate, Projection, ProjectionItem, Quantifier, Variable};
use graph_value::GraphValue;
use itertools::Itertools;
use schema_model::{
    AggregateComparison, AggregateFunction, AggregationCondition, AggregationFilter, Filter, OrderTarget, RelationField,
    ScalarField, SchemaModel,
};

use crate::{
    CompileError, CompileResult,
    translate::{Translator, node_pattern, traversal},
};

/// Name of the node variable inside the isolated scope.
const AGGREGATION_SLOT: &str = "this";

pub(super) fn extract_aggregation(
    schema: &SchemaModel,
    field: &RelationField,
    value: &GraphValue,
) -> CompileResult<Filter> {
    let name = field.aggregate_name();

    let target = match schema.target_nodes(field).as_slice() {
        [target] if !schema.is_abstract_target(field) => *target,
        _ => return Err(CompileError::invalid_filter(&name, &field.target)),
    };

    let edge_fields = schema
        .relationship_properties(field)
        .map(|p| p.fields.as_slice())
        .unwrap_or_default();

    let condition = extract_condition(&name, &target.fields, edge_fields, value)?;

    Ok(Filter::Aggregation(AggregationFilter {
        field: field.clone(),
        target: target.name.clone(),
        condition,
    }))
}

fn entries<'v>(name: &str, value: &'v GraphValue) -> CompileResult<&'v [(String, GraphValue)]> {
    value
        .as_object()
        .ok_or_else(|| CompileError::invalid_argument(name, "expected an object"))
}

fn combine(mut conditions: Vec<AggregationCondition>) -> AggregationCondition {
    if conditions.len() == 1 {
        conditions.remove(0)
    } else {
        AggregationCondition::And(conditions)
    }
}

/// `AND`/`OR`/`NOT` groups, `None` for any other key.
fn logical<F>(key: &str, value: &GraphValue, extract: F) -> CompileResult<Option<AggregationCondition>>
where
    F: Fn(&GraphValue) -> CompileResult<AggregationCondition>,
{
    let list = || match value {
        GraphValue::List(values) => values.iter().map(&extract).collect::<CompileResult<Vec<_>>>(),
        _ => Ok(vec![extract(value)?]),
    };

    Ok(match key {
        "AND" => Some(AggregationCondition::And(list()?)),
        "OR" => Some(AggregationCondition::Or(list()?)),
        "NOT" => Some(AggregationCondition::Not(Box::new(extract(value)?))),
        _ => None,
    })
}

fn extract_condition(
    name: &str,
    node_fields: &[ScalarField],
    edge_fields: &[ScalarField],
    value: &GraphValue,
) -> CompileResult<AggregationCondition> {
    let conditions = entries(name, value)?
        .iter()
        .map(|(key, value)| {
            if let Some(condition) = logical(key, value, |v| extract_condition(name, node_fields, edge_fields, v))? {
                return Ok(condition);
            }

            match key.as_str() {
                "count" => Ok(count(AggregateComparison::Equal, value)),
                "node" => extract_fields(name, OrderTarget::Node, node_fields, value),
                "edge" if !edge_fields.is_empty() => extract_fields(name, OrderTarget::Edge, edge_fields, value),
                _ => match key.strip_prefix("count_").and_then(AggregateComparison::from_suffix) {
                    Some(comparison) => Ok(count(comparison, value)),
                    None => Err(CompileError::invalid_filter(name, key)),
                },
            }
        })
        .collect::<CompileResult<Vec<_>>>()?;

    Ok(combine(conditions))
}

fn count(comparison: AggregateComparison, value: &GraphValue) -> AggregationCondition {
    AggregationCondition::Count {
        comparison,
        value: value.clone(),
    }
}

fn extract_fields(
    name: &str,
    target: OrderTarget,
    fields: &[ScalarField],
    value: &GraphValue,
) -> CompileResult<AggregationCondition> {
    let find = |field: &str| fields.iter().find(|f| f.name == field && !f.is_computed());

    let conditions = entries(name, value)?
        .iter()
        .map(|(key, value)| {
            if let Some(condition) = logical(key, value, |v| extract_fields(name, target, fields, v))? {
                return Ok(condition);
            }

            let invalid = || CompileError::invalid_filter(name, key);

            let (rest, comparison) = key
                .rsplit_once('_')
                .and_then(|(rest, suffix)| Some((rest, AggregateComparison::from_suffix(suffix)?)))
                .ok_or_else(invalid)?;

            let (field, function) = match find(rest) {
                Some(field) => (field, None),
                None => {
                    let (field, function) = rest
                        .rsplit_once('_')
                        .and_then(|(field, suffix)| Some((find(field)?, AggregateFunction::from_suffix(suffix)?)))
                        .ok_or_else(invalid)?;

                    (field, Some(function))
                }
            };

            let scalar = &field.type_identifier;
            let supported = match function {
                None => true,
                Some(AggregateFunction::Average | AggregateFunction::Sum) => scalar.is_numeric(),
                Some(AggregateFunction::Shortest | AggregateFunction::Longest) => scalar.is_textual(),
                Some(AggregateFunction::Min | AggregateFunction::Max) => scalar.is_orderable(),
            };

            if !supported {
                return Err(invalid());
            }

            Ok(AggregationCondition::Field {
                target,
                field: field.clone(),
                function,
                comparison,
                value: value.clone(),
            })
        })
        .collect::<CompileResult<Vec<_>>>()?;

    Ok(combine(conditions))
}

fn compare_op(comparison: AggregateComparison) -> CompareOp {
    match comparison {
        AggregateComparison::Equal => CompareOp::Equals,
        AggregateComparison::GreaterThan => CompareOp::GreaterThan,
        AggregateComparison::GreaterThanOrEquals => CompareOp::GreaterThanOrEquals,
        AggregateComparison::LessThan => CompareOp::LessThan,
        AggregateComparison::LessThanOrEquals => CompareOp::LessThanOrEquals,
    }
}

impl Translator<'_> {
    /// `apoc.cypher.runFirstColumnSingle("MATCH (this)<-[r:T]-(n:L) RETURN <condition>", ...)`
    pub(super) fn lower_aggregation(
        &self,
        af: &AggregationFilter,
        node: &Variable,
        prefix: &str,
    ) -> CompileResult<Predicate> {
        let target = self.node(&af.target)?;
        let slot = Variable::external(AGGREGATION_SLOT);
        let edge = self.env.next_relationship(prefix);
        let related = self.env.next_node(prefix);

        let condition = self.lower_aggregation_condition(&af.condition, &related, &edge, prefix);

        let body = Clause::sequence([
            Match::new(traversal(&slot, &af.field, true, Some(&edge), node_pattern(&related, target))).into(),
            Projection::new([ProjectionItem::expr(condition)]).into_return(),
        ]);

        Ok(Predicate::Expr(Expr::isolated(AGGREGATION_SLOT, node.clone(), body)))
    }

    fn lower_aggregation_condition(
        &self,
        condition: &AggregationCondition,
        related: &Variable,
        edge: &Variable,
        prefix: &str,
    ) -> Predicate {
        let lower_all = |conditions: &[AggregationCondition]| {
            conditions
                .iter()
                .map(|c| self.lower_aggregation_condition(c, related, edge, prefix))
                .collect_vec()
        };

        match condition {
            AggregationCondition::And(conditions) => Predicate::all(lower_all(conditions)),
            AggregationCondition::Or(conditions) => Predicate::any(lower_all(conditions)),
            AggregationCondition::Not(inner) => self.lower_aggregation_condition(inner, related, edge, prefix).negate(),
            AggregationCondition::Count { comparison, value } => {
                Predicate::compare(Expr::count(related), compare_op(*comparison), self.param(prefix, value.clone()))
            }
            AggregationCondition::Field {
                target,
                field,
                function,
                comparison,
                value,
            } => {
                let owner = match target {
                    OrderTarget::Node => related,
                    OrderTarget::Edge => edge,
                };
                let property = Expr::property(owner, field.db_name());
                let value = self.bind(field, value, prefix);
                let op = compare_op(*comparison);

                match function {
                    None => {
                        let element = self.env.next_value(prefix);

                        Predicate::quantified(
                            Quantifier::Any,
                            element.clone(),
                            Expr::collect(property),
                            Predicate::compare(&element, op, value),
                        )
                    }
                    Some(function) => Predicate::compare(aggregate(*function, property), op, value),
                }
            }
        }
    }
}

pub(crate) fn aggregate(function: AggregateFunction, property: Expr) -> Expr {
    match function {
        AggregateFunction::Average => Expr::function("avg", [property]),
        AggregateFunction::Min => Expr::function("min", [property]),
        AggregateFunction::Max => Expr::function("max", [property]),
        AggregateFunction::Sum => Expr::function("sum", [property]),
        AggregateFunction::Shortest => Expr::function("min", [Expr::size(property)]),
        AggregateFunction::Longest => Expr::function("max", [Expr::size(property)]),
    }
}
