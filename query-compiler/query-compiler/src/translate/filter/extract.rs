use std::str::FromStr;

use graph_value::GraphValue;
use schema_model::{
    ConnectionFilter, Filter, NodeDescriptor, RelationCompare, RelationCondition, RelationField, RelationshipProperties,
    ScalarCompare, ScalarCondition, ScalarField, SchemaModel,
};

use super::aggregation::extract_aggregation;
use crate::{CompileError, CompileResult, translate::member_where};

/// The fields a `where` object may reference.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FilterScope<'a> {
    name: &'a str,
    fields: &'a [ScalarField],
    /// Relationship keys are only available on nodes.
    node: Option<&'a NodeDescriptor>,
}

impl<'a> FilterScope<'a> {
    pub(crate) fn node(node: &'a NodeDescriptor) -> Self {
        FilterScope {
            name: &node.name,
            fields: &node.fields,
            node: Some(node),
        }
    }

    pub(crate) fn edge(properties: &'a RelationshipProperties) -> Self {
        FilterScope {
            name: &properties.name,
            fields: &properties.fields,
            node: None,
        }
    }

    fn find_field(&self, name: &str) -> Option<&'a ScalarField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterGrouping {
    And,
    Or,
    Not,
}

impl FromStr for FilterGrouping {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AND" => Ok(FilterGrouping::And),
            "OR" => Ok(FilterGrouping::Or),
            "NOT" => Ok(FilterGrouping::Not),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalarOperator {
    Not,
    In,
    NotIn,
    Contains,
    NotContains,
    StartsWith,
    NotStartsWith,
    EndsWith,
    NotEndsWith,
    LessThan,
    LessThanOrEquals,
    GreaterThan,
    GreaterThanOrEquals,
    Matches,
    Includes,
    NotIncludes,
}

/// Operator suffixes, longer ones first so `_NOT_IN` wins over `_IN`.
const SCALAR_OPERATORS: &[(&str, ScalarOperator)] = &[
    ("_NOT_STARTS_WITH", ScalarOperator::NotStartsWith),
    ("_NOT_ENDS_WITH", ScalarOperator::NotEndsWith),
    ("_NOT_CONTAINS", ScalarOperator::NotContains),
    ("_NOT_INCLUDES", ScalarOperator::NotIncludes),
    ("_STARTS_WITH", ScalarOperator::StartsWith),
    ("_ENDS_WITH", ScalarOperator::EndsWith),
    ("_CONTAINS", ScalarOperator::Contains),
    ("_INCLUDES", ScalarOperator::Includes),
    ("_MATCHES", ScalarOperator::Matches),
    ("_NOT_IN", ScalarOperator::NotIn),
    ("_NOT", ScalarOperator::Not),
    ("_GTE", ScalarOperator::GreaterThanOrEquals),
    ("_LTE", ScalarOperator::LessThanOrEquals),
    ("_IN", ScalarOperator::In),
    ("_GT", ScalarOperator::GreaterThan),
    ("_LT", ScalarOperator::LessThan),
];

const RELATION_QUANTIFIERS: &[(&str, RelationCondition)] = &[
    ("_SOME", RelationCondition::Some),
    ("_NONE", RelationCondition::None),
    ("_ALL", RelationCondition::All),
    ("_SINGLE", RelationCondition::Single),
    ("_NOT", RelationCondition::None),
];

pub(crate) fn extract_node_filter(
    schema: &SchemaModel,
    node: &NodeDescriptor,
    value: &GraphValue,
) -> CompileResult<Filter> {
    extract_filter(schema, FilterScope::node(node), value)
}

/// Extracts a filter potentially matching many records.
///
/// Keys of one object are combined with AND. `AND` and `OR` take a list of objects, `NOT`
/// a single object. Groups that end up empty are dropped, except an empty `OR`, which
/// matches nothing.
pub(crate) fn extract_filter(
    schema: &SchemaModel,
    scope: FilterScope<'_>,
    value: &GraphValue,
) -> CompileResult<Filter> {
    let entries = match value {
        GraphValue::Null => return Ok(Filter::Empty),
        GraphValue::Object(entries) => entries,
        _ => return Err(CompileError::invalid_argument("where", "expected an object")),
    };

    let filters = entries
        .iter()
        .map(|(key, value)| match FilterGrouping::from_str(key) {
            Ok(grouping) => extract_group(grouping, value, |v| extract_filter(schema, scope, v)),
            Err(()) => extract_field(schema, scope, key, value),
        })
        .collect::<CompileResult<Vec<_>>>()?;

    Ok(conjunction(filters))
}

/// Extracts the `{ node, edge, AND, OR, NOT }` shape of connection filters.
pub(crate) fn extract_connection_filter(
    schema: &SchemaModel,
    field: &RelationField,
    target: &NodeDescriptor,
    value: &GraphValue,
) -> CompileResult<Filter> {
    let entries = match value {
        GraphValue::Null => return Ok(Filter::Empty),
        GraphValue::Object(entries) => entries,
        _ => return Err(CompileError::invalid_argument("where", "expected an object")),
    };

    let filters = entries
        .iter()
        .map(|(key, value)| match (FilterGrouping::from_str(key), key.as_str()) {
            (Ok(grouping), _) => extract_group(grouping, value, |v| {
                extract_connection_filter(schema, field, target, v)
            }),
            (Err(()), "node") => extract_filter(schema, FilterScope::node(target), value),
            (Err(()), "edge") => {
                let properties = schema
                    .relationship_properties(field)
                    .ok_or_else(|| CompileError::invalid_filter(field.connection_name(), key))?;

                let filter = extract_filter(schema, FilterScope::edge(properties), value)?;

                Ok(match filter {
                    Filter::Empty => Filter::Empty,
                    filter => Filter::Edge(Box::new(filter)),
                })
            }
            _ => Err(CompileError::invalid_filter(field.connection_name(), key)),
        })
        .collect::<CompileResult<Vec<_>>>()?;

    Ok(conjunction(filters))
}

fn extract_group<F>(grouping: FilterGrouping, value: &GraphValue, extract: F) -> CompileResult<Filter>
where
    F: Fn(&GraphValue) -> CompileResult<Filter>,
{
    let filters = match value {
        GraphValue::List(values) => values.iter().map(&extract).collect::<CompileResult<Vec<_>>>()?,
        // Single map to vec coercion
        GraphValue::Object(_) => vec![extract(value)?],
        GraphValue::Null => Vec::new(),
        _ => return Err(CompileError::invalid_argument("where", "logical operators take objects")),
    };

    // strip empty filters
    let filters: Vec<Filter> = filters.into_iter().filter(|f| !f.is_empty()).collect();

    Ok(match (grouping, filters.len()) {
        (FilterGrouping::Or, _) => Filter::or(filters),
        (_, 0) => Filter::Empty,
        (FilterGrouping::And, _) => Filter::and(filters),
        (FilterGrouping::Not, _) => Filter::not(filters),
    })
}

fn conjunction(filters: Vec<Filter>) -> Filter {
    let mut filters: Vec<Filter> = filters.into_iter().filter(|f| !f.is_empty()).collect();

    match filters.len() {
        0 => Filter::Empty,
        1 => filters.remove(0),
        _ => Filter::and(filters),
    }
}

fn extract_field(schema: &SchemaModel, scope: FilterScope<'_>, key: &str, value: &GraphValue) -> CompileResult<Filter> {
    if let Some(field) = scope.find_field(key) {
        return scalar_filter(scope, field, None, key, value);
    }

    if let Some(node) = scope.node {
        if let Some(filter) = extract_relation_key(schema, node, key, value)? {
            return Ok(filter);
        }
    }

    for (suffix, operator) in SCALAR_OPERATORS {
        if let Some(field) = key.strip_suffix(suffix).and_then(|name| scope.find_field(name)) {
            return scalar_filter(scope, field, Some(*operator), key, value);
        }
    }

    Err(CompileError::invalid_filter(scope.name, key))
}

fn extract_relation_key(
    schema: &SchemaModel,
    node: &NodeDescriptor,
    key: &str,
    value: &GraphValue,
) -> CompileResult<Option<Filter>> {
    if let Some(field) = node.find_relation_field(key) {
        let condition = if value.is_null() {
            RelationCondition::None
        } else {
            RelationCondition::Some
        };

        let nested = if value.is_null() { &GraphValue::Null } else { value };
        return relation_filter(schema, field, condition, nested).map(Some);
    }

    if let Some(field) = node.find_aggregate_field(key) {
        return extract_aggregation(schema, field, value).map(Some);
    }

    if let Some(field) = node.find_connection_field(key) {
        return connection_filter(schema, field, RelationCondition::Some, value).map(Some);
    }

    if let Some(field) = key.strip_suffix("_NOT").and_then(|name| node.find_connection_field(name)) {
        return connection_filter(schema, field, RelationCondition::None, value).map(Some);
    }

    for (suffix, condition) in RELATION_QUANTIFIERS {
        if let Some(field) = key.strip_suffix(suffix).and_then(|name| node.find_relation_field(name)) {
            // `<rel>_NOT: null` asks for the relationship to exist.
            let condition = match (suffix, value) {
                (&"_NOT", GraphValue::Null) => RelationCondition::Some,
                _ => *condition,
            };

            return relation_filter(schema, field, condition, value).map(Some);
        }
    }

    Ok(None)
}

/// One filter per concrete target, joined so that the condition holds across all of them.
fn per_target<F>(
    schema: &SchemaModel,
    field: &RelationField,
    condition: RelationCondition,
    build: F,
) -> CompileResult<Filter>
where
    F: Fn(&NodeDescriptor) -> CompileResult<Filter>,
{
    let mut filters = schema
        .target_nodes(field)
        .into_iter()
        .map(build)
        .collect::<CompileResult<Vec<_>>>()?;

    Ok(match (filters.len(), condition) {
        (0, _) => return Err(CompileError::unknown(&field.name, &field.target)),
        (1, _) => filters.remove(0),
        (_, RelationCondition::Some | RelationCondition::Single) => Filter::or(filters),
        (_, RelationCondition::None | RelationCondition::All) => Filter::and(filters),
    })
}

fn relation_filter(
    schema: &SchemaModel,
    field: &RelationField,
    condition: RelationCondition,
    value: &GraphValue,
) -> CompileResult<Filter> {
    let is_abstract = schema.is_abstract_target(field);

    per_target(schema, field, condition, |target| {
        let value = if is_abstract {
            member_where(value, &target.name)
        } else {
            value.clone()
        };

        let nested = extract_node_filter(schema, target, &value)?;
        Ok(field.related(&target.name, condition, nested))
    })
}

fn connection_filter(
    schema: &SchemaModel,
    field: &RelationField,
    condition: RelationCondition,
    value: &GraphValue,
) -> CompileResult<Filter> {
    let is_abstract = schema.is_abstract_target(field);

    per_target(schema, field, condition, |target| {
        let value = match value.get("node") {
            Some(node) if is_abstract => GraphValue::Object(
                value
                    .as_object()
                    .unwrap_or_default()
                    .iter()
                    .map(|(k, v)| match k.as_str() {
                        "node" => (k.clone(), member_where(node, &target.name)),
                        _ => (k.clone(), v.clone()),
                    })
                    .collect(),
            ),
            _ => value.clone(),
        };

        let nested = extract_connection_filter(schema, field, target, &value)?;

        Ok(Filter::Connection(ConnectionFilter {
            field: field.clone(),
            target: target.name.clone(),
            condition,
            nested: Box::new(nested),
        }))
    })
}

fn scalar_filter(
    scope: FilterScope<'_>,
    field: &ScalarField,
    operator: Option<ScalarOperator>,
    key: &str,
    value: &GraphValue,
) -> CompileResult<Filter> {
    if field.is_computed() {
        return Err(CompileError::invalid_filter(scope.name, key));
    }

    let scalar = &field.type_identifier;
    let invalid = || CompileError::invalid_filter(scope.name, key);

    let list = || {
        value
            .as_list()
            .map(<[GraphValue]>::to_vec)
            .ok_or_else(|| CompileError::invalid_argument(key, "expected a list"))
    };

    let condition = match operator {
        None => ScalarCondition::Equals(value.clone()),
        Some(ScalarOperator::Not) => ScalarCondition::NotEquals(value.clone()),
        Some(ScalarOperator::In) => ScalarCondition::In(list()?),
        Some(ScalarOperator::NotIn) => ScalarCondition::NotIn(list()?),
        Some(
            op @ (ScalarOperator::LessThan
            | ScalarOperator::LessThanOrEquals
            | ScalarOperator::GreaterThan
            | ScalarOperator::GreaterThanOrEquals),
        ) => {
            if !scalar.is_orderable() || field.is_list {
                return Err(invalid());
            }

            match op {
                ScalarOperator::LessThan => ScalarCondition::LessThan(value.clone()),
                ScalarOperator::LessThanOrEquals => ScalarCondition::LessThanOrEquals(value.clone()),
                ScalarOperator::GreaterThan => ScalarCondition::GreaterThan(value.clone()),
                _ => ScalarCondition::GreaterThanOrEquals(value.clone()),
            }
        }
        Some(
            op @ (ScalarOperator::Contains
            | ScalarOperator::NotContains
            | ScalarOperator::StartsWith
            | ScalarOperator::NotStartsWith
            | ScalarOperator::EndsWith
            | ScalarOperator::NotEndsWith
            | ScalarOperator::Matches),
        ) => {
            if !scalar.is_textual() || field.is_list {
                return Err(invalid());
            }

            match op {
                ScalarOperator::Contains => ScalarCondition::Contains(value.clone()),
                ScalarOperator::NotContains => ScalarCondition::NotContains(value.clone()),
                ScalarOperator::StartsWith => ScalarCondition::StartsWith(value.clone()),
                ScalarOperator::NotStartsWith => ScalarCondition::NotStartsWith(value.clone()),
                ScalarOperator::EndsWith => ScalarCondition::EndsWith(value.clone()),
                ScalarOperator::NotEndsWith => ScalarCondition::NotEndsWith(value.clone()),
                _ => ScalarCondition::Matches(value.clone()),
            }
        }
        Some(op @ (ScalarOperator::Includes | ScalarOperator::NotIncludes)) => {
            if !field.is_list {
                return Err(invalid());
            }

            ScalarCondition::Includes(value.clone()).invert(op == ScalarOperator::NotIncludes)
        }
    };

    Ok(field.condition(condition))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use schema_model::{ScalarType, SchemaDefinition};
    use serde_json::json;

    fn schema() -> SchemaModel {
        let definition: SchemaDefinition = serde_json::from_value(json!({
            "nodes": [
                {
                    "name": "Movie",
                    "fields": [
                        { "name": "title", "type": "String" },
                        { "name": "year", "type": "Int" },
                        { "name": "tags", "type": "String", "isList": true },
                        { "name": "score", "type": "Float", "customStatement": "RETURN 1" }
                    ],
                    "relationFields": [
                        { "name": "actors", "type": "ACTED_IN", "direction": "IN", "target": "Actor", "properties": "ActedIn" }
                    ]
                },
                { "name": "Actor", "fields": [{ "name": "name", "type": "String" }] }
            ],
            "relationshipProperties": [
                { "name": "ActedIn", "fields": [{ "name": "role", "type": "String" }] }
            ]
        }))
        .unwrap();

        SchemaModel::build(definition).unwrap()
    }

    fn extract(value: serde_json::Value) -> CompileResult<Filter> {
        let schema = schema();
        let movie = schema.find_node("Movie").unwrap();
        extract_node_filter(&schema, movie, &GraphValue::try_from(value).unwrap())
    }

    fn field(name: &str, scalar: ScalarType) -> ScalarField {
        ScalarField::new(name, scalar)
    }

    #[test]
    fn keys_of_one_object_are_conjoined() {
        let filter = extract(json!({ "title_STARTS_WITH": "The", "year_GTE": 1999 })).unwrap();

        assert_eq!(
            filter,
            Filter::and(vec![
                field("title", ScalarType::String).starts_with("The"),
                field("year", ScalarType::Int).condition(ScalarCondition::GreaterThanOrEquals(1999.into())),
            ])
        );
    }

    #[test]
    fn longest_operator_suffix_wins() {
        let filter = extract(json!({ "title_NOT_IN": ["A"] })).unwrap();

        assert_eq!(filter, field("title", ScalarType::String).not_in(vec!["A"]));
    }

    #[test]
    fn empty_groups_disappear_but_empty_or_matches_nothing() {
        assert_eq!(extract(json!({ "AND": [], "NOT": {} })).unwrap(), Filter::Empty);
        assert_eq!(extract(json!({ "OR": [] })).unwrap(), Filter::or(vec![]));
    }

    #[test]
    fn string_operators_require_textual_fields() {
        assert_eq!(
            extract(json!({ "year_CONTAINS": "9" })).unwrap_err(),
            CompileError::invalid_filter("Movie", "year_CONTAINS")
        );
        assert!(extract(json!({ "tags_INCLUDES": "action" })).is_ok());
    }

    #[test]
    fn computed_and_unknown_fields_are_rejected() {
        assert!(matches!(
            extract(json!({ "score_GT": 1 })),
            Err(CompileError::InvalidFilterField { .. })
        ));
        assert!(matches!(
            extract(json!({ "rating": 1 })),
            Err(CompileError::InvalidFilterField { field, .. }) if field == "rating"
        ));
    }

    #[test]
    fn relationship_keys_pick_their_quantifier() {
        let Filter::Relation(rf) = extract(json!({ "actors_NONE": { "name": "Keanu" } })).unwrap() else {
            panic!("expected a relation filter");
        };
        assert_eq!(rf.condition, RelationCondition::None);

        let Filter::Relation(rf) = extract(json!({ "actors": null })).unwrap() else {
            panic!("expected a relation filter");
        };
        assert_eq!(rf.condition, RelationCondition::None);
        assert!(rf.nested.is_empty());
    }

    #[test]
    fn connection_filters_wrap_edge_conditions() {
        let Filter::Connection(cf) =
            extract(json!({ "actorsConnection": { "edge": { "role": "Neo" }, "node": { "name": "Keanu" } } })).unwrap()
        else {
            panic!("expected a connection filter");
        };

        assert_eq!(
            *cf.nested,
            Filter::and(vec![
                Filter::Edge(Box::new(field("role", ScalarType::String).equals("Neo"))),
                field("name", ScalarType::String).equals("Keanu"),
            ])
        );
    }
}
