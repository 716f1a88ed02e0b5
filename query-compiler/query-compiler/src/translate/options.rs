//! Sorting and pagination arguments.

use base64::{Engine, engine::general_purpose::STANDARD};
use cypher_builder::ast::{Expr, MapEntry, OrderDefinition, Orderable, Projection, Variable};
use graph_value::GraphValue;
use schema_model::{
    NodeDescriptor, OrderBy, OrderTarget, QueryOptions, RelationshipProperties, ScalarField, Selection, SortOrder,
};

use crate::{
    CompileError, CompileResult,
    binding::CURSOR_PREFIX,
    translate::{expect_object, object_entries},
};

/// `options: { sort, limit, offset }` of list reads.
#[derive(Debug, Clone, Default)]
pub(crate) struct ReadOptions {
    pub(crate) sort: Vec<OrderBy>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
}

impl ReadOptions {
    pub(crate) fn is_empty(&self) -> bool {
        self.sort.is_empty() && self.limit.is_none() && self.offset.is_none()
    }

    /// Applies the options to `projection`, ordering by properties of `variable`.
    pub(crate) fn apply(&self, projection: Projection, variable: &Variable) -> Projection {
        let projection = self.sort.iter().fold(projection, |projection, order_by| {
            projection.order_by(order(Expr::property(variable, order_by.field.db_name()), order_by.sort_order))
        });

        paginate(projection, self.offset, self.limit)
    }

    /// Like [`ReadOptions::apply`] for maps already projected, keyed by field name.
    pub(crate) fn apply_projected(&self, projection: Projection, variable: &Variable) -> Projection {
        let projection = self.sort.iter().fold(projection, |projection, order_by| {
            projection.order_by(order(Expr::property(variable, &order_by.field.name), order_by.sort_order))
        });

        paginate(projection, self.offset, self.limit)
    }
}

/// `first`, `after` and `sort` of connections.
#[derive(Debug, Clone, Default)]
pub(crate) struct ConnectionOptions {
    pub(crate) sort: Vec<OrderBy>,
    pub(crate) first: Option<u64>,
    /// Index of the first edge of the page.
    pub(crate) offset: u64,
}

impl ConnectionOptions {
    pub(crate) fn is_paginated(&self) -> bool {
        !self.sort.is_empty() || self.first.is_some() || self.offset > 0
    }

    /// Order of the live pattern, before edges are materialized.
    pub(crate) fn pattern_ordering(&self, node: &Variable, edge: Option<&Variable>) -> Vec<OrderDefinition> {
        self.sort
            .iter()
            .filter_map(|order_by| {
                let owner = match order_by.target {
                    OrderTarget::Node => node,
                    OrderTarget::Edge => edge?,
                };

                Some(order(Expr::property(owner, order_by.field.db_name()), order_by.sort_order))
            })
            .collect()
    }

    /// Order of materialized edge records, which keep node fields under `node_key`.
    pub(crate) fn record_ordering(&self, record: &Variable, node_key: &str) -> Vec<OrderDefinition> {
        self.sort
            .iter()
            .map(|order_by| {
                let value = match order_by.target {
                    OrderTarget::Node => Expr::property(Expr::property(record, node_key), &order_by.field.name),
                    OrderTarget::Edge => Expr::property(record, &order_by.field.name),
                };

                order(value, order_by.sort_order)
            })
            .collect()
    }

    pub(crate) fn paginate(&self, projection: Projection) -> Projection {
        paginate(projection, Some(self.offset).filter(|o| *o > 0), self.first)
    }
}

fn order(expr: Expr, sort_order: SortOrder) -> OrderDefinition {
    match sort_order {
        SortOrder::Ascending => expr.ascend(),
        SortOrder::Descending => expr.descend(),
    }
}

/// Pagination values are written into the text. They are numbers validated here, never
/// request strings.
fn paginate(mut projection: Projection, offset: Option<u64>, limit: Option<u64>) -> Projection {
    if let Some(offset) = offset {
        projection = projection.skip(Expr::int(clamp(offset)));
    }

    if let Some(limit) = limit {
        projection = projection.limit(Expr::int(clamp(limit)));
    }

    projection
}

fn clamp(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn non_negative(value: &GraphValue, argument: &str) -> CompileResult<u64> {
    value
        .as_i64()
        .and_then(|v| u64::try_from(v).ok())
        .ok_or_else(|| CompileError::invalid_argument(argument, "expected a non-negative integer"))
}

fn sort_order(value: &GraphValue, argument: &str) -> CompileResult<SortOrder> {
    value
        .as_str()
        .and_then(SortOrder::from_argument)
        .ok_or_else(|| CompileError::invalid_argument(argument, "expected ASC or DESC"))
}

/// A field every candidate type can be sorted by.
fn sortable_field<'a>(fields: &[&'a [ScalarField]], name: &str, argument: &str) -> CompileResult<&'a ScalarField> {
    let mut found = None;

    for candidates in fields {
        let field = candidates
            .iter()
            .find(|f| f.name == name && !f.is_list && !f.is_computed())
            .ok_or_else(|| CompileError::invalid_argument(argument, format!("cannot sort by `{name}`")))?;

        found.get_or_insert(field);
    }

    found.ok_or_else(|| CompileError::invalid_argument(argument, format!("cannot sort by `{name}`")))
}

/// Reads `options` of a list selection over `nodes`, all members of one abstract target or
/// a single node.
pub(crate) fn read_options(nodes: &[&NodeDescriptor], selection: &Selection) -> CompileResult<ReadOptions> {
    let query_options = match nodes {
        [node] => node.query_options,
        _ => QueryOptions::default(),
    };

    let Some(options) = selection.get_argument("options") else {
        return Ok(ReadOptions {
            limit: query_options.effective_limit(None),
            ..Default::default()
        });
    };

    let options = expect_object(options, "options")?;
    let fields: Vec<_> = nodes.iter().map(|n| n.fields.as_slice()).collect();
    let mut read = ReadOptions::default();
    let mut limit = None;

    for (key, value) in options.iter().filter(|(_, v)| !v.is_null()) {
        match key.as_str() {
            "limit" => limit = Some(non_negative(value, "options.limit")?),
            "offset" => read.offset = Some(non_negative(value, "options.offset")?).filter(|o| *o > 0),
            "sort" => {
                for entry in value.as_list().unwrap_or(std::slice::from_ref(value)) {
                    for (name, direction) in expect_object(entry, "options.sort")? {
                        let field = sortable_field(&fields, name, "options.sort")?;
                        let direction = sort_order(direction, "options.sort")?;
                        read.sort.push(OrderBy::node(field.clone(), direction));
                    }
                }
            }
            _ => return Err(CompileError::invalid_argument("options", format!("unknown option `{key}`"))),
        }
    }

    read.limit = query_options.effective_limit(limit);

    Ok(read)
}

/// Reads `first`, `after` and `sort` of a connection selection.
pub(crate) fn connection_options(
    nodes: &[&NodeDescriptor],
    properties: Option<&RelationshipProperties>,
    selection: &Selection,
) -> CompileResult<ConnectionOptions> {
    let query_options = match nodes {
        [node] => node.query_options,
        _ => QueryOptions::default(),
    };

    let first = selection
        .get_argument("first")
        .map(|first| non_negative(first, "first"))
        .transpose()?;

    let offset = selection
        .get_argument("after")
        .map(|after| {
            after
                .as_str()
                .and_then(cursor_offset)
                .and_then(|offset| offset.checked_add(1))
                .ok_or_else(|| CompileError::invalid_argument("after", "invalid cursor"))
        })
        .transpose()?
        .unwrap_or(0);

    let node_fields: Vec<_> = nodes.iter().map(|n| n.fields.as_slice()).collect();
    let mut sort = Vec::new();

    if let Some(value) = selection.get_argument("sort") {
        for entry in value.as_list().unwrap_or(std::slice::from_ref(value)) {
            for (target, fields) in expect_object(entry, "sort")? {
                for (name, direction) in object_entries(Some(fields), "sort")? {
                    let direction = sort_order(direction, "sort")?;

                    let order_by = match (target.as_str(), properties) {
                        ("node", _) => OrderBy::node(sortable_field(&node_fields, name, "sort")?.clone(), direction),
                        ("edge", Some(properties)) => {
                            OrderBy::edge(
                                sortable_field(&[properties.fields.as_slice()], name, "sort")?.clone(),
                                direction,
                            )
                        }
                        _ => return Err(CompileError::invalid_argument("sort", format!("cannot sort by `{target}`"))),
                    };

                    sort.push(order_by);
                }
            }
        }
    }

    Ok(ConnectionOptions {
        sort,
        first: query_options.effective_limit(first),
        offset,
    })
}

/// The opaque cursor of the edge at `offset`.
pub fn offset_to_cursor(offset: u64) -> String {
    STANDARD.encode(format!("{CURSOR_PREFIX}{offset}"))
}

fn cursor_offset(cursor: &str) -> Option<u64> {
    let decoded = STANDARD.decode(cursor).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;

    decoded.strip_prefix(CURSOR_PREFIX)?.parse().ok()
}

/// Adds `field` to a map projection when no entry is keyed by its name yet.
pub(crate) fn ensure_entry(entries: &mut Vec<MapEntry>, variable: &Variable, field: &ScalarField) {
    let present = entries.iter().any(|entry| match entry {
        MapEntry::Property(name) | MapEntry::Keyed(name, _) => name == &field.name,
        MapEntry::AllProperties => true,
    });

    if present {
        return;
    }

    if field.db_name() == field.name {
        entries.push(MapEntry::Property(field.name.clone()));
    } else {
        entries.push(MapEntry::Keyed(field.name.clone(), Expr::property(variable, field.db_name())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema_model::ScalarType;

    fn movie(query_options: QueryOptions) -> NodeDescriptor {
        NodeDescriptor::builder()
            .name("Movie")
            .fields(vec![
                ScalarField::new("title", ScalarType::String),
                ScalarField::new("released", ScalarType::DateTime),
            ])
            .query_options(query_options)
            .build()
    }

    #[test]
    fn cursors_point_past_the_previous_page() {
        let movie = movie(QueryOptions::default());
        let selection = Selection::new("moviesConnection")
            .argument("first", 10)
            .argument("after", offset_to_cursor(4));

        let options = connection_options(&[&movie], None, &selection).unwrap();

        assert_eq!(options.offset, 5);
        assert_eq!(options.first, Some(10));
    }

    #[test]
    fn malformed_cursors_and_negative_pages_are_rejected() {
        let movie = movie(QueryOptions::default());

        let bad_cursor = Selection::new("moviesConnection").argument("after", "not a cursor");
        let negative = Selection::new("moviesConnection").argument("first", -1);
        let past_the_end = Selection::new("moviesConnection").argument("after", offset_to_cursor(u64::MAX));

        assert!(matches!(
            connection_options(&[&movie], None, &bad_cursor),
            Err(CompileError::InvalidArgument { .. })
        ));
        assert!(matches!(
            connection_options(&[&movie], None, &past_the_end),
            Err(CompileError::InvalidArgument { .. })
        ));
        assert!(matches!(
            connection_options(&[&movie], None, &negative),
            Err(CompileError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn limits_are_clamped_by_query_options() {
        let movie = movie(QueryOptions {
            default_limit: Some(5),
            max_limit: Some(20),
        });

        let options: GraphValue = r#"{ "limit": 100, "sort": [{ "released": "DESC" }] }"#.parse().unwrap();
        let read = read_options(&[&movie], &Selection::new("movies").argument("options", options)).unwrap();

        assert_eq!(read.limit, Some(20));
        assert_eq!(read.sort[0].sort_order, SortOrder::Descending);
        assert_eq!(read_options(&[&movie], &Selection::new("movies")).unwrap().limit, Some(5));
    }

    #[test]
    fn unknown_sort_fields_are_rejected() {
        let movie = movie(QueryOptions::default());
        let options: GraphValue = r#"{ "sort": [{ "budget": "ASC" }] }"#.parse().unwrap();

        assert!(read_options(&[&movie], &Selection::new("movies").argument("options", options)).is_err());
    }
}
