//! Relay connections over relationship fields and root lists.
//!
//! Matching edges are materialized as records (`{ <edge fields>, node: n { ... } }`), collected,
//! counted and only then sliced, so `totalCount` and `pageInfo` see the whole list.

use cypher_builder::ast::{
    CallImports, Clause, Comparable, Expr, Match, Projection, ProjectionItem, Union, Variable,
};
use graph_value::GraphValue;
use schema_model::{
    AuthOperation, Filter, NodeDescriptor, OrderBy, OrderTarget, RelationField, RelationshipProperties, Selection,
};

use crate::{
    CompileError, CompileResult,
    binding::{CURSOR_PREFIX, nested_prefix, root_node},
    translate::{
        Translator, extract_node_filter,
        filter::extract_connection_filter,
        is_directed, member_where, node_pattern,
        options::{ConnectionOptions, connection_options, ensure_entry},
        projection::NodeProjection,
        traversal,
    },
};

const TYPENAME: &str = "__typename";

/// Where the parts of a connection selection sit.
struct ConnectionShape<'s> {
    edges: Option<&'s Selection>,
    node: Option<&'s Selection>,
    cursor: Option<&'s Selection>,
}

impl<'s> ConnectionShape<'s> {
    fn new(selection: &'s Selection) -> Self {
        let edges = selection.nested("edges");

        ConnectionShape {
            edges,
            node: edges.and_then(|edges| edges.nested("node")),
            cursor: edges.and_then(|edges| edges.nested("cursor")),
        }
    }

    fn node_key(&self) -> &str {
        self.node.map_or("node", Selection::response_key)
    }
}

impl<'a> Translator<'a> {
    pub(crate) fn project_connection(
        &self,
        parent_type: &str,
        parent: &Variable,
        field: &RelationField,
        selection: &Selection,
    ) -> CompileResult<(Clause, Variable)> {
        let prefix = nested_prefix(parent, selection.response_key());
        let targets = self.targets(field)?;
        let properties = self.schema.relationship_properties(field);
        let directed = is_directed(field, selection);
        let options = connection_options(&targets, properties, selection)?;
        let shape = ConnectionShape::new(selection);
        let abstract_target = self.schema.is_abstract_target(field);
        let where_arg = selection.get_argument("where");

        let node = self.env.next_node(&prefix);
        let edge = properties.map(|properties| (self.env.next_relationship(&prefix), properties));
        let edge_variable = edge.as_ref().map(|(variable, _)| variable);
        let record = self.env.next_value(&prefix);

        let branches = targets
            .iter()
            .map(|member| {
                let filter = match where_arg {
                    Some(value) if abstract_target => {
                        extract_connection_filter(
                            self.schema,
                            field,
                            member,
                            &connection_member_where(value, &member.name),
                        )?
                    }
                    Some(value) => extract_connection_filter(self.schema, field, member, value)?,
                    None => Filter::Empty,
                };

                let predicate =
                    self.guarded_predicate(member, AuthOperation::Read, &filter, &node, edge_variable, &prefix)?;
                let (subqueries, value) = self.connection_record(
                    member,
                    &node,
                    edge.as_ref().map(|(variable, properties)| (variable, *properties)),
                    &shape,
                    &options.sort,
                    abstract_target,
                )?;

                let mut clauses = Vec::new();

                if abstract_target {
                    clauses.push(Projection::variables([parent]).into_with());
                }

                clauses.push(
                    Match::new(traversal(parent, field, directed, edge_variable, node_pattern(&node, member)))
                        .filter(predicate)
                        .into(),
                );
                clauses.extend(live_ordering(&options, &node, edge_variable));
                clauses.extend(subqueries);

                let record = Projection::new([ProjectionItem::aliased(value, record.clone())]);
                clauses.push(if abstract_target { record.into_return() } else { record.into_with() });

                Ok(Clause::sequence(clauses))
            })
            .collect::<CompileResult<Vec<_>>>()?;

        let mut body = if abstract_target {
            vec![Clause::call(CallImports::None, Union::new(branches).into())]
        } else {
            branches
        };

        let result = self.env.next_value(&prefix);
        let typename = format!("{parent_type}{}Connection", upper_first(&field.name));

        body.extend(self.connection_page(&record, selection, &shape, &options, &typename, &result, &prefix)?);

        Ok((Clause::call_with([parent], Clause::sequence(body)), result))
    }

    /// `<plural>Connection` at the root: the nodes themselves are the edges.
    pub(crate) fn translate_root_connection(
        &self,
        node: &'a NodeDescriptor,
        selection: &Selection,
    ) -> CompileResult<Clause> {
        let this = root_node();
        let options = connection_options(&[node], None, selection)?;
        let shape = ConnectionShape::new(selection);

        let filter = match selection.get_argument("where") {
            Some(value) => extract_node_filter(self.schema, node, value)?,
            None => Filter::Empty,
        };

        let predicate = self.guarded_predicate(node, AuthOperation::Read, &filter, &this, None, "")?;
        let (subqueries, value) = self.connection_record(node, &this, None, &shape, &options.sort, false)?;
        let record = self.env.next_value("");
        let typename = format!("{}Connection", node.pascal_plural());

        let mut clauses = vec![self.root_match(node, &this, predicate)];
        clauses.extend(live_ordering(&options, &this, None));
        clauses.extend(subqueries);
        clauses.push(Projection::new([ProjectionItem::aliased(value, record.clone())]).into_with());
        clauses.extend(self.connection_page(&record, selection, &shape, &options, &typename, &this, "")?);

        Ok(Clause::sequence(clauses))
    }

    /// The record one matched edge contributes, plus the subqueries its node projection needs.
    fn connection_record(
        &self,
        target: &NodeDescriptor,
        node: &Variable,
        edge: Option<(&Variable, &RelationshipProperties)>,
        shape: &ConnectionShape<'_>,
        sort: &[OrderBy],
        resolve_type: bool,
    ) -> CompileResult<(Vec<Clause>, Expr)> {
        let mut entries: Vec<(String, Expr)> = Vec::new();

        if let Some(edges) = shape.edges {
            for nested in &edges.selection {
                let key = nested.response_key().to_owned();

                match (nested.name.as_str(), edge) {
                    ("node" | "cursor", _) => {}
                    (TYPENAME, Some((_, properties))) => entries.push((key, Expr::string(properties.name.clone()))),
                    (name, Some((variable, properties))) => {
                        let field = properties
                            .find_field(name)
                            .ok_or_else(|| CompileError::unknown(&properties.name, name))?;

                        entries.push((key, Expr::property(variable, field.db_name())));
                    }
                    (name, None) => return Err(CompileError::unknown(&target.name, name)),
                }
            }
        }

        let node_sort = sort.iter().filter(|o| matches!(o.target, OrderTarget::Node));
        let mut subqueries = Vec::new();

        if shape.node.is_some() || resolve_type || node_sort.clone().next().is_some() {
            let mut projection = match shape.node {
                Some(selection) => self.project_node(target, node, selection)?,
                None => NodeProjection::default(),
            };

            if resolve_type {
                projection = projection.resolve_type(target);
            }

            for order_by in node_sort {
                ensure_entry(&mut projection.entries, node, &order_by.field);
            }

            subqueries = projection.subqueries;
            entries.push((shape.node_key().to_owned(), Expr::map_projection(node, projection.entries)));
        }

        if let Some((variable, _)) = edge {
            for order_by in sort.iter().filter(|o| matches!(o.target, OrderTarget::Edge)) {
                if !entries.iter().any(|(key, _)| key == &order_by.field.name) {
                    entries.push((order_by.field.name.clone(), Expr::property(variable, order_by.field.db_name())));
                }
            }
        }

        Ok((subqueries, Expr::map(entries)))
    }

    /// Collects `record`, counts it, slices the page and returns the connection map as `result`.
    #[allow(clippy::too_many_arguments)]
    fn connection_page(
        &self,
        record: &Variable,
        selection: &Selection,
        shape: &ConnectionShape<'_>,
        options: &ConnectionOptions,
        typename: &str,
        result: &Variable,
        prefix: &str,
    ) -> CompileResult<Vec<Clause>> {
        let edges = self.env.next_value(prefix);
        let total = self.env.next_value(prefix);

        let mut clauses = vec![
            Projection::new([ProjectionItem::aliased(Expr::collect(record), edges.clone())]).into_with(),
            Projection::new([
                ProjectionItem::from(&edges),
                ProjectionItem::aliased(Expr::size(&edges), total.clone()),
            ])
            .into_with(),
        ];

        let page = if options.is_paginated() {
            let page = self.env.next_value(prefix);
            let element = self.env.next_value(prefix);
            let ordered = options
                .record_ordering(&element, shape.node_key())
                .into_iter()
                .fold(Projection::variables([&element]), Projection::order_by);

            clauses.push(Clause::call_with(
                [&edges],
                Clause::sequence([
                    Clause::unwind(&edges, element.clone()),
                    options.paginate(ordered).into_with(),
                    Projection::new([ProjectionItem::aliased(Expr::collect(&element), page.clone())]).into_return(),
                ]),
            ));

            page
        } else {
            edges
        };

        let offset = i64::try_from(options.offset).unwrap_or(i64::MAX);
        let mut entries = Vec::new();

        for nested in &selection.selection {
            let value = match nested.name.as_str() {
                "edges" => match shape.cursor {
                    Some(cursor) => with_cursors(&page, offset, cursor.response_key(), self.env.next_value(prefix)),
                    None => Expr::from(&page),
                },
                "totalCount" => Expr::from(&total),
                "pageInfo" => page_info(nested, &page, &total, offset)?,
                TYPENAME => Expr::string(typename.to_owned()),
                name => return Err(CompileError::unknown(typename, name)),
            };

            entries.push((nested.response_key().to_owned(), value));
        }

        clauses.push(Projection::new([ProjectionItem::aliased(Expr::map(entries), result.clone())]).into_return());

        Ok(clauses)
    }
}

/// `WITH e, n ORDER BY ...` on the matched pattern. Records are sorted again once collected,
/// since building them changes their shape.
fn live_ordering(options: &ConnectionOptions, node: &Variable, edge: Option<&Variable>) -> Option<Clause> {
    let ordering = options.pattern_ordering(node, edge);

    if ordering.is_empty() {
        return None;
    }

    let projection = Projection::variables(edge.into_iter().chain([node]));

    Some(ordering.into_iter().fold(projection, Projection::order_by).into_with())
}

fn page_info(selection: &Selection, page: &Variable, total: &Variable, offset: i64) -> CompileResult<Expr> {
    let non_empty = || Expr::size(page).greater_than(Expr::int(0));

    let entries = selection
        .selection
        .iter()
        .map(|nested| {
            let value = match nested.name.as_str() {
                "hasNextPage" => Expr::from(shifted(offset, Expr::size(page)).less_than(total)),
                "hasPreviousPage" => Expr::boolean(offset > 0),
                "startCursor" => Expr::case(non_empty(), cursor(Expr::int(offset)), Expr::null()),
                "endCursor" => Expr::case(
                    non_empty(),
                    cursor(shifted(offset, Expr::size(page)).subtract(Expr::int(1))),
                    Expr::null(),
                ),
                TYPENAME => Expr::string("PageInfo"),
                name => return Err(CompileError::unknown("PageInfo", name)),
            };

            Ok((nested.response_key().to_owned(), value))
        })
        .collect::<CompileResult<Vec<_>>>()?;

    Ok(Expr::map(entries))
}

/// `[i IN range(0, size(page) - 1) | apoc.map.merge(page[i], { cursor: ... })]`
fn with_cursors(page: &Variable, offset: i64, key: &str, index: Variable) -> Expr {
    let range = Expr::function("range", [Expr::int(0), Expr::size(page).subtract(Expr::int(1))]);
    let merged = Expr::function(
        "apoc.map.merge",
        [
            Expr::index(page, &index),
            Expr::map([(key, cursor(shifted(offset, Expr::from(&index))))]),
        ],
    );

    Expr::list_comprehension(index, range, None, Some(merged))
}

fn cursor(index: Expr) -> Expr {
    Expr::function(
        "apoc.text.base64Encode",
        [Expr::string(CURSOR_PREFIX).add(Expr::function("toString", [index]))],
    )
}

fn shifted(offset: i64, expr: Expr) -> Expr {
    if offset == 0 { expr } else { Expr::int(offset).add(expr) }
}

fn upper_first(name: &str) -> String {
    let mut chars = name.chars();

    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Narrows the `node` parts of a connection `where` to one member of an abstract target.
pub(crate) fn connection_member_where(value: &GraphValue, member: &str) -> GraphValue {
    let Some(entries) = value.as_object() else {
        return value.clone();
    };

    let narrowed = entries
        .iter()
        .map(|(key, value)| {
            let value = match (key.as_str(), value) {
                ("node", value) => member_where(value, member),
                ("AND" | "OR", GraphValue::List(items)) => {
                    GraphValue::List(items.iter().map(|item| connection_member_where(item, member)).collect())
                }
                ("AND" | "OR" | "NOT", value) => connection_member_where(value, member),
                (_, value) => value.clone(),
            };

            (key.clone(), value)
        })
        .collect();

    GraphValue::Object(narrowed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CompileContext;
    use cypher_builder::visitor::Cypher;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use schema_model::{SchemaDefinition, SchemaModel};
    use serde_json::json;

    fn schema() -> SchemaModel {
        let definition: SchemaDefinition = serde_json::from_value(json!({
            "nodes": [
                {
                    "name": "Movie",
                    "fields": [{ "name": "title", "type": "String" }],
                    "relationFields": [{
                        "name": "actors",
                        "type": "ACTED_IN",
                        "direction": "IN",
                        "target": "Actor",
                        "properties": "ActedIn"
                    }]
                },
                { "name": "Actor", "fields": [{ "name": "name", "type": "String" }] }
            ],
            "relationshipProperties": [{ "name": "ActedIn", "fields": [{ "name": "role", "type": "String" }] }]
        }))
        .unwrap();

        SchemaModel::build(definition).unwrap()
    }

    #[test]
    fn pages_are_sliced_after_counting() {
        let schema = schema();
        let context = CompileContext::default();
        let translator = Translator::new(&schema, &context);
        let movie = schema.find_node("Movie").unwrap();
        let this = Variable::named("this");

        let selection = Selection::new("actorsConnection")
            .argument("first", 2)
            .argument("sort", r#"[{ "edge": { "role": "ASC" } }]"#.parse::<GraphValue>().unwrap())
            .select([
                Selection::new("totalCount"),
                Selection::new("edges").select([
                    Selection::new("role"),
                    Selection::new("cursor"),
                    Selection::new("node").select([Selection::new("name")]),
                ]),
                Selection::new("pageInfo").select([Selection::new("hasNextPage")]),
            ]);

        let field = movie.find_connection_field("actorsConnection").unwrap();
        let (clause, result) = translator.project_connection("Movie", &this, field, &selection).unwrap();
        let rendered = Cypher::build(&clause, &translator.env).unwrap();

        assert_eq!(result, Variable::named("this_actorsConnection_var3"));
        assert_eq!(
            rendered.text,
            indoc! {r#"
                CALL {
                    WITH this
                    MATCH (this)<-[this_actorsConnection_edge1:ACTED_IN]-(this_actorsConnection_this0:`Actor`)
                    WITH this_actorsConnection_edge1, this_actorsConnection_this0
                    ORDER BY this_actorsConnection_edge1.role ASC
                    WITH { role: this_actorsConnection_edge1.role, node: this_actorsConnection_this0 { .name } } AS this_actorsConnection_var2
                    WITH collect(this_actorsConnection_var2) AS this_actorsConnection_var4
                    WITH this_actorsConnection_var4, size(this_actorsConnection_var4) AS this_actorsConnection_var5
                    CALL {
                        WITH this_actorsConnection_var4
                        UNWIND this_actorsConnection_var4 AS this_actorsConnection_var7
                        WITH this_actorsConnection_var7
                        ORDER BY this_actorsConnection_var7.role ASC
                        LIMIT 2
                        RETURN collect(this_actorsConnection_var7) AS this_actorsConnection_var6
                    }
                    RETURN { totalCount: this_actorsConnection_var5, edges: [this_actorsConnection_var8 IN range(0, size(this_actorsConnection_var6) - 1) | apoc.map.merge(this_actorsConnection_var6[this_actorsConnection_var8], { cursor: apoc.text.base64Encode("arrayconnection:" + toString(this_actorsConnection_var8)) })], pageInfo: { hasNextPage: size(this_actorsConnection_var6) < this_actorsConnection_var5 } } AS this_actorsConnection_var3
                }"#}
        );
        assert!(rendered.params.is_empty());
    }

    #[test]
    fn edge_filters_reach_the_relationship() {
        let schema = schema();
        let context = CompileContext::default();
        let translator = Translator::new(&schema, &context);
        let movie = schema.find_node("Movie").unwrap();

        let selection = Selection::new("actorsConnection")
            .argument("where", r#"{ "edge": { "role": "Neo" } }"#.parse::<GraphValue>().unwrap())
            .select([Selection::new("totalCount")]);

        let field = movie.find_connection_field("actorsConnection").unwrap();
        let (clause, _) = translator
            .project_connection("Movie", &Variable::named("this"), field, &selection)
            .unwrap();
        let rendered = Cypher::build(&clause, &translator.env).unwrap();

        assert!(rendered.text.contains("WHERE this_actorsConnection_edge1.role = $this_actorsConnection_param0"));
        assert_eq!(rendered.params["this_actorsConnection_param0"], GraphValue::from("Neo"));
    }

    #[test]
    fn unknown_connection_fields_are_rejected() {
        let schema = schema();
        let context = CompileContext::default();
        let translator = Translator::new(&schema, &context);
        let movie = schema.find_node("Movie").unwrap();
        let field = movie.find_connection_field("actorsConnection").unwrap();

        let selection = Selection::new("actorsConnection").select([Selection::new("nodes")]);

        assert!(matches!(
            translator.project_connection("Movie", &Variable::named("this"), field, &selection),
            Err(CompileError::SchemaReference { .. })
        ));
    }

    #[test]
    fn abstract_where_is_narrowed_per_member() {
        let value: GraphValue =
            r#"{ "OR": [{ "node": { "_on": { "Post": { "title": "A" } } } }], "edge": { "since": 1 } }"#
                .parse()
                .unwrap();

        assert_eq!(
            connection_member_where(&value, "Post"),
            r#"{ "OR": [{ "node": { "title": "A" } }], "edge": { "since": 1 } }"#.parse::<GraphValue>().unwrap()
        );
    }
}
