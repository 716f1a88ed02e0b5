//! Batched creates: every input row travels in one list parameter and a single `UNWIND`
//! creates them all.
//!
//! The rows are normalized while compiling so the query reads a fixed shape. Nested creates
//! always sit under `<field>.create` as `{ node, edge }` items and callback results are
//! written straight into the row they belong to. Whatever the batch cannot express fails with
//! [`CompileError::UnsupportedOptimization`], after which callers compile the request again
//! with one block per row.

use cypher_builder::ast::{Clause, Expr, NodePattern, Param, Pattern, Projection, ProjectionItem, Variable};
use graph_value::{GraphObject, GraphValue};
use schema_model::{AuthOperation, NodeDescriptor, RelationshipProperties, ScalarField, Selection, WriteOperation};

use crate::{
    CompileError, CompileResult, PathSegment,
    binding::{DATA, ROOT_SLOT, external_root},
    translate::{
        Translator, coerce_value, expect_object, node_pattern, traversal,
        write::{edge_input, empty_result, items, split_input, with_all},
    },
};

const PREFIX: &str = "create_";

fn unsupported(reason: &str) -> CompileError {
    CompileError::UnsupportedOptimization(reason.to_owned())
}

impl<'a> Translator<'a> {
    /// `UNWIND $rows AS row CALL { CREATE ... RETURN n } RETURN collect(n { ... }) AS data`
    #[tracing::instrument(skip_all, fields(node = %node.name, rows = rows.len()))]
    pub(crate) fn translate_batched_create(
        &self,
        node: &'a NodeDescriptor,
        rows: &[GraphValue],
        selection: &Selection,
    ) -> CompileResult<Clause> {
        if self.context.subscriptions_enabled {
            return Err(unsupported("batched creates do not report subscription events"));
        }

        let param = self.env.next_param_name(PREFIX);
        let normalized = rows
            .iter()
            .enumerate()
            .map(|(idx, row)| self.batched_row(node, row, vec![param.as_str().into(), idx.into()]))
            .collect::<CompileResult<Vec<_>>>()?;

        let row = self.env.next_value(PREFIX);
        let created = self.env.next_node(PREFIX);

        let values: Vec<_> = normalized.iter().collect();
        let mut body = self.batched_create(node, &created, &row, &values)?;
        body.extend(self.cardinality_checks(node, &created)?);
        body.push(Projection::variables([&created]).into_return());

        let mut clauses = vec![
            Clause::unwind(Param::new(param, GraphValue::List(normalized)), row.clone()),
            Clause::call_with([&row], Clause::sequence(body)),
        ];

        // The projection is built against the root slot and bound to the created node here.
        let root = external_root();

        match self.mutation_projection(node, &root, selection)? {
            Some(projection) => {
                let collected = Expr::collect(Expr::map_projection(&root, projection.entries));
                let returned =
                    Projection::new([ProjectionItem::aliased(collected, Variable::named(DATA))]).into_return();

                clauses.push(Clause::rebind(
                    ROOT_SLOT,
                    created,
                    Clause::sequence(projection.subqueries.into_iter().chain([returned])),
                ));
            }
            None => clauses.push(empty_result()),
        }

        Ok(Clause::sequence(clauses))
    }

    /// One row in the shape the batched query reads, registering its callbacks at `path`.
    fn batched_row(
        &self,
        node: &NodeDescriptor,
        input: &GraphValue,
        path: Vec<PathSegment>,
    ) -> CompileResult<GraphValue> {
        if node.auth_rules(AuthOperation::Create).any(|rule| rule.where_template.is_some()) {
            return Err(unsupported("create rules with a where clause are validated per row"));
        }

        self.check_rules(node, AuthOperation::Create)?;

        let (scalars, relations) = split_input(node, expect_object(input, "input")?)?;

        let mut row: GraphObject = scalars
            .into_iter()
            .map(|(field, value)| (field.name.clone(), coerce_value(field, value.clone())))
            .collect();

        row.extend(self.batched_callbacks(&node.fields, input, &path));

        for (field, value) in relations {
            if self.schema.is_abstract_target(field) {
                return Err(unsupported("batched creates cannot choose between relationship targets"));
            }

            let target = self.targets(field)?[0];
            let properties = self.schema.relationship_properties(field);
            let mut creates = Vec::new();

            for (key, value) in expect_object(value, &field.name)? {
                match key.as_str() {
                    "create" => {
                        for (idx, item) in items(value).iter().enumerate() {
                            let mut item_path = path.clone();
                            item_path.extend([field.name.as_str().into(), "create".into(), idx.into()]);

                            creates.push(self.batched_item(target, properties, item, item_path)?);
                        }
                    }
                    "connect" => return Err(unsupported("batched creates cannot connect existing nodes")),
                    other => {
                        return Err(CompileError::invalid_argument(
                            &field.name,
                            format!("`{other}` is not available while creating"),
                        ));
                    }
                }
            }

            row.push((
                field.name.clone(),
                GraphValue::Object(vec![("create".to_owned(), GraphValue::List(creates))]),
            ));
        }

        Ok(GraphValue::Object(row))
    }

    /// `{ node, edge }` of a nested create, both normalized.
    fn batched_item(
        &self,
        target: &NodeDescriptor,
        properties: Option<&RelationshipProperties>,
        item: &GraphValue,
        path: Vec<PathSegment>,
    ) -> CompileResult<GraphValue> {
        let node_input = item
            .get("node")
            .ok_or_else(|| CompileError::invalid_argument("create", "create needs a node"))?;

        let mut node_path = path.clone();
        node_path.push("node".into());
        let node = self.batched_row(target, node_input, node_path)?;

        let edge_value = item.get("edge").filter(|v| !v.is_null());
        let edge = match (properties, edge_value) {
            (Some(properties), edge_value) => {
                let empty = GraphValue::Object(Vec::new());
                let edge_value = edge_value.unwrap_or(&empty);
                let fields = edge_input(&properties.name, &properties.fields, expect_object(edge_value, "edge")?)?;

                let mut edge_path = path;
                edge_path.push("edge".into());

                let mut edge: GraphObject = fields
                    .into_iter()
                    .map(|(field, value)| (field.name.clone(), coerce_value(field, value.clone())))
                    .collect();
                edge.extend(self.batched_callbacks(&properties.fields, edge_value, &edge_path));

                GraphValue::Object(edge)
            }
            (None, Some(_)) => {
                return Err(CompileError::invalid_argument("edge", "the relationship has no properties"));
            }
            (None, None) => GraphValue::Null,
        };

        Ok(GraphValue::Object(vec![("node".to_owned(), node), ("edge".to_owned(), edge)]))
    }

    /// Registers the create callbacks of `fields`, returning the slots their results fill.
    fn batched_callbacks(&self, fields: &[ScalarField], input: &GraphValue, path: &[PathSegment]) -> GraphObject {
        fields
            .iter()
            .filter_map(|field| {
                let callback = field.callback_for(WriteOperation::Create)?;

                let mut target = path.to_vec();
                target.push(field.name.as_str().into());
                self.bucket.add(callback, input.clone(), target);

                Some((field.name.clone(), GraphValue::Null))
            })
            .collect()
    }

    /// `CREATE (n:Label) SET n.f = row.f, ...` and a nested `UNWIND` per created relationship.
    ///
    /// `values` holds every normalized input of this level, so a property is only written when
    /// at least one row carries it.
    fn batched_create(
        &self,
        node: &NodeDescriptor,
        created: &Variable,
        input: &Variable,
        values: &[&GraphValue],
    ) -> CompileResult<Vec<Clause>> {
        let mut clauses = vec![
            Clause::Create(Pattern::node(node_pattern(created, node))),
            Clause::set(batched_assignments(&node.fields, created, input, values)),
        ];

        for field in &node.relation_fields {
            let nested: Vec<&GraphValue> = values
                .iter()
                .filter_map(|value| value.get(&field.name)?.get("create")?.as_list())
                .flatten()
                .collect();

            if nested.is_empty() {
                continue;
            }

            let target = self.targets(field)?[0];
            let item = self.env.next_value(PREFIX);
            let node_input = self.env.next_value(PREFIX);
            let edge_input = self.env.next_value(PREFIX);
            let related = self.env.next_node(PREFIX);
            let edge = self.env.next_relationship(PREFIX);
            let done = self.env.next_value(PREFIX);

            let node_values: Vec<_> = nested.iter().filter_map(|item| item.get("node")).collect();
            let edge_values: Vec<_> = nested
                .iter()
                .filter_map(|item| item.get("edge"))
                .filter(|edge| !edge.is_null())
                .collect();

            let mut body = vec![
                Clause::unwind(Expr::property(Expr::property(input, &field.name), "create"), item.clone()),
                Projection::new([
                    ProjectionItem::aliased(Expr::property(&item, "node"), node_input.clone()),
                    ProjectionItem::aliased(Expr::property(&item, "edge"), edge_input.clone()),
                    ProjectionItem::from(created),
                ])
                .into_with(),
            ];

            body.extend(self.batched_create(target, &related, &node_input, &node_values)?);
            body.push(Clause::Merge(traversal(created, field, true, Some(&edge), NodePattern::new(&related))));

            if let Some(properties) = self.schema.relationship_properties(field) {
                body.push(Clause::set(batched_assignments(&properties.fields, &edge, &edge_input, &edge_values)));
            }

            body.extend(self.cardinality_checks(target, &related)?);
            body.push(Projection::new([ProjectionItem::aliased(Expr::collect(Expr::null()), done)]).into_return());

            clauses.push(with_all());
            clauses.push(Clause::call_with([created, input], Clause::sequence(body)));
        }

        Ok(clauses)
    }
}

fn batched_assignments(
    fields: &[ScalarField],
    created: &Variable,
    input: &Variable,
    values: &[&GraphValue],
) -> Vec<(Expr, Expr)> {
    fields
        .iter()
        .filter(|field| !field.is_computed())
        .filter_map(|field| {
            let target = Expr::property(created, field.db_name());

            if field.has_timestamp_for(WriteOperation::Create) {
                return Some((target, Expr::function("datetime", std::iter::empty())));
            }

            values
                .iter()
                .any(|value| value.get(&field.name).is_some())
                .then(|| (target, Expr::property(input, &field.name)))
        })
        .collect()
}
