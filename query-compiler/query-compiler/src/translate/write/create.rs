use cypher_builder::ast::{CallImports, Clause, Expr, NodePattern, Pattern, Projection, ProjectionItem, Variable};
use graph_value::GraphValue;
use schema_model::{AuthOperation, NodeDescriptor, RelationField, Selection, WriteOperation};

use crate::{
    CompileError, CompileResult, CreateStrategy,
    binding::{DATA, META, nested_prefix, node_prefix},
    translate::{
        Translator, expect_object, node_pattern, traversal,
        write::{RelationOperation, create_event, edge_input, empty_result, items, split_input, with_all},
    },
};

impl<'a> Translator<'a> {
    /// `createMovies(input: [...])`, one `CALL { CREATE ... }` block per input row unless the
    /// batched strategy takes over.
    #[tracing::instrument(skip_all, fields(node = %node.name))]
    pub(crate) fn translate_create(&self, node: &'a NodeDescriptor, selection: &Selection) -> CompileResult<Clause> {
        let input = selection
            .get_argument("input")
            .ok_or_else(|| CompileError::invalid_argument("input", "missing"))?;
        let rows = items(input);

        self.check_rules(node, AuthOperation::Create)?;

        if rows.len() > 1 && self.context.create_strategy == CreateStrategy::Batched {
            return self.translate_batched_create(node, rows, selection);
        }

        let mut clauses = Vec::with_capacity(rows.len() + 1);
        let mut created = Vec::with_capacity(rows.len());

        for row in rows {
            let variable = self.env.next_node("");
            let mut events = Vec::new();

            let mut body = self.create_node(node, &variable, row, &mut events)?;
            body.extend(self.cardinality_checks(node, &variable)?);

            let meta = self.context.subscriptions_enabled.then(|| {
                let meta = self.env.next_value(&node_prefix(&variable));
                (meta, Expr::List(events))
            });

            let mut returned = vec![ProjectionItem::from(&variable)];
            if let Some((meta, events)) = &meta {
                returned.push(ProjectionItem::aliased(events.clone(), meta.clone()));
            }

            body.push(Projection::new(returned).into_return());
            clauses.push(Clause::call(CallImports::None, Clause::sequence(body)));
            created.push((variable, meta.map(|(meta, _)| meta)));
        }

        let mut data = Vec::with_capacity(created.len());

        for (variable, _) in &created {
            if let Some(projection) = self.mutation_projection(node, variable, selection)? {
                clauses.extend(projection.subqueries);
                data.push(Expr::map_projection(variable, projection.entries));
            }
        }

        let metas: Vec<_> = created.iter().filter_map(|(_, meta)| meta.as_ref()).collect();

        if metas.is_empty() {
            if selection.nested(&node.plural).is_none() {
                clauses.push(empty_result());
            } else {
                clauses.push(
                    Projection::new([ProjectionItem::aliased(Expr::List(data), Variable::named(DATA))]).into_return(),
                );
            }
        } else {
            let meta = metas
                .iter()
                .skip(1)
                .fold(Expr::from(metas[0]), |acc, meta| acc.add(*meta));

            clauses.push(
                Projection::new([
                    ProjectionItem::aliased(Expr::List(data), Variable::named(DATA)),
                    ProjectionItem::aliased(meta, Variable::named(META)),
                ])
                .into_return(),
            );
        }

        Ok(Clause::sequence(clauses))
    }

    /// `CREATE (n:Label) SET ...` followed by the nested creates and connects of `input`.
    ///
    /// Cardinality checks are left to the caller, since a nested node's relationship to its
    /// parent only exists once the caller merged it.
    pub(crate) fn create_node(
        &self,
        node: &NodeDescriptor,
        variable: &Variable,
        input: &GraphValue,
        events: &mut Vec<Expr>,
    ) -> CompileResult<Vec<Clause>> {
        let prefix = node_prefix(variable);
        let (scalars, relations) = split_input(node, expect_object(input, "input")?)?;

        let mut clauses = vec![
            Clause::Create(Pattern::node(node_pattern(variable, node))),
            self.assignments(&scalars, &node.fields, variable, input, WriteOperation::Create, &prefix),
        ];

        events.push(create_event(node, variable));

        for (field, value) in relations {
            for (target, operations) in self.relation_targets(field, value)? {
                for (key, value) in expect_object(operations, &field.name)? {
                    match key.as_str() {
                        "create" => {
                            for item in items(value) {
                                clauses.extend(self.create_related(variable, field, target, item, events)?);
                            }
                        }
                        "connect" => {
                            for item in items(value) {
                                clauses.extend(self.relation_operation(
                                    RelationOperation::Connect,
                                    node,
                                    variable,
                                    field,
                                    target,
                                    item,
                                )?);
                            }
                        }
                        other => {
                            return Err(CompileError::invalid_argument(
                                &field.name,
                                format!("`{other}` is not available while creating"),
                            ));
                        }
                    }
                }
            }
        }

        clauses.push(self.auth_validation(node, AuthOperation::Create, variable, &prefix)?);

        Ok(clauses)
    }

    /// `{ node: { ... }, edge: { ... } }` created and merged below `parent`.
    pub(crate) fn create_related(
        &self,
        parent: &Variable,
        field: &RelationField,
        target: &NodeDescriptor,
        item: &GraphValue,
        events: &mut Vec<Expr>,
    ) -> CompileResult<Vec<Clause>> {
        let prefix = nested_prefix(parent, &field.name);
        let node_input = item
            .get("node")
            .ok_or_else(|| CompileError::invalid_argument(&field.name, "create needs a node"))?;

        self.check_rules(target, AuthOperation::Create)?;

        let related = self.env.next_node(&prefix);
        let edge = self.env.next_relationship(&prefix);

        let mut clauses = vec![with_all()];
        clauses.extend(self.create_node(target, &related, node_input, events)?);
        clauses.push(Clause::Merge(traversal(parent, field, true, Some(&edge), NodePattern::new(&related))));

        match (self.schema.relationship_properties(field), item.get("edge").filter(|v| !v.is_null())) {
            (Some(properties), edge_value) => {
                let empty = GraphValue::Object(Vec::new());
                let edge_value = edge_value.unwrap_or(&empty);
                let fields = edge_input(&properties.name, &properties.fields, expect_object(edge_value, "edge")?)?;

                clauses.push(self.assignments(
                    &fields,
                    &properties.fields,
                    &edge,
                    edge_value,
                    WriteOperation::Create,
                    &node_prefix(&edge),
                ));
            }
            (None, Some(_)) => {
                return Err(CompileError::invalid_argument(&field.name, "the relationship has no properties"));
            }
            (None, None) => {}
        }

        clauses.extend(self.cardinality_checks(target, &related)?);

        Ok(clauses)
    }
}
