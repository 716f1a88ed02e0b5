use cypher_builder::ast::{Clause, Match, Variable};
use graph_value::GraphValue;
use schema_model::{AuthOperation, Filter, NodeDescriptor, RelationField, Selection, WriteOperation};

use crate::{
    CompileError, CompileResult,
    binding::{nested_prefix, node_prefix, root_node},
    translate::{
        Translator, expect_object, extract_node_filter, node_pattern, traversal,
        write::{RelationOperation, edge_input, items, return_count, split_input, with_all},
    },
};

impl<'a> Translator<'a> {
    /// `updateMovies(where, update, connect, disconnect, create, delete)`
    #[tracing::instrument(skip_all, fields(node = %node.name))]
    pub(crate) fn translate_update(&self, node: &'a NodeDescriptor, selection: &Selection) -> CompileResult<Clause> {
        let this = root_node();

        let filter = match selection.get_argument("where") {
            Some(value) => extract_node_filter(self.schema, node, value)?,
            None => Filter::Empty,
        };

        let predicate = self.guarded_predicate(node, AuthOperation::Update, &filter, &this, None, "")?;
        let mut clauses = vec![self.root_match(node, &this, predicate)];

        if let Some(update) = selection.get_argument("update").filter(|v| !v.is_null()) {
            clauses.extend(self.update_node(node, &this, update, &nested_prefix(&this, "update"))?);
        }

        for operation in RelationOperation::ALL {
            if operation == RelationOperation::Update {
                continue;
            }

            let Some(value) = selection.get_argument(operation.key()).filter(|v| !v.is_null()) else {
                continue;
            };

            let inputs = self.relation_items(node, value, operation.key())?;

            if operation == RelationOperation::Delete {
                clauses.extend(self.delete_branches(&this, inputs)?);
                continue;
            }

            for (field, target, item) in inputs {
                clauses.extend(self.relation_operation(operation, node, &this, field, target, item)?);
            }
        }

        clauses.extend(self.cardinality_checks(node, &this)?);
        clauses.extend(self.collected_result(node, &this, selection)?);

        Ok(Clause::sequence(clauses))
    }

    /// `SET` of the scalar part of `input`, then the nested operations of its relationship part.
    pub(crate) fn update_node(
        &self,
        node: &NodeDescriptor,
        variable: &Variable,
        input: &GraphValue,
        prefix: &str,
    ) -> CompileResult<Vec<Clause>> {
        let (scalars, relations) = split_input(node, expect_object(input, "update")?)?;

        let mut clauses = vec![self.assignments(
            &scalars,
            &node.fields,
            variable,
            input,
            WriteOperation::Update,
            prefix,
        )];

        for (field, value) in relations {
            for (target, value) in self.relation_targets(field, value)? {
                for item in items(value) {
                    clauses.extend(self.relation_operations(node, variable, field, target, item)?);
                }
            }
        }

        Ok(clauses)
    }

    /// `{ where, update: { node, edge } }` applied to every matching related node.
    ///
    /// `CALL { WITH parent MATCH (parent)-[e:T]-(n) WHERE ... SET ... RETURN count(*) AS var }`
    pub(crate) fn nested_update(
        &self,
        parent: &Variable,
        field: &RelationField,
        target: &'a NodeDescriptor,
        where_arg: Option<&GraphValue>,
        update: &GraphValue,
    ) -> CompileResult<Vec<Clause>> {
        let prefix = nested_prefix(parent, &format!("{}_update", field.name));
        let properties = self.schema.relationship_properties(field);

        let related = self.env.next_node(&prefix);
        let edge = properties.map(|_| self.env.next_relationship(&prefix));

        let filter = self.relation_filter(field, target, where_arg)?;
        let predicate =
            self.guarded_predicate(target, AuthOperation::Update, &filter, &related, edge.as_ref(), &prefix)?;

        let mut body = vec![
            Match::new(traversal(parent, field, true, edge.as_ref(), node_pattern(&related, target)))
                .filter(predicate)
                .into(),
        ];

        for (key, value) in expect_object(update, &field.name)? {
            match (key.as_str(), properties, edge.as_ref()) {
                (_, _, _) if value.is_null() => {}
                ("node", _, _) => body.extend(self.update_node(target, &related, value, &node_prefix(&related))?),
                ("edge", Some(properties), Some(edge)) => {
                    let fields = edge_input(&properties.name, &properties.fields, expect_object(value, "edge")?)?;
                    body.push(self.assignments(
                        &fields,
                        &properties.fields,
                        edge,
                        value,
                        WriteOperation::Update,
                        &node_prefix(edge),
                    ));
                }
                _ => return Err(CompileError::unknown(&field.name, key)),
            }
        }

        body.extend(self.cardinality_checks(target, &related)?);
        body.push(return_count(self.env.next_value(&prefix)));

        Ok(vec![with_all(), Clause::call_with([parent], Clause::sequence(body))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CompileContext, translate::write::test_schema};
    use cypher_builder::visitor::Cypher;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn render(selection: Selection) -> (String, Vec<String>) {
        let schema = test_schema::movies();
        let context = CompileContext::default();
        let translator = Translator::new(&schema, &context);
        let movie = schema.find_node("Movie").unwrap();

        let clause = translator.translate_update(movie, &selection).unwrap();
        let rendered = Cypher::build(&clause, &translator.env).unwrap();

        (rendered.text, rendered.params.into_keys().collect())
    }

    #[test]
    fn nested_updates_match_through_the_relationship() {
        let where_arg: GraphValue = r#"{ "title": "Heat" }"#.parse().unwrap();
        let update: GraphValue = r#"{
            "title": "Heat (1995)",
            "actors": [{ "where": { "node": { "name": "Al" } }, "update": { "edge": { "role": "Vincent" } } }]
        }"#
        .parse()
        .unwrap();

        let (text, params) = render(
            Selection::new("updateMovies")
                .argument("where", where_arg)
                .argument("update", update)
                .select([Selection::new("movies").select([Selection::new("title")])]),
        );

        assert_eq!(
            text,
            indoc! {r#"
                MATCH (this:`Movie`)
                WHERE this.title = $param0
                SET this.title = $this_update_param1
                WITH *
                CALL {
                    WITH this
                    MATCH (this)<-[this_actors_update_edge1:ACTED_IN]-(this_actors_update_this0:`Actor`)
                    WHERE this_actors_update_this0.name = $this_actors_update_param2
                    SET this_actors_update_edge1.role = $this_actors_update_edge1_param3
                    RETURN count(*) AS this_actors_update_var2
                }
                WITH *
                CALL {
                    WITH this
                    MATCH (this)<-[this_director_edge3:DIRECTED]-(:`Director`)
                    WITH count(this_director_edge3) AS this_director_var4
                    CALL apoc.util.validate(NOT (this_director_var4 = 1), "@graph-compiler/RELATIONSHIP-REQUIRED: Movie.director required exactly once", [0])
                    RETURN this_director_var4
                }
                RETURN collect(DISTINCT this { .title }) AS data"#}
        );
        assert_eq!(
            params,
            ["param0", "this_update_param1", "this_actors_update_param2", "this_actors_update_edge1_param3"]
        );
    }

    #[test]
    fn unknown_update_keys_are_schema_errors() {
        let schema = test_schema::movies();
        let context = CompileContext::default();
        let translator = Translator::new(&schema, &context);
        let movie = schema.find_node("Movie").unwrap();

        let update: GraphValue = r#"{ "rating": 5 }"#.parse().unwrap();

        assert!(matches!(
            translator.translate_update(movie, &Selection::new("updateMovies").argument("update", update)),
            Err(CompileError::SchemaReference { .. })
        ));
    }
}
