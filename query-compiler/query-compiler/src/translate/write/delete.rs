//! Cascading deletes.
//!
//! Nodes are gathered by `OPTIONAL MATCH` subqueries for every branch before anything is
//! deleted, then removed deepest first. Deleting while still matching would detach nodes a
//! later branch still has to reach.

use cypher_builder::ast::{Clause, Expr, Match, Projection, ProjectionItem, Variable};
use graph_value::GraphValue;
use schema_model::{AuthOperation, Filter, NodeDescriptor, RelationField, Selection};

use crate::{
    CompileResult,
    binding::{nested_prefix, root_node},
    translate::{
        Translator, extract_node_filter, node_pattern, traversal,
        write::{RelationInput, return_count, with_all},
    },
};

impl<'a> Translator<'a> {
    /// `deleteMovies(where, delete)`
    #[tracing::instrument(skip_all, fields(node = %node.name))]
    pub(crate) fn translate_delete(&self, node: &'a NodeDescriptor, selection: &Selection) -> CompileResult<Clause> {
        let this = root_node();

        let filter = match selection.get_argument("where") {
            Some(value) => extract_node_filter(self.schema, node, value)?,
            None => Filter::Empty,
        };

        let predicate = self.guarded_predicate(node, AuthOperation::Delete, &filter, &this, None, "")?;
        let mut clauses = vec![self.root_match(node, &this, predicate)];

        if let Some(nested) = selection.get_argument("delete").filter(|v| !v.is_null()) {
            let branches = self.relation_items(node, nested, "delete")?;
            clauses.extend(self.delete_branches(&this, branches)?);
        }

        clauses.push(Clause::detach_delete(&this));

        Ok(Clause::sequence(clauses))
    }

    /// Every collection subquery, then one deletion subquery per collected list.
    pub(crate) fn delete_branches(
        &self,
        parent_var: &Variable,
        branches: Vec<RelationInput<'_, 'a, '_>>,
    ) -> CompileResult<Vec<Clause>> {
        if branches.is_empty() {
            return Ok(Vec::new());
        }

        let mut clauses = vec![with_all()];
        let mut lists = Vec::new();

        for (field, target, item) in branches {
            let (collection, collected) = self.delete_collection(parent_var, field, target, item)?;
            clauses.push(collection);
            lists.push(collected);
        }

        for list in lists.iter().rev().flat_map(|lists| lists.iter().rev()) {
            let node = self.env.next_node("");

            let body = Clause::sequence([
                Clause::unwind(list, node.clone()),
                Clause::detach_delete(&node),
                return_count(self.env.next_value("")),
            ]);

            clauses.push(Clause::call_with([list], body));
        }

        Ok(clauses)
    }

    /// Collects the nodes of one branch and of the branches below it.
    ///
    /// Returns the subquery and the variables holding the collected lists, shallowest first.
    fn delete_collection(
        &self,
        parent_var: &Variable,
        field: &RelationField,
        target: &'a NodeDescriptor,
        item: &GraphValue,
    ) -> CompileResult<(Clause, Vec<Variable>)> {
        let prefix = nested_prefix(parent_var, &format!("{}_delete", field.name));
        let properties = self.schema.relationship_properties(field);

        let related = self.env.next_node(&prefix);
        let edge = properties.map(|_| self.env.next_relationship(&prefix));

        let filter = self.relation_filter(field, target, item.get("where"))?;
        let predicate =
            self.guarded_predicate(target, AuthOperation::Delete, &filter, &related, edge.as_ref(), &prefix)?;

        let mut body = vec![
            Match::optional(traversal(parent_var, field, true, edge.as_ref(), node_pattern(&related, target)))
                .filter(predicate)
                .into(),
        ];

        let mut nested_lists = Vec::new();

        if let Some(nested) = item.get("delete").filter(|v| !v.is_null()) {
            for (nested_field, nested_target, nested_item) in self.relation_items(target, nested, "delete")? {
                let (collection, lists) = self.delete_collection(&related, nested_field, nested_target, nested_item)?;
                body.push(collection);
                nested_lists.extend(lists);
            }
        }

        let own = self.env.next_value(&prefix);
        let mut returned = vec![ProjectionItem::aliased(Expr::collect_distinct(&related), own.clone())];
        let mut lists = vec![own];

        for nested in nested_lists {
            let flattened = self.env.next_value(&prefix);
            let value = Expr::function("apoc.coll.flatten", [Expr::collect(&nested)]);

            returned.push(ProjectionItem::aliased(value, flattened.clone()));
            lists.push(flattened);
        }

        body.push(Projection::new(returned).into_return());

        Ok((Clause::call_with([parent_var], Clause::sequence(body)), lists))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CompileContext, CompileError, translate::write::test_schema};
    use cypher_builder::visitor::Cypher;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn nodes_are_collected_before_anything_is_deleted() {
        let schema = test_schema::movies();
        let context = CompileContext::default();
        let translator = Translator::new(&schema, &context);
        let movie = schema.find_node("Movie").unwrap();

        let delete: GraphValue = r#"{
            "actors": [{ "where": { "node": { "name": "Al" } }, "delete": { "movies": [{}] } }],
            "director": {}
        }"#
        .parse()
        .unwrap();

        let clause = translator
            .translate_delete(movie, &Selection::new("deleteMovies").argument("delete", delete))
            .unwrap();
        let rendered = Cypher::build(&clause, &translator.env).unwrap();

        assert_eq!(
            rendered.text,
            indoc! {"
                MATCH (this:`Movie`)
                WITH *
                CALL {
                    WITH this
                    OPTIONAL MATCH (this)<-[this_actors_delete_edge1:ACTED_IN]-(this_actors_delete_this0:`Actor`)
                    WHERE this_actors_delete_this0.name = $this_actors_delete_param0
                    CALL {
                        WITH this_actors_delete_this0
                        OPTIONAL MATCH (this_actors_delete_this0)-[this_actors_delete_this0_movies_delete_edge3:ACTED_IN]->(this_actors_delete_this0_movies_delete_this2:`Movie`)
                        RETURN collect(DISTINCT this_actors_delete_this0_movies_delete_this2) AS this_actors_delete_this0_movies_delete_var4
                    }
                    RETURN collect(DISTINCT this_actors_delete_this0) AS this_actors_delete_var5, apoc.coll.flatten(collect(this_actors_delete_this0_movies_delete_var4)) AS this_actors_delete_var6
                }
                CALL {
                    WITH this
                    OPTIONAL MATCH (this)<-[:DIRECTED]-(this_director_delete_this7:`Director`)
                    RETURN collect(DISTINCT this_director_delete_this7) AS this_director_delete_var8
                }
                CALL {
                    WITH this_director_delete_var8
                    UNWIND this_director_delete_var8 AS this9
                    DETACH DELETE this9
                    RETURN count(*) AS var10
                }
                CALL {
                    WITH this_actors_delete_var6
                    UNWIND this_actors_delete_var6 AS this11
                    DETACH DELETE this11
                    RETURN count(*) AS var12
                }
                CALL {
                    WITH this_actors_delete_var5
                    UNWIND this_actors_delete_var5 AS this13
                    DETACH DELETE this13
                    RETURN count(*) AS var14
                }
                DETACH DELETE this"}
        );
    }

    #[test]
    fn delete_rules_are_checked_per_branch() {
        let definition: schema_model::SchemaDefinition = serde_json::from_value(serde_json::json!({
            "nodes": [
                {
                    "name": "Movie",
                    "fields": [{ "name": "title", "type": "String" }],
                    "relationFields": [{ "name": "reviews", "type": "HAS_REVIEW", "direction": "OUT", "target": "Review" }]
                },
                {
                    "name": "Review",
                    "fields": [{ "name": "body", "type": "String" }],
                    "auth": [{ "operations": ["DELETE"], "isAuthenticated": true }]
                }
            ]
        }))
        .unwrap();
        let schema = schema_model::SchemaModel::build(definition).unwrap();
        let context = CompileContext::default();
        let translator = Translator::new(&schema, &context);
        let movie = schema.find_node("Movie").unwrap();

        let delete: GraphValue = r#"{ "reviews": [{}] }"#.parse().unwrap();

        assert_eq!(
            translator
                .translate_delete(movie, &Selection::new("deleteMovies").argument("delete", delete))
                .err(),
            Some(CompileError::AuthenticationRequired)
        );
    }
}
