use cypher_builder::ast::{Clause, Match, Pattern, Predicate, Projection, Variable};
use schema_model::{AuthOperation, Filter, NodeDescriptor, Selection};

use crate::{
    CompileResult,
    binding::root_node,
    translate::{Translator, extract_node_filter, node_pattern, options::read_options, projection::NodeProjection},
};

impl<'a> Translator<'a> {
    /// `MATCH (this:Label) WHERE ... RETURN this { ... } AS this`
    pub(crate) fn translate_read(&self, node: &'a NodeDescriptor, selection: &Selection) -> CompileResult<Clause> {
        let this = root_node();

        let filter = match selection.get_argument("where") {
            Some(value) => extract_node_filter(self.schema, node, value)?,
            None => Filter::Empty,
        };

        let predicate = self.guarded_predicate(node, AuthOperation::Read, &filter, &this, None, "")?;
        let options = read_options(&[node], selection)?;

        let mut clauses = vec![self.root_match(node, &this, predicate)];

        if !options.is_empty() {
            clauses.push(options.apply(Projection::star(), &this).into_with());
        }

        let projection = self.project_node(node, &this, selection)?;

        clauses.extend(projection.subqueries);
        clauses.push(Projection::new([NodeProjection::item(projection.entries, &this)]).into_return());

        Ok(Clause::sequence(clauses))
    }

    /// Binds `variable` to every node of `node`, or to what its custom query yields.
    pub(crate) fn root_match(&self, node: &NodeDescriptor, variable: &Variable, predicate: Predicate) -> Clause {
        match &node.custom_query {
            Some(statement) => Clause::sequence([
                Clause::Raw(statement.clone()),
                Projection::variables([variable]).filter(predicate).into_with(),
            ]),
            None => Match::new(Pattern::node(node_pattern(variable, node))).filter(predicate).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CompileContext;
    use cypher_builder::visitor::Cypher;
    use graph_value::GraphValue;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use schema_model::{SchemaDefinition, SchemaModel};
    use serde_json::json;

    fn schema() -> SchemaModel {
        let definition: SchemaDefinition = serde_json::from_value(json!({
            "nodes": [
                {
                    "name": "Movie",
                    "fields": [{ "name": "title", "type": "String" }, { "name": "released", "type": "Int" }],
                    "queryOptions": { "maxLimit": 50 }
                },
                {
                    "name": "Trending",
                    "fields": [{ "name": "title", "type": "String" }],
                    "customQuery": "MATCH (this:Movie) WHERE this.views > 1000"
                }
            ]
        }))
        .unwrap();

        SchemaModel::build(definition).unwrap()
    }

    fn render(node: &str, selection: Selection) -> (String, Vec<(String, GraphValue)>) {
        let schema = schema();
        let context = CompileContext::default();
        let translator = Translator::new(&schema, &context);
        let node = schema.find_node(node).unwrap();

        let clause = translator.translate_read(node, &selection).unwrap();
        let rendered = Cypher::build(&clause, &translator.env).unwrap();

        (rendered.text, rendered.params.into_iter().collect())
    }

    #[test]
    fn options_order_and_limit_the_root() {
        let options: GraphValue = r#"{ "sort": [{ "released": "DESC" }], "offset": 10 }"#.parse().unwrap();
        let (text, params) = render(
            "Movie",
            Selection::new("movies")
                .argument("options", options)
                .select([Selection::new("title")]),
        );

        assert_eq!(
            text,
            indoc! {"
                MATCH (this:`Movie`)
                WITH *
                ORDER BY this.released DESC
                SKIP 10
                LIMIT 50
                RETURN this { .title } AS this"}
        );
        assert!(params.is_empty());
    }

    #[test]
    fn custom_queries_replace_the_match() {
        let where_arg: GraphValue = r#"{ "title": "Heat" }"#.parse().unwrap();
        let (text, params) = render(
            "Trending",
            Selection::new("trendings")
                .argument("where", where_arg)
                .select([Selection::new("title")]),
        );

        assert_eq!(
            text,
            indoc! {"
                MATCH (this:Movie) WHERE this.views > 1000
                WITH this
                WHERE this.title = $param0
                RETURN this { .title } AS this"}
        );
        assert_eq!(params, vec![("param0".to_owned(), GraphValue::from("Heat"))]);
    }
}
