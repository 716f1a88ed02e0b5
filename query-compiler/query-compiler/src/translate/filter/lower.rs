use cypher_builder::ast::{Comparable, CompareOp, Expr, NodePattern, Predicate, Quantifier, Variable};
use graph_value::GraphValue;
use schema_model::{ConnectionFilter, Filter, RelationCondition, RelationFilter, ScalarCondition, ScalarFilter};

use crate::{
    CompileError, CompileResult,
    translate::{Translator, node_pattern, traversal},
};

/// Authorization predicates treat missing values as a denial: a `null` comparison never
/// matches, and equality requires the property to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LowerMode {
    Request,
    Auth,
}

impl Translator<'_> {
    /// Lowers `filter` against `node`. Conditions under [`Filter::Edge`] apply to `edge`.
    pub(crate) fn lower_filter(
        &self,
        filter: &Filter,
        node: &Variable,
        edge: Option<&Variable>,
        prefix: &str,
        mode: LowerMode,
    ) -> CompileResult<Predicate> {
        Ok(match filter {
            Filter::Empty => Predicate::Literal(true),
            Filter::And(filters) => Predicate::all(self.lower_all(filters, node, edge, prefix, mode)?),
            Filter::Or(filters) => {
                let predicates = self.lower_all(filters, node, edge, prefix, mode)?;

                if predicates.iter().any(Predicate::is_trivial) {
                    Predicate::Literal(true)
                } else {
                    Predicate::any(predicates)
                }
            }
            Filter::Not(filters) => Predicate::all(self.lower_all(filters, node, edge, prefix, mode)?).negate(),
            Filter::Scalar(sf) => self.lower_scalar(sf, node, prefix, mode),
            Filter::Relation(rf) => self.lower_relation(rf, node, prefix, mode)?,
            Filter::Connection(cf) => self.lower_connection(cf, node, prefix, mode)?,
            Filter::Aggregation(af) => self.lower_aggregation(af, node, prefix)?,
            Filter::Edge(inner) => {
                let edge = edge.ok_or_else(|| CompileError::invalid_filter(prefix, "edge"))?;
                self.lower_filter(inner, edge, None, prefix, mode)?
            }
        })
    }

    fn lower_all(
        &self,
        filters: &[Filter],
        node: &Variable,
        edge: Option<&Variable>,
        prefix: &str,
        mode: LowerMode,
    ) -> CompileResult<Vec<Predicate>> {
        filters
            .iter()
            .map(|f| self.lower_filter(f, node, edge, prefix, mode))
            .collect()
    }

    fn lower_scalar(&self, sf: &ScalarFilter, node: &Variable, prefix: &str, mode: LowerMode) -> Predicate {
        let property = Expr::property(node, sf.field.db_name());
        let bind = |value: &GraphValue| self.bind(&sf.field, value, prefix);

        match &sf.condition {
            ScalarCondition::Equals(GraphValue::Null) => match mode {
                LowerMode::Request => property.is_null(),
                LowerMode::Auth => Predicate::Literal(false),
            },
            ScalarCondition::NotEquals(GraphValue::Null) => property.is_not_null(),
            ScalarCondition::Equals(value) => {
                let equals = property.clone().equals(bind(value));

                match mode {
                    LowerMode::Request => equals,
                    LowerMode::Auth => Predicate::all([property.is_not_null(), equals]),
                }
            }
            ScalarCondition::In(values) => {
                Predicate::compare(property, CompareOp::In, bind(&GraphValue::List(values.clone())))
            }
            ScalarCondition::Includes(value) => Predicate::compare(bind(value), CompareOp::In, property),
            ScalarCondition::Contains(value) => Predicate::compare(property, CompareOp::Contains, bind(value)),
            ScalarCondition::StartsWith(value) => Predicate::compare(property, CompareOp::StartsWith, bind(value)),
            ScalarCondition::EndsWith(value) => Predicate::compare(property, CompareOp::EndsWith, bind(value)),
            ScalarCondition::Matches(value) => Predicate::compare(property, CompareOp::Matches, bind(value)),
            ScalarCondition::LessThan(value) => property.less_than(bind(value)),
            ScalarCondition::LessThanOrEquals(value) => property.less_than_or_equals(bind(value)),
            ScalarCondition::GreaterThan(value) => property.greater_than(bind(value)),
            ScalarCondition::GreaterThanOrEquals(value) => property.greater_than_or_equals(bind(value)),
            negated => {
                let positive = ScalarFilter {
                    field: sf.field.clone(),
                    condition: negated.clone().invert(true),
                };

                self.lower_scalar(&positive, node, prefix, mode).negate()
            }
        }
    }

    fn lower_relation(
        &self,
        rf: &RelationFilter,
        node: &Variable,
        prefix: &str,
        mode: LowerMode,
    ) -> CompileResult<Predicate> {
        let target = self.node(&rf.target)?;
        let related = self.env.next_node(prefix);
        let candidate = self.env.next_node(prefix);

        let nested = self.lower_filter(&rf.nested, &candidate, None, prefix, mode)?;

        let exists = || {
            Predicate::Exists(traversal(
                node,
                &rf.field,
                true,
                None,
                NodePattern::anonymous().labels(target.labels.iter().cloned()),
            ))
        };

        let quantified = |quantifier: Quantifier, condition: Predicate| {
            let pattern = traversal(node, &rf.field, true, None, node_pattern(&related, target));

            Predicate::quantified(
                quantifier,
                candidate.clone(),
                Expr::pattern_comprehension(pattern, None, &related),
                condition,
            )
        };

        Ok(match (rf.condition, nested.is_trivial(), mode) {
            (RelationCondition::Some, true, _) => exists(),
            (RelationCondition::None, true, _) => exists().negate(),
            (RelationCondition::All, true, LowerMode::Request) => Predicate::Literal(true),
            (RelationCondition::All, true, LowerMode::Auth) => exists(),
            (RelationCondition::Some, false, _) => quantified(Quantifier::Any, nested),
            (RelationCondition::None, false, _) => quantified(Quantifier::None, nested),
            (RelationCondition::All, false, LowerMode::Request) => quantified(Quantifier::All, nested),
            (RelationCondition::All, false, LowerMode::Auth) => {
                Predicate::all([exists(), quantified(Quantifier::All, nested)])
            }
            (RelationCondition::Single, _, _) => quantified(Quantifier::Single, nested),
        })
    }

    fn lower_connection(
        &self,
        cf: &ConnectionFilter,
        node: &Variable,
        prefix: &str,
        mode: LowerMode,
    ) -> CompileResult<Predicate> {
        let target = self.node(&cf.target)?;
        let edge = self.env.next_relationship(prefix);
        let related = self.env.next_node(prefix);

        let nested = self.lower_filter(&cf.nested, &related, Some(&edge), prefix, mode)?;
        let pattern = traversal(node, &cf.field, true, Some(&edge), node_pattern(&related, target));

        let matches = |condition: Predicate| {
            let condition = Some(condition).filter(|c| !c.is_trivial());
            Expr::size(Expr::pattern_comprehension(pattern.clone(), condition, Expr::int(1)))
        };

        Ok(match cf.condition {
            RelationCondition::Some => matches(nested).greater_than(Expr::int(0)),
            RelationCondition::None => matches(nested).equals(Expr::int(0)),
            RelationCondition::Single => matches(nested).equals(Expr::int(1)),
            RelationCondition::All => match nested {
                nested if nested.is_trivial() => Predicate::Literal(true),
                nested => matches(nested.negate()).equals(Expr::int(0)),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CompileContext, translate::extract_node_filter};
    use cypher_builder::visitor::Cypher;
    use pretty_assertions::assert_eq;
    use schema_model::{SchemaDefinition, SchemaModel};
    use serde_json::json;

    fn schema() -> SchemaModel {
        let definition: SchemaDefinition = serde_json::from_value(json!({
            "nodes": [
                {
                    "name": "Movie",
                    "fields": [{ "name": "title", "type": "String" }, { "name": "released", "type": "DateTime" }],
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

    fn lower(value: serde_json::Value, mode: LowerMode) -> (String, Vec<(String, GraphValue)>) {
        let schema = schema();
        let context = CompileContext::default();
        let translator = Translator::new(&schema, &context);
        let movie = schema.find_node("Movie").unwrap();

        let filter = extract_node_filter(&schema, movie, &GraphValue::try_from(value).unwrap()).unwrap();
        let predicate = translator
            .lower_filter(&filter, &Variable::named("this"), None, "", mode)
            .unwrap();

        let rendered = Cypher::build_expr(&Expr::from(predicate), &translator.env).unwrap();
        (rendered.text, rendered.params.into_iter().collect())
    }

    #[test]
    fn negated_operators_wrap_the_positive_form() {
        let (text, params) = lower(json!({ "title_NOT_CONTAINS": "x", "title": null }), LowerMode::Request);

        assert_eq!(text, "(NOT (this.title CONTAINS $param0) AND this.title IS NULL)");
        assert_eq!(params, vec![("param0".to_owned(), "x".into())]);
    }

    #[test]
    fn auth_mode_requires_present_values() {
        let (text, _) = lower(json!({ "title": "x" }), LowerMode::Auth);
        assert_eq!(text, "(this.title IS NOT NULL AND this.title = $param0)");

        let (text, params) = lower(json!({ "title": null }), LowerMode::Auth);
        assert_eq!(text, "false");
        assert!(params.is_empty());
    }

    #[test]
    fn relationship_quantifiers_iterate_pattern_comprehensions() {
        let (text, _) = lower(json!({ "actors_ALL": { "name": "Keanu" } }), LowerMode::Request);

        assert_eq!(
            text,
            "all(this1 IN [(this)<-[:ACTED_IN]-(this0:`Actor`) | this0] WHERE this1.name = $param0)"
        );
    }

    #[test]
    fn negating_an_unconditional_quantifier_matches_nothing() {
        let (text, params) = lower(json!({ "NOT": { "actors_ALL": {} } }), LowerMode::Request);

        assert_eq!(text, "false");
        assert!(params.is_empty());
    }

    #[test]
    fn empty_relationship_filters_check_existence() {
        let (text, _) = lower(json!({ "actors": null }), LowerMode::Request);

        assert_eq!(text, "NOT (exists((this)<-[:ACTED_IN]-(:`Actor`)))");
    }

    #[test]
    fn connection_filters_count_matching_edges() {
        let (text, _) = lower(
            json!({ "actorsConnection_NOT": { "edge": { "role": "Neo" } } }),
            LowerMode::Request,
        );

        assert_eq!(
            text,
            "size([(this)<-[edge0:ACTED_IN]-(this1:`Actor`) WHERE edge0.role = $param0 | 1]) = 0"
        );
    }

    #[test]
    fn date_time_strings_bind_as_temporal_values() {
        let (text, params) = lower(json!({ "released_GT": "2020-01-01T00:00:00Z" }), LowerMode::Request);

        assert_eq!(text, "this.released > $param0");
        assert!(matches!(params[0].1, GraphValue::DateTime(_)));
    }
}
