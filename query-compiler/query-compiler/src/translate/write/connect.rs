use cypher_builder::ast::{Clause, Comparable, Match, NodePattern, Pattern, Predicate, Projection, Variable};
use graph_value::GraphValue;
use schema_model::{AuthOperation, NodeDescriptor, RelationField, WriteOperation};

use crate::{
    CompileError, CompileResult,
    binding::{nested_prefix, node_prefix},
    translate::{
        Translator, expect_object, node_pattern, traversal,
        write::{edge_input, return_count, with_all},
    },
};

impl<'a> Translator<'a> {
    /// `{ where: { node }, edge, connect }` linking `parent` to every matching node.
    ///
    /// Candidates are matched optionally so a request connecting nothing still yields its row.
    /// The `MERGE` only runs for rows where both ends exist.
    pub(crate) fn connect(
        &self,
        parent: &NodeDescriptor,
        parent_var: &Variable,
        field: &RelationField,
        target: &'a NodeDescriptor,
        item: &GraphValue,
    ) -> CompileResult<Vec<Clause>> {
        let prefix = nested_prefix(parent_var, &format!("{}_connect", field.name));

        self.check_rules(parent, AuthOperation::Connect)?;

        let candidate = self.env.next_node(&prefix);
        let filter = self.candidate_filter(field, target, item.get("where"))?;
        let predicate = self.guarded_predicate(target, AuthOperation::Connect, &filter, &candidate, None, &prefix)?;

        let edge = self.env.next_relationship(&prefix);
        let mut merge = vec![
            Projection::variables([parent_var, &candidate])
                .filter(Predicate::all([
                    Comparable::is_not_null(parent_var),
                    Comparable::is_not_null(&candidate),
                ]))
                .into_with(),
            Clause::Merge(traversal(parent_var, field, true, Some(&edge), NodePattern::new(&candidate))),
        ];

        let edge_value = item.get("edge").filter(|v| !v.is_null());

        match (self.schema.relationship_properties(field), edge_value) {
            (Some(properties), edge_value) => {
                let empty = GraphValue::Object(Vec::new());
                let edge_value = edge_value.unwrap_or(&empty);
                let fields = edge_input(&properties.name, &properties.fields, expect_object(edge_value, "edge")?)?;

                merge.push(self.assignments(
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

        merge.push(return_count(self.env.next_value(&prefix)));

        let mut body = vec![
            self.auth_validation(parent, AuthOperation::Connect, parent_var, &prefix)?,
            Match::optional(Pattern::node(node_pattern(&candidate, target)))
                .filter(predicate)
                .into(),
            Clause::call_with([parent_var, &candidate], Clause::sequence(merge)),
        ];

        if let Some(nested) = item.get("connect").filter(|v| !v.is_null()) {
            for (nested_field, nested_target, nested_item) in self.relation_items(target, nested, "connect")? {
                body.extend(self.connect(target, &candidate, nested_field, nested_target, nested_item)?);
            }
        }

        body.push(return_count(self.env.next_value(&prefix)));

        Ok(vec![with_all(), Clause::call_with([parent_var], Clause::sequence(body))])
    }
}
