use cypher_builder::ast::{Clause, Expr, Match, Projection, ProjectionItem, Variable};
use graph_value::GraphValue;
use schema_model::{AuthOperation, NodeDescriptor, RelationField};

use crate::{
    CompileResult,
    binding::nested_prefix,
    translate::{
        Translator, node_pattern, traversal,
        write::{return_count, with_all},
    },
};

impl<'a> Translator<'a> {
    /// `{ where: { node, edge }, disconnect }` removing the matching relationships of `parent`.
    ///
    /// The matched relationships are collected first and deleted from the collected list.
    pub(crate) fn disconnect(
        &self,
        parent: &NodeDescriptor,
        parent_var: &Variable,
        field: &RelationField,
        target: &'a NodeDescriptor,
        item: &GraphValue,
    ) -> CompileResult<Vec<Clause>> {
        let prefix = nested_prefix(parent_var, &format!("{}_disconnect", field.name));

        self.check_rules(parent, AuthOperation::Disconnect)?;

        let related = self.env.next_node(&prefix);
        let edge = self.env.next_relationship(&prefix);

        let filter = self.relation_filter(field, target, item.get("where"))?;
        let predicate =
            self.guarded_predicate(target, AuthOperation::Disconnect, &filter, &related, Some(&edge), &prefix)?;

        let collected = self.env.next_value(&prefix);
        let each = self.env.next_value(&prefix);

        let delete = Clause::sequence([
            Projection::new([ProjectionItem::aliased(Expr::collect(&edge), collected.clone())]).into_with(),
            Clause::unwind(&collected, each.clone()),
            Clause::delete(&each),
            return_count(self.env.next_value(&prefix)),
        ]);

        let mut body = vec![
            self.auth_validation(parent, AuthOperation::Disconnect, parent_var, &prefix)?,
            Match::optional(traversal(parent_var, field, true, Some(&edge), node_pattern(&related, target)))
                .filter(predicate)
                .into(),
            Clause::call_with([&edge], delete),
        ];

        if let Some(nested) = item.get("disconnect").filter(|v| !v.is_null()) {
            for (nested_field, nested_target, nested_item) in self.relation_items(target, nested, "disconnect")? {
                body.extend(self.disconnect(target, &related, nested_field, nested_target, nested_item)?);
            }
        }

        body.push(return_count(self.env.next_value(&prefix)));

        Ok(vec![with_all(), Clause::call_with([parent_var], Clause::sequence(body))])
    }
}
