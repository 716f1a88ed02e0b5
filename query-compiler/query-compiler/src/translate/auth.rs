//! Rules of a node's authorization directive.
//!
//! Static requirements (`isAuthenticated`, `roles`) are decided while compiling, before any
//! clause for the node is built. `where` templates become predicates that are always ANDed
//! with whatever the request filters on.

use cypher_builder::ast::{Clause, Expr, Predicate, Projection, Variable};
use graph_value::GraphValue;
use schema_model::{AuthOperation, AuthRule, Filter, NodeDescriptor};

use crate::{
    CompileContext, CompileError, CompileResult,
    binding::AUTH_FORBIDDEN,
    translate::{Translator, extract_node_filter, filter::LowerMode},
};

const JWT_PLACEHOLDER: &str = "$jwt";

impl Translator<'_> {
    /// Fails when the request may not run `operation` on `node` at all.
    pub(crate) fn check_rules(&self, node: &NodeDescriptor, operation: AuthOperation) -> CompileResult<()> {
        for rule in node.auth_rules(operation) {
            check_rule(rule, self.context)?;
        }

        Ok(())
    }

    /// The `where` templates of every rule for `operation`, evaluated against `variable`.
    pub(crate) fn auth_predicate(
        &self,
        node: &NodeDescriptor,
        operation: AuthOperation,
        variable: &Variable,
        prefix: &str,
    ) -> CompileResult<Predicate> {
        let predicates = node
            .auth_rules(operation)
            .filter_map(|rule| rule.where_template.as_ref())
            .map(|template| {
                let filter = extract_node_filter(self.schema, node, &substitute_claims(template, self.context))?;
                self.lower_filter(&filter, variable, None, prefix, LowerMode::Auth)
            })
            .collect::<CompileResult<Vec<_>>>()?;

        Ok(Predicate::all(predicates))
    }

    /// `filter AND auth`, after the static checks of `operation` passed.
    pub(crate) fn guarded_predicate(
        &self,
        node: &NodeDescriptor,
        operation: AuthOperation,
        filter: &Filter,
        variable: &Variable,
        edge: Option<&Variable>,
        prefix: &str,
    ) -> CompileResult<Predicate> {
        self.check_rules(node, operation)?;

        let requested = self.lower_filter(filter, variable, edge, prefix, LowerMode::Request)?;
        let auth = self.auth_predicate(node, operation, variable, prefix)?;

        Ok(Predicate::all([requested, auth]))
    }

    /// `WITH * CALL apoc.util.validate(NOT (auth), ...)` for nodes that only exist once the
    /// query ran, such as freshly created ones.
    pub(crate) fn auth_validation(
        &self,
        node: &NodeDescriptor,
        operation: AuthOperation,
        variable: &Variable,
        prefix: &str,
    ) -> CompileResult<Clause> {
        let predicate = self.auth_predicate(node, operation, variable, prefix)?;

        if predicate.is_trivial() {
            return Ok(Clause::empty());
        }

        Ok(Clause::sequence([
            Projection::star().into_with(),
            validate(predicate.negate(), AUTH_FORBIDDEN),
        ]))
    }
}

pub(crate) fn check_rule(rule: &AuthRule, context: &CompileContext) -> CompileResult<()> {
    let authenticated = context.jwt.is_some();

    if rule.requires_authentication() && !authenticated {
        return Err(CompileError::AuthenticationRequired);
    }

    if let Some(roles) = rule.roles.as_ref().filter(|roles| !roles.is_empty()) {
        if !authenticated {
            return Err(CompileError::AuthenticationRequired);
        }

        let granted = context.roles();

        if !roles.iter().any(|role| granted.contains(&role.as_str())) {
            return Err(CompileError::AuthorizationDenied);
        }
    }

    if !authenticated && rule.where_template.as_ref().is_some_and(references_claims) {
        return Err(CompileError::AuthenticationRequired);
    }

    Ok(())
}

fn references_claims(value: &GraphValue) -> bool {
    match value {
        GraphValue::String(s) => s.starts_with(JWT_PLACEHOLDER),
        GraphValue::List(values) => values.iter().any(references_claims),
        GraphValue::Object(entries) => entries.iter().any(|(_, v)| references_claims(v)),
        _ => false,
    }
}

/// Replaces `$jwt.<path>` leaves by the claim at `path`, `null` when the token lacks it.
fn substitute_claims(value: &GraphValue, context: &CompileContext) -> GraphValue {
    match value {
        GraphValue::String(s) => match s.strip_prefix(JWT_PLACEHOLDER).and_then(|rest| rest.strip_prefix('.')) {
            Some(path) => context.claim(path).cloned().unwrap_or(GraphValue::Null),
            None => value.clone(),
        },
        GraphValue::List(values) => GraphValue::List(values.iter().map(|v| substitute_claims(v, context)).collect()),
        GraphValue::Object(entries) => GraphValue::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), substitute_claims(v, context)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// `CALL apoc.util.validate(predicate, message, [0])`, aborting the query when `predicate` holds.
pub(crate) fn validate(predicate: Predicate, message: impl Into<String>) -> Clause {
    Clause::procedure(
        "apoc.util.validate",
        [
            Expr::from(predicate),
            Expr::string(message.into()),
            Expr::List(vec![Expr::int(0)]),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use cypher_builder::visitor::Cypher;
    use pretty_assertions::assert_eq;
    use schema_model::{SchemaDefinition, SchemaModel};
    use serde_json::json;

    fn schema() -> SchemaModel {
        let definition: SchemaDefinition = serde_json::from_value(json!({
            "nodes": [{
                "name": "Post",
                "fields": [{ "name": "id", "type": "ID" }, { "name": "authorId", "type": "ID" }],
                "auth": [
                    { "operations": ["READ"], "where": { "authorId": "$jwt.sub" } },
                    { "operations": ["DELETE"], "roles": ["admin"] },
                    { "operations": ["UPDATE"], "isAuthenticated": true }
                ]
            }]
        }))
        .unwrap();

        SchemaModel::build(definition).unwrap()
    }

    fn context(jwt: Option<serde_json::Value>) -> CompileContext {
        CompileContext {
            jwt: jwt.map(|jwt| GraphValue::try_from(jwt).unwrap()),
            ..Default::default()
        }
    }

    fn read_predicate(context: &CompileContext, filter: serde_json::Value) -> CompileResult<String> {
        let schema = schema();
        let translator = Translator::new(&schema, context);
        let post = schema.find_node("Post").unwrap();
        let filter = extract_node_filter(&schema, post, &GraphValue::try_from(filter).unwrap())?;

        let predicate = translator.guarded_predicate(
            post,
            AuthOperation::Read,
            &filter,
            &Variable::named("this"),
            None,
            "",
        )?;

        Ok(Cypher::build_expr(&Expr::from(predicate), &translator.env)?.text)
    }

    #[test]
    fn rules_are_conjoined_with_request_filters() {
        let text = read_predicate(&context(Some(json!({ "sub": "u1" }))), json!({ "id": "1" })).unwrap();

        assert_eq!(
            text,
            "(this.id = $param0 AND (this.authorId IS NOT NULL AND this.authorId = $param1))"
        );
    }

    #[test]
    fn request_filters_cannot_replace_rules() {
        let text = read_predicate(
            &context(Some(json!({ "sub": "u1" }))),
            json!({ "OR": [{ "authorId": "u2" }, { "id": "1" }] }),
        )
        .unwrap();

        assert!(text.ends_with("AND (this.authorId IS NOT NULL AND this.authorId = $param2))"));
    }

    #[test]
    fn missing_claims_deny_everything() {
        assert_eq!(read_predicate(&context(Some(json!({}))), json!(null)).unwrap(), "false");
    }

    #[test]
    fn templates_need_a_token() {
        assert_eq!(
            read_predicate(&context(None), json!(null)),
            Err(CompileError::AuthenticationRequired)
        );
    }

    #[test]
    fn roles_and_authentication_are_checked_statically() {
        let schema = schema();
        let post = schema.find_node("Post").unwrap();

        let check =
            |context: CompileContext, operation| Translator::new(&schema, &context).check_rules(post, operation);

        assert_eq!(
            check(context(Some(json!({ "roles": ["user"] }))), AuthOperation::Delete),
            Err(CompileError::AuthorizationDenied)
        );
        assert_eq!(check(context(Some(json!({ "roles": ["admin"] }))), AuthOperation::Delete), Ok(()));
        assert_eq!(check(context(None), AuthOperation::Delete), Err(CompileError::AuthenticationRequired));
        assert_eq!(check(context(None), AuthOperation::Update), Err(CompileError::AuthenticationRequired));
        assert_eq!(check(context(None), AuthOperation::Create), Ok(()));
    }
}
