use graph_value::GraphValue;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthOperation {
    Read,
    Create,
    Update,
    Delete,
    Connect,
    Disconnect,
    Subscribe,
}

/// One rule of a node's authorization directive.
///
/// `where` is a filter template in the regular `where` shape. String leaves of the form
/// `$jwt.<path>` are replaced by the matching claim of the decoded token at compile time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRule {
    /// Operations the rule applies to, all of them when absent.
    #[serde(default)]
    pub operations: Option<Vec<AuthOperation>>,
    #[serde(default)]
    pub is_authenticated: Option<bool>,
    #[serde(default)]
    pub roles: Option<Vec<String>>,
    #[serde(default, rename = "where")]
    pub where_template: Option<GraphValue>,
}

impl AuthRule {
    pub fn applies_to(&self, operation: AuthOperation) -> bool {
        match &self.operations {
            Some(ops) => ops.contains(&operation),
            None => true,
        }
    }

    pub fn requires_authentication(&self) -> bool {
        self.is_authenticated.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rules_without_operations_apply_everywhere() {
        let rule: AuthRule = serde_json::from_value(json!({ "isAuthenticated": true })).unwrap();

        assert!(rule.applies_to(AuthOperation::Read));
        assert!(rule.applies_to(AuthOperation::Subscribe));
        assert!(rule.requires_authentication());
    }

    #[test]
    fn rules_are_scoped_to_their_operations() {
        let rule: AuthRule = serde_json::from_value(json!({
            "operations": ["UPDATE", "DELETE"],
            "where": { "id": "$jwt.sub" },
        }))
        .unwrap();

        assert!(rule.applies_to(AuthOperation::Delete));
        assert!(!rule.applies_to(AuthOperation::Read));
        assert!(rule.where_template.is_some());
    }
}
