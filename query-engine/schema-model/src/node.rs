use crate::{AuthOperation, AuthRule, RelationField, ScalarField};
use bon::Builder;
use serde::Deserialize;

/// Limits applied to list reads of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOptions {
    #[serde(default)]
    pub default_limit: Option<u64>,
    #[serde(default)]
    pub max_limit: Option<u64>,
}

impl QueryOptions {
    /// Resolves the limit for a request, clamping explicit limits to the maximum.
    pub fn effective_limit(&self, requested: Option<u64>) -> Option<u64> {
        let limit = requested.or(self.default_limit);

        match (limit, self.max_limit) {
            (Some(limit), Some(max)) => Some(limit.min(max)),
            (None, Some(max)) => Some(max),
            (limit, None) => limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Builder)]
#[serde(rename_all = "camelCase")]
pub struct NodeDescriptor {
    #[builder(into)]
    pub name: String,
    /// Database labels, `[name]` when empty.
    #[serde(default)]
    #[builder(default)]
    pub labels: Vec<String>,
    /// Plural used for root field names, derived from `name` when empty.
    #[serde(default)]
    #[builder(default, into)]
    pub plural: String,
    #[serde(default)]
    #[builder(default)]
    pub fields: Vec<ScalarField>,
    #[serde(default)]
    #[builder(default)]
    pub relation_fields: Vec<RelationField>,
    #[serde(default)]
    #[builder(default)]
    pub auth: Vec<AuthRule>,
    #[serde(default)]
    #[builder(default)]
    pub query_options: QueryOptions,
    /// Statement replacing the default root match. It must bind `this`.
    #[serde(default)]
    pub custom_query: Option<String>,
}

impl NodeDescriptor {
    pub fn find_field(&self, name: &str) -> Option<&ScalarField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn find_relation_field(&self, name: &str) -> Option<&RelationField> {
        self.relation_fields.iter().find(|f| f.name == name)
    }

    /// Finds the relationship field exposed as `<name>Connection`.
    pub fn find_connection_field(&self, name: &str) -> Option<&RelationField> {
        name.strip_suffix("Connection")
            .and_then(|field| self.find_relation_field(field))
    }

    /// Finds the relationship field exposed as `<name>Aggregate`.
    pub fn find_aggregate_field(&self, name: &str) -> Option<&RelationField> {
        name.strip_suffix("Aggregate")
            .and_then(|field| self.find_relation_field(field))
    }

    pub fn auth_rules(&self, operation: AuthOperation) -> impl Iterator<Item = &AuthRule> {
        self.auth.iter().filter(move |rule| rule.applies_to(operation))
    }

    pub fn pascal_plural(&self) -> String {
        let mut chars = self.plural.chars();

        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}
