use bon::Builder;
use graph_value::GraphValue;

use crate::CallbackRegistry;

/// How `create<Plural>` mutations with more than one input row are compiled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CreateStrategy {
    /// One `UNWIND` over a list parameter holding every row.
    #[default]
    Batched,
    /// One creation block per row.
    PerRow,
}

/// Per-request inputs of a compilation.
#[derive(Debug, Clone, Default, Builder)]
pub struct CompileContext {
    /// Decoded and verified token claims. `None` for anonymous requests.
    pub jwt: Option<GraphValue>,
    #[builder(default)]
    pub subscriptions_enabled: bool,
    #[builder(default)]
    pub create_strategy: CreateStrategy,
    #[builder(default)]
    pub callbacks: CallbackRegistry,
}

impl CompileContext {
    pub fn with_create_strategy(&self, create_strategy: CreateStrategy) -> Self {
        CompileContext {
            create_strategy,
            ..self.clone()
        }
    }

    /// Resolves a dotted claim path such as `sub` or `org.id`.
    pub fn claim(&self, path: &str) -> Option<&GraphValue> {
        self.jwt.as_ref()?.get_path(path.split('.'))
    }

    pub(crate) fn roles(&self) -> Vec<&str> {
        self.claim("roles")
            .and_then(GraphValue::as_list)
            .map(|roles| roles.iter().filter_map(GraphValue::as_str).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_resolve_nested_paths() {
        let context = CompileContext::builder()
            .jwt(r#"{ "sub": "u1", "org": { "id": "o1" }, "roles": ["admin"] }"#.parse().unwrap())
            .build();

        assert_eq!(context.claim("org.id"), Some(&GraphValue::from("o1")));
        assert_eq!(context.claim("org.name"), None);
        assert_eq!(context.roles(), vec!["admin"]);
        assert_eq!(context.create_strategy, CreateStrategy::Batched);
    }

    #[test]
    fn switching_strategy_keeps_the_rest() {
        let context = CompileContext::builder().subscriptions_enabled(true).build();
        let per_row = context.with_create_strategy(CreateStrategy::PerRow);

        assert!(per_row.subscriptions_enabled);
        assert_eq!(per_row.create_strategy, CreateStrategy::PerRow);
    }
}
