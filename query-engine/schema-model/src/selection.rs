use graph_value::GraphValue;
use indexmap::IndexMap;
use serde::Deserialize;

/// One field of an already parsed and validated request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub arguments: IndexMap<String, GraphValue>,
    #[serde(default)]
    pub selection: Vec<Selection>,
    /// Restricts this entry to one concrete member of an interface or union target.
    #[serde(default)]
    pub on_type: Option<String>,
}

impl Selection {
    pub fn new(name: impl Into<String>) -> Self {
        Selection {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn argument(mut self, name: impl Into<String>, value: impl Into<GraphValue>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    pub fn select(mut self, nested: impl IntoIterator<Item = Selection>) -> Self {
        self.selection.extend(nested);
        self
    }

    pub fn on_type(mut self, type_name: impl Into<String>) -> Self {
        self.on_type = Some(type_name.into());
        self
    }

    /// The key the field is returned under.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn get_argument(&self, name: &str) -> Option<&GraphValue> {
        self.arguments.get(name).filter(|v| !v.is_null())
    }

    pub fn nested(&self, name: &str) -> Option<&Selection> {
        self.selection.iter().find(|s| s.name == name)
    }

    /// Nested entries that apply to the given concrete type.
    pub fn fields_for<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a Selection> + 'a {
        self.selection
            .iter()
            .filter(move |s| s.on_type.as_deref().is_none_or(|t| t == type_name))
    }
}
