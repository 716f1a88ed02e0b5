use crate::ScalarField;
use serde::Deserialize;

/// Storage direction of a relationship, seen from the node declaring the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RelationDirection {
    In,
    Out,
}

/// Which traversal directions a relationship may be queried in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryDirection {
    #[default]
    DefaultDirected,
    DefaultUndirected,
    DirectedOnly,
    UndirectedOnly,
}

impl QueryDirection {
    /// Resolves the optional `directed` argument of a field selection.
    pub fn is_directed(self, requested: Option<bool>) -> bool {
        match self {
            QueryDirection::DirectedOnly => true,
            QueryDirection::UndirectedOnly => false,
            QueryDirection::DefaultDirected => requested.unwrap_or(true),
            QueryDirection::DefaultUndirected => requested.unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One { required: bool },
    Many,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationField {
    pub name: String,
    #[serde(rename = "type")]
    pub relationship_type: String,
    pub direction: RelationDirection,
    #[serde(default)]
    pub query_direction: QueryDirection,
    /// Name of the interface describing the properties stored on the relationship.
    #[serde(default)]
    pub properties: Option<String>,
    /// A node, interface or union name.
    pub target: String,
    #[serde(default = "default_true")]
    pub is_list: bool,
    #[serde(default)]
    pub is_required: bool,
}

fn default_true() -> bool {
    true
}

impl RelationField {
    pub fn new(
        name: impl Into<String>,
        relationship_type: impl Into<String>,
        direction: RelationDirection,
        target: impl Into<String>,
    ) -> Self {
        RelationField {
            name: name.into(),
            relationship_type: relationship_type.into(),
            direction,
            query_direction: QueryDirection::default(),
            properties: None,
            target: target.into(),
            is_list: true,
            is_required: false,
        }
    }

    pub fn cardinality(&self) -> Cardinality {
        if self.is_list {
            Cardinality::Many
        } else {
            Cardinality::One {
                required: self.is_required,
            }
        }
    }

    pub fn connection_name(&self) -> String {
        format!("{}Connection", self.name)
    }

    pub fn aggregate_name(&self) -> String {
        format!("{}Aggregate", self.name)
    }
}

/// Named set of scalar fields stored on relationships.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelationshipProperties {
    pub name: String,
    pub fields: Vec<ScalarField>,
}

impl RelationshipProperties {
    pub fn find_field(&self, name: &str) -> Option<&ScalarField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbstractTypeKind {
    Interface,
    Union,
}

/// An interface or union a relationship may target, expanded to its concrete nodes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AbstractType {
    pub name: String,
    pub kind: AbstractTypeKind,
    pub members: Vec<String>,
}
