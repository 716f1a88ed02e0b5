use crate::{AbstractType, NodeDescriptor, RelationField, RelationshipProperties, SchemaError};
use heck::ToLowerCamelCase;
use indexmap::IndexMap;
use itertools::Itertools;
use serde::Deserialize;
use std::sync::Arc;

pub type SchemaRef = Arc<SchemaModel>;

/// Raw schema input, validated and frozen by [`SchemaModel::build`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDefinition {
    pub nodes: Vec<NodeDescriptor>,
    #[serde(default)]
    pub abstract_types: Vec<AbstractType>,
    #[serde(default)]
    pub relationship_properties: Vec<RelationshipProperties>,
}

#[derive(Debug, Default)]
pub struct SchemaModel {
    nodes: IndexMap<String, NodeDescriptor>,
    abstract_types: IndexMap<String, AbstractType>,
    relationship_properties: IndexMap<String, RelationshipProperties>,
}

impl SchemaModel {
    /// Validates the definition and fills in derived defaults (labels, plurals).
    pub fn build(definition: SchemaDefinition) -> Result<SchemaModel, SchemaError> {
        let mut nodes = IndexMap::with_capacity(definition.nodes.len());

        for mut node in definition.nodes {
            if node.labels.is_empty() {
                node.labels.push(node.name.clone());
            }

            if node.plural.is_empty() {
                node.plural = format!("{}s", node.name.to_lower_camel_case());
            }

            check_duplicate_fields(&node)?;

            if nodes.contains_key(&node.name) {
                return Err(SchemaError::DuplicateNode(node.name));
            }

            nodes.insert(node.name.clone(), node);
        }

        let abstract_types: IndexMap<_, _> = definition
            .abstract_types
            .into_iter()
            .map(|t| (t.name.clone(), t))
            .collect();

        for abstract_type in abstract_types.values() {
            if let Some(member) = abstract_type.members.iter().find(|m| !nodes.contains_key(*m)) {
                return Err(SchemaError::UnknownAbstractMember {
                    name: abstract_type.name.clone(),
                    member: member.clone(),
                });
            }
        }

        let relationship_properties: IndexMap<_, _> = definition
            .relationship_properties
            .into_iter()
            .map(|p| (p.name.clone(), p))
            .collect();

        for node in nodes.values() {
            for field in &node.relation_fields {
                if !nodes.contains_key(&field.target) && !abstract_types.contains_key(&field.target) {
                    return Err(SchemaError::UnknownRelationshipTarget {
                        node: node.name.clone(),
                        field: field.name.clone(),
                        target: field.target.clone(),
                    });
                }

                if let Some(properties) = &field.properties {
                    if !relationship_properties.contains_key(properties) {
                        return Err(SchemaError::UnknownRelationshipProperties {
                            node: node.name.clone(),
                            field: field.name.clone(),
                            properties: properties.clone(),
                        });
                    }
                }
            }
        }

        Ok(SchemaModel {
            nodes,
            abstract_types,
            relationship_properties,
        })
    }

    pub fn find_node(&self, name: &str) -> Option<&NodeDescriptor> {
        self.nodes.get(name)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeDescriptor> {
        self.nodes.values()
    }

    /// Concrete nodes a relationship field points at, in declaration order.
    pub fn target_nodes(&self, field: &RelationField) -> Vec<&NodeDescriptor> {
        match self.abstract_types.get(&field.target) {
            Some(abstract_type) => abstract_type
                .members
                .iter()
                .filter_map(|member| self.nodes.get(member))
                .collect(),
            None => self.nodes.get(&field.target).into_iter().collect(),
        }
    }

    pub fn is_abstract_target(&self, field: &RelationField) -> bool {
        self.abstract_types.contains_key(&field.target)
    }

    pub fn relationship_properties(&self, field: &RelationField) -> Option<&RelationshipProperties> {
        field
            .properties
            .as_ref()
            .and_then(|name| self.relationship_properties.get(name))
    }
}

fn check_duplicate_fields(node: &NodeDescriptor) -> Result<(), SchemaError> {
    let names = node
        .fields
        .iter()
        .map(|f| f.name.as_str())
        .chain(node.relation_fields.iter().map(|f| f.name.as_str()));

    match names.duplicates().next() {
        Some(name) => Err(SchemaError::DuplicateField {
            node: node.name.clone(),
            field: name.to_owned(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn definition(value: serde_json::Value) -> SchemaDefinition {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn build_fills_in_labels_and_plurals() {
        let schema = SchemaModel::build(definition(json!({
            "nodes": [{ "name": "BlogPost", "fields": [{ "name": "id", "type": "ID" }] }]
        })))
        .unwrap();

        let node = schema.find_node("BlogPost").unwrap();

        assert_eq!(node.labels, vec!["BlogPost".to_owned()]);
        assert_eq!(node.plural, "blogPosts");
        assert_eq!(node.pascal_plural(), "BlogPosts");
    }

    #[test]
    fn unknown_relationship_targets_are_rejected() {
        let err = SchemaModel::build(definition(json!({
            "nodes": [{
                "name": "Movie",
                "relationFields": [{ "name": "actors", "type": "ACTED_IN", "direction": "IN", "target": "Actor" }]
            }]
        })))
        .unwrap_err();

        assert_eq!(
            err,
            SchemaError::UnknownRelationshipTarget {
                node: "Movie".into(),
                field: "actors".into(),
                target: "Actor".into(),
            }
        );
    }

    #[test]
    fn abstract_targets_expand_to_their_members() {
        let schema = SchemaModel::build(definition(json!({
            "nodes": [
                { "name": "Comment" },
                { "name": "Post" },
                {
                    "name": "User",
                    "relationFields": [{ "name": "content", "type": "HAS_CONTENT", "direction": "OUT", "target": "Content" }]
                }
            ],
            "abstractTypes": [{ "name": "Content", "kind": "interface", "members": ["Comment", "Post"] }]
        })))
        .unwrap();

        let user = schema.find_node("User").unwrap();
        let field = user.find_relation_field("content").unwrap();
        let targets: Vec<_> = schema.target_nodes(field).into_iter().map(|n| n.name.as_str()).collect();

        assert!(schema.is_abstract_target(field));
        assert_eq!(targets, vec!["Comment", "Post"]);
    }
}
