use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Node `{0}` is defined more than once.")]
    DuplicateNode(String),

    #[error("Relationship field `{node}.{field}` points at unknown type `{target}`.")]
    UnknownRelationshipTarget { node: String, field: String, target: String },

    #[error("Relationship field `{node}.{field}` references unknown properties interface `{properties}`.")]
    UnknownRelationshipProperties {
        node: String,
        field: String,
        properties: String,
    },

    #[error("Abstract type `{name}` lists unknown member `{member}`.")]
    UnknownAbstractMember { name: String, member: String },

    #[error("Field `{node}.{field}` is defined more than once.")]
    DuplicateField { node: String, field: String },
}
