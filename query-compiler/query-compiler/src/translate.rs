mod aggregate;
mod auth;
mod connection;
mod filter;
mod options;
mod projection;
mod read;
mod write;

pub use options::offset_to_cursor;

pub(crate) use auth::check_rule;
pub(crate) use filter::extract_node_filter;
#[cfg(test)]
pub(crate) use write::test_schema;

use cypher_builder::{
    Environment,
    ast::{Direction, Expr, NodePattern, Pattern, RelationshipPattern, Variable},
};
use graph_value::{GraphValue, parse_datetime};
use schema_model::{
    GraphObject, NodeDescriptor, RelationDirection, RelationField, ScalarField, ScalarType, SchemaModel, Selection,
};

use crate::{CallbackBucket, CompileContext, CompileError, CompileResult};

/// The operation a root selection asks for.
#[derive(Debug, Clone, Copy)]
pub(crate) enum RootOperation<'a> {
    Read(&'a NodeDescriptor),
    Aggregate(&'a NodeDescriptor),
    Connection(&'a NodeDescriptor),
    Create(&'a NodeDescriptor),
    Update(&'a NodeDescriptor),
    Delete(&'a NodeDescriptor),
}

impl<'a> RootOperation<'a> {
    /// Maps a root field name like `movies`, `moviesConnection` or `createMovies` to its node.
    pub(crate) fn resolve(schema: &'a SchemaModel, name: &str) -> CompileResult<Self> {
        for node in schema.nodes() {
            let plural = node.plural.as_str();
            let pascal = node.pascal_plural();

            let operation = match name {
                n if n == plural => Some(RootOperation::Read(node)),
                n if n.strip_prefix(plural) == Some("Aggregate") => Some(RootOperation::Aggregate(node)),
                n if n.strip_prefix(plural) == Some("Connection") => Some(RootOperation::Connection(node)),
                n if n.strip_prefix("create") == Some(pascal.as_str()) => Some(RootOperation::Create(node)),
                n if n.strip_prefix("update") == Some(pascal.as_str()) => Some(RootOperation::Update(node)),
                n if n.strip_prefix("delete") == Some(pascal.as_str()) => Some(RootOperation::Delete(node)),
                _ => None,
            };

            if let Some(operation) = operation {
                return Ok(operation);
            }
        }

        Err(CompileError::unknown("Query", name))
    }

    /// Mutations referencing callback results through the resolved callbacks parameter.
    pub(crate) fn uses_callbacks(&self) -> bool {
        matches!(self, RootOperation::Create(_) | RootOperation::Update(_))
    }
}

/// State of one compilation.
pub(crate) struct Translator<'a> {
    pub(crate) schema: &'a SchemaModel,
    pub(crate) context: &'a CompileContext,
    pub(crate) env: Environment,
    pub(crate) bucket: CallbackBucket,
}

impl<'a> Translator<'a> {
    pub(crate) fn new(schema: &'a SchemaModel, context: &'a CompileContext) -> Self {
        Translator {
            schema,
            context,
            env: Environment::new(),
            bucket: CallbackBucket::new(),
        }
    }

    pub(crate) fn translate(
        &self,
        operation: RootOperation<'a>,
        selection: &Selection,
    ) -> CompileResult<cypher_builder::ast::Clause> {
        match operation {
            RootOperation::Read(node) => self.translate_read(node, selection),
            RootOperation::Aggregate(node) => self.translate_root_aggregate(node, selection),
            RootOperation::Connection(node) => self.translate_root_connection(node, selection),
            RootOperation::Create(node) => self.translate_create(node, selection),
            RootOperation::Update(node) => self.translate_update(node, selection),
            RootOperation::Delete(node) => self.translate_delete(node, selection),
        }
    }

    pub(crate) fn param(&self, prefix: &str, value: impl Into<GraphValue>) -> Expr {
        Expr::Param(self.env.next_param(prefix, value))
    }

    /// Binds a value compared with or written to `field`.
    pub(crate) fn bind(&self, field: &ScalarField, value: &GraphValue, prefix: &str) -> Expr {
        self.param(prefix, coerce_value(field, value.clone()))
    }

    /// Concrete nodes behind a relationship field.
    pub(crate) fn targets(&self, field: &RelationField) -> CompileResult<Vec<&'a NodeDescriptor>> {
        let targets = self.schema.target_nodes(field);

        if targets.is_empty() {
            return Err(CompileError::unknown(&field.name, &field.target));
        }

        Ok(targets)
    }

    pub(crate) fn node(&self, name: &str) -> CompileResult<&'a NodeDescriptor> {
        self.schema.find_node(name).ok_or_else(|| CompileError::unknown("Schema", name))
    }
}

/// Temporal fields arrive as ISO strings and are stored as temporal values.
pub(crate) fn coerce_value(field: &ScalarField, value: GraphValue) -> GraphValue {
    if field.type_identifier != ScalarType::DateTime {
        return value;
    }

    match value {
        GraphValue::String(s) => match parse_datetime(&s) {
            Ok(datetime) => GraphValue::DateTime(datetime),
            Err(_) => GraphValue::String(s),
        },
        GraphValue::List(values) => GraphValue::List(values.into_iter().map(|v| coerce_value(field, v)).collect()),
        other => other,
    }
}

pub(crate) fn node_pattern(variable: &Variable, node: &NodeDescriptor) -> NodePattern {
    NodePattern::new(variable).labels(node.labels.iter().cloned())
}

/// `(from)<-[r:TYPE]-(to)` following the storage direction of `field`, or undirected.
pub(crate) fn traversal(
    from: &Variable,
    field: &RelationField,
    directed: bool,
    relationship: Option<&Variable>,
    to: NodePattern,
) -> Pattern {
    let direction = match (directed, field.direction) {
        (false, _) => Direction::Undirected,
        (true, RelationDirection::In) => Direction::Left,
        (true, RelationDirection::Out) => Direction::Right,
    };

    let mut rel = RelationshipPattern::new(field.relationship_type.clone(), direction);

    if let Some(variable) = relationship {
        rel = rel.named(variable);
    }

    Pattern::node(NodePattern::new(from)).related(rel, to)
}

/// Whether the selection of `field` traverses with or without direction.
pub(crate) fn is_directed(field: &RelationField, selection: &Selection) -> bool {
    field
        .query_direction
        .is_directed(selection.get_argument("directed").and_then(GraphValue::as_bool))
}

pub(crate) fn expect_object<'v>(value: &'v GraphValue, argument: &str) -> CompileResult<&'v [(String, GraphValue)]> {
    value
        .as_object()
        .ok_or_else(|| CompileError::invalid_argument(argument, "expected an object"))
}

/// Entries of an object argument, an empty slice for `null`.
pub(crate) fn object_entries<'v>(
    value: Option<&'v GraphValue>,
    argument: &str,
) -> CompileResult<&'v [(String, GraphValue)]> {
    match value {
        None | Some(GraphValue::Null) => Ok(&[]),
        Some(value) => expect_object(value, argument),
    }
}

/// A copy of `where` for one member of an abstract target: shared keys plus the member's
/// entry under `_on`.
pub(crate) fn member_where(value: &GraphValue, member: &str) -> GraphValue {
    let Some(entries) = value.as_object() else {
        return value.clone();
    };

    let mut shared: GraphObject = entries.iter().filter(|(key, _)| key != "_on").cloned().collect();

    if let Some(GraphValue::Object(specific)) = value.get("_on").and_then(|on| on.get(member)) {
        shared.extend(specific.iter().cloned());
    }

    GraphValue::Object(shared)
}
