//! Static, read-only description of the graph the compiler targets: nodes, their scalar and
//! relationship fields, authorization rules, and the selection tree requests arrive as.

mod auth;
mod error;
mod field;
mod node;
mod relation;
mod schema;
mod selection;

pub mod filter;
pub mod order_by;

pub use auth::{AuthOperation, AuthRule};
pub use error::SchemaError;
pub use field::{PopulatedBy, ScalarField, ScalarType, WriteOperation};
pub use filter::*;
pub use graph_value::{GraphObject, GraphValue};
pub use node::{NodeDescriptor, QueryOptions};
pub use order_by::{OrderBy, OrderTarget, SortOrder};
pub use relation::{
    AbstractType, AbstractTypeKind, Cardinality, QueryDirection, RelationDirection, RelationField,
    RelationshipProperties,
};
pub use schema::{SchemaDefinition, SchemaModel, SchemaRef};
pub use selection::Selection;
