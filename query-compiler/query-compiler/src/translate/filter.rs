//! `where` arguments: extraction into [`Filter`](schema_model::Filter) trees, and lowering of
//! those trees into predicates over query variables.

mod aggregation;
mod extract;
mod lower;

pub(crate) use extract::{extract_connection_filter, extract_node_filter};
pub(crate) use lower::LowerMode;
