mod aggregation;
mod compare;
mod evaluate;
mod scalar;

pub use aggregation::{AggregateComparison, AggregateFunction, AggregationCondition, AggregationFilter};
pub use compare::{RelationCompare, ScalarCompare};
pub use scalar::{ScalarCondition, ScalarFilter};

use crate::RelationField;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Vec<Filter>),
    Scalar(ScalarFilter),
    Relation(RelationFilter),
    Connection(ConnectionFilter),
    Aggregation(AggregationFilter),
    /// Filter applied to the relationship of a connection instead of its node.
    Edge(Box<Filter>),
    Empty,
}

impl Filter {
    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::And(filters)
    }

    pub fn or(filters: Vec<Filter>) -> Self {
        Filter::Or(filters)
    }

    pub fn not(filters: Vec<Filter>) -> Self {
        Filter::Not(filters)
    }

    pub fn empty() -> Self {
        Filter::Empty
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Filter::Empty)
    }

    /// Whether the filter can only be decided with access to the graph.
    pub fn requires_traversal(&self) -> bool {
        match self {
            Filter::And(filters) | Filter::Or(filters) | Filter::Not(filters) => {
                filters.iter().any(Filter::requires_traversal)
            }
            Filter::Scalar(_) | Filter::Empty => false,
            Filter::Relation(_) | Filter::Connection(_) | Filter::Aggregation(_) | Filter::Edge(_) => true,
        }
    }
}

impl From<ScalarFilter> for Filter {
    fn from(sf: ScalarFilter) -> Self {
        Filter::Scalar(sf)
    }
}

impl From<RelationFilter> for Filter {
    fn from(rf: RelationFilter) -> Self {
        Filter::Relation(rf)
    }
}

impl From<AggregationFilter> for Filter {
    fn from(af: AggregationFilter) -> Self {
        Filter::Aggregation(af)
    }
}

/// How many related nodes must satisfy the nested filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationCondition {
    Some,
    None,
    All,
    Single,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationFilter {
    pub field: RelationField,
    /// Concrete node the relationship is traversed to.
    pub target: String,
    pub condition: RelationCondition,
    pub nested: Box<Filter>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionFilter {
    pub field: RelationField,
    pub target: String,
    /// `Some` for the plain form, `None` for the `_NOT` form.
    pub condition: RelationCondition,
    /// Node filters at the top level, relationship filters wrapped in [`Filter::Edge`].
    pub nested: Box<Filter>,
}
