use crate::{OrderTarget, RelationField, ScalarField};
use graph_value::GraphValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateComparison {
    Equal,
    GreaterThan,
    GreaterThanOrEquals,
    LessThan,
    LessThanOrEquals,
}

impl AggregateComparison {
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "EQUAL" => Some(Self::Equal),
            "GT" => Some(Self::GreaterThan),
            "GTE" => Some(Self::GreaterThanOrEquals),
            "LT" => Some(Self::LessThan),
            "LTE" => Some(Self::LessThanOrEquals),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    Average,
    Min,
    Max,
    Sum,
    /// Minimum string length.
    Shortest,
    /// Maximum string length.
    Longest,
}

impl AggregateFunction {
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "AVERAGE" => Some(Self::Average),
            "MIN" => Some(Self::Min),
            "MAX" => Some(Self::Max),
            "SUM" => Some(Self::Sum),
            "SHORTEST" => Some(Self::Shortest),
            "LONGEST" => Some(Self::Longest),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationCondition {
    And(Vec<AggregationCondition>),
    Or(Vec<AggregationCondition>),
    Not(Box<AggregationCondition>),
    Count {
        comparison: AggregateComparison,
        value: GraphValue,
    },
    Field {
        target: OrderTarget,
        field: ScalarField,
        /// `None` compares individual related values.
        function: Option<AggregateFunction>,
        comparison: AggregateComparison,
        value: GraphValue,
    },
}

/// Comparison over an aggregate of the related set, e.g. `actorsAggregate: { count_GT: 1 }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationFilter {
    pub field: RelationField,
    pub target: String,
    pub condition: AggregationCondition,
}
