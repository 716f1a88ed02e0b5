use graph_value::GraphValue;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScalarCondition {
    Equals(GraphValue),
    NotEquals(GraphValue),
    Contains(GraphValue),
    NotContains(GraphValue),
    StartsWith(GraphValue),
    NotStartsWith(GraphValue),
    EndsWith(GraphValue),
    NotEndsWith(GraphValue),
    LessThan(GraphValue),
    LessThanOrEquals(GraphValue),
    GreaterThan(GraphValue),
    GreaterThanOrEquals(GraphValue),
    In(Vec<GraphValue>),
    NotIn(Vec<GraphValue>),
    /// Regular expression match.
    Matches(GraphValue),
    NotMatches(GraphValue),
    /// A list property contains the value.
    Includes(GraphValue),
    NotIncludes(GraphValue),
}

impl ScalarCondition {
    pub fn invert(self, condition: bool) -> Self {
        if condition {
            match self {
                Self::Equals(v) => Self::NotEquals(v),
                Self::NotEquals(v) => Self::Equals(v),
                Self::Contains(v) => Self::NotContains(v),
                Self::NotContains(v) => Self::Contains(v),
                Self::StartsWith(v) => Self::NotStartsWith(v),
                Self::NotStartsWith(v) => Self::StartsWith(v),
                Self::EndsWith(v) => Self::NotEndsWith(v),
                Self::NotEndsWith(v) => Self::EndsWith(v),
                Self::LessThan(v) => Self::GreaterThanOrEquals(v),
                Self::LessThanOrEquals(v) => Self::GreaterThan(v),
                Self::GreaterThan(v) => Self::LessThanOrEquals(v),
                Self::GreaterThanOrEquals(v) => Self::LessThan(v),
                Self::In(v) => Self::NotIn(v),
                Self::NotIn(v) => Self::In(v),
                Self::Matches(v) => Self::NotMatches(v),
                Self::NotMatches(v) => Self::Matches(v),
                Self::Includes(v) => Self::NotIncludes(v),
                Self::NotIncludes(v) => Self::Includes(v),
            }
        } else {
            self
        }
    }

    pub fn value(&self) -> GraphValue {
        match self {
            Self::In(values) | Self::NotIn(values) => GraphValue::List(values.clone()),
            Self::Equals(v)
            | Self::NotEquals(v)
            | Self::Contains(v)
            | Self::NotContains(v)
            | Self::StartsWith(v)
            | Self::NotStartsWith(v)
            | Self::EndsWith(v)
            | Self::NotEndsWith(v)
            | Self::LessThan(v)
            | Self::LessThanOrEquals(v)
            | Self::GreaterThan(v)
            | Self::GreaterThanOrEquals(v)
            | Self::Matches(v)
            | Self::NotMatches(v)
            | Self::Includes(v)
            | Self::NotIncludes(v) => v.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverting_twice_is_identity() {
        let condition = ScalarCondition::LessThan(GraphValue::Int(3));

        assert_eq!(condition.clone().invert(true).invert(true), condition);
        assert_eq!(
            condition.clone().invert(true),
            ScalarCondition::GreaterThanOrEquals(GraphValue::Int(3))
        );
        assert_eq!(condition.clone().invert(false), condition);
    }
}
