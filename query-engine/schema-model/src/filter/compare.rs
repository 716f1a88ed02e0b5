use super::*;

use crate::{Filter, ScalarField};
use graph_value::GraphValue;

/// Comparing methods for scalar fields.
pub trait ScalarCompare {
    fn is_in<T>(&self, values: Vec<T>) -> Filter
    where
        T: Into<GraphValue>;

    fn not_in<T>(&self, values: Vec<T>) -> Filter
    where
        T: Into<GraphValue>;

    fn equals<T>(&self, val: T) -> Filter
    where
        T: Into<GraphValue>;

    fn not_equals<T>(&self, val: T) -> Filter
    where
        T: Into<GraphValue>;

    fn contains<T>(&self, val: T) -> Filter
    where
        T: Into<GraphValue>;

    fn starts_with<T>(&self, val: T) -> Filter
    where
        T: Into<GraphValue>;

    fn ends_with<T>(&self, val: T) -> Filter
    where
        T: Into<GraphValue>;

    fn less_than<T>(&self, val: T) -> Filter
    where
        T: Into<GraphValue>;

    fn greater_than<T>(&self, val: T) -> Filter
    where
        T: Into<GraphValue>;

    fn condition(&self, condition: ScalarCondition) -> Filter;
}

impl ScalarCompare for ScalarField {
    fn is_in<T>(&self, values: Vec<T>) -> Filter
    where
        T: Into<GraphValue>,
    {
        self.condition(ScalarCondition::In(values.into_iter().map(Into::into).collect()))
    }

    fn not_in<T>(&self, values: Vec<T>) -> Filter
    where
        T: Into<GraphValue>,
    {
        self.condition(ScalarCondition::NotIn(values.into_iter().map(Into::into).collect()))
    }

    fn equals<T>(&self, val: T) -> Filter
    where
        T: Into<GraphValue>,
    {
        self.condition(ScalarCondition::Equals(val.into()))
    }

    fn not_equals<T>(&self, val: T) -> Filter
    where
        T: Into<GraphValue>,
    {
        self.condition(ScalarCondition::NotEquals(val.into()))
    }

    fn contains<T>(&self, val: T) -> Filter
    where
        T: Into<GraphValue>,
    {
        self.condition(ScalarCondition::Contains(val.into()))
    }

    fn starts_with<T>(&self, val: T) -> Filter
    where
        T: Into<GraphValue>,
    {
        self.condition(ScalarCondition::StartsWith(val.into()))
    }

    fn ends_with<T>(&self, val: T) -> Filter
    where
        T: Into<GraphValue>,
    {
        self.condition(ScalarCondition::EndsWith(val.into()))
    }

    fn less_than<T>(&self, val: T) -> Filter
    where
        T: Into<GraphValue>,
    {
        self.condition(ScalarCondition::LessThan(val.into()))
    }

    fn greater_than<T>(&self, val: T) -> Filter
    where
        T: Into<GraphValue>,
    {
        self.condition(ScalarCondition::GreaterThan(val.into()))
    }

    fn condition(&self, condition: ScalarCondition) -> Filter {
        Filter::from(ScalarFilter {
            field: self.clone(),
            condition,
        })
    }
}

/// Comparison methods for relational fields.
pub trait RelationCompare {
    fn related(&self, target: &str, condition: RelationCondition, filter: Filter) -> Filter;

    fn at_least_one_related(&self, target: &str, filter: Filter) -> Filter {
        self.related(target, RelationCondition::Some, filter)
    }

    fn every_related(&self, target: &str, filter: Filter) -> Filter {
        self.related(target, RelationCondition::All, filter)
    }

    fn no_related(&self, target: &str, filter: Filter) -> Filter {
        self.related(target, RelationCondition::None, filter)
    }

    fn exactly_one_related(&self, target: &str, filter: Filter) -> Filter {
        self.related(target, RelationCondition::Single, filter)
    }
}

impl RelationCompare for RelationField {
    fn related(&self, target: &str, condition: RelationCondition, filter: Filter) -> Filter {
        Filter::from(RelationFilter {
            field: self.clone(),
            target: target.to_owned(),
            condition,
            nested: Box::new(filter),
        })
    }
}
