//! In-memory evaluation of filters against plain property maps.
//!
//! Only scalar conditions and their boolean combinations can be decided without the graph,
//! anything that needs a traversal evaluates to `false`.

use super::{Filter, ScalarCondition, ScalarFilter};
use graph_value::GraphValue;
use std::cmp::Ordering;

impl Filter {
    /// Evaluates the filter against an object of database properties.
    pub fn evaluate(&self, record: &GraphValue) -> bool {
        match self {
            Filter::And(filters) => filters.iter().all(|f| f.evaluate(record)),
            Filter::Or(filters) => filters.iter().any(|f| f.evaluate(record)),
            Filter::Not(filters) => !filters.iter().all(|f| f.evaluate(record)),
            Filter::Scalar(sf) => sf.evaluate(record),
            Filter::Empty => true,
            Filter::Relation(_) | Filter::Connection(_) | Filter::Aggregation(_) | Filter::Edge(_) => false,
        }
    }
}

impl ScalarFilter {
    pub fn evaluate(&self, record: &GraphValue) -> bool {
        let value = record.get(self.field.db_name()).unwrap_or(&GraphValue::Null);
        self.condition.evaluate(value)
    }
}

impl ScalarCondition {
    pub fn evaluate(&self, value: &GraphValue) -> bool {
        match self {
            ScalarCondition::Equals(expected) => value.loosely_equals(expected),
            ScalarCondition::In(candidates) => candidates.iter().any(|c| value.loosely_equals(c)),
            ScalarCondition::Contains(needle) => strings(value, needle).is_some_and(|(h, n)| h.contains(n)),
            ScalarCondition::StartsWith(prefix) => strings(value, prefix).is_some_and(|(h, p)| h.starts_with(p)),
            ScalarCondition::EndsWith(suffix) => strings(value, suffix).is_some_and(|(h, s)| h.ends_with(s)),
            ScalarCondition::Matches(pattern) => strings(value, pattern).is_some_and(|(h, p)| {
                regex::Regex::new(&format!("^(?:{p})$")).is_ok_and(|re| re.is_match(h))
            }),
            ScalarCondition::LessThan(bound) => value.compare(bound) == Some(Ordering::Less),
            ScalarCondition::LessThanOrEquals(bound) => {
                matches!(value.compare(bound), Some(Ordering::Less | Ordering::Equal))
            }
            ScalarCondition::GreaterThan(bound) => value.compare(bound) == Some(Ordering::Greater),
            ScalarCondition::GreaterThanOrEquals(bound) => {
                matches!(value.compare(bound), Some(Ordering::Greater | Ordering::Equal))
            }
            ScalarCondition::Includes(element) => value
                .as_list()
                .is_some_and(|list| list.iter().any(|v| v.loosely_equals(element))),
            negated => !negated.clone().invert(true).evaluate(value),
        }
    }
}

fn strings<'a>(haystack: &'a GraphValue, needle: &'a GraphValue) -> Option<(&'a str, &'a str)> {
    Some((haystack.as_str()?, needle.as_str()?))
}

#[cfg(test)]
mod tests {
    use crate::{Filter, ScalarCompare, ScalarField, ScalarType};
    use graph_value::GraphValue;

    fn record() -> GraphValue {
        r#"{ "title": "The Matrix", "year": 1999, "tags": ["action", "sci-fi"] }"#
            .parse()
            .unwrap()
    }

    #[test]
    fn scalar_conditions_read_properties() {
        let title = ScalarField::new("title", ScalarType::String);
        let year = ScalarField::new("year", ScalarType::Int);

        assert!(title.starts_with("The").evaluate(&record()));
        assert!(year.greater_than(1990).evaluate(&record()));
        assert!(!year.less_than(1990).evaluate(&record()));
        assert!(title.not_in(vec!["Heat"]).evaluate(&record()));
    }

    #[test]
    fn boolean_combinators() {
        let title = ScalarField::new("title", ScalarType::String);
        let year = ScalarField::new("year", ScalarType::Int);

        let filter = Filter::or(vec![title.equals("Heat"), year.equals(1999)]);
        assert!(filter.evaluate(&record()));

        let filter = Filter::not(vec![title.contains("Matrix")]);
        assert!(!filter.evaluate(&record()));
    }

    #[test]
    fn missing_properties_compare_as_null() {
        let rating = ScalarField::new("rating", ScalarType::Float);

        assert!(rating.equals(GraphValue::Null).evaluate(&record()));
        assert!(!rating.greater_than(1).evaluate(&record()));
    }

    #[test]
    fn aliased_fields_read_their_storage_name() {
        let mut field = ScalarField::new("name", ScalarType::String);
        field.alias = Some("title".into());

        assert!(field.ends_with("Matrix").evaluate(&record()));
    }
}
