mod error;
mod temporal;

use bigdecimal::{BigDecimal, FromPrimitive, ToPrimitive};
use chrono::prelude::*;
use serde::{Deserialize, Serialize, Serializer, ser::SerializeMap};
use std::{cmp::Ordering, convert::TryFrom, fmt, str::FromStr};

pub use error::ConversionFailure;
pub use temporal::{TemporalFields, parse_datetime, stringify_datetime};

pub type GraphValueResult<T> = std::result::Result<T, ConversionFailure>;
pub type GraphListValue = Vec<GraphValue>;
pub type GraphObject = Vec<(String, GraphValue)>;

/// A value that can be bound as a query parameter or appear in request arguments.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, PartialOrd, Ord)]
#[serde(try_from = "serde_json::Value")]
pub enum GraphValue {
    String(String),
    Boolean(bool),
    Enum(String),
    Int(i64),
    Float(BigDecimal),
    /// Serialized as its calendar fields, see [`TemporalFields`].
    DateTime(DateTime<FixedOffset>),
    List(GraphListValue),
    /// A collection of key-value pairs, kept in insertion order.
    Object(GraphObject),
    Null,
}

impl Serialize for GraphValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            GraphValue::String(s) | GraphValue::Enum(s) => serializer.serialize_str(s),
            GraphValue::Boolean(b) => serializer.serialize_bool(*b),
            GraphValue::Int(i) => serializer.serialize_i64(*i),
            GraphValue::Float(f) => match f.to_f64() {
                Some(f) => serializer.serialize_f64(f),
                None => serializer.serialize_str(&f.to_string()),
            },
            GraphValue::DateTime(dt) => TemporalFields::from(dt).serialize(serializer),
            GraphValue::List(list) => serializer.collect_seq(list),
            GraphValue::Object(obj) => {
                let mut map = serializer.serialize_map(Some(obj.len()))?;

                for (k, v) in obj {
                    map.serialize_entry(k, v)?;
                }

                map.end()
            }
            GraphValue::Null => serializer.serialize_none(),
        }
    }
}

impl TryFrom<serde_json::Value> for GraphValue {
    type Error = ConversionFailure;

    fn try_from(v: serde_json::Value) -> GraphValueResult<Self> {
        match v {
            serde_json::Value::String(s) => Ok(GraphValue::String(s)),
            serde_json::Value::Array(v) => {
                let vals: GraphValueResult<Vec<GraphValue>> = v.into_iter().map(GraphValue::try_from).collect();
                Ok(GraphValue::List(vals?))
            }
            serde_json::Value::Null => Ok(GraphValue::Null),
            serde_json::Value::Bool(b) => Ok(GraphValue::Boolean(b)),
            serde_json::Value::Number(num) => {
                if let Some(i) = num.as_i64() {
                    return Ok(GraphValue::Int(i));
                }

                num.as_f64()
                    .and_then(BigDecimal::from_f64)
                    .map(|dec| GraphValue::Float(dec.normalized()))
                    .ok_or_else(|| ConversionFailure::new("JSON number", "GraphValue::Float"))
            }
            serde_json::Value::Object(obj) => {
                let pairs: GraphValueResult<GraphObject> = obj
                    .into_iter()
                    .map(|(k, v)| GraphValue::try_from(v).map(|v| (k, v)))
                    .collect();

                Ok(GraphValue::Object(pairs?))
            }
        }
    }
}

impl GraphValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            GraphValue::String(s) | GraphValue::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            GraphValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            GraphValue::Int(i) => Some(*i),
            GraphValue::Float(f) => f.to_i64().filter(|i| BigDecimal::from(*i) == *f),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[GraphValue]> {
        match self {
            GraphValue::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&[(String, GraphValue)]> {
        match self {
            GraphValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, GraphValue::Null)
    }

    /// Looks up a key of an object value. Returns `None` for non-objects and missing keys.
    pub fn get(&self, key: &str) -> Option<&GraphValue> {
        self.as_object()?.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Follows a path of object keys, e.g. `["user", "id"]`.
    pub fn get_path<'a, I>(&self, path: I) -> Option<&GraphValue>
    where
        I: IntoIterator<Item = &'a str>,
    {
        path.into_iter().try_fold(self, |value, segment| value.get(segment))
    }

    pub fn new_float(float: f64) -> GraphValueResult<GraphValue> {
        BigDecimal::from_f64(float)
            .map(GraphValue::Float)
            .ok_or_else(|| ConversionFailure::new("f64", "GraphValue::Float"))
    }

    /// Compares two scalar values. Integers and floats compare numerically, strings
    /// lexicographically, date times chronologically. Anything else is unordered.
    pub fn compare(&self, other: &GraphValue) -> Option<Ordering> {
        match (self, other) {
            (GraphValue::Int(l), GraphValue::Int(r)) => Some(l.cmp(r)),
            (GraphValue::Float(l), GraphValue::Float(r)) => Some(l.cmp(r)),
            (GraphValue::Int(l), GraphValue::Float(r)) => Some(BigDecimal::from(*l).cmp(r)),
            (GraphValue::Float(l), GraphValue::Int(r)) => Some(l.cmp(&BigDecimal::from(*r))),
            (GraphValue::String(l), GraphValue::String(r)) => Some(l.cmp(r)),
            (GraphValue::Enum(l), GraphValue::Enum(r)) => Some(l.cmp(r)),
            (GraphValue::DateTime(l), GraphValue::DateTime(r)) => Some(l.cmp(r)),
            (GraphValue::DateTime(l), GraphValue::String(r)) => parse_datetime(r).ok().map(|r| l.cmp(&r)),
            (GraphValue::String(l), GraphValue::DateTime(r)) => parse_datetime(l).ok().map(|l| l.cmp(r)),
            (GraphValue::Boolean(l), GraphValue::Boolean(r)) => Some(l.cmp(r)),
            _ => None,
        }
    }

    /// Equality that ignores the representation differences `compare` ignores.
    pub fn loosely_equals(&self, other: &GraphValue) -> bool {
        match (self, other) {
            (GraphValue::Null, GraphValue::Null) => true,
            (GraphValue::List(l), GraphValue::List(r)) => {
                l.len() == r.len() && l.iter().zip(r).all(|(l, r)| l.loosely_equals(r))
            }
            (GraphValue::Object(l), GraphValue::Object(r)) => {
                l.len() == r.len()
                    && l.iter()
                        .all(|(k, v)| other.get(k).is_some_and(|rv| v.loosely_equals(rv)))
                    && r.iter().all(|(k, _)| self.get(k).is_some())
            }
            _ => self.compare(other) == Some(Ordering::Equal),
        }
    }
}

impl fmt::Display for GraphValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GraphValue::String(x) => x.fmt(f),
            GraphValue::Float(x) => x.fmt(f),
            GraphValue::Boolean(x) => x.fmt(f),
            GraphValue::DateTime(x) => stringify_datetime(x).fmt(f),
            GraphValue::Enum(x) => x.fmt(f),
            GraphValue::Int(x) => x.fmt(f),
            GraphValue::Null => "null".fmt(f),
            GraphValue::List(x) => {
                let joined = x.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
                write!(f, "[{joined}]")
            }
            GraphValue::Object(pairs) => {
                let joined = pairs
                    .iter()
                    .map(|(key, value)| format!(r#""{key}": {value}"#))
                    .collect::<Vec<_>>()
                    .join(", ");

                write!(f, "{{ {joined} }}")
            }
        }
    }
}

impl From<&str> for GraphValue {
    fn from(s: &str) -> Self {
        GraphValue::from(s.to_string())
    }
}

impl From<String> for GraphValue {
    fn from(s: String) -> Self {
        GraphValue::String(s)
    }
}

impl From<bool> for GraphValue {
    fn from(b: bool) -> Self {
        GraphValue::Boolean(b)
    }
}

impl From<i32> for GraphValue {
    fn from(i: i32) -> Self {
        GraphValue::Int(i64::from(i))
    }
}

impl From<i64> for GraphValue {
    fn from(i: i64) -> Self {
        GraphValue::Int(i)
    }
}

impl From<usize> for GraphValue {
    fn from(u: usize) -> Self {
        GraphValue::Int(u as i64)
    }
}

impl From<DateTime<FixedOffset>> for GraphValue {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        GraphValue::DateTime(dt)
    }
}

impl From<GraphListValue> for GraphValue {
    fn from(s: GraphListValue) -> Self {
        GraphValue::List(s)
    }
}

impl From<GraphObject> for GraphValue {
    fn from(obj: GraphObject) -> Self {
        GraphValue::Object(obj)
    }
}

impl<T> From<Option<T>> for GraphValue
where
    T: Into<GraphValue>,
{
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(GraphValue::Null)
    }
}

impl TryFrom<GraphValue> for i64 {
    type Error = ConversionFailure;

    fn try_from(value: GraphValue) -> GraphValueResult<i64> {
        value.as_i64().ok_or_else(|| ConversionFailure::new("GraphValue", "i64"))
    }
}

impl TryFrom<GraphValue> for String {
    type Error = ConversionFailure;

    fn try_from(pv: GraphValue) -> GraphValueResult<String> {
        match pv {
            GraphValue::String(s) | GraphValue::Enum(s) => Ok(s),
            _ => Err(ConversionFailure::new("GraphValue", "String")),
        }
    }
}

impl FromStr for GraphValue {
    type Err = ConversionFailure;

    /// Parses JSON text into a value.
    fn from_str(s: &str) -> GraphValueResult<Self> {
        let json: serde_json::Value =
            serde_json::from_str(s).map_err(|_| ConversionFailure::new("JSON text", "GraphValue"))?;

        GraphValue::try_from(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn json_objects_keep_key_order() {
        let value = GraphValue::try_from(json!({ "title": "X", "year": 1999, "tags": ["a"] })).unwrap();

        assert_eq!(
            value,
            GraphValue::Object(vec![
                ("title".into(), "X".into()),
                ("year".into(), GraphValue::Int(1999)),
                ("tags".into(), GraphValue::List(vec!["a".into()])),
            ])
        );
    }

    #[test]
    fn fractional_numbers_become_floats() {
        let value = GraphValue::try_from(json!(1.5)).unwrap();

        assert_eq!(value, GraphValue::new_float(1.5).unwrap());
        assert_eq!(serde_json::to_value(&value).unwrap(), json!(1.5));
    }

    #[test]
    fn integers_and_floats_compare_numerically() {
        let int = GraphValue::Int(2);
        let float = GraphValue::new_float(2.5).unwrap();

        assert_eq!(int.compare(&float), Some(Ordering::Less));
        assert_eq!(float.compare(&int), Some(Ordering::Greater));
        assert_eq!(int.compare(&GraphValue::from("2")), None);
    }

    #[test]
    fn get_path_walks_nested_objects() {
        let value: GraphValue = r#"{ "user": { "id": "u1" } }"#.parse().unwrap();

        assert_eq!(value.get_path(["user", "id"]), Some(&GraphValue::from("u1")));
        assert_eq!(value.get_path(["user", "name"]), None);
    }

    #[test]
    fn loose_equality_ignores_object_key_order() {
        let left: GraphValue = r#"{ "a": 1, "b": 2 }"#.parse().unwrap();
        let right: GraphValue = r#"{ "b": 2, "a": 1 }"#.parse().unwrap();

        assert!(left.loosely_equals(&right));
        assert!(!left.loosely_equals(&GraphValue::Null));
    }
}
