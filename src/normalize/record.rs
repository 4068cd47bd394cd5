use chrono::{DateTime, Utc};
use serde_json::Number;
use std::collections::BTreeMap;

/// One article as produced by an [`ArticleSource`](crate::fetch::ArticleSource):
/// an arbitrary tree of scalars, maps and lists.
pub type RawRecord = RawValue;

/// Single-level article record. Keys are delimiter-joined paths or synthetic keys,
/// values are always strings.
pub type FlatRecord = BTreeMap<String, String>;

/// A node in a raw article tree.
///
/// Owned enum nodes cannot form reference cycles, so traversal needs no visited set.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Date(DateTime<Utc>),
    Map(BTreeMap<String, RawValue>),
    List(Vec<RawValue>),
}

impl RawValue {
    /// Whether this value counts as "no value" for coercion purposes:
    /// null, `false`, numeric zero or NaN, and the empty string.
    pub fn is_falsy(&self) -> bool {
        match self {
            RawValue::Null => true,
            RawValue::Bool(b) => !b,
            RawValue::Number(n) => n.as_f64().is_some_and(|f| f == 0.0 || f.is_nan()),
            RawValue::String(s) => s.is_empty(),
            RawValue::Date(_) | RawValue::Map(_) | RawValue::List(_) => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RawValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Looks up a top-level field of a map value.
    pub fn get(&self, key: &str) -> Option<&RawValue> {
        match self {
            RawValue::Map(map) => map.get(key),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for RawValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => RawValue::Null,
            serde_json::Value::Bool(b) => RawValue::Bool(b),
            serde_json::Value::Number(n) => RawValue::Number(n),
            serde_json::Value::String(s) => RawValue::String(s),
            serde_json::Value::Array(items) => {
                RawValue::List(items.into_iter().map(RawValue::from).collect())
            }
            serde_json::Value::Object(map) => RawValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, RawValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::String(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::String(value)
    }
}

impl From<DateTime<Utc>> for RawValue {
    fn from(value: DateTime<Utc>) -> Self {
        RawValue::Date(value)
    }
}

impl From<&FlatRecord> for RawValue {
    fn from(record: &FlatRecord) -> Self {
        RawValue::Map(
            record
                .iter()
                .map(|(k, v)| (k.clone(), RawValue::String(v.clone())))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_falsy_values() {
        assert!(RawValue::Null.is_falsy());
        assert!(RawValue::Bool(false).is_falsy());
        assert!(RawValue::from(json!(0)).is_falsy());
        assert!(RawValue::from(json!(0.0)).is_falsy());
        assert!(RawValue::from("").is_falsy());

        assert!(!RawValue::Bool(true).is_falsy());
        assert!(!RawValue::from(json!(7)).is_falsy());
        assert!(!RawValue::from(" ").is_falsy());
        assert!(!RawValue::Map(BTreeMap::new()).is_falsy());
        assert!(!RawValue::List(Vec::new()).is_falsy());
    }

    #[test]
    fn test_from_json_preserves_structure() {
        let value = RawValue::from(json!({"a": {"b": [1, "x"]}}));
        let inner = value.get("a").and_then(|a| a.get("b"));
        match inner {
            Some(RawValue::List(items)) => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[1].as_str(), Some("x"));
            }
            other => panic!("Expected list, got {:?}", other),
        }
    }
}
