//! Resolved content values.
//!
//! [`Value`] is what node evaluation produces: the literal text of a Node,
//! rows returned by a bound query, or the assembled values of linked child
//! Nodes. Templates consume it as context and the HTTP layer serializes it.
//!
//! SQL results always arrive as sequences of rows even when a single scalar
//! or a single row is meant. [`short_circuit`] collapses those shapes back to
//! what a template or JSON consumer expects.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A resolved node value.
///
/// Mappings keep insertion order so that rendered JSON follows the order of
/// query columns and links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
}

/// How a linked value was combined with a Node's existing value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMerge {
    /// There was no existing value; the linked value was adopted.
    Adopted,
    /// The existing value was a sequence and was extended.
    Extended,
    /// The existing value was not a sequence and was overwritten.
    ReplacedScalar,
}

impl Value {
    /// Builds a single-entry mapping `{name: value}`.
    pub fn entry(name: impl Into<String>, value: Value) -> Value {
        let mut map = IndexMap::with_capacity(1);
        map.insert(name.into(), value);
        Value::Map(map)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for text, numbers and booleans.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Bool(_) | Value::Integer(_) | Value::Float(_) | Value::Text(_)
        )
    }

    /// True when the value carries no content: null, empty text, an empty
    /// mapping, or a sequence made only of empty values (`[[{}]]`).
    ///
    /// A non-empty mapping is never empty, even if every entry is null; its
    /// keys are content.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            Value::Bool(_) | Value::Integer(_) | Value::Float(_) => false,
            Value::List(items) => items.iter().all(Value::is_empty),
            Value::Map(map) => map.is_empty(),
        }
    }

    /// Returns a human-readable description of the value's shape.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Integer(_) => "Integer",
            Value::Float(_) => "Float",
            Value::Text(_) => "Text",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Converts to a `serde_json::Value`. Non-finite floats become null.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Folds the value produced by a Node's links into the Node's own value.
    ///
    /// - no existing value: the linked value is adopted
    /// - existing sequence: extended with the linked items
    /// - anything else: overwritten by the linked value
    pub fn absorb(self, linked: Value) -> (Value, LinkMerge) {
        match self {
            Value::Null => (linked, LinkMerge::Adopted),
            Value::List(mut items) => {
                match linked {
                    Value::List(more) => items.extend(more),
                    other => items.push(other),
                }
                (Value::List(items), LinkMerge::Extended)
            }
            _ => (linked, LinkMerge::ReplacedScalar),
        }
    }
}

/// Collapses singleton sequences and sequences of distinct single-key
/// mappings.
///
/// - `[X]` becomes `short_circuit(X)`
/// - `[{a: 1}, {b: 2}]` becomes `{a: 1, b: 2}`
/// - `[{a: 1}, {a: 2}]`, `[]` and every non-sequence are returned unchanged
pub fn short_circuit(value: Value) -> Value {
    let Value::List(mut items) = value else {
        return value;
    };
    if items.len() == 1 {
        return short_circuit(items.swap_remove(0));
    }
    if items.len() > 1 && has_distinct_single_keys(&items) {
        let mut merged = IndexMap::with_capacity(items.len());
        for item in items {
            if let Value::Map(map) = item {
                merged.extend(map);
            }
        }
        return Value::Map(merged);
    }
    Value::List(items)
}

fn has_distinct_single_keys(items: &[Value]) -> bool {
    let mut seen = std::collections::HashSet::with_capacity(items.len());
    items.iter().all(|item| match item {
        Value::Map(map) if map.len() == 1 => map.keys().all(|k| seen.insert(k.as_str())),
        _ => false,
    })
}

impl fmt::Display for Value {
    /// Scalars print raw; sequences and mappings print as JSON.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
            Value::List(_) | Value::Map(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}
