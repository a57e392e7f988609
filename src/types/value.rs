//! The closed set of value kinds that can be stored at a path.
//!
//! Plain JSON kinds map one-to-one onto `serde_json`. Timestamps, binary blobs
//! and path links are the rich kinds that the transport codec tags so they
//! survive a trip through plain JSON.

use chrono::{DateTime, SubsecRound, Utc};
use std::collections::BTreeMap;

use crate::path::{self, PathKey};

/// Marks a string payload as a path to another node rather than literal text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathReference {
    path: String,
}

impl PathReference {
    /// Creates a link to `path`, normalized.
    pub fn new(path: impl AsRef<str>) -> Self {
        Self {
            path: path::normalize(path.as_ref()).to_string(),
        }
    }

    /// The linked path.
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// A node value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absence of a value. Writing `Null` deletes the node.
    #[default]
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    /// UTC timestamp, millisecond precision
    Date(DateTime<Utc>),
    Binary(Vec<u8>),
    PathLink(PathReference),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Creates a timestamp value. Sub-millisecond precision is dropped so the
    /// value survives transport unchanged.
    pub fn date(at: DateTime<Utc>) -> Self {
        Value::Date(at.trunc_subsecs(3))
    }

    /// Creates a binary value.
    pub fn binary(bytes: impl Into<Vec<u8>>) -> Self {
        Value::Binary(bytes.into())
    }

    /// Creates a path link value.
    pub fn path_link(path: impl AsRef<str>) -> Self {
        Value::PathLink(PathReference::new(path))
    }

    /// Creates an empty object.
    pub fn object() -> Self {
        Value::Object(BTreeMap::new())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this is a keyed structure (an object, not an array or a rich leaf).
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    /// Whether this value has children that a traversal descends into.
    pub fn is_composite(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Array(_))
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the direct child addressed by `key`, if present.
    pub fn get(&self, key: &PathKey) -> Option<&Value> {
        match (self, key) {
            (Value::Object(map), PathKey::Name(name)) => map.get(name),
            (Value::Array(items), PathKey::Index(index)) => items.get(*index),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, key: &PathKey) -> Option<&mut Value> {
        match (self, key) {
            (Value::Object(map), PathKey::Name(name)) => map.get_mut(name),
            (Value::Array(items), PathKey::Index(index)) => items.get_mut(*index),
            _ => None,
        }
    }

    /// Follows a key sequence down from this value.
    pub fn get_in(&self, keys: &[PathKey]) -> Option<&Value> {
        keys.iter().try_fold(self, |node, key| node.get(key))
    }

    pub fn get_in_mut(&mut self, keys: &[PathKey]) -> Option<&mut Value> {
        keys.iter().try_fold(self, |node, key| node.get_mut(key))
    }

    /// Rejects any object key below this value that would not read back as a
    /// single path key (see [`path::is_valid_key`]).
    pub fn check_keys(&self) -> crate::error::Result<()> {
        self.check_keys_at("")
    }

    fn check_keys_at(&self, at: &str) -> crate::error::Result<()> {
        match self {
            Value::Object(map) => map.iter().try_for_each(|(k, v)| {
                if !path::is_valid_key(k) {
                    return Err(crate::error::ArborError::validation(format!(
                        "invalid property name '{}' under '{}': keys must be non-empty and \
                         contain no '/', '[' or ']'",
                        k, at
                    )));
                }
                v.check_keys_at(&path::child_key(at, &PathKey::Name(k.clone())))
            }),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .try_for_each(|(i, v)| v.check_keys_at(&path::child_key(at, &PathKey::Index(i)))),
            _ => Ok(()),
        }
    }

    /// Direct children as `(key, value)` pairs, in key order for objects and
    /// index order for arrays. Leaves have no children.
    pub fn children(&self) -> Vec<(PathKey, &Value)> {
        match self {
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| (PathKey::Name(k.clone()), v))
                .collect(),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (PathKey::Index(i), v))
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n.into())
    }
}

impl From<f64> for Value {
    /// Non-finite numbers have no JSON representation and become `Null`.
    fn from(n: f64) -> Self {
        serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(at: DateTime<Utc>) -> Self {
        Value::date(at)
    }
}

impl From<PathReference> for Value {
    fn from(link: PathReference) -> Self {
        Value::PathLink(link)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Object(map)
    }
}
