// src/core/type_mappings.rs

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::path::{self, PathInfo};
use crate::types::Value;

/// Converts values to and from their stored shape on a per-path basis.
///
/// References call `serialize` before a value leaves for the backend and
/// `deserialize` on everything read back, including event values and
/// transaction inputs.
pub trait TypeMappings: Send + Sync {
    fn serialize(&self, path: &str, value: Value) -> Result<Value>;
    fn deserialize(&self, path: &str, value: Value) -> Result<Value>;
}

/// Identity mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTypeMappings;

impl TypeMappings for NoTypeMappings {
    fn serialize(&self, _path: &str, value: Value) -> Result<Value> {
        Ok(value)
    }

    fn deserialize(&self, _path: &str, value: Value) -> Result<Value> {
        Ok(value)
    }
}

/// Conversion applied to every node matching a bound path pattern.
pub trait TypeCodec: Send + Sync {
    fn serialize(&self, value: Value) -> Result<Value>;
    fn deserialize(&self, value: Value) -> Result<Value>;
}

/// Path-pattern based [`TypeMappings`].
///
/// Patterns use the usual wildcards (`*`, `[*]`, `$name`). Serialization is
/// applied top-down, deserialization bottom-up, so a codec always sees its
/// children in the shape it produced.
#[derive(Default, Clone)]
pub struct TypeMappingRegistry {
    bindings: Vec<(PathInfo, Arc<dyn TypeCodec>)>,
}

impl TypeMappingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, pattern: &str, codec: impl TypeCodec + 'static) -> Self {
        self.bindings.push((PathInfo::new(pattern), Arc::new(codec)));
        self
    }

    fn codec_for(&self, at: &PathInfo) -> Option<&Arc<dyn TypeCodec>> {
        self.bindings
            .iter()
            .find(|(pattern, _)| pattern.matches_pattern(at))
            .map(|(_, codec)| codec)
    }

    fn serialize_at(&self, at: &str, value: Value) -> Result<Value> {
        let value = match self.codec_for(&PathInfo::new(at)) {
            Some(codec) => codec.serialize(value)?,
            None => value,
        };
        self.map_children(at, value, Self::serialize_at)
    }

    fn deserialize_at(&self, at: &str, value: Value) -> Result<Value> {
        let value = self.map_children(at, value, Self::deserialize_at)?;
        match self.codec_for(&PathInfo::new(at)) {
            Some(codec) => codec.deserialize(value),
            None => Ok(value),
        }
    }

    fn map_children(
        &self,
        at: &str,
        value: Value,
        f: fn(&Self, &str, Value) -> Result<Value>,
    ) -> Result<Value> {
        match value {
            Value::Object(map) => map
                .into_iter()
                .map(|(key, child)| {
                    let child_path = path::child_key(at, &path::PathKey::Name(key.clone()));
                    Ok((key, f(self, &child_path, child)?))
                })
                .collect::<Result<_>>()
                .map(Value::Object),
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(index, child)| f(self, &path::child_key(at, &index.into()), child))
                .collect::<Result<_>>()
                .map(Value::Array),
            other => Ok(other),
        }
    }
}

impl TypeMappings for TypeMappingRegistry {
    fn serialize(&self, path: &str, value: Value) -> Result<Value> {
        if self.bindings.is_empty() {
            return Ok(value);
        }
        self.serialize_at(path, value)
    }

    fn deserialize(&self, path: &str, value: Value) -> Result<Value> {
        if self.bindings.is_empty() {
            return Ok(value);
        }
        self.deserialize_at(path, value)
    }
}

impl fmt::Debug for TypeMappingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.bindings.iter().map(|(pattern, _)| pattern.path()))
            .finish()
    }
}
