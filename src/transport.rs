//! Transport codec.
//!
//! Rich values cross the backend boundary as an [`Envelope`]: a plain JSON
//! tree in `val` plus a `map` of type tags naming the locations inside `val`
//! that must be reverse-transformed. Timestamps travel as RFC 3339 strings
//! with millisecond precision, binary blobs as standard base64 text and path
//! links as their path string.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use strum::{Display, EnumString};

use crate::error::{ArborError, Result};
use crate::path::{self, PathKey};
use crate::types::{PathReference, Value};

/// Name of the field a leaf value is wrapped in while it passes through the
/// composite walk.
const WRAPPER_KEY: &str = "value";

/// Tag naming how a plain leaf is turned back into a rich value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    Date,
    Binary,
    Reference,
}

/// Type metadata of an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeMap {
    /// `val` itself is the one tagged leaf
    Single(TypeTag),
    /// Relative path inside `val` -> tag. Locations never nest.
    Paths(BTreeMap<String, TypeTag>),
}

/// A value in transport form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub val: Json,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<TypeMap>,
}

impl Envelope {
    /// An envelope around an already plain tree.
    pub fn plain(val: Json) -> Self {
        Self { val, map: None }
    }

    /// The envelope of an absent value.
    pub fn null() -> Self {
        Self::plain(Json::Null)
    }

    pub fn is_null(&self) -> bool {
        self.val.is_null()
    }
}

/// Converts a rich value into transport form. The input is left untouched.
///
/// Object keys must satisfy [`path::is_valid_key`]; tag locations are written
/// as paths, so a key holding path syntax would point at the wrong slot.
/// [`Value::check_keys`] verifies this.
pub fn serialize(value: &Value) -> Envelope {
    if value.is_composite() {
        return serialize_composite(value);
    }

    // Leaves go through the composite walk wrapped in a single field; that
    // field's tag, if any, becomes the envelope's top-level tag.
    let wrapped = Value::Object(BTreeMap::from([(WRAPPER_KEY.to_string(), value.clone())]));
    let Envelope { val, map } = serialize_composite(&wrapped);
    let tag = match map {
        Some(TypeMap::Paths(mut tags)) => tags.remove(WRAPPER_KEY),
        _ => None,
    };
    let val = match val {
        Json::Object(mut fields) => fields.remove(WRAPPER_KEY).unwrap_or(Json::Null),
        other => other,
    };
    Envelope {
        val,
        map: tag.map(TypeMap::Single),
    }
}

fn serialize_composite(value: &Value) -> Envelope {
    let mut tags = BTreeMap::new();
    let val = to_plain(value, "", &mut tags);
    Envelope {
        val,
        map: if tags.is_empty() { None } else { Some(TypeMap::Paths(tags)) },
    }
}

fn to_plain(value: &Value, at: &str, tags: &mut BTreeMap<String, TypeTag>) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Number(n) => Json::Number(n.clone()),
        Value::String(s) => Json::String(s.clone()),
        Value::Date(at_time) => {
            tags.insert(at.to_string(), TypeTag::Date);
            Json::String(at_time.to_rfc3339_opts(SecondsFormat::Millis, true))
        }
        Value::Binary(bytes) => {
            tags.insert(at.to_string(), TypeTag::Binary);
            Json::String(STANDARD.encode(bytes))
        }
        Value::PathLink(link) => {
            tags.insert(at.to_string(), TypeTag::Reference);
            Json::String(link.path().to_string())
        }
        Value::Array(items) => Json::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| to_plain(item, &path::child_key(at, &PathKey::Index(i)), tags))
                .collect(),
        ),
        Value::Object(fields) => Json::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), to_plain(v, &path::child_key(at, &PathKey::Name(k.clone())), tags)))
                .collect(),
        ),
    }
}

/// Converts an envelope back into a rich value.
///
/// # Errors
///
/// Returns [`ArborError::Decode`] if a tagged location is missing or its
/// content is not valid for its tag.
pub fn deserialize(envelope: Envelope) -> Result<Value> {
    let Envelope { val, map } = envelope;
    let mut value = Value::from(val);
    match map {
        None => Ok(value),
        Some(TypeMap::Single(tag)) => decode(tag, value),
        Some(TypeMap::Paths(tags)) => {
            for (at, tag) in tags {
                let keys = path::split_to_keys(&at);
                let slot = value.get_in_mut(&keys).ok_or_else(|| {
                    ArborError::decode(format!("tagged path '{}' not present in value", at))
                })?;
                let raw = std::mem::take(slot);
                *slot = decode(tag, raw)?;
            }
            Ok(value)
        }
    }
}

fn decode(tag: TypeTag, raw: Value) -> Result<Value> {
    let text = match raw {
        Value::String(text) => text,
        other => {
            return Err(ArborError::decode(format!("{} tag on non-string value {:?}", tag, other)))
        }
    };
    Ok(match tag {
        TypeTag::Date => Value::Date(parse_timestamp(&text)?),
        TypeTag::Binary => Value::Binary(STANDARD.decode(text.as_bytes())?),
        TypeTag::Reference => Value::PathLink(PathReference::new(text)),
    })
}

/// Parses an RFC 3339 timestamp. Years outside 0000-9999 are written with
/// an explicit sign (`+10000-01-01T00:00:00.000Z`), which strict RFC 3339
/// rejects, so those go through chrono's relaxed parser.
fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(text) {
        Ok(at) => Ok(at.with_timezone(&Utc)),
        Err(_) if text.starts_with(['+', '-']) => Ok(text.parse::<DateTime<Utc>>()?),
        Err(err) => Err(err.into()),
    }
}
