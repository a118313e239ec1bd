//! # Attribute Values
//!
//! Graphs, nodes and edges carry a string-keyed map of loosely typed
//! values. `AttrValue` is the closed set of shapes such a value may take.
//!
//! ## Number Coercion
//!
//! Numbers are normalized the same way on every path into the store
//! (JSON request bodies, snapshot files, SQL JSON columns):
//!
//! - an integer literal that fits in `i64` becomes [`AttrValue::Int`]
//! - every other number becomes [`AttrValue::Float`]
//!
//! The rule applies recursively inside lists and maps, so both engines
//! hand back identical values for identical input.

use super::StoreError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// String-keyed attribute map, ordered by key.
pub type Attrs = BTreeMap<String, AttrValue>;

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AttrValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<AttrValue>),
    Map(BTreeMap<String, AttrValue>),
}

impl AttrValue {
    /// Returns the string payload, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer payload, if this is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Converts this value into its JSON form.
    ///
    /// Non-finite floats have no JSON representation and become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(n) => Value::from(*n),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::String(s) => Value::String(s.clone()),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// False when a float anywhere in this value is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Float(f) => f.is_finite(),
            Self::List(items) => items.iter().all(Self::is_finite),
            Self::Map(map) => map.values().all(Self::is_finite),
            _ => true,
        }
    }
}

/// Rejects maps holding a NaN or infinite float with `EINVALID`.
///
/// Such values have no JSON form, so storing them would let the engines
/// disagree on what comes back.
pub fn check_attrs(attrs: &Attrs) -> Result<(), StoreError> {
    match attrs.iter().find(|(_, value)| !value.is_finite()) {
        Some((key, _)) => Err(StoreError::Invalid(format!(
            "attribute {} is not a finite number",
            key
        ))),
        None => Ok(()),
    }
}

impl From<serde_json::Value> for AttrValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for AttrValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for AttrValue {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<f64> for AttrValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl Serialize for AttrValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AttrValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from)
    }
}

// =============================================================================
// MAP HELPERS
// =============================================================================

/// Merges `update` into `target` key by key.
///
/// Keys absent from `update` are left untouched; the map is never
/// replaced wholesale.
pub fn merge_attrs(target: &mut Attrs, update: &Attrs) {
    for (key, value) in update {
        target.insert(key.clone(), value.clone());
    }
}

/// Encodes an attribute map as a JSON object string.
pub fn encode_attrs(attrs: &Attrs) -> Result<String, StoreError> {
    Ok(serde_json::to_string(attrs)?)
}

/// Decodes a JSON object string into an attribute map.
///
/// An empty string decodes to an empty map. Anything that is not a JSON
/// object is reported as `EINTERNAL`, since it can only come from a
/// corrupted stored representation.
pub fn decode_attrs(text: &str) -> Result<Attrs, StoreError> {
    if text.trim().is_empty() {
        return Ok(Attrs::new());
    }
    match serde_json::from_str::<serde_json::Value>(text)? {
        serde_json::Value::Object(map) => Ok(map
            .into_iter()
            .map(|(k, v)| (k, AttrValue::from(v)))
            .collect()),
        serde_json::Value::Null => Ok(Attrs::new()),
        other => Err(StoreError::Internal(format!(
            "attributes must be a JSON object, found {}",
            other
        ))),
    }
}

/// Builds an [`Attrs`] map from key/value pairs.
///
/// ```
/// use orbgraph_core::{attrs, AttrValue};
///
/// let a = attrs([("stars", AttrValue::Int(5)), ("lang", "rust".into())]);
/// assert_eq!(a.len(), 2);
/// ```
pub fn attrs<K, I>(pairs: I) -> Attrs
where
    K: Into<String>,
    I: IntoIterator<Item = (K, AttrValue)>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}
