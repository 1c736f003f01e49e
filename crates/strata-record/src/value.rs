//! Attribute value tree
//!
//! Provides [`Value`], the representation every record attribute is stored
//! as: typed scalars, the four collection kinds and nested objects, plus the
//! two out-of-band markers `null` and `unknown`.

use std::fmt::{self, Display, Formatter};

use indexmap::IndexMap;
use serde_json::{Number, Value as JsonValue};

use crate::fingerprint::Fingerprint;
use crate::path::AttrPath;
use crate::record::RecordError;

/// Ordered attribute map (name → value)
pub type Attributes = IndexMap<String, Value>;

/// A single attribute value
///
/// # Invariants
/// - `Set` never holds two elements with the same [`Fingerprint`]
/// - `Set` keeps first-seen insertion order so conversions are deterministic
/// - `Map` values are homogeneous; `Object` fields follow a block schema
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Explicitly absent
    #[default]
    Null,

    /// Not yet determined (planned value)
    Unknown,

    /// Boolean scalar
    Bool(bool),

    /// Numeric scalar
    Number(Number),

    /// String scalar
    String(String),

    /// Ordered collection
    List(Vec<Value>),

    /// Unordered collection without duplicates
    Set(Vec<Value>),

    /// String-keyed homogeneous collection
    Map(IndexMap<String, Value>),

    /// Nested block with named fields
    Object(IndexMap<String, Value>),
}

/// Structural shape of a value, used in diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// `null`
    Null,
    /// `unknown`
    Unknown,
    /// boolean
    Bool,
    /// number
    Number,
    /// string
    String,
    /// list
    List,
    /// set
    Set,
    /// map
    Map,
    /// object
    Object,
}

impl Display for Shape {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Unknown => "unknown",
            Self::Bool => "bool",
            Self::Number => "number",
            Self::String => "string",
            Self::List => "list",
            Self::Set => "set",
            Self::Map => "map",
            Self::Object => "object",
        };
        f.write_str(name)
    }
}

impl Value {
    /// Build a set, dropping elements whose content was already seen
    #[must_use]
    pub fn set_from(items: impl IntoIterator<Item = Value>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let items = items
            .into_iter()
            .filter(|item| seen.insert(Fingerprint::of(item)))
            .collect();
        Self::Set(items)
    }

    /// Build a list
    #[inline]
    #[must_use]
    pub fn list_from(items: impl IntoIterator<Item = Value>) -> Self {
        Self::List(items.into_iter().collect())
    }

    /// Build an object from `(field, value)` pairs
    #[must_use]
    pub fn object_from<K: Into<String>>(fields: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::Object(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build a map from `(key, value)` pairs
    #[must_use]
    pub fn map_from<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Structural shape
    #[inline]
    #[must_use]
    pub fn shape(&self) -> Shape {
        match self {
            Self::Null => Shape::Null,
            Self::Unknown => Shape::Unknown,
            Self::Bool(_) => Shape::Bool,
            Self::Number(_) => Shape::Number,
            Self::String(_) => Shape::String,
            Self::List(_) => Shape::List,
            Self::Set(_) => Shape::Set,
            Self::Map(_) => Shape::Map,
            Self::Object(_) => Shape::Object,
        }
    }

    /// Check for the `null` marker
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Check for the `unknown` marker
    #[inline]
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Check if value is a bool, number or string
    #[inline]
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Bool(_) | Self::Number(_) | Self::String(_))
    }

    /// Check if any nested value is `unknown`
    #[must_use]
    pub fn contains_unknown(&self) -> bool {
        match self {
            Self::Unknown => true,
            Self::List(items) | Self::Set(items) => items.iter().any(Self::contains_unknown),
            Self::Map(entries) | Self::Object(entries) => {
                entries.values().any(Self::contains_unknown)
            }
            _ => false,
        }
    }

    /// String content, if this is a string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean content, if this is a bool
    #[inline]
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric content, if this is a number
    #[inline]
    #[must_use]
    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Self::Number(n) => Some(n),
            _ => None,
        }
    }

    /// Elements of a list or set
    #[inline]
    #[must_use]
    pub fn as_items(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) | Self::Set(items) => Some(items),
            _ => None,
        }
    }

    /// Entries of a map or object
    #[inline]
    #[must_use]
    pub fn as_entries(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Self::Map(entries) | Self::Object(entries) => Some(entries),
            _ => None,
        }
    }

    /// Mutable entries of a map or object
    #[inline]
    pub fn as_entries_mut(&mut self) -> Option<&mut IndexMap<String, Value>> {
        match self {
            Self::Map(entries) | Self::Object(entries) => Some(entries),
            _ => None,
        }
    }

    /// Field or key lookup on a map or object
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_entries().and_then(|entries| entries.get(key))
    }

    /// Untyped conversion from JSON
    ///
    /// Arrays become lists and objects become objects; collection kinds are
    /// refined later by decoding against a schema.
    #[must_use]
    pub fn from_json(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::Number(n) => Self::Number(n),
            JsonValue::String(s) => Self::String(s),
            JsonValue::Array(items) => Self::List(items.into_iter().map(Self::from_json).collect()),
            JsonValue::Object(map) => Self::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert to JSON for persistence
    ///
    /// # Errors
    /// Returns error if any nested value is `unknown`
    pub fn to_json(&self) -> Result<JsonValue, RecordError> {
        self.to_json_at(&AttrPath::root())
    }

    pub(crate) fn to_json_at(&self, path: &AttrPath) -> Result<JsonValue, RecordError> {
        Ok(match self {
            Self::Null => JsonValue::Null,
            Self::Unknown => {
                return Err(RecordError::UnknownNotPersistable { path: path.clone() })
            }
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Number(n) => JsonValue::Number(n.clone()),
            Self::String(s) => JsonValue::String(s.clone()),
            Self::List(items) | Self::Set(items) => JsonValue::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| item.to_json_at(&path.index(i)))
                    .collect::<Result<_, _>>()?,
            ),
            Self::Map(entries) | Self::Object(entries) => {
                let mut map = serde_json::Map::with_capacity(entries.len());
                for (key, item) in entries {
                    map.insert(key.clone(), item.to_json_at(&path.child(key.as_str()))?);
                }
                JsonValue::Object(map)
            }
        })
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Self::Number(n.into())
    }
}

impl From<f64> for Value {
    /// Non-finite floats have no JSON representation and become `null`
    fn from(n: f64) -> Self {
        Number::from_f64(n).map_or(Self::Null, Self::Number)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl From<JsonValue> for Value {
    fn from(json: JsonValue) -> Self {
        Self::from_json(json)
    }
}
