//! Versioned records
//!
//! A [`Record`] is one managed object's persisted configuration: an ordered
//! attribute tree tagged with its resource kind and schema version.

use std::borrow::Borrow;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::fingerprint::Fingerprint;
use crate::path::AttrPath;
use crate::value::{Attributes, Value};

/// Resource kind identifier (`load_balancer`, `workers_script`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKind(String);

impl ResourceKind {
    /// Create kind identifier
    #[inline]
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    /// Identifier as string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceKind {
    fn from(kind: &str) -> Self {
        Self(kind.to_string())
    }
}

impl From<String> for ResourceKind {
    fn from(kind: String) -> Self {
        Self(kind)
    }
}

impl Borrow<str> for ResourceKind {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Schema version (non-negative, strictly increasing along a migration plan)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SchemaVersion(u64);

impl SchemaVersion {
    /// Create version
    #[inline]
    #[must_use]
    pub const fn new(version: u64) -> Self {
        Self(version)
    }

    /// Raw version number
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl Display for SchemaVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<u64> for SchemaVersion {
    fn from(version: u64) -> Self {
        Self(version)
    }
}

/// Explicit historical format marker supplied by the host
///
/// When present it overrides heuristic format detection for versions that
/// were reused by two encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatMarker {
    /// Older, structurally distinctive encoding
    Legacy,
    /// Newer encoding sharing the same version number
    Current,
}

/// Versioned attribute tree for one managed object
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    kind: ResourceKind,
    version: SchemaVersion,
    attributes: Attributes,
    format_marker: Option<FormatMarker>,
}

impl Record {
    /// Create record
    #[inline]
    #[must_use]
    pub fn new(kind: impl Into<ResourceKind>, version: u64, attributes: Attributes) -> Self {
        Self {
            kind: kind.into(),
            version: SchemaVersion::new(version),
            attributes,
            format_marker: None,
        }
    }

    /// Attach explicit format marker
    #[inline]
    #[must_use]
    pub fn with_format_marker(mut self, marker: FormatMarker) -> Self {
        self.format_marker = Some(marker);
        self
    }

    /// Re-tag with a different schema version; attributes are untouched
    #[inline]
    #[must_use]
    pub fn with_version(mut self, version: SchemaVersion) -> Self {
        self.version = version;
        self
    }

    /// Replace the attribute tree, keeping kind, version and marker
    #[inline]
    #[must_use]
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Drop the format marker (it only describes the pre-migration encoding)
    #[inline]
    #[must_use]
    pub fn without_format_marker(mut self) -> Self {
        self.format_marker = None;
        self
    }

    /// Resource kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    /// Schema version
    #[inline]
    #[must_use]
    pub fn version(&self) -> SchemaVersion {
        self.version
    }

    /// Explicit format marker, if supplied
    #[inline]
    #[must_use]
    pub fn format_marker(&self) -> Option<FormatMarker> {
        self.format_marker
    }

    /// Attribute tree
    #[inline]
    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Mutable attribute tree
    #[inline]
    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    /// Consume into attribute tree
    #[inline]
    #[must_use]
    pub fn into_attributes(self) -> Attributes {
        self.attributes
    }

    /// Top-level attribute lookup
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Content fingerprint of the attribute tree
    #[inline]
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of_attributes(&self.attributes)
    }

    /// Parse from a JSON envelope string
    ///
    /// # Errors
    /// Returns error if JSON is invalid or not an envelope
    pub fn from_json(json: &str) -> Result<Self, RecordError> {
        let envelope: RecordEnvelope = serde_json::from_str(json)?;
        Ok(envelope.into())
    }

    /// Encode as JSON envelope
    ///
    /// # Errors
    /// Returns error if any attribute is still `unknown`
    pub fn to_envelope(&self) -> Result<RecordEnvelope, RecordError> {
        RecordEnvelope::try_from(self)
    }
}

/// JSON wire shape of a record
///
/// ```json
/// { "kind": "load_balancer", "schema_version": 0, "attributes": { ... } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEnvelope {
    /// Resource kind
    pub kind: ResourceKind,

    /// Schema version the attributes were written under
    pub schema_version: SchemaVersion,

    /// Raw attribute tree
    #[serde(default)]
    pub attributes: serde_json::Map<String, JsonValue>,

    /// Optional explicit format marker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<FormatMarker>,
}

impl From<RecordEnvelope> for Record {
    fn from(envelope: RecordEnvelope) -> Self {
        let attributes = envelope
            .attributes
            .into_iter()
            .map(|(k, v)| (k, Value::from_json(v)))
            .collect();
        Self {
            kind: envelope.kind,
            version: envelope.schema_version,
            attributes,
            format_marker: envelope.format,
        }
    }
}

impl TryFrom<&Record> for RecordEnvelope {
    type Error = RecordError;

    fn try_from(record: &Record) -> Result<Self, Self::Error> {
        let mut attributes = serde_json::Map::with_capacity(record.attributes.len());
        for (name, value) in &record.attributes {
            attributes.insert(name.clone(), value.to_json_at(&AttrPath::single(name.as_str()))?);
        }
        Ok(Self {
            kind: record.kind.clone(),
            schema_version: record.version,
            attributes,
            format: record.format_marker,
        })
    }
}

/// Record encoding errors
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// `unknown` values exist only in plans and cannot be written to state
    #[error("unknown value at {path} cannot be persisted")]
    UnknownNotPersistable {
        /// Location of the unknown value
        path: AttrPath,
    },

    /// Envelope JSON is malformed
    #[error("invalid record JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}
