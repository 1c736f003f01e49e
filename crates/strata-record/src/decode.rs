//! Strict decoding of records against schema descriptors
//!
//! Decoding checks every attribute's shape against its declaration and
//! refines untyped collections (as produced by JSON parsing) into the
//! declared collection kind. A strict decode doubles as a format
//! discriminator: it fails whenever the record's shape does not match.

use serde::{Deserialize, Serialize};

use crate::path::AttrPath;
use crate::record::{Record, ResourceKind};
use crate::schema::{AttrType, Block, SchemaDescriptor};
use crate::value::{Attributes, Shape, Value};

/// How undeclared attributes are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeMode {
    /// Undeclared attributes are an error
    #[default]
    Strict,
    /// Undeclared attributes are dropped and reported
    Lenient,
}

/// Result of decoding an attribute tree
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Decoded {
    /// Typed attribute tree
    pub attributes: Attributes,
    /// Undeclared attributes removed in lenient mode
    pub dropped: Vec<AttrPath>,
}

/// Decode errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    /// Value shape does not match the declared type
    #[error("{path}: expected {expected} found {found}")]
    ShapeMismatch {
        /// Offending attribute
        path: AttrPath,
        /// Declared type
        expected: String,
        /// Actual shape
        found: Shape,
    },

    /// Required attribute absent or null
    #[error("{path}: required attribute is missing")]
    MissingRequired {
        /// Missing attribute
        path: AttrPath,
    },

    /// Attribute not declared by the descriptor
    #[error("{path}: attribute is not declared")]
    UnexpectedAttribute {
        /// Undeclared attribute
        path: AttrPath,
    },

    /// Collection exceeds `max_items`
    #[error("{path}: at most {max} item(s) allowed, found {found}")]
    TooManyItems {
        /// Offending collection
        path: AttrPath,
        /// Declared limit
        max: usize,
        /// Actual size
        found: usize,
    },

    /// Set holds two elements with identical content
    #[error("{path}: duplicate set element")]
    DuplicateSetElement {
        /// Offending element
        path: AttrPath,
    },

    /// Record kind differs from the descriptor kind
    #[error("descriptor is for kind '{expected}', record is '{found}'")]
    KindMismatch {
        /// Descriptor kind
        expected: ResourceKind,
        /// Record kind
        found: ResourceKind,
    },
}

impl DecodeError {
    /// Attribute path the error points at, if any
    #[must_use]
    pub fn path(&self) -> Option<&AttrPath> {
        match self {
            Self::ShapeMismatch { path, .. }
            | Self::MissingRequired { path }
            | Self::UnexpectedAttribute { path }
            | Self::TooManyItems { path, .. }
            | Self::DuplicateSetElement { path } => Some(path),
            Self::KindMismatch { .. } => None,
        }
    }
}

/// Decode an attribute tree against a block
///
/// # Errors
/// Returns the first shape, presence or size violation found
pub fn decode_attributes(
    attributes: &Attributes,
    block: &Block,
    mode: DecodeMode,
) -> Result<Decoded, DecodeError> {
    let mut dropped = Vec::new();
    let attributes = decode_block(attributes, block, mode, &AttrPath::root(), &mut dropped)?;
    Ok(Decoded {
        attributes,
        dropped,
    })
}

impl Record {
    /// Decode this record against a descriptor of the same kind
    ///
    /// The version tag is not checked; callers pick the descriptor. The
    /// returned record keeps this record's kind, version and format marker.
    ///
    /// # Errors
    /// Returns error on kind mismatch or any shape violation
    pub fn decode(
        &self,
        descriptor: &SchemaDescriptor,
        mode: DecodeMode,
    ) -> Result<(Record, Vec<AttrPath>), DecodeError> {
        if self.kind() != descriptor.kind() {
            return Err(DecodeError::KindMismatch {
                expected: descriptor.kind().clone(),
                found: self.kind().clone(),
            });
        }
        let decoded = decode_attributes(self.attributes(), descriptor.block(), mode)?;
        Ok((self.clone().with_attributes(decoded.attributes), decoded.dropped))
    }
}

fn decode_block(
    attributes: &Attributes,
    block: &Block,
    mode: DecodeMode,
    at: &AttrPath,
    dropped: &mut Vec<AttrPath>,
) -> Result<Attributes, DecodeError> {
    for name in attributes.keys() {
        if !block.contains(name) {
            let path = at.child(name.as_str());
            match mode {
                DecodeMode::Strict => return Err(DecodeError::UnexpectedAttribute { path }),
                DecodeMode::Lenient => dropped.push(path),
            }
        }
    }

    let mut out = Attributes::with_capacity(attributes.len());
    for (name, attr) in block.iter() {
        let path = at.child(name);
        match attributes.get(name) {
            None | Some(Value::Null) if attr.is_required() => {
                return Err(DecodeError::MissingRequired { path });
            }
            None => {}
            Some(value) => {
                let value = decode_value(value, attr.ty(), mode, &path, dropped)?;
                let size = match &value {
                    Value::List(items) | Value::Set(items) => Some(items.len()),
                    Value::Map(entries) => Some(entries.len()),
                    _ => None,
                };
                if let (Some(max), Some(found)) = (attr.max_items(), size) {
                    if found > max {
                        return Err(DecodeError::TooManyItems { path, max, found });
                    }
                }
                out.insert(name.to_string(), value);
            }
        }
    }
    Ok(out)
}

fn decode_value(
    value: &Value,
    ty: &AttrType,
    mode: DecodeMode,
    path: &AttrPath,
    dropped: &mut Vec<AttrPath>,
) -> Result<Value, DecodeError> {
    let mismatch = || DecodeError::ShapeMismatch {
        path: path.clone(),
        expected: ty.to_string(),
        found: value.shape(),
    };

    match (ty, value) {
        (_, Value::Null | Value::Unknown) | (AttrType::Dynamic, _) => Ok(value.clone()),
        (AttrType::String, Value::String(_))
        | (AttrType::Number, Value::Number(_))
        | (AttrType::Bool, Value::Bool(_)) => Ok(value.clone()),
        (AttrType::List(element), Value::List(items) | Value::Set(items)) => {
            let items = decode_items(items, element, mode, path, dropped)?;
            Ok(Value::List(items))
        }
        (AttrType::Set(element), Value::List(items) | Value::Set(items)) => {
            let items = decode_items(items, element, mode, path, dropped)?;
            let mut seen = std::collections::HashSet::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                if !seen.insert(crate::Fingerprint::of(item)) {
                    return Err(DecodeError::DuplicateSetElement {
                        path: path.index(i),
                    });
                }
            }
            Ok(Value::Set(items))
        }
        (AttrType::Map(element), Value::Map(entries) | Value::Object(entries)) => {
            let mut out = indexmap::IndexMap::with_capacity(entries.len());
            for (key, item) in entries {
                let decoded = decode_value(item, element, mode, &path.child(key.as_str()), dropped)?;
                out.insert(key.clone(), decoded);
            }
            Ok(Value::Map(out))
        }
        (AttrType::Object(block), Value::Map(entries) | Value::Object(entries)) => {
            decode_block(entries, block, mode, path, dropped).map(Value::Object)
        }
        _ => Err(mismatch()),
    }
}

fn decode_items(
    items: &[Value],
    element: &AttrType,
    mode: DecodeMode,
    path: &AttrPath,
    dropped: &mut Vec<AttrPath>,
) -> Result<Vec<Value>, DecodeError> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| decode_value(item, element, mode, &path.index(i), dropped))
        .collect()
}
