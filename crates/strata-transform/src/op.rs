//! Declarative field operations
//!
//! Provides [`FieldOp`], a path-targeted wrapper over the primitives, and
//! [`Pipeline`], which applies a sequence of operations atomically: the
//! input attributes are only replaced if every operation succeeds.

use std::fmt::{self, Debug, Display, Formatter};

use indexmap::IndexMap;
use strata_record::{AttrPath, Attributes, Value};

use crate::attrs;
use crate::block;
use crate::collection;
use crate::error::TransformError;
use crate::map;

/// Non-fatal observation made while transforming
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformNote {
    /// Attribute the note refers to
    pub path: AttrPath,
    /// Human-readable message
    pub message: String,
}

impl TransformNote {
    /// Create note
    #[inline]
    #[must_use]
    pub fn new(path: AttrPath, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
        }
    }
}

impl Display for TransformNote {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Transformation applied to an attribute tree
pub trait FieldTransform: Send + Sync + Debug {
    /// Apply in place, returning any notes
    ///
    /// # Errors
    /// Returns error if the transformation cannot be applied. The attributes
    /// may be partially modified; use [`Pipeline`] for atomic application.
    fn apply(&self, attributes: &mut Attributes) -> Result<Vec<TransformNote>, TransformError>;

    /// Describe the transformation
    fn describe(&self) -> String;
}

/// Path-targeted field operation
///
/// The path's last segment names the attribute; earlier segments walk
/// nested objects, with `*` visiting every element of a collection.
/// Absent or null intermediate values are skipped.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    /// Set → list
    SetToList(AttrPath),
    /// List → set (collapses duplicates with a note)
    ListToSet(AttrPath),
    /// Singleton block → object or null
    UnwrapSingleton(AttrPath),
    /// Map of scalars → map of single-field objects
    WrapValues {
        /// Target map
        path: AttrPath,
        /// Field wrapping each value
        field: String,
    },
    /// Rename attribute, keeping its value
    Rename {
        /// Old attribute
        path: AttrPath,
        /// New name in the same block
        to: String,
    },
    /// Write old default when unset
    ReconcileDefault {
        /// Target attribute
        path: AttrPath,
        /// Old schema default
        default: Value,
    },
    /// Remove attribute
    Drop(AttrPath),
    /// List of objects → map of one field
    RekeyField {
        /// Target collection
        path: AttrPath,
        /// Field supplying the key
        key_field: String,
        /// Field supplying the value
        value_field: String,
    },
    /// List of objects → map of objects
    RekeyObjects {
        /// Target collection
        path: AttrPath,
        /// Field supplying the key
        key_field: String,
    },
}

impl FieldOp {
    /// `SetToList` on a dotted path
    #[inline]
    #[must_use]
    pub fn set_to_list(path: &str) -> Self {
        Self::SetToList(AttrPath::dotted(path))
    }

    /// `ListToSet` on a dotted path
    #[inline]
    #[must_use]
    pub fn list_to_set(path: &str) -> Self {
        Self::ListToSet(AttrPath::dotted(path))
    }

    /// `UnwrapSingleton` on a dotted path
    #[inline]
    #[must_use]
    pub fn unwrap_singleton(path: &str) -> Self {
        Self::UnwrapSingleton(AttrPath::dotted(path))
    }

    /// `WrapValues` on a dotted path
    #[inline]
    #[must_use]
    pub fn wrap_values(path: &str, field: &str) -> Self {
        Self::WrapValues {
            path: AttrPath::dotted(path),
            field: field.to_string(),
        }
    }

    /// `Rename` on a dotted path
    #[inline]
    #[must_use]
    pub fn rename(path: &str, to: &str) -> Self {
        Self::Rename {
            path: AttrPath::dotted(path),
            to: to.to_string(),
        }
    }

    /// `ReconcileDefault` on a dotted path
    #[inline]
    #[must_use]
    pub fn reconcile_default(path: &str, default: impl Into<Value>) -> Self {
        Self::ReconcileDefault {
            path: AttrPath::dotted(path),
            default: default.into(),
        }
    }

    /// `Drop` on a dotted path
    #[inline]
    #[must_use]
    pub fn drop(path: &str) -> Self {
        Self::Drop(AttrPath::dotted(path))
    }

    /// `RekeyField` on a dotted path
    #[inline]
    #[must_use]
    pub fn rekey_field(path: &str, key_field: &str, value_field: &str) -> Self {
        Self::RekeyField {
            path: AttrPath::dotted(path),
            key_field: key_field.to_string(),
            value_field: value_field.to_string(),
        }
    }

    /// `RekeyObjects` on a dotted path
    #[inline]
    #[must_use]
    pub fn rekey_objects(path: &str, key_field: &str) -> Self {
        Self::RekeyObjects {
            path: AttrPath::dotted(path),
            key_field: key_field.to_string(),
        }
    }

    /// Target path
    #[must_use]
    pub fn path(&self) -> &AttrPath {
        match self {
            Self::SetToList(path)
            | Self::ListToSet(path)
            | Self::UnwrapSingleton(path)
            | Self::Drop(path)
            | Self::WrapValues { path, .. }
            | Self::Rename { path, .. }
            | Self::ReconcileDefault { path, .. }
            | Self::RekeyField { path, .. }
            | Self::RekeyObjects { path, .. } => path,
        }
    }

    fn apply_leaf(
        &self,
        container: &mut Attributes,
        name: &str,
        at: &AttrPath,
        notes: &mut Vec<TransformNote>,
    ) -> Result<(), TransformError> {
        let here = at.child(name);
        match self {
            Self::Rename { to, .. } => {
                return attrs::rename(container, name, to).map_err(|e| e.within(at));
            }
            Self::ReconcileDefault { default, .. } => {
                if attrs::reconcile_default(container, name, default) {
                    notes.push(TransformNote::new(here, "unset; old default written explicitly"));
                }
                return Ok(());
            }
            Self::Drop(_) => {
                container.shift_remove(name);
                return Ok(());
            }
            _ => {}
        }

        let Some(slot) = container.get_mut(name) else {
            return Ok(());
        };
        let value = std::mem::take(slot);
        let converted = match self {
            Self::SetToList(_) => collection::set_to_list(value),
            Self::ListToSet(_) => collection::list_to_set(value).map(|c| {
                if c.collapsed > 0 {
                    notes.push(TransformNote::new(
                        here.clone(),
                        format!("{} duplicate element(s) collapsed", c.collapsed),
                    ));
                }
                c.value
            }),
            Self::UnwrapSingleton(_) => block::unwrap_singleton(value),
            Self::WrapValues { field, .. } => map::wrap_values(value, field),
            Self::RekeyField {
                key_field,
                value_field,
                ..
            } => map::rekey_field(value, key_field, value_field),
            Self::RekeyObjects { key_field, .. } => map::rekey_objects(value, key_field),
            Self::Rename { .. } | Self::ReconcileDefault { .. } | Self::Drop(_) => Ok(value),
        };
        *slot = converted.map_err(|e| e.within(&here))?;
        Ok(())
    }
}

impl FieldTransform for FieldOp {
    fn apply(&self, attributes: &mut Attributes) -> Result<Vec<TransformNote>, TransformError> {
        let mut notes = Vec::new();
        let Some((parents, leaf)) = self.path().split_leaf() else {
            return Ok(notes);
        };
        visit_block(attributes, parents, &AttrPath::root(), &mut |container, at| {
            if leaf == AttrPath::WILDCARD {
                let names: Vec<String> = container.keys().cloned().collect();
                for name in names {
                    self.apply_leaf(container, &name, at, &mut notes)?;
                }
                Ok(())
            } else {
                self.apply_leaf(container, leaf, at, &mut notes)
            }
        })?;
        Ok(notes)
    }

    fn describe(&self) -> String {
        match self {
            Self::SetToList(path) => format!("set_to_list({path})"),
            Self::ListToSet(path) => format!("list_to_set({path})"),
            Self::UnwrapSingleton(path) => format!("unwrap_singleton({path})"),
            Self::WrapValues { path, field } => format!("wrap_values({path}, {field})"),
            Self::Rename { path, to } => format!("rename({path} -> {to})"),
            Self::ReconcileDefault { path, .. } => format!("reconcile_default({path})"),
            Self::Drop(path) => format!("drop({path})"),
            Self::RekeyField {
                path,
                key_field,
                value_field,
            } => format!("rekey_field({path}, {key_field} -> {value_field})"),
            Self::RekeyObjects { path, key_field } => format!("rekey_objects({path}, {key_field})"),
        }
    }
}

type BlockVisitor<'v> =
    dyn FnMut(&mut IndexMap<String, Value>, &AttrPath) -> Result<(), TransformError> + 'v;

fn visit_block(
    entries: &mut IndexMap<String, Value>,
    segments: &[String],
    at: &AttrPath,
    f: &mut BlockVisitor<'_>,
) -> Result<(), TransformError> {
    let Some((head, rest)) = segments.split_first() else {
        return f(entries, at);
    };
    if head == AttrPath::WILDCARD {
        for (key, value) in entries.iter_mut() {
            visit_value(value, rest, &at.child(key.as_str()), f)?;
        }
        return Ok(());
    }
    match entries.get_mut(head.as_str()) {
        Some(value) => visit_value(value, rest, &at.child(head.as_str()), f),
        None => Ok(()),
    }
}

fn visit_value(
    value: &mut Value,
    segments: &[String],
    at: &AttrPath,
    f: &mut BlockVisitor<'_>,
) -> Result<(), TransformError> {
    let shape = value.shape();
    match value {
        Value::Null | Value::Unknown => Ok(()),
        Value::Map(entries) | Value::Object(entries) => visit_block(entries, segments, at, f),
        Value::List(items) | Value::Set(items) => {
            let Some((head, rest)) = segments.split_first() else {
                return Err(TransformError::shape("object", shape).within(at));
            };
            if head == AttrPath::WILDCARD {
                for (i, item) in items.iter_mut().enumerate() {
                    visit_value(item, rest, &at.index(i), f)?;
                }
                return Ok(());
            }
            match head.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                Some(item) => visit_value(item, rest, &at.child(head.as_str()), f),
                None => Ok(()),
            }
        }
        _ => Err(TransformError::shape("object", shape).within(at)),
    }
}

/// Ordered, atomic sequence of field transforms
#[derive(Debug, Default)]
pub struct Pipeline {
    ops: Vec<Box<dyn FieldTransform>>,
}

impl Pipeline {
    /// Create empty pipeline
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transform
    #[inline]
    #[must_use]
    pub fn then(mut self, op: impl FieldTransform + 'static) -> Self {
        self.ops.push(Box::new(op));
        self
    }

    /// Append a transform in place
    #[inline]
    pub fn push(&mut self, op: impl FieldTransform + 'static) {
        self.ops.push(Box::new(op));
    }

    /// Number of transforms
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Check if pipeline is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Describe every transform in order
    #[must_use]
    pub fn describe(&self) -> Vec<String> {
        self.ops.iter().map(|op| op.describe()).collect()
    }

    /// Apply to a working copy, replacing `attributes` only on success
    ///
    /// # Errors
    /// Returns the first failing transform's error; `attributes` is untouched
    pub fn apply(&self, attributes: &mut Attributes) -> Result<Vec<TransformNote>, TransformError> {
        let mut working = attributes.clone();
        let mut notes = Vec::new();
        for op in &self.ops {
            notes.extend(op.apply(&mut working)?);
        }
        *attributes = working;
        Ok(notes)
    }
}
