//! Attribute paths for addressing within records
//!
//! Provides [`AttrPath`] for hierarchical addressing of attributes, nested
//! block fields and collection elements inside a record.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Path within a record's attribute tree
///
/// Segments are attribute names, map keys or element indices. The special
/// segment `*` matches every element of the collection at that level and is
/// only meaningful for path-targeted transforms.
///
/// # Examples
/// - `["origins", "0", "header"]` → `origins.0.header`
/// - `["rules", "*", "overrides"]` → `rules.*.overrides`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AttrPath(Vec<String>);

impl AttrPath {
    /// Wildcard segment
    pub const WILDCARD: &'static str = "*";

    /// Create path from a single segment
    #[inline]
    #[must_use]
    pub fn single(segment: impl Into<String>) -> Self {
        Self(vec![segment.into()])
    }

    /// Split a dotted path without validating segments
    ///
    /// For statically known paths; use [`str::parse`] for untrusted input.
    #[inline]
    #[must_use]
    pub fn dotted(path: &str) -> Self {
        if path.is_empty() {
            return Self::root();
        }
        Self(path.split('.').map(str::to_string).collect())
    }

    /// Empty path (record root)
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Check if path is empty (root)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a segment, returning new path
    #[inline]
    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut new = self.clone();
        new.0.push(segment.into());
        new
    }

    /// Append an element index, returning new path
    #[inline]
    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        self.child(index.to_string())
    }

    /// Concatenate another path below this one
    #[inline]
    #[must_use]
    pub fn join(&self, other: &Self) -> Self {
        let mut segments = self.0.clone();
        segments.extend(other.0.iter().cloned());
        Self(segments)
    }

    /// Split into parent segments and leaf name (if not root)
    #[inline]
    #[must_use]
    pub fn split_leaf(&self) -> Option<(&[String], &str)> {
        self.0
            .split_last()
            .map(|(leaf, parents)| (parents, leaf.as_str()))
    }
}

impl Display for AttrPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }
        write!(f, "{}", self.0.join("."))
    }
}

impl FromStr for AttrPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::root());
        }

        let segments: Vec<String> = s
            .split('.')
            .map(|seg| {
                if seg.is_empty() {
                    Err(PathError::EmptySegment)
                } else if seg == Self::WILDCARD {
                    Ok(seg.to_string())
                } else if seg.contains(|c: char| !c.is_alphanumeric() && c != '_' && c != '-') {
                    Err(PathError::InvalidSegment(seg.to_string()))
                } else {
                    Ok(seg.to_string())
                }
            })
            .collect::<Result<_, _>>()?;

        Ok(Self(segments))
    }
}

impl From<&str> for AttrPath {
    /// Single-segment path; no parsing, the name is taken verbatim
    fn from(name: &str) -> Self {
        Self::single(name)
    }
}

impl serde::Serialize for AttrPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0.join("."))
    }
}

/// Errors related to attribute paths
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Path contains an empty segment (`a..b`)
    #[error("path contains an empty segment")]
    EmptySegment,

    /// Segment contains characters outside `[A-Za-z0-9_-]`
    #[error("invalid path segment: '{0}'")]
    InvalidSegment(String),
}
