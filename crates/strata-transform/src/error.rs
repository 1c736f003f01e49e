//! Transform errors

use strata_record::{AttrPath, Shape};

/// Errors raised by field transform primitives
///
/// Primitives report paths relative to the value they were handed;
/// [`TransformError::within`] re-anchors them under the attribute's path.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransformError {
    /// Value has the wrong shape for this primitive
    #[error("{path}: expected {expected} found {found}")]
    UnexpectedShape {
        /// Offending value
        path: AttrPath,
        /// Accepted shapes
        expected: &'static str,
        /// Actual shape
        found: Shape,
    },

    /// Singleton block held more than one element
    #[error("{path}: singleton block holds {found} elements")]
    SingletonOverflow {
        /// Offending block
        path: AttrPath,
        /// Number of elements found
        found: usize,
    },

    /// Same key present in more than one merged source map
    #[error("{path}: key '{key}' present in both '{first}' and '{second}'")]
    KeyCollision {
        /// Merged map
        path: AttrPath,
        /// Colliding key
        key: String,
        /// Tag of the source that supplied the key first
        first: String,
        /// Tag of the conflicting source
        second: String,
    },

    /// Re-keying produced the same key twice
    #[error("{path}: duplicate key '{key}'")]
    DuplicateKey {
        /// Re-keyed collection
        path: AttrPath,
        /// Duplicate key
        key: String,
    },

    /// Rename target already carries a value
    #[error("{path}: cannot rename '{from}' to '{to}', target already set")]
    RenameCollision {
        /// Containing block
        path: AttrPath,
        /// Old name
        from: String,
        /// New name
        to: String,
    },

    /// Field needed by the transform is absent or null
    #[error("{path}: required field is missing")]
    MissingField {
        /// Missing field
        path: AttrPath,
    },

    /// Value present but outside what the transform accepts
    #[error("{path}: invalid value {value}: {reason}")]
    InvalidValue {
        /// Offending value
        path: AttrPath,
        /// Rendered value
        value: String,
        /// What was expected
        reason: String,
    },
}

impl TransformError {
    /// Shape mismatch at the value root
    #[inline]
    #[must_use]
    pub fn shape(expected: &'static str, found: Shape) -> Self {
        Self::UnexpectedShape {
            path: AttrPath::root(),
            expected,
            found,
        }
    }

    /// Path the error points at
    #[must_use]
    pub fn path(&self) -> &AttrPath {
        match self {
            Self::UnexpectedShape { path, .. }
            | Self::SingletonOverflow { path, .. }
            | Self::KeyCollision { path, .. }
            | Self::DuplicateKey { path, .. }
            | Self::RenameCollision { path, .. }
            | Self::MissingField { path }
            | Self::InvalidValue { path, .. } => path,
        }
    }

    /// Re-anchor the error path below `prefix`
    #[must_use]
    pub fn within(mut self, prefix: &AttrPath) -> Self {
        let path = match &mut self {
            Self::UnexpectedShape { path, .. }
            | Self::SingletonOverflow { path, .. }
            | Self::KeyCollision { path, .. }
            | Self::DuplicateKey { path, .. }
            | Self::RenameCollision { path, .. }
            | Self::MissingField { path }
            | Self::InvalidValue { path, .. } => path,
        };
        *path = prefix.join(path);
        self
    }

    /// Check if this is a sibling-map merge collision
    #[inline]
    #[must_use]
    pub fn is_merge_conflict(&self) -> bool {
        matches!(self, Self::KeyCollision { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn within_prefixes_path() {
        let err = TransformError::SingletonOverflow {
            path: AttrPath::root().index(0),
            found: 2,
        }
        .within(&AttrPath::dotted("rules.3.overrides"));
        assert_eq!(err.path().to_string(), "rules.3.overrides.0");
        assert_eq!(
            err.to_string(),
            "rules.3.overrides.0: singleton block holds 2 elements"
        );
    }
}
