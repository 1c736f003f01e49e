//! Engine errors
//!
//! [`RegistryError`] covers configuration defects caught while the registry
//! is built; [`MigrationError`] covers runtime failures of one migration.

use strata_record::{AttrPath, DecodeError, ResourceKind, SchemaVersion};
use strata_transform::TransformError;

use crate::diagnostics::Diagnostic;

/// Registry construction errors (fail fast, never at dispatch time)
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    /// Kind registered twice
    #[error("kind '{0}' registered twice")]
    DuplicateKind(ResourceKind),

    /// Step registered for a kind with no current descriptor
    #[error("step registered for unknown kind '{0}'")]
    UnknownKind(ResourceKind),

    /// Step does not strictly increase the version
    #[error("{kind}: step {from} -> {to} does not increase the version")]
    NonMonotonicStep {
        /// Resource kind
        kind: ResourceKind,
        /// Source version
        from: SchemaVersion,
        /// Declared next version
        to: SchemaVersion,
    },

    /// Second step for the same source version
    #[error("{kind}: step for {version} registered twice")]
    DuplicateStep {
        /// Resource kind
        kind: ResourceKind,
        /// Source version
        version: SchemaVersion,
    },

    /// Descriptor attached to a step is for another kind or version
    #[error("{kind} {version}: descriptor is for {found_kind} {found_version}")]
    DescriptorMismatch {
        /// Step kind
        kind: ResourceKind,
        /// Step source version
        version: SchemaVersion,
        /// Descriptor kind
        found_kind: ResourceKind,
        /// Descriptor version
        found_version: SchemaVersion,
    },

    /// Step starts at or goes past the current version
    #[error("{kind}: step {from} -> {to} exceeds current version {current}")]
    StepBeyondCurrent {
        /// Resource kind
        kind: ResourceKind,
        /// Source version
        from: SchemaVersion,
        /// Declared next version
        to: SchemaVersion,
        /// Current version
        current: SchemaVersion,
    },

    /// Step's next version is neither current nor registered
    #[error("{kind}: step {from} -> {to} leads to an unregistered version")]
    BrokenChain {
        /// Resource kind
        kind: ResourceKind,
        /// Source version
        from: SchemaVersion,
        /// Declared next version
        to: SchemaVersion,
    },
}

/// Runtime failure of one migration
///
/// The input record is never modified; a failed migration produces no output.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MigrationError {
    /// Kind not present in the registry
    #[error("unknown resource kind '{0}'")]
    UnknownKind(ResourceKind),

    /// No step registered for this version
    #[error("{kind}: no upgrade step registered for {version}")]
    UnregisteredVersion {
        /// Resource kind
        kind: ResourceKind,
        /// Record version
        version: SchemaVersion,
    },

    /// Record written by a newer schema than this engine knows
    #[error("{kind}: record version {version} is newer than current {current}")]
    VersionAhead {
        /// Resource kind
        kind: ResourceKind,
        /// Record version
        version: SchemaVersion,
        /// Current version
        current: SchemaVersion,
    },

    /// Migrated record lacks a field the target schema requires
    #[error("{kind} {version}: required field '{path}' is missing")]
    MissingRequiredField {
        /// Resource kind
        kind: ResourceKind,
        /// Version whose schema requires the field
        version: SchemaVersion,
        /// Missing field
        path: AttrPath,
    },

    /// Format detection could not decide between historical encodings
    #[error("{kind} {version}: ambiguous format unresolved: {reason}")]
    AmbiguousFormatUnresolved {
        /// Resource kind
        kind: ResourceKind,
        /// Ambiguous version
        version: SchemaVersion,
        /// What the detector observed
        reason: String,
    },

    /// Sibling-map merge found overlapping keys
    #[error("merge conflict: {0}")]
    MergeConflict(TransformError),

    /// Record does not match the descriptor of a version
    #[error("{kind} {version}: {source}")]
    Decode {
        /// Resource kind
        kind: ResourceKind,
        /// Version decoded against
        version: SchemaVersion,
        /// Shape error
        #[source]
        source: DecodeError,
    },

    /// Transform primitive failed
    #[error("transform failed: {0}")]
    Transform(TransformError),

    /// Enumerated value outside the supported table
    #[error("{path}: invalid value '{value}': {reason}")]
    InvalidValue {
        /// Offending attribute
        path: AttrPath,
        /// Rendered value
        value: String,
        /// Accepted values
        reason: String,
    },

    /// Split output is inconsistent
    #[error("split conflict: {0}")]
    SplitConflict(String),

    /// Merge inputs do not fit the rule
    #[error("merge rejected: {0}")]
    MergeRejected(String),

    /// Step returned a record of another kind
    #[error("step changed record kind from '{expected}' to '{found}'")]
    KindChanged {
        /// Kind being migrated
        expected: ResourceKind,
        /// Kind returned by the step
        found: ResourceKind,
    },

    /// Step reported error diagnostics
    #[error("{kind} {version}: step reported {count} error(s)")]
    StepFailed {
        /// Resource kind
        kind: ResourceKind,
        /// Step source version
        version: SchemaVersion,
        /// Number of error diagnostics
        count: usize,
    },

    /// Plan longer than the configured limit
    #[error("{kind}: plan has {steps} steps, limit is {max}")]
    StepLimitExceeded {
        /// Resource kind
        kind: ResourceKind,
        /// Plan length
        steps: usize,
        /// Configured limit
        max: usize,
    },

    /// Warnings promoted to errors by configuration
    #[error("{count} warning(s) treated as errors")]
    WarningsAsErrors {
        /// Number of warnings
        count: usize,
    },
}

impl MigrationError {
    /// Map a primitive failure onto the migration taxonomy
    ///
    /// Key collisions become [`MigrationError::MergeConflict`]; missing
    /// fields become [`MigrationError::MissingRequiredField`] for the given
    /// kind and target version.
    #[must_use]
    pub fn from_transform(err: TransformError, kind: &ResourceKind, version: SchemaVersion) -> Self {
        match err {
            TransformError::KeyCollision { .. } => Self::MergeConflict(err),
            TransformError::MissingField { path } => Self::MissingRequiredField {
                kind: kind.clone(),
                version,
                path,
            },
            TransformError::InvalidValue {
                path,
                value,
                reason,
            } => Self::InvalidValue {
                path,
                value,
                reason,
            },
            other => Self::Transform(other),
        }
    }

    /// Stable machine-readable code
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownKind(_) => "unknown_kind",
            Self::UnregisteredVersion { .. } => "unregistered_version",
            Self::VersionAhead { .. } => "version_ahead",
            Self::MissingRequiredField { .. } => "missing_required_field",
            Self::AmbiguousFormatUnresolved { .. } => "ambiguous_format_unresolved",
            Self::MergeConflict(_) => "merge_conflict",
            Self::Decode { .. } => "decode_failed",
            Self::Transform(_) => "transform_failed",
            Self::InvalidValue { .. } => "invalid_value",
            Self::SplitConflict(_) => "split_conflict",
            Self::MergeRejected(_) => "merge_rejected",
            Self::KindChanged { .. } => "kind_changed",
            Self::StepFailed { .. } => "step_failed",
            Self::StepLimitExceeded { .. } => "step_limit_exceeded",
            Self::WarningsAsErrors { .. } => "warnings_as_errors",
        }
    }

    /// Attribute the failure points at, if any
    #[must_use]
    pub fn path(&self) -> Option<&AttrPath> {
        match self {
            Self::MissingRequiredField { path, .. } | Self::InvalidValue { path, .. } => Some(path),
            Self::MergeConflict(err) | Self::Transform(err) => Some(err.path()),
            Self::Decode { source, .. } => source.path(),
            _ => None,
        }
    }

    /// Render as an error diagnostic
    #[must_use]
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diagnostic = Diagnostic::error(self.code(), self.to_string());
        match self.path() {
            Some(path) if !path.is_empty() => diagnostic.at(path.clone()),
            _ => diagnostic,
        }
    }
}
