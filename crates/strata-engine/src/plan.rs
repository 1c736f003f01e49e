//! Migration plans and reports

use std::fmt::{self, Display, Formatter};

use serde::Serialize;
use strata_record::{ResourceKind, SchemaVersion};

use crate::diagnostics::Diagnostics;

/// Registered action kind of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Version bump only
    Noop,
    /// Transform
    Transform,
    /// Format detection, then transform or bump
    Ambiguous,
}

impl Display for StepKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Noop => f.write_str("noop"),
            Self::Transform => f.write_str("transform"),
            Self::Ambiguous => f.write_str("ambiguous"),
        }
    }
}

/// One resolved step of a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlannedStep {
    /// Source version
    pub from: SchemaVersion,
    /// Next version
    pub to: SchemaVersion,
    /// Registered action
    pub kind: StepKind,
}

/// Ordered chain of steps from a record's version to the current version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationPlan {
    /// Resource kind
    pub kind: ResourceKind,
    /// Starting version
    pub from: SchemaVersion,
    /// Current version
    pub to: SchemaVersion,
    /// Steps in strictly increasing version order
    pub steps: Vec<PlannedStep>,
}

impl MigrationPlan {
    /// Number of steps
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if the record is already current
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Display for MigrationPlan {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -> {}", self.kind, self.from, self.to)?;
        for step in &self.steps {
            write!(f, "\n  {} -> {} ({})", step.from, step.to, step.kind)?;
        }
        Ok(())
    }
}

/// What a step actually did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Applied {
    /// Version bump only
    Noop,
    /// Transform ran
    Transform,
    /// Ambiguous version resolved to the legacy format; transform ran
    LegacyFormat,
    /// Ambiguous version resolved to the current format; version bump only
    CurrentFormat,
}

/// One executed step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AppliedStep {
    /// Source version
    pub from: SchemaVersion,
    /// Next version
    pub to: SchemaVersion,
    /// What happened
    pub applied: Applied,
}

/// Per-record account of a migration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationReport {
    /// Resource kind
    pub kind: ResourceKind,
    /// Version of the input record
    pub from: SchemaVersion,
    /// Version reached (input version on failure)
    pub to: SchemaVersion,
    /// Steps executed in order
    pub steps: Vec<AppliedStep>,
    /// Errors and warnings
    pub diagnostics: Diagnostics,
}

impl MigrationReport {
    /// Start report for a record
    #[inline]
    #[must_use]
    pub fn new(kind: ResourceKind, from: SchemaVersion) -> Self {
        Self {
            kind,
            from,
            to: from,
            steps: Vec::new(),
            diagnostics: Diagnostics::new(),
        }
    }
}
