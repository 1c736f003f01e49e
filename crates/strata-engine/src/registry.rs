//! Version registry
//!
//! Provides [`Registry`], the read-only table mapping `(kind, version)` to
//! the upgrade step for that version. Registries are assembled once with
//! [`RegistryBuilder`], which rejects malformed step chains before any
//! record is dispatched, and are then shared immutably.

use std::collections::BTreeMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use strata_record::{Record, ResourceKind, SchemaDescriptor, SchemaVersion};

use crate::diagnostics::Diagnostics;
use crate::error::{MigrationError, RegistryError};
use crate::plan::{MigrationPlan, PlannedStep, StepKind};

/// Per-resource transform for one version step
///
/// Receives the record decoded against the prior descriptor and returns the
/// record for the next version. Warnings are pushed onto the diagnostics;
/// the dispatcher re-tags the output with the step's next version.
pub type TransformFn =
    fn(Record, &SchemaDescriptor, &mut Diagnostics) -> Result<StepOutput, MigrationError>;

/// Output of one transform step
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    /// Migrated record
    pub record: Record,
    /// Second record produced by a split, at its kind's current version
    pub companion: Option<Record>,
}

impl StepOutput {
    /// Single-record output
    #[inline]
    #[must_use]
    pub fn record(record: Record) -> Self {
        Self {
            record,
            companion: None,
        }
    }

    /// Attach split companion
    #[inline]
    #[must_use]
    pub fn with_companion(mut self, companion: Record) -> Self {
        self.companion = Some(companion);
        self
    }
}

/// What a step does
#[derive(Clone)]
pub enum StepAction {
    /// Advance the version tag only
    Noop,
    /// Run a transform
    Transform(TransformFn),
    /// Version shared by two encodings: transform the legacy one, bump the other
    Ambiguous {
        /// Older, structurally distinctive format
        legacy: Arc<SchemaDescriptor>,
        /// Transform applied to legacy-format records
        transform: TransformFn,
    },
}

impl Debug for StepAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Noop => f.write_str("Noop"),
            Self::Transform(_) => f.write_str("Transform"),
            Self::Ambiguous { legacy, .. } => f
                .debug_struct("Ambiguous")
                .field("legacy", &legacy.version())
                .finish_non_exhaustive(),
        }
    }
}

/// Registered upgrade step
#[derive(Debug, Clone)]
pub struct Step {
    prior: Arc<SchemaDescriptor>,
    to: SchemaVersion,
    action: StepAction,
}

impl Step {
    /// Version bump without attribute changes
    #[must_use]
    pub fn noop(prior: SchemaDescriptor, to: u64) -> Self {
        Self::with_action(prior, to, StepAction::Noop)
    }

    /// Transform step
    #[must_use]
    pub fn transform(prior: SchemaDescriptor, to: u64, transform: TransformFn) -> Self {
        Self::with_action(prior, to, StepAction::Transform(transform))
    }

    /// Ambiguous step: `current` is the newer format sharing the version
    #[must_use]
    pub fn ambiguous(
        current: SchemaDescriptor,
        legacy: SchemaDescriptor,
        to: u64,
        transform: TransformFn,
    ) -> Self {
        Self::with_action(
            current,
            to,
            StepAction::Ambiguous {
                legacy: Arc::new(legacy),
                transform,
            },
        )
    }

    fn with_action(prior: SchemaDescriptor, to: u64, action: StepAction) -> Self {
        Self {
            prior: Arc::new(prior),
            to: SchemaVersion::new(to),
            action,
        }
    }

    /// Resource kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &ResourceKind {
        self.prior.kind()
    }

    /// Source version
    #[inline]
    #[must_use]
    pub fn from(&self) -> SchemaVersion {
        self.prior.version()
    }

    /// Next version
    #[inline]
    #[must_use]
    pub fn to(&self) -> SchemaVersion {
        self.to
    }

    /// Descriptor of the source version
    #[inline]
    #[must_use]
    pub fn prior(&self) -> &SchemaDescriptor {
        &self.prior
    }

    /// Step action
    #[inline]
    #[must_use]
    pub fn action(&self) -> &StepAction {
        &self.action
    }

    /// Action kind for plans
    #[must_use]
    pub fn step_kind(&self) -> StepKind {
        match self.action {
            StepAction::Noop => StepKind::Noop,
            StepAction::Transform(_) => StepKind::Transform,
            StepAction::Ambiguous { .. } => StepKind::Ambiguous,
        }
    }
}

#[derive(Debug, Clone)]
struct KindEntry {
    current: Arc<SchemaDescriptor>,
    steps: BTreeMap<SchemaVersion, Step>,
}

/// Read-only version registry
///
/// # Invariants
/// - Every step strictly increases the version
/// - At most one step per `(kind, version)`
/// - Every step's next version is the current version or has its own step
#[derive(Debug, Clone, Default)]
pub struct Registry {
    kinds: BTreeMap<ResourceKind, KindEntry>,
}

impl Registry {
    /// Start building a registry
    #[inline]
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Registered kinds in name order
    pub fn kinds(&self) -> impl Iterator<Item = &ResourceKind> {
        self.kinds.keys()
    }

    /// Check if a kind is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    /// Current version of a kind
    #[must_use]
    pub fn current_version(&self, kind: &str) -> Option<SchemaVersion> {
        self.kinds.get(kind).map(|e| e.current.version())
    }

    /// Current descriptor of a kind
    #[must_use]
    pub fn current_descriptor(&self, kind: &str) -> Option<&SchemaDescriptor> {
        self.kinds.get(kind).map(|e| e.current.as_ref())
    }

    /// Step registered for `(kind, version)`
    #[must_use]
    pub fn step(&self, kind: &str, version: SchemaVersion) -> Option<&Step> {
        self.kinds.get(kind).and_then(|e| e.steps.get(&version))
    }

    /// Steps of a kind in version order
    pub fn steps(&self, kind: &str) -> impl Iterator<Item = &Step> {
        self.kinds.get(kind).into_iter().flat_map(|e| e.steps.values())
    }

    /// Descriptor records of `version` must match
    ///
    /// For ambiguous versions this is the newer of the two formats.
    #[must_use]
    pub fn descriptor_at(&self, kind: &str, version: SchemaVersion) -> Option<&SchemaDescriptor> {
        let entry = self.kinds.get(kind)?;
        if entry.current.version() == version {
            return Some(&entry.current);
        }
        entry.steps.get(&version).map(Step::prior)
    }

    /// Resolve the chain of steps from `from` to the current version
    ///
    /// # Errors
    /// Returns error for an unknown kind, a version newer than current, or
    /// a version with no registered step
    pub fn plan(&self, kind: &str, from: SchemaVersion) -> Result<MigrationPlan, MigrationError> {
        let entry = self
            .kinds
            .get(kind)
            .ok_or_else(|| MigrationError::UnknownKind(kind.into()))?;
        let current = entry.current.version();
        if from > current {
            return Err(MigrationError::VersionAhead {
                kind: kind.into(),
                version: from,
                current,
            });
        }

        let mut steps = Vec::new();
        let mut version = from;
        while version < current {
            let step = entry
                .steps
                .get(&version)
                .ok_or_else(|| MigrationError::UnregisteredVersion {
                    kind: kind.into(),
                    version,
                })?;
            steps.push(PlannedStep {
                from: step.from(),
                to: step.to(),
                kind: step.step_kind(),
            });
            version = step.to();
        }

        Ok(MigrationPlan {
            kind: kind.into(),
            from,
            to: current,
            steps,
        })
    }

    /// Number of registered kinds
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

/// Validating registry builder
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    kinds: BTreeMap<ResourceKind, KindEntry>,
}

impl RegistryBuilder {
    /// Register a kind by its current descriptor
    ///
    /// # Errors
    /// Returns error if the kind is already registered
    pub fn kind(&mut self, current: SchemaDescriptor) -> Result<&mut Self, RegistryError> {
        let kind = current.kind().clone();
        if self.kinds.contains_key(&kind) {
            return Err(RegistryError::DuplicateKind(kind));
        }
        self.kinds.insert(
            kind,
            KindEntry {
                current: Arc::new(current),
                steps: BTreeMap::new(),
            },
        );
        Ok(self)
    }

    /// Register an upgrade step
    ///
    /// # Errors
    /// Returns error if the step is non-monotonic, duplicated, beyond the
    /// current version, for an unknown kind, or carries a descriptor for
    /// another kind or version
    pub fn step(&mut self, step: Step) -> Result<&mut Self, RegistryError> {
        let kind = step.kind().clone();
        let (from, to) = (step.from(), step.to());
        let entry = self
            .kinds
            .get_mut(&kind)
            .ok_or_else(|| RegistryError::UnknownKind(kind.clone()))?;

        if to <= from {
            return Err(RegistryError::NonMonotonicStep { kind, from, to });
        }
        let current = entry.current.version();
        if from >= current || to > current {
            return Err(RegistryError::StepBeyondCurrent {
                kind,
                from,
                to,
                current,
            });
        }
        if let StepAction::Ambiguous { legacy, .. } = step.action() {
            if legacy.kind() != &kind || legacy.version() != from {
                return Err(RegistryError::DescriptorMismatch {
                    kind,
                    version: from,
                    found_kind: legacy.kind().clone(),
                    found_version: legacy.version(),
                });
            }
        }
        if entry.steps.contains_key(&from) {
            return Err(RegistryError::DuplicateStep {
                kind,
                version: from,
            });
        }

        tracing::trace!("registered {} step {} -> {}", kind, from, to);
        entry.steps.insert(from, step);
        Ok(self)
    }

    /// Finish, checking that every step chain reaches the current version
    ///
    /// # Errors
    /// Returns [`RegistryError::BrokenChain`] for a step whose next version
    /// has neither a step nor is current
    pub fn build(&mut self) -> Result<Registry, RegistryError> {
        for (kind, entry) in &self.kinds {
            let current = entry.current.version();
            for step in entry.steps.values() {
                if step.to() != current && !entry.steps.contains_key(&step.to()) {
                    return Err(RegistryError::BrokenChain {
                        kind: kind.clone(),
                        from: step.from(),
                        to: step.to(),
                    });
                }
            }
        }
        Ok(Registry {
            kinds: std::mem::take(&mut self.kinds),
        })
    }
}
