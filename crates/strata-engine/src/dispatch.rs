//! Upgrade dispatcher
//!
//! Provides [`Dispatcher`], which walks a record from its stored version to
//! the current version one registered step at a time. The input record is
//! never modified: every step works on a copy, and a failure discards all
//! intermediate output.

use rayon::prelude::*;
use strata_record::{DecodeError, DecodeMode, Record, ResourceKind, SchemaDescriptor, SchemaVersion};

use crate::config::EngineConfig;
use crate::coordinator::{self, MergeRule};
use crate::detect::{FormatClass, FormatDetector};
use crate::diagnostics::Diagnostics;
use crate::error::MigrationError;
use crate::outcome::MigrationOutcome;
use crate::plan::{Applied, AppliedStep, MigrationPlan, MigrationReport};
use crate::registry::{Registry, StepAction, StepOutput};

/// Drives records through a [`Registry`]
///
/// Holds no mutable state; one dispatcher may serve any number of threads.
#[derive(Debug, Clone)]
pub struct Dispatcher<'r> {
    registry: &'r Registry,
    config: EngineConfig,
}

struct Finished {
    record: Record,
    companion: Option<Record>,
}

impl<'r> Dispatcher<'r> {
    /// Create dispatcher
    #[inline]
    #[must_use]
    pub fn new(registry: &'r Registry, config: EngineConfig) -> Self {
        Self { registry, config }
    }

    /// Registry in use
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolve the migration plan for a kind and stored version
    ///
    /// # Errors
    /// Returns error for an unknown kind, a future version, or a gap in the
    /// step chain
    pub fn plan(&self, kind: &str, from: SchemaVersion) -> Result<MigrationPlan, MigrationError> {
        self.registry.plan(kind, from)
    }

    /// Migrate one record to its kind's current version
    #[must_use]
    pub fn dispatch(&self, record: &Record) -> MigrationOutcome {
        let mut report = MigrationReport::new(record.kind().clone(), record.version());
        match self.run(record, &mut report) {
            Ok(None) => MigrationOutcome::UpToDate {
                record: record.clone(),
                report,
            },
            Ok(Some(finished)) => {
                report.to = finished.record.version();
                tracing::info!(
                    "{} migrated {} -> {} in {} step(s)",
                    report.kind,
                    report.from,
                    report.to,
                    report.steps.len()
                );
                match finished.companion {
                    Some(companion) => MigrationOutcome::SplitPending {
                        record: finished.record,
                        companion,
                        report,
                    },
                    None => MigrationOutcome::Upgraded {
                        record: finished.record,
                        report,
                    },
                }
            }
            Err(error) => self.fail(error, report),
        }
    }

    /// Migrate independent records in parallel
    ///
    /// Outcomes are returned in input order.
    #[must_use]
    pub fn dispatch_all(&self, records: &[Record]) -> Vec<MigrationOutcome> {
        records.par_iter().map(|record| self.dispatch(record)).collect()
    }

    /// Migrate a target record and fold contributor records into it
    ///
    /// Contributors are migrated first. If the target or any contributor
    /// fails, or any rule rejects its inputs, the whole group fails.
    #[must_use]
    pub fn dispatch_merge(
        &self,
        target: &Record,
        contributors: &[Record],
        rules: &[MergeRule],
    ) -> MigrationOutcome {
        let outcome = self.dispatch(target);
        let (record, mut report) = match outcome {
            MigrationOutcome::UpToDate { record, report }
            | MigrationOutcome::Upgraded { record, report } => (record, report),
            MigrationOutcome::SplitPending { report, .. } | MigrationOutcome::Merged { report, .. } => {
                let error = MigrationError::MergeRejected(format!(
                    "target '{}' cannot be merged into after a split",
                    target.kind()
                ));
                return self.fail(error, report);
            }
            failed @ MigrationOutcome::Failed { .. } => return failed,
        };

        let mut migrated = Vec::with_capacity(contributors.len());
        for (index, contributor) in contributors.iter().enumerate() {
            let checked = self.dispatch(contributor).into_records().and_then(|mut records| {
                match (records.pop(), records.is_empty()) {
                    (Some(record), true) => {
                        let version = record.version();
                        self.validate(record, version)
                    }
                    _ => Err(MigrationError::SplitConflict(
                        "contributor split into several records".into(),
                    )),
                }
            });
            match checked {
                Ok(record) => migrated.push(record),
                Err(error) => {
                    let error =
                        MigrationError::MergeRejected(format!("contributor {index}: {error}"));
                    return self.fail(error, report);
                }
            }
        }

        let merged = match coordinator::merge(&record, &migrated, rules) {
            Ok(merged) => merged,
            Err(error) => return self.fail(error, report),
        };
        let record = if self.config.validate_step_output {
            match self.validate(merged.record, record.version()) {
                Ok(record) => record,
                Err(error) => return self.fail(error, report),
            }
        } else {
            merged.record
        };

        tracing::info!(
            "{} merged {} contributor(s)",
            report.kind,
            merged.absorbed.len()
        );
        report.to = record.version();
        MigrationOutcome::Merged {
            record,
            absorbed: merged.absorbed,
            report,
        }
    }

    fn fail(&self, error: MigrationError, mut report: MigrationReport) -> MigrationOutcome {
        tracing::error!("{} {}: migration failed: {}", report.kind, report.from, error);
        report.to = report.from;
        report.diagnostics.push(error.to_diagnostic());
        MigrationOutcome::Failed { error, report }
    }

    fn run(
        &self,
        record: &Record,
        report: &mut MigrationReport,
    ) -> Result<Option<Finished>, MigrationError> {
        let kind = record.kind();
        let plan = self.registry.plan(kind.as_str(), record.version())?;
        if plan.is_empty() {
            return Ok(None);
        }
        if plan.len() > self.config.max_steps {
            return Err(MigrationError::StepLimitExceeded {
                kind: kind.clone(),
                steps: plan.len(),
                max: self.config.max_steps,
            });
        }

        let mut working = record.clone();
        let mut companion: Option<Record> = None;

        for planned in &plan.steps {
            let step = self
                .registry
                .step(kind.as_str(), planned.from)
                .ok_or_else(|| MigrationError::UnregisteredVersion {
                    kind: kind.clone(),
                    version: planned.from,
                })?;
            let (from, to) = (step.from(), step.to());
            let mark = report.diagnostics.len();
            tracing::debug!("{} applying step {} -> {}", kind, from, to);

            let (output, applied) = match step.action() {
                StepAction::Noop => (StepOutput::record(working), Applied::Noop),
                StepAction::Transform(transform) => {
                    let input = self.decode_input(&working, step.prior(), &mut report.diagnostics)?;
                    let output = transform(input, step.prior(), &mut report.diagnostics)?;
                    (output, Applied::Transform)
                }
                StepAction::Ambiguous { legacy, transform } => {
                    let detector = FormatDetector::new(legacy, step.prior())
                        .with_required_marker(self.config.require_format_marker);
                    match detector.classify(&working)? {
                        FormatClass::Legacy(decoded) => {
                            let output = transform(decoded, legacy, &mut report.diagnostics)?;
                            (output, Applied::LegacyFormat)
                        }
                        FormatClass::Current(_) => {
                            (StepOutput::record(working), Applied::CurrentFormat)
                        }
                    }
                }
            };

            let errors = report.diagnostics.since(mark).iter().filter(|d| d.is_error()).count();
            if errors > 0 {
                return Err(MigrationError::StepFailed {
                    kind: kind.clone(),
                    version: from,
                    count: errors,
                });
            }
            for warning in report.diagnostics.since(mark) {
                tracing::warn!("{} {} -> {}: {}", kind, from, to, warning);
            }

            if output.record.kind() != kind {
                return Err(MigrationError::KindChanged {
                    expected: kind.clone(),
                    found: output.record.kind().clone(),
                });
            }
            if let Some(produced) = output.companion {
                if companion.is_some() {
                    return Err(MigrationError::SplitConflict(format!(
                        "{kind}: more than one split in a single plan"
                    )));
                }
                companion = Some(self.validate_companion(produced)?);
            }

            let next = output.record.with_version(to).without_format_marker();
            working = match applied {
                Applied::Noop | Applied::CurrentFormat => next,
                Applied::Transform | Applied::LegacyFormat if self.config.validate_step_output => {
                    self.validate(next, to)?
                }
                Applied::Transform | Applied::LegacyFormat => next,
            };
            report.steps.push(AppliedStep { from, to, applied });
        }

        if self.config.warnings_as_errors {
            let count = report.diagnostics.warnings().count();
            if count > 0 {
                return Err(MigrationError::WarningsAsErrors { count });
            }
        }

        Ok(Some(Finished {
            record: working,
            companion,
        }))
    }

    fn decode_input(
        &self,
        record: &Record,
        prior: &SchemaDescriptor,
        diags: &mut Diagnostics,
    ) -> Result<Record, MigrationError> {
        let (decoded, dropped) = record
            .decode(prior, self.config.input_mode)
            .map_err(|source| decode_failure(record.kind().clone(), prior.version(), source))?;
        for path in dropped {
            diags.warn_at(
                "attribute_dropped",
                path,
                format!("not declared by {} {}; dropped", prior.kind(), prior.version()),
            );
        }
        Ok(decoded)
    }

    /// Strict-decode a step output against the descriptor of `version`
    fn validate(&self, record: Record, version: SchemaVersion) -> Result<Record, MigrationError> {
        let kind = record.kind().clone();
        let descriptor = self
            .registry
            .descriptor_at(kind.as_str(), version)
            .ok_or_else(|| MigrationError::UnregisteredVersion {
                kind: kind.clone(),
                version,
            })?;
        record
            .decode(descriptor, DecodeMode::Strict)
            .map(|(decoded, _)| decoded)
            .map_err(|source| decode_failure(kind, version, source))
    }

    fn validate_companion(&self, companion: Record) -> Result<Record, MigrationError> {
        let kind = companion.kind().clone();
        let current = self
            .registry
            .current_version(kind.as_str())
            .ok_or_else(|| MigrationError::SplitConflict(format!("companion kind '{kind}' is not registered")))?;
        if companion.version() != current {
            return Err(MigrationError::SplitConflict(format!(
                "companion {kind} is at {}, current is {current}",
                companion.version()
            )));
        }
        self.validate(companion, current)
            .map_err(|err| MigrationError::SplitConflict(format!("companion {kind}: {err}")))
    }
}

fn decode_failure(kind: ResourceKind, version: SchemaVersion, source: DecodeError) -> MigrationError {
    match source {
        DecodeError::MissingRequired { path } => MigrationError::MissingRequiredField {
            kind,
            version,
            path,
        },
        source => MigrationError::Decode {
            kind,
            version,
            source,
        },
    }
}
