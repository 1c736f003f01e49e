//! Migration outcomes
//!
//! A [`MigrationOutcome`] tells the host what to persist: nothing new
//! (`UpToDate`), one record (`Upgraded`, `Merged`), two records atomically
//! (`SplitPending`), or nothing at all (`Failed`).

use std::fmt::{self, Display, Formatter};

use serde::Serialize;
use strata_record::Record;

use crate::diagnostics::Diagnostics;
use crate::error::MigrationError;
use crate::plan::MigrationReport;

/// Stable outcome codes for hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Record already at current version
    UpToDate,
    /// Record migrated
    Upgraded,
    /// Two records must both be persisted
    SplitPending,
    /// Target record absorbed contributors
    Merged,
    /// Migration failed; persist nothing
    Failed,
}

impl OutcomeStatus {
    /// Code string
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UpToDate => "up_to_date",
            Self::Upgraded => "upgraded",
            Self::SplitPending => "split_pending",
            Self::Merged => "merged",
            Self::Failed => "failed",
        }
    }
}

impl Display for OutcomeStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of dispatching one record (or one merge group)
#[derive(Debug, Clone, PartialEq)]
pub enum MigrationOutcome {
    /// No migration needed; the record is returned unchanged
    UpToDate {
        /// Input record
        record: Record,
        /// Report (no steps)
        report: MigrationReport,
    },
    /// Record migrated to the current version
    Upgraded {
        /// Migrated record
        record: Record,
        /// Report
        report: MigrationReport,
    },
    /// Split produced two records the host must write atomically
    SplitPending {
        /// Migrated source record
        record: Record,
        /// Companion record of another kind
        companion: Record,
        /// Report
        report: MigrationReport,
    },
    /// Target record migrated and contributors folded in
    Merged {
        /// Migrated target record
        record: Record,
        /// Indices of contributors that were absorbed
        absorbed: Vec<usize>,
        /// Report
        report: MigrationReport,
    },
    /// Migration aborted; the input must be left untouched
    Failed {
        /// Cause
        error: MigrationError,
        /// Report, including the error diagnostic
        report: MigrationReport,
    },
}

impl MigrationOutcome {
    /// Stable status code
    #[must_use]
    pub fn status(&self) -> OutcomeStatus {
        match self {
            Self::UpToDate { .. } => OutcomeStatus::UpToDate,
            Self::Upgraded { .. } => OutcomeStatus::Upgraded,
            Self::SplitPending { .. } => OutcomeStatus::SplitPending,
            Self::Merged { .. } => OutcomeStatus::Merged,
            Self::Failed { .. } => OutcomeStatus::Failed,
        }
    }

    /// Migration report
    #[must_use]
    pub fn report(&self) -> &MigrationReport {
        match self {
            Self::UpToDate { report, .. }
            | Self::Upgraded { report, .. }
            | Self::SplitPending { report, .. }
            | Self::Merged { report, .. }
            | Self::Failed { report, .. } => report,
        }
    }

    /// Diagnostics of the migration
    #[inline]
    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.report().diagnostics
    }

    /// Primary output record, if any
    #[must_use]
    pub fn record(&self) -> Option<&Record> {
        match self {
            Self::UpToDate { record, .. }
            | Self::Upgraded { record, .. }
            | Self::SplitPending { record, .. }
            | Self::Merged { record, .. } => Some(record),
            Self::Failed { .. } => None,
        }
    }

    /// Every record the host must persist, primary first
    #[must_use]
    pub fn records(&self) -> Vec<&Record> {
        match self {
            Self::SplitPending {
                record, companion, ..
            } => vec![record, companion],
            other => other.record().into_iter().collect(),
        }
    }

    /// Failure cause, if failed
    #[must_use]
    pub fn error(&self) -> Option<&MigrationError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Check if the migration failed
    #[inline]
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Consume into the records to persist
    ///
    /// # Errors
    /// Returns the failure cause for a failed migration
    pub fn into_records(self) -> Result<Vec<Record>, MigrationError> {
        match self {
            Self::UpToDate { record, .. }
            | Self::Upgraded { record, .. }
            | Self::Merged { record, .. } => Ok(vec![record]),
            Self::SplitPending {
                record, companion, ..
            } => Ok(vec![record, companion]),
            Self::Failed { error, .. } => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_record::{Attributes, SchemaVersion};

    fn report() -> MigrationReport {
        MigrationReport::new("tiered_cache".into(), SchemaVersion::new(0))
    }

    #[test]
    fn split_returns_both_records() {
        let outcome = MigrationOutcome::SplitPending {
            record: Record::new("tiered_cache", 1, Attributes::new()),
            companion: Record::new("argo_tiered_caching", 0, Attributes::new()),
            report: report(),
        };
        assert_eq!(outcome.status().as_str(), "split_pending");
        let kinds: Vec<_> = outcome.records().iter().map(|r| r.kind().to_string()).collect();
        assert_eq!(kinds, vec!["tiered_cache", "argo_tiered_caching"]);
    }

    #[test]
    fn failed_has_no_records() {
        let outcome = MigrationOutcome::Failed {
            error: MigrationError::UnknownKind("x".into()),
            report: report(),
        };
        assert!(outcome.is_failed());
        assert!(outcome.records().is_empty());
        assert!(outcome.into_records().is_err());
    }
}
