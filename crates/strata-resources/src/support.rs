//! Helpers shared by the per-resource upgrade steps

use strata_engine::MigrationError;
use strata_record::{Record, SchemaVersion};
use strata_transform::{Pipeline, TransformError};

/// Run a field pipeline on a record's attributes
///
/// `to` is the version being produced, used to tag errors.
pub(crate) fn run(pipeline: &Pipeline, record: &mut Record, to: u64) -> Result<(), MigrationError> {
    let kind = record.kind().clone();
    let notes = pipeline
        .apply(record.attributes_mut())
        .map_err(|e| MigrationError::from_transform(e, &kind, SchemaVersion::new(to)))?;
    for note in notes {
        tracing::debug!("{} -> v{}: {}", kind, to, note);
    }
    Ok(())
}

/// Lift a primitive failure into a migration error for `record`
pub(crate) fn lift(err: TransformError, record: &Record, to: u64) -> MigrationError {
    MigrationError::from_transform(err, record.kind(), SchemaVersion::new(to))
}
