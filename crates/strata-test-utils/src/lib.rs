//! Testing utilities for Strata workspace
//!
//! Shared record fixtures, synthetic registries, and outcome assertions.

#![allow(missing_docs)]

pub use serde_json;

use serde_json::Value as JsonValue;
use strata_engine::{
    Diagnostics, MigrationError, MigrationOutcome, OutcomeStatus, Registry, Step, StepOutput,
};
use strata_record::{AttrType, Attributes, Block, Record, SchemaDescriptor, Value};

/// Build a record from a `json!` attribute object
///
/// ```rust,ignore
/// let rec = record!("dns_record", 1, {"name": "www", "value": "1.2.3.4"});
/// ```
#[macro_export]
macro_rules! record {
    ($kind:expr, $version:expr, $($attrs:tt)+) => {
        $crate::record_from_json($kind, $version, $crate::serde_json::json!($($attrs)+))
    };
}

pub fn attributes_from_json(json: JsonValue) -> Attributes {
    match Value::from_json(json) {
        Value::Object(entries) | Value::Map(entries) => entries,
        other => panic!("fixture attributes must be a JSON object, got {}", other.shape()),
    }
}

pub fn record_from_json(kind: &str, version: u64, json: JsonValue) -> Record {
    Record::new(kind, version, attributes_from_json(json))
}

pub fn envelope_json(record: &Record) -> JsonValue {
    let envelope = record.to_envelope().unwrap();
    serde_json::to_value(envelope).unwrap()
}

/// Look up a top-level attribute as a string
pub fn attr_str<'a>(record: &'a Record, name: &str) -> Option<&'a str> {
    record.get(name).and_then(Value::as_str)
}

/// String elements of a collection attribute, sorted
pub fn sorted_strings(value: &Value) -> Vec<String> {
    let mut out: Vec<String> = value
        .as_items()
        .unwrap_or_default()
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    out.sort();
    out
}

#[track_caller]
pub fn assert_status(outcome: &MigrationOutcome, status: OutcomeStatus) {
    assert_eq!(
        outcome.status(),
        status,
        "unexpected outcome; diagnostics: {:?}",
        outcome.diagnostics()
    );
}

/// Assert the migration succeeded with one output record and return it
#[track_caller]
pub fn assert_upgraded(outcome: &MigrationOutcome) -> &Record {
    assert_status(outcome, OutcomeStatus::Upgraded);
    assert!(!outcome.diagnostics().has_errors());
    outcome.record().unwrap()
}

/// Assert the migration failed with the given error code
#[track_caller]
pub fn assert_failed_with<'a>(outcome: &'a MigrationOutcome, code: &str) -> &'a MigrationError {
    let error = outcome
        .error()
        .unwrap_or_else(|| panic!("expected failure '{code}', got {}", outcome.status()));
    assert_eq!(error.code(), code, "error: {error}");
    assert!(outcome.diagnostics().has_errors());
    error
}

fn counter(version: u64) -> SchemaDescriptor {
    SchemaDescriptor::new(
        "counter",
        version,
        Block::new()
            .required("name", AttrType::String)
            .optional("count", AttrType::Number),
    )
}

fn passthrough(
    record: Record,
    _prior: &SchemaDescriptor,
    _diags: &mut Diagnostics,
) -> Result<StepOutput, MigrationError> {
    Ok(StepOutput::record(record))
}

/// Synthetic `counter` kind with `steps` consecutive versions
///
/// Even versions step with a no-op, odd versions with a pass-through
/// transform, so plans mix both actions.
pub fn chain_registry(steps: u64) -> Registry {
    let mut builder = Registry::builder();
    builder.kind(counter(steps)).unwrap();
    for from in 0..steps {
        let step = if from % 2 == 0 {
            Step::noop(counter(from), from + 1)
        } else {
            Step::transform(counter(from), from + 1, passthrough)
        };
        builder.step(step).unwrap();
    }
    builder.build().unwrap()
}

pub fn counter_record(version: u64, name: &str) -> Record {
    record_from_json("counter", version, serde_json::json!({"name": name, "count": 1}))
}
