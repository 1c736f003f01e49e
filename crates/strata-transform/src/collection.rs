//! Collection-kind conversion (set ↔ list)

use std::collections::HashSet;

use strata_record::{Fingerprint, Value};

use crate::error::TransformError;

/// Result of a conversion that may merge equal elements
#[derive(Debug, Clone, PartialEq)]
pub struct Converted {
    /// Converted value
    pub value: Value,
    /// Number of elements dropped as duplicates
    pub collapsed: usize,
}

/// Re-materialize a set as a list
///
/// The element multiset is preserved exactly; elements keep the set's
/// stored order, which is deterministic for a given input. A value that is
/// already a list passes through unchanged. `null` and `unknown` pass
/// through.
///
/// # Errors
/// Returns error if the value is not a collection
pub fn set_to_list(value: Value) -> Result<Value, TransformError> {
    match value {
        Value::Set(items) | Value::List(items) => Ok(Value::List(items)),
        Value::Null | Value::Unknown => Ok(value),
        other => Err(TransformError::shape("set", other.shape())),
    }
}

/// Re-materialize a list as a set, collapsing content-equal elements
///
/// # Errors
/// Returns error if the value is not a collection
pub fn list_to_set(value: Value) -> Result<Converted, TransformError> {
    match value {
        Value::List(items) | Value::Set(items) => {
            let total = items.len();
            let mut seen = HashSet::with_capacity(total);
            let kept: Vec<Value> = items
                .into_iter()
                .filter(|item| seen.insert(Fingerprint::of(item)))
                .collect();
            Ok(Converted {
                collapsed: total - kept.len(),
                value: Value::Set(kept),
            })
        }
        Value::Null | Value::Unknown => Ok(Converted {
            value,
            collapsed: 0,
        }),
        other => Err(TransformError::shape("list", other.shape())),
    }
}
