//! Format detection for ambiguous versions
//!
//! Some versions were written by two historical producers with
//! incompatible encodings. [`FormatDetector`] classifies a record as one or
//! the other by attempting a strict decode against each candidate format;
//! a host-supplied [`FormatMarker`] takes precedence over the heuristic.

use strata_record::{DecodeError, DecodeMode, FormatMarker, Record, SchemaDescriptor};

use crate::error::MigrationError;

/// Which historical encoding a record uses
#[derive(Debug, Clone, PartialEq)]
pub enum FormatClass {
    /// Older format, needs the transform; carries the decoded record
    Legacy(Record),
    /// Newer format, needs only a version bump; carries the decoded record
    Current(Record),
}

impl FormatClass {
    /// Check for the legacy format
    #[inline]
    #[must_use]
    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::Legacy(_))
    }
}

/// Strict-decode `record` against `candidate`
///
/// Returns whether the record is in the candidate's format, and the decoded
/// record when it is.
#[must_use]
pub fn resolve(record: &Record, candidate: &SchemaDescriptor) -> (bool, Option<Record>) {
    match record.decode(candidate, DecodeMode::Strict) {
        Ok((decoded, _)) => (true, Some(decoded)),
        Err(_) => (false, None),
    }
}

/// Classifier between the two encodings of one ambiguous version
#[derive(Debug, Clone, Copy)]
pub struct FormatDetector<'a> {
    legacy: &'a SchemaDescriptor,
    current: &'a SchemaDescriptor,
    require_marker: bool,
}

impl<'a> FormatDetector<'a> {
    /// Create detector for a version's two formats
    #[inline]
    #[must_use]
    pub fn new(legacy: &'a SchemaDescriptor, current: &'a SchemaDescriptor) -> Self {
        Self {
            legacy,
            current,
            require_marker: false,
        }
    }

    /// Refuse heuristic detection when no marker is present
    #[inline]
    #[must_use]
    pub fn with_required_marker(mut self, required: bool) -> Self {
        self.require_marker = required;
        self
    }

    /// Classify a record
    ///
    /// # Errors
    /// Returns [`MigrationError::AmbiguousFormatUnresolved`] if the record
    /// decodes as both formats or neither, or if a marker is required but
    /// absent; [`MigrationError::Decode`] if the record does not match the
    /// format its marker names
    pub fn classify(&self, record: &Record) -> Result<FormatClass, MigrationError> {
        match record.format_marker() {
            Some(FormatMarker::Legacy) => {
                let decoded = self.decode_marked(record, self.legacy)?;
                return Ok(FormatClass::Legacy(decoded));
            }
            Some(FormatMarker::Current) => {
                let decoded = self.decode_marked(record, self.current)?;
                return Ok(FormatClass::Current(decoded));
            }
            None if self.require_marker => {
                return Err(self.unresolved("format marker required but absent".into()));
            }
            None => {}
        }

        let legacy = record.decode(self.legacy, DecodeMode::Strict);
        let current = record.decode(self.current, DecodeMode::Strict);
        match (legacy, current) {
            (Ok((decoded, _)), Err(_)) => {
                tracing::debug!("{} {}: legacy format detected", record.kind(), record.version());
                Ok(FormatClass::Legacy(decoded))
            }
            (Err(_), Ok((decoded, _))) => {
                tracing::debug!("{} {}: current format detected", record.kind(), record.version());
                Ok(FormatClass::Current(decoded))
            }
            (Ok(_), Ok(_)) => Err(self.unresolved("record decodes as both formats".into())),
            (Err(legacy), Err(current)) => Err(self.unresolved(format!(
                "record matches neither format (legacy: {legacy}; current: {current})"
            ))),
        }
    }

    fn decode_marked(
        &self,
        record: &Record,
        descriptor: &SchemaDescriptor,
    ) -> Result<Record, MigrationError> {
        record
            .decode(descriptor, DecodeMode::Strict)
            .map(|(decoded, _)| decoded)
            .map_err(|source: DecodeError| MigrationError::Decode {
                kind: record.kind().clone(),
                version: record.version(),
                source,
            })
    }

    fn unresolved(&self, reason: String) -> MigrationError {
        MigrationError::AmbiguousFormatUnresolved {
            kind: self.current.kind().clone(),
            version: self.current.version(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strata_record::{AttrType, Attributes, Block, Value};

    fn legacy() -> SchemaDescriptor {
        SchemaDescriptor::new(
            "workers_script",
            0,
            Block::new()
                .required("name", AttrType::String)
                .singleton_block("placement", Block::new().optional("mode", AttrType::String)),
        )
    }

    fn current() -> SchemaDescriptor {
        SchemaDescriptor::new(
            "workers_script",
            0,
            Block::new()
                .required("script_name", AttrType::String)
                .optional(
                    "placement",
                    AttrType::object(Block::new().optional("mode", AttrType::String)),
                ),
        )
    }

    fn record(attrs: serde_json::Value) -> Record {
        let attributes = match Value::from_json(attrs) {
            Value::Object(entries) => entries,
            _ => Attributes::new(),
        };
        Record::new("workers_script", 0, attributes)
    }

    #[test]
    fn resolve_contract() {
        let rec = record(json!({"name": "w", "placement": [{"mode": "smart"}]}));
        let (is_legacy, decoded) = resolve(&rec, &legacy());
        assert!(is_legacy);
        assert!(decoded.is_some());

        let rec = record(json!({"script_name": "w", "placement": {"mode": "smart"}}));
        assert_eq!(resolve(&rec, &legacy()), (false, None));
    }

    #[test]
    fn classifies_by_shape() {
        let (l, c) = (legacy(), current());
        let detector = FormatDetector::new(&l, &c);
        let old = record(json!({"name": "w", "placement": [{"mode": "smart"}]}));
        assert!(detector.classify(&old).unwrap().is_legacy());

        let new = record(json!({"script_name": "w", "placement": {"mode": "smart"}}));
        assert!(!detector.classify(&new).unwrap().is_legacy());
    }

    #[test]
    fn neither_is_unresolved() {
        let (l, c) = (legacy(), current());
        let rec = record(json!({"name": "w", "placement": {"mode": "smart"}}));
        let err = FormatDetector::new(&l, &c).classify(&rec).unwrap_err();
        assert_eq!(err.code(), "ambiguous_format_unresolved");
    }

    #[test]
    fn both_is_unresolved() {
        let l = SchemaDescriptor::new(
            "workers_script",
            0,
            Block::new().optional("name", AttrType::String),
        );
        let c = SchemaDescriptor::new(
            "workers_script",
            0,
            Block::new().optional("name", AttrType::String),
        );
        let rec = record(json!({"name": "w"}));
        let err = FormatDetector::new(&l, &c).classify(&rec).unwrap_err();
        assert!(err.to_string().contains("both formats"));
    }

    #[test]
    fn marker_overrides_heuristic() {
        let (l, c) = (legacy(), current());
        let rec = record(json!({"name": "w"})).with_format_marker(FormatMarker::Legacy);
        assert!(FormatDetector::new(&l, &c).classify(&rec).unwrap().is_legacy());

        // A marker naming the wrong format is a decode failure, not a guess.
        let wrong = record(json!({"name": "w"})).with_format_marker(FormatMarker::Current);
        assert!(matches!(
            FormatDetector::new(&l, &c).classify(&wrong),
            Err(MigrationError::Decode { .. })
        ));
    }

    #[test]
    fn required_marker() {
        let (l, c) = (legacy(), current());
        let rec = record(json!({"name": "w"}));
        let err = FormatDetector::new(&l, &c)
            .with_required_marker(true)
            .classify(&rec)
            .unwrap_err();
        assert!(err.to_string().contains("marker required"));
    }
}
