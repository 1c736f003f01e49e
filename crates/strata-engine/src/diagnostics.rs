//! Migration diagnostics
//!
//! Provides [`Diagnostics`], the ordered list of errors and warnings a
//! migration surfaces to the host. Any error-severity entry means the
//! output must not be persisted.

use std::fmt::{self, Display, Formatter};

use serde::Serialize;
use strata_record::AttrPath;

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Aborts the migration
    Error,
    /// Surfaced to the operator, does not abort
    Warning,
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => f.write_str("error"),
            Self::Warning => f.write_str("warning"),
        }
    }
}

/// Single diagnostic entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Severity
    pub severity: Severity,

    /// Stable machine-readable code (`missing_required_field`, `value_coerced`, ...)
    pub code: &'static str,

    /// Human-readable description
    pub summary: String,

    /// Attribute the entry refers to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<AttrPath>,
}

impl Diagnostic {
    /// Create error entry
    #[inline]
    #[must_use]
    pub fn error(code: &'static str, summary: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            summary: summary.into(),
            attribute: None,
        }
    }

    /// Create warning entry
    #[inline]
    #[must_use]
    pub fn warning(code: &'static str, summary: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            summary: summary.into(),
            attribute: None,
        }
    }

    /// Attach the attribute path
    #[inline]
    #[must_use]
    pub fn at(mut self, attribute: AttrPath) -> Self {
        self.attribute = Some(attribute);
        self
    }

    /// Check if this entry aborts the migration
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.severity, self.code)?;
        if let Some(attribute) = &self.attribute {
            write!(f, " {attribute}")?;
        }
        write!(f, ": {}", self.summary)
    }
}

/// Ordered diagnostics list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    /// Create empty list
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry
    #[inline]
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    /// Append a warning
    #[inline]
    pub fn warn(&mut self, code: &'static str, summary: impl Into<String>) {
        self.push(Diagnostic::warning(code, summary));
    }

    /// Append a warning about one attribute
    #[inline]
    pub fn warn_at(&mut self, code: &'static str, attribute: AttrPath, summary: impl Into<String>) {
        self.push(Diagnostic::warning(code, summary).at(attribute));
    }

    /// Append an error
    #[inline]
    pub fn error(&mut self, code: &'static str, summary: impl Into<String>) {
        self.push(Diagnostic::error(code, summary));
    }

    /// Append all entries of another list
    #[inline]
    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    /// Check if any entry is an error
    #[inline]
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.0.iter().any(Diagnostic::is_error)
    }

    /// Iterate errors
    #[inline]
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(|d| d.is_error())
    }

    /// Iterate warnings
    #[inline]
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(|d| !d.is_error())
    }

    /// Iterate all entries in order
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    /// Entries from index `start` on
    #[inline]
    #[must_use]
    pub fn since(&self, start: usize) -> &[Diagnostic] {
        self.0.get(start..).unwrap_or_default()
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if list is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume into entries
    #[inline]
    #[must_use]
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.0
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_filtering() {
        let mut diags = Diagnostics::new();
        diags.warn("value_coerced", "'Smart' coerced to 'smart'");
        assert!(!diags.has_errors());
        diags.error("missing_required_field", "ttl is required");
        assert!(diags.has_errors());
        assert_eq!(diags.errors().count(), 1);
        assert_eq!(diags.warnings().count(), 1);
        assert_eq!(diags.since(1).len(), 1);
        assert!(diags.since(5).is_empty());
    }

    #[test]
    fn display_includes_attribute() {
        let diag = Diagnostic::warning("attribute_dropped", "not declared")
            .at(AttrPath::dotted("rules.0.legacy"));
        assert_eq!(
            diag.to_string(),
            "warning [attribute_dropped] rules.0.legacy: not declared"
        );
    }

    #[test]
    fn serializes_lowercase_severity() {
        let diag = Diagnostic::error("unregistered_version", "no step");
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(json["severity"], "error");
        assert!(json.get("attribute").is_none());
    }
}
