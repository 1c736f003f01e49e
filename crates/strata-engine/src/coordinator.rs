//! Merge/split coordination
//!
//! Provides [`SplitTable`] for one value that must become two records, and
//! [`MergeRule`] / [`merge`] for several records that fold into one target
//! collection. Both operate on copies and produce all of their output or
//! none of it.

use std::collections::HashSet;

use strata_record::{AttrPath, Attributes, Fingerprint, Record, ResourceKind, Value};

use crate::diagnostics::Diagnostics;
use crate::error::MigrationError;
use crate::registry::StepOutput;

/// One row of a split table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitRule {
    /// Legacy enumerated value
    pub source: &'static str,
    /// Value written to the source record
    pub primary: &'static str,
    /// Value written to the companion record
    pub companion: &'static str,
}

impl SplitRule {
    /// Create row
    #[inline]
    #[must_use]
    pub const fn new(source: &'static str, primary: &'static str, companion: &'static str) -> Self {
        Self {
            source,
            primary,
            companion,
        }
    }
}

/// Static table splitting one enumerated attribute across two records
///
/// Values that match a row only case-insensitively are coerced to the
/// canonical spelling with a warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitTable {
    /// Attribute holding the legacy value (removed from the source record)
    pub source_attr: &'static str,
    /// Attribute receiving the primary value
    pub primary_attr: &'static str,
    /// Kind of the companion record
    pub companion_kind: &'static str,
    /// Version of the companion record (its kind's current version)
    pub companion_version: u64,
    /// Attribute receiving the companion value
    pub companion_attr: &'static str,
    /// Attributes copied verbatim from source to companion
    pub carried: &'static [&'static str],
    /// Value table
    pub rules: &'static [SplitRule],
}

impl SplitTable {
    /// Look up the row for a legacy value
    ///
    /// # Errors
    /// Returns [`MigrationError::InvalidValue`] if no row matches
    pub fn resolve(&self, value: &str, diags: &mut Diagnostics) -> Result<&SplitRule, MigrationError> {
        if let Some(rule) = self.rules.iter().find(|r| r.source == value) {
            return Ok(rule);
        }
        if let Some(rule) = self.rules.iter().find(|r| r.source.eq_ignore_ascii_case(value)) {
            diags.warn_at(
                "value_coerced",
                AttrPath::single(self.source_attr),
                format!("non-standard value '{value}' coerced to '{}'", rule.source),
            );
            return Ok(rule);
        }
        Err(MigrationError::InvalidValue {
            path: AttrPath::single(self.source_attr),
            value: value.to_string(),
            reason: format!(
                "expected one of {}",
                self.rules.iter().map(|r| r.source).collect::<Vec<_>>().join(", ")
            ),
        })
    }

    /// Split a record into the migrated source and its companion
    ///
    /// # Errors
    /// Returns error if the source value is missing, not a string, or not
    /// in the table
    pub fn split(&self, mut record: Record, diags: &mut Diagnostics) -> Result<StepOutput, MigrationError> {
        let path = AttrPath::single(self.source_attr);
        let (kind, version) = (record.kind().clone(), record.version());
        let attributes = record.attributes_mut();
        let value = match attributes.shift_remove(self.source_attr) {
            Some(Value::String(value)) => value,
            None | Some(Value::Null) => {
                return Err(MigrationError::MissingRequiredField {
                    kind,
                    version,
                    path,
                })
            }
            Some(other) => {
                return Err(MigrationError::InvalidValue {
                    path,
                    value: format!("{other:?}"),
                    reason: "expected a string".into(),
                })
            }
        };
        let rule = self.resolve(&value, diags)?;

        let mut companion = Attributes::new();
        for name in self.carried {
            if let Some(carried) = attributes.get(*name) {
                companion.insert((*name).to_string(), carried.clone());
            }
        }
        companion.insert(self.companion_attr.to_string(), Value::from(rule.companion));
        attributes.insert(self.primary_attr.to_string(), Value::from(rule.primary));

        let companion = Record::new(self.companion_kind, self.companion_version, companion);
        Ok(StepOutput::record(record).with_companion(companion))
    }
}

/// Attribute equality condition on contributors
#[derive(Debug, Clone, PartialEq)]
pub struct MergeFilter {
    /// Contributor attribute
    pub attribute: String,
    /// Required value
    pub equals: Value,
}

/// Rule folding contributor records into a target collection
///
/// A contributor belongs to the target when it carries no `link_attr`
/// (absence means "the default instance"), shares the target's
/// `scope_attr` value, and passes the optional filter. Its `payload_attr`
/// elements are added to the target's `target_attr` with set semantics.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeRule {
    /// Rule name
    pub name: String,
    /// Kind of the target record
    pub target_kind: ResourceKind,
    /// Target collection attribute
    pub target_attr: String,
    /// Kind of contributor records
    pub contributor_kind: ResourceKind,
    /// Link attribute whose presence means "belongs elsewhere"
    pub link_attr: String,
    /// Attribute that must match between target and contributor
    pub scope_attr: Option<String>,
    /// Extra contributor condition
    pub filter: Option<MergeFilter>,
    /// Contributor collection attribute supplying the elements
    pub payload_attr: String,
}

impl MergeRule {
    /// Create rule
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        target: (&str, &str),
        contributor: (&str, &str),
        link_attr: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target_kind: target.0.into(),
            target_attr: target.1.to_string(),
            contributor_kind: contributor.0.into(),
            payload_attr: contributor.1.to_string(),
            link_attr: link_attr.into(),
            scope_attr: None,
            filter: None,
        }
    }

    /// With scope attribute
    #[inline]
    #[must_use]
    pub fn with_scope(mut self, attr: impl Into<String>) -> Self {
        self.scope_attr = Some(attr.into());
        self
    }

    /// With contributor filter
    #[inline]
    #[must_use]
    pub fn with_filter(mut self, attribute: impl Into<String>, equals: impl Into<Value>) -> Self {
        self.filter = Some(MergeFilter {
            attribute: attribute.into(),
            equals: equals.into(),
        });
        self
    }

    /// Check if a contributor belongs to the target under this rule
    #[must_use]
    pub fn matches(&self, target: &Record, contributor: &Record) -> bool {
        if contributor.kind() != &self.contributor_kind {
            return false;
        }
        if contributor.get(&self.link_attr).is_some_and(|v| !v.is_null()) {
            return false;
        }
        if let Some(scope) = &self.scope_attr {
            if target.get(scope) != contributor.get(scope) {
                return false;
            }
        }
        match &self.filter {
            Some(filter) => contributor.get(&filter.attribute) == Some(&filter.equals),
            None => true,
        }
    }
}

/// Merged target and the contributors it absorbed
#[derive(Debug, Clone, PartialEq)]
pub struct MergeResult {
    /// Target with contributor payloads folded in
    pub record: Record,
    /// Sorted indices of absorbed contributors
    pub absorbed: Vec<usize>,
}

/// Apply merge rules to a target record
///
/// All rules run against a copy of the target; on any error the target is
/// left as it was and nothing is absorbed.
///
/// # Errors
/// Returns [`MigrationError::MergeRejected`] if a rule is for another
/// target kind, or a target or payload attribute is not a collection
pub fn merge(
    target: &Record,
    contributors: &[Record],
    rules: &[MergeRule],
) -> Result<MergeResult, MigrationError> {
    let mut merged = target.clone();
    let mut absorbed = HashSet::new();

    for rule in rules {
        if target.kind() != &rule.target_kind {
            return Err(MigrationError::MergeRejected(format!(
                "rule '{}' targets '{}', record is '{}'",
                rule.name,
                rule.target_kind,
                target.kind()
            )));
        }

        let existing = merged.get(&rule.target_attr);
        let mut elements = match existing {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Set(items) | Value::List(items)) => items.clone(),
            Some(other) => {
                return Err(MigrationError::MergeRejected(format!(
                    "target attribute '{}' is {}, not a collection",
                    rule.target_attr,
                    other.shape()
                )))
            }
        };
        let mut seen: HashSet<Fingerprint> = elements.iter().map(Fingerprint::of_element).collect();
        let before = elements.len();

        for (index, contributor) in contributors.iter().enumerate() {
            if !rule.matches(target, contributor) {
                continue;
            }
            match contributor.get(&rule.payload_attr) {
                None | Some(Value::Null) => {}
                Some(Value::Set(items) | Value::List(items)) => {
                    for item in items {
                        if seen.insert(Fingerprint::of_element(item)) {
                            elements.push(item.clone());
                        }
                    }
                }
                Some(other) => {
                    return Err(MigrationError::MergeRejected(format!(
                        "contributor {index} attribute '{}' is {}, not a collection",
                        rule.payload_attr,
                        other.shape()
                    )))
                }
            }
            absorbed.insert(index);
        }

        let added = elements.len() - before;
        tracing::debug!(
            "merge rule '{}': {} element(s) added to {}",
            rule.name,
            added,
            rule.target_attr
        );
        // Nothing new: the attribute keeps its original shape.
        if added > 0 {
            merged
                .attributes_mut()
                .insert(rule.target_attr.clone(), Value::Set(elements));
        }
    }

    let mut absorbed: Vec<usize> = absorbed.into_iter().collect();
    absorbed.sort_unstable();
    Ok(MergeResult {
        record: merged,
        absorbed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CACHE: SplitTable = SplitTable {
        source_attr: "cache_type",
        primary_attr: "value",
        companion_kind: "argo_tiered_caching",
        companion_version: 0,
        companion_attr: "value",
        carried: &["zone_id"],
        rules: &[
            SplitRule::new("generic", "off", "on"),
            SplitRule::new("smart", "on", "on"),
            SplitRule::new("off", "off", "off"),
        ],
    };

    fn record(kind: &str, attrs: serde_json::Value) -> Record {
        let attributes = match Value::from_json(attrs) {
            Value::Object(entries) => entries,
            _ => Attributes::new(),
        };
        Record::new(kind, 0, attributes)
    }

    #[test]
    fn split_generic() {
        let mut diags = Diagnostics::new();
        let out = CACHE
            .split(record("tiered_cache", json!({"zone_id": "z1", "cache_type": "generic"})), &mut diags)
            .unwrap();
        assert_eq!(out.record.get("value"), Some(&Value::from("off")));
        assert!(out.record.get("cache_type").is_none());
        let companion = out.companion.unwrap();
        assert_eq!(companion.kind().as_str(), "argo_tiered_caching");
        assert_eq!(companion.get("value"), Some(&Value::from("on")));
        assert_eq!(companion.get("zone_id"), Some(&Value::from("z1")));
        assert!(diags.is_empty());
    }

    #[test]
    fn split_coerces_case_with_warning() {
        let mut diags = Diagnostics::new();
        let rule = CACHE.resolve("Smart", &mut diags).unwrap();
        assert_eq!(rule.primary, "on");
        assert_eq!(diags.warnings().count(), 1);
        assert_eq!(diags.iter().next().map(|d| d.code), Some("value_coerced"));
    }

    #[test]
    fn split_rejects_unknown_value() {
        let mut diags = Diagnostics::new();
        let err = CACHE.resolve("aggressive", &mut diags).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cache_type: invalid value 'aggressive': expected one of generic, smart, off"
        );
    }

    fn exclude_rule() -> MergeRule {
        MergeRule::new(
            "split_tunnel_exclude",
            ("device_default_profile", "exclude"),
            ("split_tunnel", "tunnels"),
            "policy_id",
        )
        .with_scope("account_id")
        .with_filter("mode", "exclude")
    }

    fn tunnel(attrs: serde_json::Value) -> Record {
        record("split_tunnel", attrs)
    }

    #[test]
    fn merge_two_contributors_as_set() {
        let target = record("device_default_profile", json!({"account_id": "a1"}));
        let contributors = vec![
            tunnel(json!({"account_id": "a1", "mode": "exclude", "tunnels": [{"address": "10.0.0.0/8"}]})),
            tunnel(json!({"account_id": "a1", "mode": "exclude", "tunnels": [{"address": "192.168.0.0/16"}]})),
            tunnel(json!({"account_id": "a1", "mode": "exclude", "tunnels": [{"address": "10.0.0.0/8"}]})),
        ];
        let result = merge(&target, &contributors, &[exclude_rule()]).unwrap();
        let exclude = result.record.get("exclude").unwrap();
        assert_eq!(exclude.as_items().unwrap().len(), 2);
        assert_eq!(result.absorbed, vec![0, 1, 2]);
    }

    #[test]
    fn merge_skips_linked_other_scope_and_filtered() {
        let target = record("device_default_profile", json!({"account_id": "a1"}));
        let contributors = vec![
            tunnel(json!({"account_id": "a1", "mode": "exclude", "policy_id": "p9", "tunnels": [{"address": "1.1.1.1/32"}]})),
            tunnel(json!({"account_id": "a2", "mode": "exclude", "tunnels": [{"address": "2.2.2.2/32"}]})),
            tunnel(json!({"account_id": "a1", "mode": "include", "tunnels": [{"address": "3.3.3.3/32"}]})),
        ];
        let result = merge(&target, &contributors, &[exclude_rule()]).unwrap();
        assert!(result.record.get("exclude").is_none());
        assert!(result.absorbed.is_empty());
    }

    #[test]
    fn merge_treats_null_fields_as_absent() {
        let target = record(
            "device_default_profile",
            json!({"account_id": "a1", "exclude": [{"address": "10.0.0.0/8"}]}),
        );
        let contributors = vec![tunnel(json!({
            "account_id": "a1",
            "mode": "exclude",
            "tunnels": [{"address": "10.0.0.0/8", "host": null, "description": null}]
        }))];
        let result = merge(&target, &contributors, &[exclude_rule()]).unwrap();
        let exclude = result.record.get("exclude").unwrap();
        assert_eq!(exclude.as_items().unwrap().len(), 1);
        assert_eq!(result.absorbed, vec![0]);
    }

    #[test]
    fn merge_without_additions_keeps_target_value() {
        let empty = record("device_default_profile", json!({"account_id": "a1", "exclude": []}));
        let result = merge(&empty, &[], &[exclude_rule()]).unwrap();
        assert_eq!(result.record, empty);
        assert!(matches!(result.record.get("exclude"), Some(Value::List(items)) if items.is_empty()));
        assert!(result.absorbed.is_empty());

        let listed = record(
            "device_default_profile",
            json!({"account_id": "a1", "exclude": [{"address": "10.0.0.0/8"}]}),
        );
        let contributors = vec![tunnel(json!({
            "account_id": "a1",
            "mode": "exclude",
            "tunnels": [{"address": "10.0.0.0/8"}]
        }))];
        let result = merge(&listed, &contributors, &[exclude_rule()]).unwrap();
        assert_eq!(result.record, listed);
        assert_eq!(result.absorbed, vec![0]);
    }

    #[test]
    fn merge_is_all_or_nothing() {
        let target = record("device_default_profile", json!({"account_id": "a1"}));
        let contributors = vec![
            tunnel(json!({"account_id": "a1", "mode": "exclude", "tunnels": [{"address": "10.0.0.0/8"}]})),
            tunnel(json!({"account_id": "a1", "mode": "exclude", "tunnels": "oops"})),
        ];
        let err = merge(&target, &contributors, &[exclude_rule()]).unwrap_err();
        assert_eq!(err.code(), "merge_rejected");
    }

    #[test]
    fn merge_rejects_wrong_target_kind() {
        let target = record("dns_record", json!({}));
        assert!(matches!(
            merge(&target, &[], &[exclude_rule()]),
            Err(MigrationError::MergeRejected(_))
        ));
    }
}
