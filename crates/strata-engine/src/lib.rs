//! Strata Migration Engine
//!
//! Walks versioned records from their stored schema version to the current
//! one through a read-only registry of per-version upgrade steps.
//!
//! # Core Concepts
//!
//! - [`Registry`]: Validated `(kind, version)` → step table, built once
//! - [`Step`]: No-op bump, transform, or ambiguous-format transform
//! - [`Dispatcher`]: Applies a [`MigrationPlan`] atomically, one step at a time
//! - [`FormatDetector`]: Classifies records of versions shared by two formats
//! - [`SplitTable`] / [`MergeRule`]: One record into two, many into one
//! - [`MigrationOutcome`]: What the host must persist, with [`Diagnostics`]
//!
//! # Example
//!
//! ```rust,ignore
//! use strata_engine::{Dispatcher, EngineConfig};
//!
//! let registry = strata_resources::registry()?;
//! let dispatcher = Dispatcher::new(&registry, EngineConfig::default());
//! match dispatcher.dispatch(&record) {
//!     outcome if outcome.is_failed() => eprintln!("{:?}", outcome.diagnostics()),
//!     outcome => persist(outcome.into_records()?),
//! }
//! ```

#![warn(unreachable_pub)]

mod config;
mod coordinator;
mod detect;
mod diagnostics;
mod dispatch;
mod error;
mod outcome;
mod plan;
mod registry;

pub use config::{ConfigError, EngineConfig};
pub use coordinator::{merge, MergeFilter, MergeResult, MergeRule, SplitRule, SplitTable};
pub use detect::{resolve, FormatClass, FormatDetector};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use dispatch::Dispatcher;
pub use error::{MigrationError, RegistryError};
pub use outcome::{MigrationOutcome, OutcomeStatus};
pub use plan::{Applied, AppliedStep, MigrationPlan, MigrationReport, PlannedStep, StepKind};
pub use registry::{Registry, RegistryBuilder, Step, StepAction, StepOutput, TransformFn};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use strata_record::{AttrType, Attributes, Block, FormatMarker, Record, SchemaDescriptor, SchemaVersion, Value};
    use strata_transform::{FieldOp, Pipeline};

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

    fn record(kind: &str, version: u64, attrs: serde_json::Value) -> Record {
        let attributes = match Value::from_json(attrs) {
            Value::Object(entries) => entries,
            _ => Attributes::new(),
        };
        Record::new(kind, version, attributes)
    }

    fn cache_v0() -> SchemaDescriptor {
        SchemaDescriptor::new(
            "tiered_cache",
            0,
            Block::new()
                .required("zone_id", AttrType::String)
                .required("cache_type", AttrType::String),
        )
    }

    fn cache_v1() -> SchemaDescriptor {
        SchemaDescriptor::new(
            "tiered_cache",
            1,
            Block::new()
                .required("zone_id", AttrType::String)
                .required("value", AttrType::String),
        )
    }

    fn argo_v0() -> SchemaDescriptor {
        SchemaDescriptor::new(
            "argo_tiered_caching",
            0,
            Block::new()
                .required("zone_id", AttrType::String)
                .required("value", AttrType::String),
        )
    }

    fn split_cache(
        record: Record,
        _prior: &SchemaDescriptor,
        diags: &mut Diagnostics,
    ) -> Result<StepOutput, MigrationError> {
        CACHE.split(record, diags)
    }

    fn script_legacy() -> SchemaDescriptor {
        SchemaDescriptor::new(
            "workers_script",
            0,
            Block::new()
                .required("name", AttrType::String)
                .optional("compatibility_flags", AttrType::set(AttrType::String)),
        )
    }

    fn script_current(version: u64) -> SchemaDescriptor {
        SchemaDescriptor::new(
            "workers_script",
            version,
            Block::new()
                .required("script_name", AttrType::String)
                .optional("compatibility_flags", AttrType::list(AttrType::String)),
        )
    }

    fn upgrade_script(
        mut record: Record,
        _prior: &SchemaDescriptor,
        _diags: &mut Diagnostics,
    ) -> Result<StepOutput, MigrationError> {
        let kind = record.kind().clone();
        Pipeline::new()
            .then(FieldOp::rename("name", "script_name"))
            .then(FieldOp::set_to_list("compatibility_flags"))
            .apply(record.attributes_mut())
            .map_err(|e| MigrationError::from_transform(e, &kind, SchemaVersion::new(1)))?;
        Ok(StepOutput::record(record))
    }

    fn registry() -> Registry {
        let mut builder = Registry::builder();
        builder
            .kind(cache_v1())
            .unwrap()
            .kind(argo_v0())
            .unwrap()
            .kind(script_current(1))
            .unwrap()
            .step(Step::transform(cache_v0(), 1, split_cache))
            .unwrap()
            .step(Step::ambiguous(script_current(0), script_legacy(), 1, upgrade_script))
            .unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn split_yields_both_records() {
        let registry = registry();
        let dispatcher = Dispatcher::new(&registry, EngineConfig::default());
        let input = record("tiered_cache", 0, json!({"zone_id": "z1", "cache_type": "generic"}));
        let outcome = dispatcher.dispatch(&input);

        assert_eq!(outcome.status(), OutcomeStatus::SplitPending);
        let records = outcome.into_records().unwrap();
        assert_eq!(records[0].get("value"), Some(&Value::from("off")));
        assert_eq!(records[0].version(), SchemaVersion::new(1));
        assert_eq!(records[1].kind().as_str(), "argo_tiered_caching");
        assert_eq!(records[1].get("value"), Some(&Value::from("on")));
        assert_eq!(records[1].get("zone_id"), Some(&Value::from("z1")));
    }

    #[test]
    fn split_coerces_with_warning() {
        let registry = registry();
        let dispatcher = Dispatcher::new(&registry, EngineConfig::default());
        let input = record("tiered_cache", 0, json!({"zone_id": "z1", "cache_type": "Smart"}));
        let outcome = dispatcher.dispatch(&input);
        assert_eq!(outcome.status(), OutcomeStatus::SplitPending);
        let codes: Vec<_> = outcome.diagnostics().warnings().map(|d| d.code).collect();
        assert_eq!(codes, vec!["value_coerced"]);
    }

    #[test]
    fn split_rejects_unknown_value() {
        let registry = registry();
        let dispatcher = Dispatcher::new(&registry, EngineConfig::default());
        let input = record("tiered_cache", 0, json!({"zone_id": "z1", "cache_type": "turbo"}));
        let outcome = dispatcher.dispatch(&input);
        assert_eq!(outcome.error().map(MigrationError::code), Some("invalid_value"));
        assert!(outcome.records().is_empty());
    }

    #[test]
    fn ambiguous_version_both_paths() {
        let registry = registry();
        let dispatcher = Dispatcher::new(&registry, EngineConfig::default());

        let legacy = record("workers_script", 0, json!({"name": "w", "compatibility_flags": ["a", "b"]}));
        let outcome = dispatcher.dispatch(&legacy);
        assert_eq!(outcome.report().steps[0].applied, Applied::LegacyFormat);
        assert_eq!(outcome.record().unwrap().get("script_name"), Some(&Value::from("w")));

        let current = record("workers_script", 0, json!({"script_name": "w"}));
        let outcome = dispatcher.dispatch(&current);
        assert_eq!(outcome.report().steps[0].applied, Applied::CurrentFormat);
        let migrated = outcome.record().unwrap();
        assert_eq!(migrated.version(), SchemaVersion::new(1));
        assert_eq!(migrated.attributes(), current.attributes());
    }

    #[test]
    fn marker_is_cleared_after_detection() {
        let registry = registry();
        let dispatcher = Dispatcher::new(
            &registry,
            EngineConfig::default().with_required_format_marker(true),
        );
        let unmarked = record("workers_script", 0, json!({"name": "w"}));
        assert_eq!(
            dispatcher.dispatch(&unmarked).error().map(MigrationError::code),
            Some("ambiguous_format_unresolved")
        );

        let marked = unmarked.with_format_marker(FormatMarker::Legacy);
        let outcome = dispatcher.dispatch(&marked);
        assert_eq!(outcome.record().unwrap().format_marker(), None);
    }

    #[test]
    fn merge_group() {
        let mut builder = Registry::builder();
        builder
            .kind(SchemaDescriptor::new(
                "device_default_profile",
                0,
                Block::new()
                    .required("account_id", AttrType::String)
                    .optional("exclude", AttrType::set(AttrType::String)),
            ))
            .unwrap()
            .kind(SchemaDescriptor::new(
                "split_tunnel",
                0,
                Block::new()
                    .required("account_id", AttrType::String)
                    .optional("policy_id", AttrType::String)
                    .required("mode", AttrType::String)
                    .required("tunnels", AttrType::set(AttrType::String)),
            ))
            .unwrap();
        let registry = builder.build().unwrap();
        let dispatcher = Dispatcher::new(&registry, EngineConfig::default());

        let rule = MergeRule::new(
            "split_tunnel_exclude",
            ("device_default_profile", "exclude"),
            ("split_tunnel", "tunnels"),
            "policy_id",
        )
        .with_scope("account_id")
        .with_filter("mode", "exclude");

        let target = record("device_default_profile", 0, json!({"account_id": "a"}));
        let contributors = vec![
            record("split_tunnel", 0, json!({"account_id": "a", "mode": "exclude", "tunnels": ["10.0.0.0/8"]})),
            record("split_tunnel", 0, json!({"account_id": "a", "mode": "include", "tunnels": ["x"]})),
            record("split_tunnel", 0, json!({"account_id": "a", "policy_id": "p", "mode": "exclude", "tunnels": ["y"]})),
        ];
        let outcome = dispatcher.dispatch_merge(&target, &contributors, &[rule.clone()]);
        match &outcome {
            MigrationOutcome::Merged { record, absorbed, .. } => {
                assert_eq!(absorbed, &vec![0]);
                assert_eq!(record.get("exclude"), Some(&Value::set_from(["10.0.0.0/8".into()])));
            }
            other => panic!("expected merge, got {other:?}"),
        }

        let bad = vec![record("split_tunnel", 3, json!({}))];
        let outcome = dispatcher.dispatch_merge(&target, &bad, &[rule]);
        assert_eq!(outcome.error().map(MigrationError::code), Some("merge_rejected"));
    }
}
