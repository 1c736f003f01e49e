//! `workers_script`
//!
//! Version 0 was written by two producers. The legacy producer stored
//! bindings as flat per-type maps and the placement block as a singleton
//! list; the newer producer already wrote the v1 shape under version 0.
//! The step is therefore ambiguous: legacy records are transformed, newer
//! ones only have their version bumped.

use strata_engine::{Diagnostics, MigrationError, RegistryBuilder, RegistryError, Step, StepOutput};
use strata_record::{AttrPath, AttrType, Block, Record, SchemaDescriptor, SchemaVersion, Value};
use strata_transform::{merge_tagged, take, FieldOp, Pipeline, TaggedSource};

use crate::support;

/// Kind name
pub const KIND: &str = "workers_script";

/// Current version
pub const CURRENT: u64 = 1;

/// `usage_model` default of the legacy producer
const LEGACY_USAGE_MODEL: &str = "bundled";

/// `usage_model` default since v1
const USAGE_MODEL: &str = "standard";

/// Upload part name the legacy producer used for script content
const SCRIPT_PART: &str = "worker.js";

/// `(legacy map attribute, binding tag)` merged into `bindings`
const TEXT_BINDINGS: [(&str, &str); 2] = [
    ("plain_text_binding", "plain_text"),
    ("secret_text_binding", "secret_text"),
];

fn placement() -> Block {
    Block::new().optional("mode", AttrType::String)
}

/// Legacy-producer descriptor for version 0
#[must_use]
pub fn schema_v0_legacy() -> SchemaDescriptor {
    SchemaDescriptor::new(
        KIND,
        0,
        Block::new()
            .computed("id", AttrType::String)
            .required("account_id", AttrType::String)
            .required("name", AttrType::String)
            .required("content", AttrType::String)
            .optional_with_default("module", AttrType::Bool, false)
            .optional("compatibility_date", AttrType::String)
            .optional("compatibility_flags", AttrType::set(AttrType::String))
            .optional("logpush", AttrType::Bool)
            .optional_with_default("usage_model", AttrType::String, LEGACY_USAGE_MODEL)
            .optional("plain_text_binding", AttrType::map(AttrType::String))
            .optional("secret_text_binding", AttrType::map(AttrType::String))
            .optional("kv_namespace_binding", AttrType::map(AttrType::String))
            .optional("r2_bucket_binding", AttrType::map(AttrType::String))
            .singleton_block("placement", placement()),
    )
}

fn current_block() -> Block {
    Block::new()
        .computed("id", AttrType::String)
        .required("account_id", AttrType::String)
        .required("script_name", AttrType::String)
        .required("content", AttrType::String)
        .optional("main_module", AttrType::String)
        .optional("body_part", AttrType::String)
        .optional("compatibility_date", AttrType::String)
        .optional("compatibility_flags", AttrType::list(AttrType::String))
        .optional("logpush", AttrType::Bool)
        .optional_with_default("usage_model", AttrType::String, USAGE_MODEL)
        .optional(
            "bindings",
            AttrType::map(AttrType::object(
                Block::new()
                    .required("type", AttrType::String)
                    .required("text", AttrType::String),
            )),
        )
        .optional(
            "kv_namespaces",
            AttrType::map(AttrType::object(Block::new().required("id", AttrType::String))),
        )
        .optional(
            "r2_buckets",
            AttrType::map(AttrType::object(
                Block::new().required("bucket_name", AttrType::String),
            )),
        )
        .optional("placement", AttrType::object(placement()))
}

/// Newer-producer descriptor for version 0 (same shape as v1)
#[must_use]
pub fn schema_v0() -> SchemaDescriptor {
    SchemaDescriptor::new(KIND, 0, current_block())
}

/// v1 descriptor
#[must_use]
pub fn schema_v1() -> SchemaDescriptor {
    SchemaDescriptor::new(KIND, 1, current_block())
}

fn upgrade_legacy(
    mut record: Record,
    _prior: &SchemaDescriptor,
    diags: &mut Diagnostics,
) -> Result<StepOutput, MigrationError> {
    let pipeline = Pipeline::new()
        .then(FieldOp::rename("name", "script_name"))
        .then(FieldOp::set_to_list("compatibility_flags"))
        .then(FieldOp::unwrap_singleton("placement"))
        .then(FieldOp::wrap_values("kv_namespace_binding", "id"))
        .then(FieldOp::rename("kv_namespace_binding", "kv_namespaces"))
        .then(FieldOp::wrap_values("r2_bucket_binding", "bucket_name"))
        .then(FieldOp::rename("r2_bucket_binding", "r2_buckets"))
        .then(FieldOp::reconcile_default("usage_model", LEGACY_USAGE_MODEL));
    support::run(&pipeline, &mut record, CURRENT)?;

    let kind = record.kind().clone();
    let attributes = record.attributes_mut();
    let sources = TEXT_BINDINGS
        .iter()
        .map(|(attr, tag)| TaggedSource::new(*tag, take(attributes, attr)))
        .collect();
    let bindings = merge_tagged(sources, "text", "type")
        .map_err(|e| e.within(&AttrPath::single("bindings")));
    match bindings {
        Ok(Value::Null) => {}
        Ok(bindings) => {
            attributes.insert("bindings".to_string(), bindings);
        }
        Err(err) => {
            return Err(MigrationError::from_transform(err, &kind, SchemaVersion::new(CURRENT)))
        }
    }

    let module = take(attributes, "module");
    let part = if module.as_bool().unwrap_or(false) {
        "main_module"
    } else {
        "body_part"
    };
    attributes.insert(part.to_string(), Value::from(SCRIPT_PART));

    if attributes.get("bindings").is_some_and(|b| b.as_entries().is_some_and(|e| {
        e.values().any(|v| v.get("type") == Some(&Value::from("secret_text")))
    })) {
        diags.warn_at(
            "secret_binding_migrated",
            AttrPath::single("bindings"),
            "secret text bindings were carried over in state; rotate if the state file was shared",
        );
    }

    Ok(StepOutput::record(record))
}

/// Register descriptors and the ambiguous v0 step
///
/// # Errors
/// Returns error if the kind is already registered
pub fn register(builder: &mut RegistryBuilder) -> Result<(), RegistryError> {
    builder
        .kind(schema_v1())?
        .step(Step::ambiguous(schema_v0(), schema_v0_legacy(), 1, upgrade_legacy))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use strata_engine::{Applied, Dispatcher, EngineConfig, MigrationOutcome, Registry};
    use strata_record::FormatMarker;
    use strata_test_utils::{assert_failed_with, assert_upgraded, record_from_json};

    fn registry() -> Registry {
        let mut builder = Registry::builder();
        register(&mut builder).unwrap();
        builder.build().unwrap()
    }

    fn dispatch(record: &Record) -> MigrationOutcome {
        let registry = registry();
        Dispatcher::new(&registry, EngineConfig::default()).dispatch(record)
    }

    fn legacy(extra: serde_json::Value) -> Record {
        let mut attrs = json!({"account_id": "acc", "name": "edge", "content": "export default {}"});
        if let (Some(base), Some(extra)) = (attrs.as_object_mut(), extra.as_object()) {
            base.extend(extra.clone());
        }
        record_from_json(KIND, 0, attrs)
    }

    #[test]
    fn legacy_format_is_transformed() {
        let input = legacy(json!({
            "module": true,
            "compatibility_flags": ["nodejs_compat"],
            "plain_text_binding": {"ENV": "prod"},
            "kv_namespace_binding": {"MY_KV": "abc123"},
            "r2_bucket_binding": {"ASSETS": "assets-bucket"},
            "placement": [{"mode": "smart"}]
        }));
        let outcome = dispatch(&input);
        let migrated = assert_upgraded(&outcome);
        assert_eq!(outcome.report().steps[0].applied, Applied::LegacyFormat);

        assert_eq!(migrated.get("script_name"), Some(&Value::from("edge")));
        assert!(migrated.get("name").is_none());
        assert_eq!(migrated.get("main_module"), Some(&Value::from("worker.js")));
        assert!(migrated.get("module").is_none());
        assert_eq!(
            migrated.get("kv_namespaces"),
            Some(&Value::map_from([("MY_KV", Value::object_from([("id", Value::from("abc123"))]))]))
        );
        assert_eq!(
            migrated.get("r2_buckets").and_then(|m| m.get("ASSETS")).and_then(|b| b.get("bucket_name")),
            Some(&Value::from("assets-bucket"))
        );
        assert_eq!(
            migrated.get("bindings").and_then(|m| m.get("ENV")),
            Some(&Value::object_from([("type", Value::from("plain_text")), ("text", Value::from("prod"))]))
        );
        assert_eq!(migrated.get("placement").and_then(|p| p.get("mode")), Some(&Value::from("smart")));
        assert_eq!(
            migrated.get("compatibility_flags"),
            Some(&Value::list_from(["nodejs_compat".into()]))
        );
    }

    #[test]
    fn legacy_usage_model_default_is_written() {
        let outcome = dispatch(&legacy(json!({})));
        let migrated = assert_upgraded(&outcome);
        assert_eq!(migrated.get("usage_model"), Some(&Value::from("bundled")));
        assert_eq!(migrated.get("body_part"), Some(&Value::from("worker.js")));
        assert!(migrated.get("bindings").is_none());
    }

    #[test]
    fn current_format_is_only_bumped() {
        let input = record_from_json(
            KIND,
            0,
            json!({
                "account_id": "acc",
                "script_name": "edge",
                "content": "export default {}",
                "placement": {"mode": "smart"},
                "kv_namespaces": {"MY_KV": {"id": "abc123"}}
            }),
        );
        let outcome = dispatch(&input);
        let migrated = assert_upgraded(&outcome);
        assert_eq!(outcome.report().steps[0].applied, Applied::CurrentFormat);
        assert_eq!(migrated.version(), SchemaVersion::new(1));
        assert_eq!(migrated.attributes(), input.attributes());
    }

    #[test]
    fn secret_bindings_merge_with_tag_and_warn() {
        let input = legacy(json!({
            "plain_text_binding": {"ENV": "prod"},
            "secret_text_binding": {"TOKEN": "s3cr3t"}
        }));
        let outcome = dispatch(&input);
        let migrated = assert_upgraded(&outcome);
        let bindings = migrated.get("bindings").and_then(Value::as_entries).unwrap();
        assert_eq!(bindings.len(), 2);
        assert_eq!(
            bindings.get("TOKEN").and_then(|b| b.get("type")),
            Some(&Value::from("secret_text"))
        );
        let codes: Vec<_> = outcome.diagnostics().warnings().map(|d| d.code).collect();
        assert_eq!(codes, vec!["secret_binding_migrated"]);
    }

    #[test]
    fn colliding_binding_names_fail() {
        let input = legacy(json!({
            "plain_text_binding": {"API": "a"},
            "secret_text_binding": {"API": "b"}
        }));
        let outcome = dispatch(&input);
        let error = assert_failed_with(&outcome, "merge_conflict");
        assert!(error.to_string().contains("API"), "{error}");
    }

    #[test]
    fn unrecognized_shape_is_unresolved() {
        let input = record_from_json(KIND, 0, json!({"account_id": "acc", "content": "x"}));
        assert_failed_with(&dispatch(&input), "ambiguous_format_unresolved");
    }

    #[test]
    fn marker_skips_heuristic() {
        let input = legacy(json!({})).with_format_marker(FormatMarker::Legacy);
        let outcome = dispatch(&input);
        assert_eq!(outcome.report().steps[0].applied, Applied::LegacyFormat);
        assert_eq!(assert_upgraded(&outcome).format_marker(), None);
    }
}
