//! `load_balancer_pool`
//!
//! v0 → v1: `origins` and `check_regions` become lists, the
//! `load_shedding` / `origin_steering` singleton blocks become objects, and
//! each origin's `header { header = "Host", values = [...] }` block becomes
//! `header = { host = [...] }`.

use strata_engine::{Diagnostics, MigrationError, RegistryBuilder, RegistryError, Step, StepOutput};
use strata_record::{AttrPath, AttrType, Attributes, Block, Record, SchemaDescriptor, Value};
use strata_transform::{set_to_list, FieldOp, FieldTransform, Pipeline, TransformError, TransformNote};

use crate::support;

/// Kind name
pub const KIND: &str = "load_balancer_pool";

/// Current version
pub const CURRENT: u64 = 1;

fn load_shedding() -> Block {
    Block::new()
        .optional_with_default("default_percent", AttrType::Number, 0_i64)
        .optional_with_default("default_policy", AttrType::String, "")
        .optional_with_default("session_percent", AttrType::Number, 0_i64)
        .optional_with_default("session_policy", AttrType::String, "")
}

fn origin_steering() -> Block {
    Block::new().optional_with_default("policy", AttrType::String, "random")
}

fn origin_fields() -> Block {
    Block::new()
        .required("name", AttrType::String)
        .required("address", AttrType::String)
        .optional_with_default("enabled", AttrType::Bool, true)
        .optional_with_default("weight", AttrType::Number, 1_i64)
        .optional("virtual_network_id", AttrType::String)
}

fn common(block: Block) -> Block {
    block
        .computed("id", AttrType::String)
        .required("account_id", AttrType::String)
        .required("name", AttrType::String)
        .optional("description", AttrType::String)
        .optional_with_default("enabled", AttrType::Bool, true)
        .optional_with_default("minimum_origins", AttrType::Number, 1_i64)
        .optional("monitor", AttrType::String)
        .optional("notification_email", AttrType::String)
        .optional("latitude", AttrType::Number)
        .optional("longitude", AttrType::Number)
}

/// v0 descriptor
#[must_use]
pub fn schema_v0() -> SchemaDescriptor {
    let origin = origin_fields().singleton_block(
        "header",
        Block::new()
            .required("header", AttrType::String)
            .required("values", AttrType::set(AttrType::String)),
    );
    SchemaDescriptor::new(
        KIND,
        0,
        common(Block::new())
            .required("origins", AttrType::set(AttrType::object(origin)))
            .optional("check_regions", AttrType::set(AttrType::String))
            .singleton_block("load_shedding", load_shedding())
            .singleton_block("origin_steering", origin_steering()),
    )
}

/// v1 descriptor
#[must_use]
pub fn schema_v1() -> SchemaDescriptor {
    let origin = origin_fields().optional(
        "header",
        AttrType::object(Block::new().optional("host", AttrType::list(AttrType::String))),
    );
    SchemaDescriptor::new(
        KIND,
        1,
        common(Block::new())
            .required("origins", AttrType::list(AttrType::object(origin)))
            .optional("check_regions", AttrType::list(AttrType::String))
            .optional("load_shedding", AttrType::object(load_shedding()))
            .optional("origin_steering", AttrType::object(origin_steering())),
    )
}

/// Rewrites each origin's unwrapped `{header, values}` block as `{host}`
///
/// Only the `Host` header was ever accepted; any other name is rejected.
#[derive(Debug)]
struct HostHeader;

impl HostHeader {
    fn rewrite(block: Value, at: &AttrPath) -> Result<Value, TransformError> {
        let mut fields = match block {
            Value::Object(fields) | Value::Map(fields) => fields,
            Value::Null | Value::Unknown => return Ok(block),
            other => return Err(TransformError::shape("object", other.shape()).within(at)),
        };
        let name = fields.shift_remove("header").unwrap_or_default();
        match name.as_str() {
            Some(name) if name.eq_ignore_ascii_case("host") => {}
            _ => {
                return Err(TransformError::InvalidValue {
                    path: at.child("header"),
                    value: format!("{name:?}"),
                    reason: "only the Host header is supported".into(),
                })
            }
        }
        let values = fields.shift_remove("values").unwrap_or_default();
        let host = set_to_list(values).map_err(|e| e.within(&at.child("values")))?;
        Ok(Value::object_from([("host", host)]))
    }
}

impl FieldTransform for HostHeader {
    fn apply(&self, attributes: &mut Attributes) -> Result<Vec<TransformNote>, TransformError> {
        let Some(Value::List(origins)) = attributes.get_mut("origins") else {
            return Ok(Vec::new());
        };
        for (i, origin) in origins.iter_mut().enumerate() {
            let Some(fields) = origin.as_entries_mut() else {
                continue;
            };
            if let Some(slot) = fields.get_mut("header") {
                let at = AttrPath::single("origins").index(i).child("header");
                *slot = Self::rewrite(std::mem::take(slot), &at)?;
            }
        }
        Ok(Vec::new())
    }

    fn describe(&self) -> String {
        "host_header(origins.*.header)".to_string()
    }
}

fn upgrade_v0(
    mut record: Record,
    _prior: &SchemaDescriptor,
    _diags: &mut Diagnostics,
) -> Result<StepOutput, MigrationError> {
    let pipeline = Pipeline::new()
        .then(FieldOp::set_to_list("origins"))
        .then(FieldOp::set_to_list("check_regions"))
        .then(FieldOp::unwrap_singleton("load_shedding"))
        .then(FieldOp::unwrap_singleton("origin_steering"))
        .then(FieldOp::unwrap_singleton("origins.*.header"))
        .then(HostHeader);
    support::run(&pipeline, &mut record, CURRENT)?;
    Ok(StepOutput::record(record))
}

/// Register descriptors and steps
///
/// # Errors
/// Returns error if the kind is already registered
pub fn register(builder: &mut RegistryBuilder) -> Result<(), RegistryError> {
    builder
        .kind(schema_v1())?
        .step(Step::transform(schema_v0(), 1, upgrade_v0))?;
    Ok(())
}
