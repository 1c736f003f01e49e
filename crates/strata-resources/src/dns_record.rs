//! `dns_record`
//!
//! v0 → v1 is a no-op. v1 → v2 renames `value` to `content`, unwraps the
//! `data` block, turns `tags` into a list, and makes `ttl` required. The
//! computed `hostname` and the provider-side `allow_overwrite` flag have no
//! v2 counterpart and are dropped.

use strata_engine::{Diagnostics, MigrationError, RegistryBuilder, RegistryError, Step, StepOutput};
use strata_record::{AttrType, Block, Record, SchemaDescriptor};
use strata_transform::{FieldOp, Pipeline};

use crate::support;

/// Kind name
pub const KIND: &str = "dns_record";

/// Current version
pub const CURRENT: u64 = 2;

/// TTL applied by v1 when unset ("automatic")
const AUTOMATIC_TTL: i64 = 1;

fn data_block() -> Block {
    Block::new()
        .optional("flags", AttrType::Number)
        .optional("tag", AttrType::String)
        .optional("value", AttrType::String)
        .optional("priority", AttrType::Number)
        .optional("weight", AttrType::Number)
        .optional("port", AttrType::Number)
        .optional("target", AttrType::String)
}

fn legacy_block() -> Block {
    Block::new()
        .computed("id", AttrType::String)
        .required("zone_id", AttrType::String)
        .required("name", AttrType::String)
        .required("type", AttrType::String)
        .optional("value", AttrType::String)
        .singleton_block("data", data_block())
        .optional_with_default("ttl", AttrType::Number, AUTOMATIC_TTL)
        .optional("priority", AttrType::Number)
        .optional("proxied", AttrType::Bool)
        .optional("comment", AttrType::String)
        .optional("tags", AttrType::set(AttrType::String))
        .computed("hostname", AttrType::String)
        .optional_with_default("allow_overwrite", AttrType::Bool, false)
}

/// v0 descriptor
#[must_use]
pub fn schema_v0() -> SchemaDescriptor {
    SchemaDescriptor::new(KIND, 0, legacy_block())
}

/// v1 descriptor (same shape as v0)
#[must_use]
pub fn schema_v1() -> SchemaDescriptor {
    SchemaDescriptor::new(KIND, 1, legacy_block())
}

/// v2 descriptor
#[must_use]
pub fn schema_v2() -> SchemaDescriptor {
    SchemaDescriptor::new(
        KIND,
        2,
        Block::new()
            .computed("id", AttrType::String)
            .required("zone_id", AttrType::String)
            .required("name", AttrType::String)
            .required("type", AttrType::String)
            .optional("content", AttrType::String)
            .optional("data", AttrType::object(data_block()))
            .required("ttl", AttrType::Number)
            .optional("priority", AttrType::Number)
            .optional("proxied", AttrType::Bool)
            .optional("comment", AttrType::String)
            .optional("tags", AttrType::list(AttrType::String)),
    )
}

fn upgrade_v1(
    mut record: Record,
    _prior: &SchemaDescriptor,
    _diags: &mut Diagnostics,
) -> Result<StepOutput, MigrationError> {
    let pipeline = Pipeline::new()
        .then(FieldOp::rename("value", "content"))
        .then(FieldOp::unwrap_singleton("data"))
        .then(FieldOp::set_to_list("tags"))
        .then(FieldOp::reconcile_default("ttl", AUTOMATIC_TTL))
        .then(FieldOp::drop("hostname"))
        .then(FieldOp::drop("allow_overwrite"));
    support::run(&pipeline, &mut record, CURRENT)?;
    Ok(StepOutput::record(record))
}

/// Register descriptors and steps
///
/// # Errors
/// Returns error if the kind is already registered
pub fn register(builder: &mut RegistryBuilder) -> Result<(), RegistryError> {
    builder
        .kind(schema_v2())?
        .step(Step::noop(schema_v0(), 1))?
        .step(Step::transform(schema_v1(), 2, upgrade_v1))?;
    Ok(())
}
