//! `load_balancer`
//!
//! v0 → v1 renames the pool references, unwraps every singleton block
//! (including the per-rule `overrides` and `fixed_response`), re-keys the
//! region / PoP / country pool lists into maps, and writes the old
//! `session_affinity` default explicitly.

use strata_engine::{Diagnostics, MigrationError, RegistryBuilder, RegistryError, Step, StepOutput};
use strata_record::{AttrType, Block, Record, SchemaDescriptor};
use strata_transform::{FieldOp, Pipeline};

use crate::support;

/// Kind name
pub const KIND: &str = "load_balancer";

/// Current version
pub const CURRENT: u64 = 1;

/// `session_affinity` default before v1
const SESSION_AFFINITY_DEFAULT: &str = "none";

/// `(attribute, key field)` of every geo-keyed pool collection
const POOL_MAPS: [(&str, &str); 3] = [
    ("region_pools", "region"),
    ("pop_pools", "pop"),
    ("country_pools", "country"),
];

fn pool_list(key: &str) -> AttrType {
    AttrType::set(AttrType::object(
        Block::new()
            .required(key, AttrType::String)
            .required("pool_ids", AttrType::list(AttrType::String)),
    ))
}

fn pool_map() -> AttrType {
    AttrType::map(AttrType::list(AttrType::String))
}

fn session_affinity_attributes() -> Block {
    Block::new()
        .optional("samesite", AttrType::String)
        .optional("secure", AttrType::String)
        .optional("drain_duration", AttrType::Number)
        .optional("zero_downtime_failover", AttrType::String)
}

fn adaptive_routing() -> Block {
    Block::new().optional_with_default("failover_across_pools", AttrType::Bool, false)
}

fn random_steering() -> Block {
    Block::new()
        .optional("default_weight", AttrType::Number)
        .optional("pool_weights", AttrType::map(AttrType::Number))
}

fn fixed_response() -> Block {
    Block::new()
        .optional("message_body", AttrType::String)
        .optional("status_code", AttrType::Number)
        .optional("content_type", AttrType::String)
        .optional("location", AttrType::String)
}

/// Attributes shared by the load balancer and its rule overrides
fn steering(block: Block, legacy: bool) -> Block {
    let pools = |key: &str| if legacy { pool_list(key) } else { pool_map() };
    let nested = |block: Block, name: &str, inner: Block| {
        if legacy {
            block.singleton_block(name, inner)
        } else {
            block.optional(name, AttrType::object(inner))
        }
    };
    let block = block
        .optional("steering_policy", AttrType::String)
        .optional("session_affinity_ttl", AttrType::Number)
        .optional("ttl", AttrType::Number)
        .optional("region_pools", pools("region"))
        .optional("pop_pools", pools("pop"))
        .optional("country_pools", pools("country"));
    let block = nested(block, "session_affinity_attributes", session_affinity_attributes());
    let block = nested(block, "adaptive_routing", adaptive_routing());
    nested(block, "random_steering", random_steering())
}

fn rules(legacy: bool) -> AttrType {
    let mut overrides = steering(Block::new(), legacy).optional("session_affinity", AttrType::String);
    let mut rule = Block::new()
        .required("name", AttrType::String)
        .optional("condition", AttrType::String)
        .optional("priority", AttrType::Number)
        .optional_with_default("disabled", AttrType::Bool, false)
        .optional("terminates", AttrType::Bool);
    if legacy {
        overrides = overrides
            .optional("fallback_pool_id", AttrType::String)
            .optional("default_pool_ids", AttrType::list(AttrType::String));
        rule = rule
            .singleton_block("overrides", overrides)
            .singleton_block("fixed_response", fixed_response());
    } else {
        overrides = overrides
            .optional("fallback_pool", AttrType::String)
            .optional("default_pools", AttrType::list(AttrType::String));
        rule = rule
            .optional("overrides", AttrType::object(overrides))
            .optional("fixed_response", AttrType::object(fixed_response()));
    }
    AttrType::list(AttrType::object(rule))
}

fn common() -> Block {
    Block::new()
        .computed("id", AttrType::String)
        .required("zone_id", AttrType::String)
        .required("name", AttrType::String)
        .optional("description", AttrType::String)
        .optional_with_default("enabled", AttrType::Bool, true)
        .optional_with_default("proxied", AttrType::Bool, false)
}

/// v0 descriptor
#[must_use]
pub fn schema_v0() -> SchemaDescriptor {
    let block = common()
        .required("fallback_pool_id", AttrType::String)
        .required("default_pool_ids", AttrType::list(AttrType::String))
        .optional_with_default("session_affinity", AttrType::String, SESSION_AFFINITY_DEFAULT);
    SchemaDescriptor::new(
        KIND,
        0,
        steering(block, true).optional("rules", rules(true)),
    )
}

/// v1 descriptor
#[must_use]
pub fn schema_v1() -> SchemaDescriptor {
    let block = common()
        .required("fallback_pool", AttrType::String)
        .required("default_pools", AttrType::list(AttrType::String))
        .optional_computed("session_affinity", AttrType::String);
    SchemaDescriptor::new(
        KIND,
        1,
        steering(block, false).optional("rules", rules(false)),
    )
}

fn steering_ops(pipeline: &mut Pipeline, prefix: &str) {
    for block in ["session_affinity_attributes", "adaptive_routing", "random_steering"] {
        pipeline.push(FieldOp::unwrap_singleton(&format!("{prefix}{block}")));
    }
    for (attr, key) in POOL_MAPS {
        pipeline.push(FieldOp::rekey_field(&format!("{prefix}{attr}"), key, "pool_ids"));
    }
}

fn upgrade_v0(
    mut record: Record,
    _prior: &SchemaDescriptor,
    _diags: &mut Diagnostics,
) -> Result<StepOutput, MigrationError> {
    let mut pipeline = Pipeline::new()
        .then(FieldOp::rename("fallback_pool_id", "fallback_pool"))
        .then(FieldOp::rename("default_pool_ids", "default_pools"))
        .then(FieldOp::reconcile_default("session_affinity", SESSION_AFFINITY_DEFAULT))
        .then(FieldOp::unwrap_singleton("rules.*.overrides"))
        .then(FieldOp::unwrap_singleton("rules.*.fixed_response"))
        .then(FieldOp::rename("rules.*.overrides.fallback_pool_id", "fallback_pool"))
        .then(FieldOp::rename("rules.*.overrides.default_pool_ids", "default_pools"));
    steering_ops(&mut pipeline, "");
    steering_ops(&mut pipeline, "rules.*.overrides.");
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
