//! `device_default_profile` and its merge contributor `split_tunnel`
//!
//! v0 → v1 gathers the flat `service_mode_v2_*` attributes into one
//! `service_mode_v2` object. Split tunnel records without a `policy_id`
//! used to apply to the account's default profile; they are folded into the
//! profile's `exclude` / `include` sets by [`merge_rules`].

use strata_engine::{
    Diagnostics, MergeRule, MigrationError, RegistryBuilder, RegistryError, Step, StepOutput,
};
use strata_record::{AttrType, Block, Record, SchemaDescriptor};
use strata_transform::nest;

use crate::support;

/// Kind name
pub const KIND: &str = "device_default_profile";

/// Contributor kind name
pub const SPLIT_TUNNEL_KIND: &str = "split_tunnel";

/// Current version
pub const CURRENT: u64 = 1;

/// Merge rule for excluded tunnels
pub const EXCLUDE_RULE: &str = "split_tunnel_exclude";
/// Merge rule for included tunnels
pub const INCLUDE_RULE: &str = "split_tunnel_include";

fn tunnel_entry() -> AttrType {
    AttrType::object(
        Block::new()
            .optional("address", AttrType::String)
            .optional("host", AttrType::String)
            .optional("description", AttrType::String),
    )
}

fn common(block: Block) -> Block {
    block
        .optional("allow_mode_switch", AttrType::Bool)
        .optional("auto_connect", AttrType::Number)
        .optional("captive_portal", AttrType::Number)
        .optional("switch_locked", AttrType::Bool)
        .optional("exclude", AttrType::set(tunnel_entry()))
        .optional("include", AttrType::set(tunnel_entry()))
}

/// v0 descriptor
#[must_use]
pub fn schema_v0() -> SchemaDescriptor {
    SchemaDescriptor::new(
        KIND,
        0,
        common(
            Block::new()
                .required("account_id", AttrType::String)
                .optional("service_mode_v2_mode", AttrType::String)
                .optional("service_mode_v2_port", AttrType::Number),
        ),
    )
}

/// v1 descriptor
#[must_use]
pub fn schema_v1() -> SchemaDescriptor {
    SchemaDescriptor::new(
        KIND,
        1,
        common(
            Block::new().required("account_id", AttrType::String).optional(
                "service_mode_v2",
                AttrType::object(
                    Block::new()
                        .optional("mode", AttrType::String)
                        .optional("port", AttrType::Number),
                ),
            ),
        ),
    )
}

/// Split tunnel descriptor
#[must_use]
pub fn split_tunnel_schema() -> SchemaDescriptor {
    SchemaDescriptor::new(
        SPLIT_TUNNEL_KIND,
        0,
        Block::new()
            .computed("id", AttrType::String)
            .required("account_id", AttrType::String)
            .optional("policy_id", AttrType::String)
            .required("mode", AttrType::String)
            .required("tunnels", AttrType::set(tunnel_entry())),
    )
}

fn upgrade_v0(
    mut record: Record,
    _prior: &SchemaDescriptor,
    _diags: &mut Diagnostics,
) -> Result<StepOutput, MigrationError> {
    nest(
        record.attributes_mut(),
        &[("service_mode_v2_mode", "mode"), ("service_mode_v2_port", "port")],
        "service_mode_v2",
    )
    .map_err(|e| support::lift(e, &record, CURRENT))?;
    Ok(StepOutput::record(record))
}

fn rule(name: &str, target_attr: &str, mode: &str) -> MergeRule {
    MergeRule::new(name, (KIND, target_attr), (SPLIT_TUNNEL_KIND, "tunnels"), "policy_id")
        .with_scope("account_id")
        .with_filter("mode", mode)
}

/// Rules folding policy-less split tunnel records into the default profile
#[must_use]
pub fn merge_rules() -> Vec<MergeRule> {
    vec![
        rule(EXCLUDE_RULE, "exclude", "exclude"),
        rule(INCLUDE_RULE, "include", "include"),
    ]
}

/// Register both kinds and the profile step
///
/// # Errors
/// Returns error if either kind is already registered
pub fn register(builder: &mut RegistryBuilder) -> Result<(), RegistryError> {
    builder
        .kind(schema_v1())?
        .kind(split_tunnel_schema())?
        .step(Step::transform(schema_v0(), 1, upgrade_v0))?;
    Ok(())
}
