//! `tiered_cache` and its split companion `argo_tiered_caching`
//!
//! The v0 `cache_type` enumeration covered two settings that are now
//! separate resources: the tiered cache topology (`value`) and the Argo
//! tiered caching toggle. v0 → v1 splits one record into both.

use strata_engine::{
    Diagnostics, MigrationError, RegistryBuilder, RegistryError, SplitRule, SplitTable, Step,
    StepOutput,
};
use strata_record::{AttrType, Block, Record, SchemaDescriptor};

/// Kind name
pub const KIND: &str = "tiered_cache";

/// Companion kind name
pub const COMPANION_KIND: &str = "argo_tiered_caching";

/// Current version
pub const CURRENT: u64 = 1;

/// Current version of the companion kind
pub const COMPANION_CURRENT: u64 = 0;

/// `cache_type` → (`tiered_cache.value`, `argo_tiered_caching.value`)
pub const CACHE_TYPE_SPLIT: SplitTable = SplitTable {
    source_attr: "cache_type",
    primary_attr: "value",
    companion_kind: COMPANION_KIND,
    companion_version: COMPANION_CURRENT,
    companion_attr: "value",
    carried: &["zone_id"],
    rules: &[
        SplitRule::new("generic", "off", "on"),
        SplitRule::new("smart", "on", "on"),
        SplitRule::new("off", "off", "off"),
    ],
};

/// v0 descriptor
#[must_use]
pub fn schema_v0() -> SchemaDescriptor {
    SchemaDescriptor::new(
        KIND,
        0,
        Block::new()
            .computed("id", AttrType::String)
            .required("zone_id", AttrType::String)
            .required("cache_type", AttrType::String),
    )
}

/// v1 descriptor
#[must_use]
pub fn schema_v1() -> SchemaDescriptor {
    SchemaDescriptor::new(
        KIND,
        1,
        Block::new()
            .computed("id", AttrType::String)
            .required("zone_id", AttrType::String)
            .required("value", AttrType::String),
    )
}

/// Companion descriptor
#[must_use]
pub fn companion_schema() -> SchemaDescriptor {
    SchemaDescriptor::new(
        COMPANION_KIND,
        COMPANION_CURRENT,
        Block::new()
            .computed("id", AttrType::String)
            .required("zone_id", AttrType::String)
            .required("value", AttrType::String),
    )
}

fn upgrade_v0(
    record: Record,
    _prior: &SchemaDescriptor,
    diags: &mut Diagnostics,
) -> Result<StepOutput, MigrationError> {
    CACHE_TYPE_SPLIT.split(record, diags)
}

/// Register both kinds and the split step
///
/// # Errors
/// Returns error if either kind is already registered
pub fn register(builder: &mut RegistryBuilder) -> Result<(), RegistryError> {
    builder
        .kind(schema_v1())?
        .kind(companion_schema())?
        .step(Step::transform(schema_v0(), 1, upgrade_v0))?;
    Ok(())
}
