//! Strata Resource Kinds
//!
//! Schema descriptors and upgrade steps for every supported resource kind,
//! assembled into the default [`Registry`].
//!
//! # Core Concepts
//!
//! - [`registry`]: Read-only registry of every kind below
//! - [`merge_rules`] / [`merge_rule`]: Cross-record merge rules by name
//! - One module per kind, each exposing `schema_vN()` descriptors and `register`
//!
//! | kind | current |
//! |---|---|
//! | `load_balancer_pool` | 1 |
//! | `load_balancer` | 1 |
//! | `workers_script` | 1 (v0 ambiguous) |
//! | `dns_record` | 2 |
//! | `tiered_cache` / `argo_tiered_caching` | 1 / 0 (split) |
//! | `device_default_profile` / `split_tunnel` | 1 / 0 (merge) |
//!
//! # Example
//!
//! ```rust,ignore
//! use strata_engine::{Dispatcher, EngineConfig};
//!
//! let registry = strata_resources::registry()?;
//! let outcome = Dispatcher::new(&registry, EngineConfig::default()).dispatch(&record);
//! ```

#![warn(unreachable_pub)]

pub mod device_default_profile;
pub mod dns_record;
pub mod load_balancer;
pub mod load_balancer_pool;
pub mod tiered_cache;
pub mod workers_script;

mod support;

use strata_engine::{MergeRule, Registry, RegistryError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build the registry of every supported kind
///
/// # Errors
/// Returns error if two modules register the same kind or a step chain is
/// malformed
pub fn registry() -> Result<Registry, RegistryError> {
    let mut builder = Registry::builder();
    load_balancer_pool::register(&mut builder)?;
    load_balancer::register(&mut builder)?;
    workers_script::register(&mut builder)?;
    dns_record::register(&mut builder)?;
    tiered_cache::register(&mut builder)?;
    device_default_profile::register(&mut builder)?;
    let registry = builder.build()?;
    tracing::debug!("registry built with {} kinds", registry.len());
    Ok(registry)
}

/// Every cross-record merge rule
#[must_use]
pub fn merge_rules() -> Vec<MergeRule> {
    device_default_profile::merge_rules()
}

/// Look up a merge rule by name
#[must_use]
pub fn merge_rule(name: &str) -> Option<MergeRule> {
    merge_rules().into_iter().find(|rule| rule.name == name)
}
