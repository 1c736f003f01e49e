//! Strata Field Transforms
//!
//! Stateless, composable primitives that per-resource upgrade steps are
//! built from.
//!
//! # Core Concepts
//!
//! - [`set_to_list`] / [`list_to_set`]: Collection-kind conversion
//! - [`unwrap_singleton`]: Historical 0-or-1 element list → object or null
//! - [`wrap_values`]: Map of bare scalars → map of single-field objects
//! - [`rekey_field`] / [`rekey_objects`]: List of objects → keyed map
//! - [`merge_tagged`]: Sibling maps merged with a per-entry source tag
//! - [`rename`], [`reconcile_default`], [`nest`]: Attribute-level moves
//! - [`FieldOp`] / [`Pipeline`]: Path-targeted ops applied atomically
//!
//! # Example
//!
//! ```rust,ignore
//! use strata_transform::{FieldOp, Pipeline};
//!
//! let notes = Pipeline::new()
//!     .then(FieldOp::set_to_list("origins"))
//!     .then(FieldOp::unwrap_singleton("rules.*.overrides"))
//!     .then(FieldOp::rename("fallback_pool_id", "fallback_pool"))
//!     .apply(record.attributes_mut())?;
//! ```

#![warn(unreachable_pub)]

mod attrs;
mod block;
mod collection;
mod error;
mod map;
mod op;

pub use attrs::{drop_attrs, reconcile_default, rename, require, take};
pub use block::{nest, unwrap_singleton};
pub use collection::{list_to_set, set_to_list, Converted};
pub use error::TransformError;
pub use map::{merge_tagged, rekey_field, rekey_objects, wrap_values, TaggedSource};
pub use op::{FieldOp, FieldTransform, Pipeline, TransformNote};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
