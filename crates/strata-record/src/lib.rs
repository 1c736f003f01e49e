//! Strata Record Model
//!
//! Versioned attribute records and the schema descriptors they are decoded
//! against.
//!
//! # Core Concepts
//!
//! - [`Record`]: Attribute tree tagged with a [`ResourceKind`] and [`SchemaVersion`]
//! - [`Value`]: Typed scalars, collections and nested objects plus `null`/`unknown`
//! - [`SchemaDescriptor`]: Declarative shape for one `(kind, version)`
//! - [`decode_attributes`]: Strict shape check that refines untyped collections
//! - [`Fingerprint`]: 32-byte Blake3 content hash used for set semantics
//! - [`AttrPath`]: Hierarchical addressing within a record
//!
//! # Example
//!
//! ```rust,ignore
//! use strata_record::{AttrType, Block, DecodeMode, Record, SchemaDescriptor};
//!
//! let schema = SchemaDescriptor::new(
//!     "dns_record",
//!     1,
//!     Block::new().required("name", AttrType::String),
//! );
//! let record = Record::from_json(raw)?;
//! let (typed, _dropped) = record.decode(&schema, DecodeMode::Strict)?;
//! ```

#![warn(unreachable_pub)]

mod decode;
mod fingerprint;
mod path;
mod record;
mod schema;
mod value;

pub use decode::{decode_attributes, DecodeError, DecodeMode, Decoded};
pub use fingerprint::Fingerprint;
pub use path::{AttrPath, PathError};
pub use record::{FormatMarker, Record, RecordEnvelope, RecordError, ResourceKind, SchemaVersion};
pub use schema::{AttrType, Attribute, Block, Presence, SchemaDescriptor};
pub use value::{Attributes, Shape, Value};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
