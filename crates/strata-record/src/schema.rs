//! Schema descriptors
//!
//! A [`SchemaDescriptor`] declares, for one `(kind, version)`, the type and
//! presence of every attribute a record may carry. Descriptors are pure data
//! and immutable once built.

use std::fmt::{self, Display, Formatter};

use indexmap::IndexMap;

use crate::record::{ResourceKind, SchemaVersion};
use crate::value::Value;

/// Attribute type
#[derive(Debug, Clone, PartialEq)]
pub enum AttrType {
    /// String scalar
    String,
    /// Numeric scalar
    Number,
    /// Boolean scalar
    Bool,
    /// Any value, no shape checking
    Dynamic,
    /// Ordered collection of the element type
    List(Box<AttrType>),
    /// Unordered duplicate-free collection of the element type
    Set(Box<AttrType>),
    /// String-keyed collection of the element type
    Map(Box<AttrType>),
    /// Nested block
    Object(Block),
}

impl AttrType {
    /// `list(element)`
    #[inline]
    #[must_use]
    pub fn list(element: AttrType) -> Self {
        Self::List(Box::new(element))
    }

    /// `set(element)`
    #[inline]
    #[must_use]
    pub fn set(element: AttrType) -> Self {
        Self::Set(Box::new(element))
    }

    /// `map(element)`
    #[inline]
    #[must_use]
    pub fn map(element: AttrType) -> Self {
        Self::Map(Box::new(element))
    }

    /// Nested object
    #[inline]
    #[must_use]
    pub fn object(block: Block) -> Self {
        Self::Object(block)
    }
}

impl Display for AttrType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Number => f.write_str("number"),
            Self::Bool => f.write_str("bool"),
            Self::Dynamic => f.write_str("dynamic"),
            Self::List(el) => write!(f, "list({el})"),
            Self::Set(el) => write!(f, "set({el})"),
            Self::Map(el) => write!(f, "map({el})"),
            Self::Object(_) => f.write_str("object"),
        }
    }
}

/// How an attribute gets its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Must be set by configuration
    Required,
    /// May be set by configuration
    Optional,
    /// Set by the remote service only
    Computed,
    /// Set by configuration or, if absent, by the remote service
    OptionalComputed,
}

/// Attribute declaration
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    ty: AttrType,
    presence: Presence,
    default: Option<Value>,
    max_items: Option<usize>,
}

impl Attribute {
    /// Create attribute declaration
    #[inline]
    #[must_use]
    pub fn new(ty: AttrType, presence: Presence) -> Self {
        Self {
            ty,
            presence,
            default: None,
            max_items: None,
        }
    }

    /// Historical optional single nested block (`list(object)`, at most one element)
    #[inline]
    #[must_use]
    pub fn singleton_block(block: Block) -> Self {
        Self::new(AttrType::list(AttrType::Object(block)), Presence::Optional).with_max_items(1)
    }

    /// Set schema default
    #[inline]
    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Limit collection size
    #[inline]
    #[must_use]
    pub fn with_max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    /// Attribute type
    #[inline]
    #[must_use]
    pub fn ty(&self) -> &AttrType {
        &self.ty
    }

    /// Presence rule
    #[inline]
    #[must_use]
    pub fn presence(&self) -> Presence {
        self.presence
    }

    /// Schema default, if any
    #[inline]
    #[must_use]
    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Maximum number of elements, if limited
    #[inline]
    #[must_use]
    pub fn max_items(&self) -> Option<usize> {
        self.max_items
    }

    /// Check if the attribute must be present and non-null
    #[inline]
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.presence == Presence::Required
    }
}

/// Ordered set of attribute declarations
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    attributes: IndexMap<String, Attribute>,
}

impl Block {
    /// Create empty block
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an attribute
    #[inline]
    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    /// Declare a required attribute
    #[inline]
    #[must_use]
    pub fn required(self, name: impl Into<String>, ty: AttrType) -> Self {
        self.attribute(name, Attribute::new(ty, Presence::Required))
    }

    /// Declare an optional attribute
    #[inline]
    #[must_use]
    pub fn optional(self, name: impl Into<String>, ty: AttrType) -> Self {
        self.attribute(name, Attribute::new(ty, Presence::Optional))
    }

    /// Declare an optional attribute with a schema default
    #[inline]
    #[must_use]
    pub fn optional_with_default(
        self,
        name: impl Into<String>,
        ty: AttrType,
        default: impl Into<Value>,
    ) -> Self {
        self.attribute(
            name,
            Attribute::new(ty, Presence::Optional).with_default(default),
        )
    }

    /// Declare a computed attribute
    #[inline]
    #[must_use]
    pub fn computed(self, name: impl Into<String>, ty: AttrType) -> Self {
        self.attribute(name, Attribute::new(ty, Presence::Computed))
    }

    /// Declare an optional+computed attribute
    #[inline]
    #[must_use]
    pub fn optional_computed(self, name: impl Into<String>, ty: AttrType) -> Self {
        self.attribute(name, Attribute::new(ty, Presence::OptionalComputed))
    }

    /// Declare a historical singleton block
    #[inline]
    #[must_use]
    pub fn singleton_block(self, name: impl Into<String>, block: Block) -> Self {
        self.attribute(name, Attribute::singleton_block(block))
    }

    /// Look up a declaration
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Check if an attribute is declared
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Iterate declarations in declaration order
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Attribute)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of declared attributes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Check if no attributes are declared
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// Versioned shape definition for one resource kind
///
/// # Invariants
/// - Immutable after construction
/// - `(kind, version)` identifies the descriptor within a registry
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDescriptor {
    kind: ResourceKind,
    version: SchemaVersion,
    block: Block,
}

impl SchemaDescriptor {
    /// Create descriptor
    #[inline]
    #[must_use]
    pub fn new(kind: impl Into<ResourceKind>, version: u64, block: Block) -> Self {
        Self {
            kind: kind.into(),
            version: SchemaVersion::new(version),
            block,
        }
    }

    /// Resource kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    /// Schema version
    #[inline]
    #[must_use]
    pub fn version(&self) -> SchemaVersion {
        self.version
    }

    /// Top-level block
    #[inline]
    #[must_use]
    pub fn block(&self) -> &Block {
        &self.block
    }

    /// Look up a top-level attribute
    #[inline]
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.block.get(name)
    }

    /// Schema default of a top-level attribute
    #[inline]
    #[must_use]
    pub fn default_of(&self, name: &str) -> Option<&Value> {
        self.block.get(name).and_then(Attribute::default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_block() -> Block {
        Block::new()
            .required("name", AttrType::String)
            .optional("check_regions", AttrType::set(AttrType::String))
            .singleton_block(
                "origin_steering",
                Block::new().optional("policy", AttrType::String),
            )
            .optional_with_default("minimum_origins", AttrType::Number, 1_i64)
            .computed("id", AttrType::String)
    }

    #[test]
    fn builder_preserves_declaration_order() {
        let names: Vec<_> = pool_block().iter().map(|(n, _)| n.to_string()).collect();
        assert_eq!(
            names,
            vec!["name", "check_regions", "origin_steering", "minimum_origins", "id"]
        );
    }

    #[test]
    fn singleton_block_is_list_of_object_with_one_item() {
        let block = pool_block();
        let attr = block.get("origin_steering").unwrap();
        assert_eq!(attr.max_items(), Some(1));
        assert!(matches!(attr.ty(), AttrType::List(el) if matches!(**el, AttrType::Object(_))));
    }

    #[test]
    fn descriptor_defaults() {
        let schema = SchemaDescriptor::new("load_balancer_pool", 0, pool_block());
        assert_eq!(schema.default_of("minimum_origins"), Some(&Value::from(1_i64)));
        assert_eq!(schema.default_of("name"), None);
        assert!(schema.attribute("name").unwrap().is_required());
        assert_eq!(schema.version(), SchemaVersion::new(0));
    }

    #[test]
    fn type_display() {
        let ty = AttrType::map(AttrType::list(AttrType::String));
        assert_eq!(ty.to_string(), "map(list(string))");
    }
}
