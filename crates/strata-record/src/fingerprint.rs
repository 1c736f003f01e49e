//! Content fingerprints for attribute values
//!
//! Provides [`Fingerprint`], a 32-byte Blake3 digest over a canonical,
//! type-tagged encoding of a [`Value`]. Two values have equal fingerprints
//! exactly when they carry the same content: map/object key order and set
//! element order do not contribute, list order does.
//!
//! [`Fingerprint::of_element`] is the identity used for set membership: an
//! object field holding `null` counts the same as an absent field.

use std::fmt::{self, Display, Formatter};

use crate::value::{Attributes, Value};

/// A 32-byte content fingerprint (Blake3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint([u8; 32]);

// Type tags keep `"1"` and `1`, or `[]` and `{}`, from colliding.
const TAG_NULL: u8 = 0;
const TAG_UNKNOWN: u8 = 1;
const TAG_BOOL: u8 = 2;
const TAG_NUMBER: u8 = 3;
const TAG_STRING: u8 = 4;
const TAG_LIST: u8 = 5;
const TAG_SET: u8 = 6;
const TAG_MAP: u8 = 7;
const TAG_OBJECT: u8 = 8;

impl Fingerprint {
    /// Fingerprint a single value
    #[must_use]
    pub fn of(value: &Value) -> Self {
        Self::digest(value, Nulls::Kept)
    }

    /// Fingerprint a collection element, ignoring `null` object fields
    ///
    /// `{address = X}` and `{address = X, host = null}` describe the same
    /// element of a declared object block.
    #[must_use]
    pub fn of_element(value: &Value) -> Self {
        Self::digest(value, Nulls::Absent)
    }

    /// Fingerprint a whole attribute map (order-insensitive)
    #[must_use]
    pub fn of_attributes(attributes: &Attributes) -> Self {
        let mut hasher = blake3::Hasher::new();
        feed_entries(&mut hasher, TAG_OBJECT, attributes, Nulls::Kept);
        Self(*hasher.finalize().as_bytes())
    }

    fn digest(value: &Value, nulls: Nulls) -> Self {
        let mut hasher = blake3::Hasher::new();
        feed(&mut hasher, value, nulls);
        Self(*hasher.finalize().as_bytes())
    }

    /// Get reference to the underlying bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Short string representation (first 16 hex chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

/// Treatment of `null` object fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Nulls {
    Kept,
    Absent,
}

fn feed(hasher: &mut blake3::Hasher, value: &Value, nulls: Nulls) {
    match value {
        Value::Null => {
            hasher.update(&[TAG_NULL]);
        }
        Value::Unknown => {
            hasher.update(&[TAG_UNKNOWN]);
        }
        Value::Bool(b) => {
            hasher.update(&[TAG_BOOL, u8::from(*b)]);
        }
        Value::Number(n) => {
            feed_bytes(hasher, TAG_NUMBER, n.to_string().as_bytes());
        }
        Value::String(s) => {
            feed_bytes(hasher, TAG_STRING, s.as_bytes());
        }
        Value::List(items) => {
            hasher.update(&[TAG_LIST]);
            hasher.update(&(items.len() as u64).to_le_bytes());
            for item in items {
                feed(hasher, item, nulls);
            }
        }
        Value::Set(items) => {
            let mut digests: Vec<Fingerprint> =
                items.iter().map(|item| Fingerprint::digest(item, nulls)).collect();
            digests.sort_unstable();
            hasher.update(&[TAG_SET]);
            hasher.update(&(digests.len() as u64).to_le_bytes());
            for digest in digests {
                hasher.update(&digest.0);
            }
        }
        Value::Map(entries) => feed_entries(hasher, TAG_MAP, entries, nulls),
        Value::Object(entries) => feed_entries(hasher, TAG_OBJECT, entries, nulls),
    }
}

fn feed_entries(
    hasher: &mut blake3::Hasher,
    tag: u8,
    entries: &indexmap::IndexMap<String, Value>,
    nulls: Nulls,
) {
    // Map entries are keyed data; only object fields may be dropped.
    let skip_nulls = tag == TAG_OBJECT && nulls == Nulls::Absent;
    let mut fields: Vec<(&String, &Value)> = entries
        .iter()
        .filter(|(_, value)| !(skip_nulls && value.is_null()))
        .collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));
    hasher.update(&[tag]);
    hasher.update(&(fields.len() as u64).to_le_bytes());
    for (key, value) in fields {
        feed_bytes(hasher, TAG_STRING, key.as_bytes());
        feed(hasher, value, nulls);
    }
}

fn feed_bytes(hasher: &mut blake3::Hasher, tag: u8, bytes: &[u8]) {
    hasher.update(&[tag]);
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl serde::Serialize for Fingerprint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_key_order_is_irrelevant() {
        let a = Value::object_from([("x", Value::from(1_i64)), ("y", Value::from("b"))]);
        let b = Value::object_from([("y", Value::from("b")), ("x", Value::from(1_i64))]);
        assert_eq!(Fingerprint::of(&a), Fingerprint::of(&b));
    }

    #[test]
    fn set_order_is_irrelevant_list_order_is_not() {
        let s1 = Value::Set(vec!["a".into(), "b".into()]);
        let s2 = Value::Set(vec!["b".into(), "a".into()]);
        assert_eq!(Fingerprint::of(&s1), Fingerprint::of(&s2));

        let l1 = Value::List(vec!["a".into(), "b".into()]);
        let l2 = Value::List(vec!["b".into(), "a".into()]);
        assert_ne!(Fingerprint::of(&l1), Fingerprint::of(&l2));
    }

    #[test]
    fn type_tags_separate_lookalikes() {
        assert_ne!(
            Fingerprint::of(&Value::from("1")),
            Fingerprint::of(&Value::from(1_i64))
        );
        assert_ne!(
            Fingerprint::of(&Value::List(vec![])),
            Fingerprint::of(&Value::Set(vec![]))
        );
        assert_ne!(
            Fingerprint::of(&Value::Map(indexmap::IndexMap::new())),
            Fingerprint::of(&Value::Object(indexmap::IndexMap::new()))
        );
    }

    #[test]
    fn element_identity_ignores_null_fields() {
        let bare = Value::object_from([("address", Value::from("10.0.0.0/8"))]);
        let padded = Value::object_from([
            ("address", Value::from("10.0.0.0/8")),
            ("host", Value::Null),
            ("description", Value::Null),
        ]);
        assert_ne!(Fingerprint::of(&bare), Fingerprint::of(&padded));
        assert_eq!(Fingerprint::of_element(&bare), Fingerprint::of_element(&padded));

        let nested_bare = Value::Set(vec![bare]);
        let nested_padded = Value::Set(vec![padded]);
        assert_eq!(
            Fingerprint::of_element(&nested_bare),
            Fingerprint::of_element(&nested_padded)
        );
    }

    #[test]
    fn element_identity_keeps_null_map_entries() {
        let empty = Value::map_from([("a", Value::from("x"))]);
        let with_null = Value::map_from([("a", Value::from("x")), ("b", Value::Null)]);
        assert_ne!(Fingerprint::of_element(&empty), Fingerprint::of_element(&with_null));
    }

    #[test]
    fn null_and_unknown_differ() {
        assert_ne!(Fingerprint::of(&Value::Null), Fingerprint::of(&Value::Unknown));
    }

    #[test]
    fn short_is_sixteen_hex_chars() {
        let fp = Fingerprint::of(&Value::from("data"));
        assert_eq!(fp.short().len(), 16);
        assert_eq!(fp.to_string().len(), 64);
    }
}
