//! Attribute-level helpers: rename, take, drop, require and default
//! reconciliation

use strata_record::{AttrPath, Attributes, Value};

use crate::error::TransformError;

/// Move `from` to `to` without touching the value
///
/// The renamed attribute keeps its position. An absent `from` is a no-op;
/// a null `to` is overwritten.
///
/// # Errors
/// Returns error if `to` already holds a non-null value
pub fn rename(attributes: &mut Attributes, from: &str, to: &str) -> Result<(), TransformError> {
    if from == to || !attributes.contains_key(from) {
        return Ok(());
    }
    match attributes.get(to) {
        Some(existing) if !existing.is_null() => {
            return Err(TransformError::RenameCollision {
                path: AttrPath::root(),
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        Some(_) => {
            attributes.shift_remove(to);
        }
        None => {}
    }
    if let Some((index, _, value)) = attributes.shift_remove_full(from) {
        attributes.shift_insert(index, to.to_string(), value);
    }
    Ok(())
}

/// Remove an attribute, returning its value (`null` if absent)
#[inline]
pub fn take(attributes: &mut Attributes, name: &str) -> Value {
    attributes.shift_remove(name).unwrap_or_default()
}

/// Remove attributes that have no analogue in the target schema
///
/// Returns the names that were actually present.
pub fn drop_attrs<'a>(attributes: &mut Attributes, names: &[&'a str]) -> Vec<&'a str> {
    names
        .iter()
        .copied()
        .filter(|name| attributes.shift_remove(*name).is_some())
        .collect()
}

/// Borrow a value that must be present and non-null
///
/// # Errors
/// Returns [`TransformError::MissingField`] naming the attribute
pub fn require<'a>(attributes: &'a Attributes, name: &str) -> Result<&'a Value, TransformError> {
    attributes
        .get(name)
        .filter(|v| !v.is_null())
        .ok_or_else(|| TransformError::MissingField {
            path: AttrPath::single(name),
        })
}

/// Write the old schema default explicitly when the attribute is unset
///
/// Used when the default changed between versions: leaving the attribute
/// unset would let the new default apply and produce a spurious diff.
/// Returns `true` if the default was written.
pub fn reconcile_default(attributes: &mut Attributes, name: &str, old_default: &Value) -> bool {
    match attributes.get_mut(name) {
        Some(value) if !value.is_null() => false,
        Some(value) => {
            *value = old_default.clone();
            true
        }
        None => {
            attributes.insert(name.to_string(), old_default.clone());
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, Value)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn rename_keeps_position() {
        let mut a = attrs(&[
            ("name", "pool".into()),
            ("fallback_pool_id", "abc".into()),
            ("ttl", Value::from(30_i64)),
        ]);
        rename(&mut a, "fallback_pool_id", "fallback_pool").unwrap();
        let keys: Vec<_> = a.keys().cloned().collect();
        assert_eq!(keys, vec!["name", "fallback_pool", "ttl"]);
        assert_eq!(a["fallback_pool"], Value::from("abc"));
        assert!(!a.contains_key("fallback_pool_id"));
    }

    #[test]
    fn rename_over_null_target() {
        let mut a = attrs(&[("content", Value::Null), ("value", "1.2.3.4".into())]);
        rename(&mut a, "value", "content").unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a["content"], Value::from("1.2.3.4"));
    }

    #[test]
    fn rename_collision() {
        let mut a = attrs(&[("content", "x".into()), ("value", "y".into())]);
        assert!(matches!(
            rename(&mut a, "value", "content"),
            Err(TransformError::RenameCollision { .. })
        ));
    }

    #[test]
    fn rename_absent_is_noop() {
        let mut a = attrs(&[("name", "x".into())]);
        rename(&mut a, "value", "content").unwrap();
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn take_and_drop() {
        let mut a = attrs(&[("a", "1".into()), ("b", "2".into())]);
        assert_eq!(take(&mut a, "a"), Value::from("1"));
        assert!(take(&mut a, "missing").is_null());
        assert_eq!(drop_attrs(&mut a, &["b", "c"]), vec!["b"]);
        assert!(a.is_empty());
    }

    #[test]
    fn require_reports_field() {
        let a = attrs(&[("ttl", Value::Null)]);
        let err = require(&a, "ttl").unwrap_err();
        assert_eq!(err.path().to_string(), "ttl");
    }

    #[test]
    fn reconcile_writes_old_default_only_when_unset() {
        let old = Value::from("bundled");
        let mut unset = Attributes::new();
        assert!(reconcile_default(&mut unset, "usage_model", &old));
        assert_eq!(unset["usage_model"], old);

        let mut explicit = attrs(&[("usage_model", "unbound".into())]);
        assert!(!reconcile_default(&mut explicit, "usage_model", &old));
        assert_eq!(explicit["usage_model"], Value::from("unbound"));
    }
}
