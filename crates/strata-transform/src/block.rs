//! Singleton-block unwrapping and flat-attribute nesting

use strata_record::{AttrPath, Attributes, Value};

use crate::error::TransformError;

/// Unwrap a historical singleton block
///
/// - `[x]` → `x`
/// - `[]`, `null` → `null` (never an empty object)
/// - `unknown` → `unknown`
///
/// # Errors
/// Returns error for more than one element or a non-list value
pub fn unwrap_singleton(value: Value) -> Result<Value, TransformError> {
    match value {
        Value::List(mut items) | Value::Set(mut items) => match items.len() {
            0 => Ok(Value::Null),
            1 => Ok(items.remove(0)),
            found => Err(TransformError::SingletonOverflow {
                path: AttrPath::root(),
                found,
            }),
        },
        Value::Null | Value::Unknown => Ok(value),
        other => Err(TransformError::shape("list", other.shape())),
    }
}

/// Gather flat sibling attributes into one nested object
///
/// Each `(old, new)` pair moves `attributes[old]` to field `new` of the
/// object stored under `into`. When every source is absent or null the
/// result is a null object. Absent sources become null fields.
///
/// # Errors
/// Returns error if `into` is already set
pub fn nest(
    attributes: &mut Attributes,
    fields: &[(&str, &str)],
    into: &str,
) -> Result<(), TransformError> {
    if attributes.get(into).is_some_and(|v| !v.is_null()) {
        return Err(TransformError::InvalidValue {
            path: AttrPath::single(into),
            value: "<set>".to_string(),
            reason: "nest target already has a value".to_string(),
        });
    }

    let mut object = Attributes::with_capacity(fields.len());
    for (old, new) in fields {
        let value = attributes.shift_remove(*old).unwrap_or_default();
        object.insert((*new).to_string(), value);
    }

    let nested = if object.values().all(Value::is_null) {
        Value::Null
    } else {
        Value::Object(object)
    };
    attributes.insert(into.to_string(), nested);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_record::Shape;

    #[test]
    fn empty_singleton_is_null_not_empty_object() {
        assert!(unwrap_singleton(Value::List(vec![])).unwrap().is_null());
        assert!(unwrap_singleton(Value::Null).unwrap().is_null());
    }

    #[test]
    fn single_element_unwraps() {
        let block = Value::object_from([("mode", Value::from("random"))]);
        let unwrapped = unwrap_singleton(Value::list_from([block.clone()])).unwrap();
        assert_eq!(unwrapped, block);
    }

    #[test]
    fn overflow_rejected() {
        let list = Value::list_from([Value::Null, Value::from(true)]);
        assert!(matches!(
            unwrap_singleton(list),
            Err(TransformError::SingletonOverflow { found: 2, .. })
        ));
    }

    #[test]
    fn already_object_rejected() {
        let obj = Value::object_from([("mode", Value::from("random"))]);
        assert!(matches!(
            unwrap_singleton(obj),
            Err(TransformError::UnexpectedShape { found: Shape::Object, .. })
        ));
    }

    #[test]
    fn nest_gathers_fields() {
        let mut attrs = Attributes::new();
        attrs.insert("name".into(), "default".into());
        attrs.insert("service_mode_v2_mode".into(), "proxy".into());
        attrs.insert("service_mode_v2_port".into(), Value::from(3128_i64));

        nest(
            &mut attrs,
            &[("service_mode_v2_mode", "mode"), ("service_mode_v2_port", "port")],
            "service_mode_v2",
        )
        .unwrap();

        assert!(!attrs.contains_key("service_mode_v2_mode"));
        assert_eq!(
            attrs["service_mode_v2"],
            Value::object_from([("mode", Value::from("proxy")), ("port", Value::from(3128_i64))])
        );
    }

    #[test]
    fn nest_all_null_is_null_object() {
        let mut attrs = Attributes::new();
        attrs.insert("service_mode_v2_mode".into(), Value::Null);
        nest(
            &mut attrs,
            &[("service_mode_v2_mode", "mode"), ("service_mode_v2_port", "port")],
            "service_mode_v2",
        )
        .unwrap();
        assert!(attrs["service_mode_v2"].is_null());
    }
}
