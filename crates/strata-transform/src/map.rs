//! Map-shaped transforms: bare-value wrapping, re-keying and
//! sibling-map merge-with-tag

use indexmap::IndexMap;
use strata_record::{AttrPath, Value};

use crate::error::TransformError;

/// One source map participating in [`merge_tagged`]
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedSource {
    /// Tag recorded on every entry taken from this source
    pub tag: String,
    /// Source map (`null` contributes nothing)
    pub value: Value,
}

impl TaggedSource {
    /// Create tagged source
    #[inline]
    #[must_use]
    pub fn new(tag: impl Into<String>, value: Value) -> Self {
        Self {
            tag: tag.into(),
            value,
        }
    }
}

/// Wrap every value of a map in a single-field object
///
/// `{"MY_KV": "abc123"}` with field `id` → `{"MY_KV": {"id": "abc123"}}`.
/// Keys are kept unchanged.
///
/// # Errors
/// Returns error if the value is not a map
pub fn wrap_values(value: Value, field: &str) -> Result<Value, TransformError> {
    match value {
        Value::Map(entries) | Value::Object(entries) => Ok(Value::Map(
            entries
                .into_iter()
                .map(|(key, item)| {
                    let wrapped = Value::object_from([(field, item)]);
                    (key, wrapped)
                })
                .collect(),
        )),
        Value::Null | Value::Unknown => Ok(value),
        other => Err(TransformError::shape("map", other.shape())),
    }
}

/// Re-key a collection of objects by one of their fields
///
/// Each element becomes the map entry `element[key_field] → element`
/// with the key field removed from the stored object.
///
/// # Errors
/// Returns error on a missing or non-string key, or a duplicate key
pub fn rekey_objects(value: Value, key_field: &str) -> Result<Value, TransformError> {
    rekey(value, key_field, |mut object, _| {
        object.shift_remove(key_field);
        Ok(Value::Object(object))
    })
}

/// Re-key a collection of objects, keeping only one field as the value
///
/// `[{region: "WNAM", pool_ids: [..]}]` with `(region, pool_ids)` →
/// `{"WNAM": [..]}`.
///
/// # Errors
/// Returns error on a missing key or value field, or a duplicate key
pub fn rekey_field(
    value: Value,
    key_field: &str,
    value_field: &str,
) -> Result<Value, TransformError> {
    rekey(value, key_field, |mut object, at| {
        object
            .shift_remove(value_field)
            .filter(|v| !v.is_null())
            .ok_or_else(|| TransformError::MissingField {
                path: at.child(value_field),
            })
    })
}

fn rekey<F>(value: Value, key_field: &str, mut entry: F) -> Result<Value, TransformError>
where
    F: FnMut(IndexMap<String, Value>, &AttrPath) -> Result<Value, TransformError>,
{
    let items = match value {
        Value::List(items) | Value::Set(items) => items,
        Value::Null | Value::Unknown => return Ok(value),
        other => return Err(TransformError::shape("list", other.shape())),
    };

    let mut out = IndexMap::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        let at = AttrPath::root().index(i);
        let object = match item {
            Value::Object(object) | Value::Map(object) => object,
            other => return Err(TransformError::shape("object", other.shape()).within(&at)),
        };
        let key = match object.get(key_field) {
            Some(Value::String(key)) => key.clone(),
            None | Some(Value::Null) => {
                return Err(TransformError::MissingField {
                    path: at.child(key_field),
                })
            }
            Some(other) => {
                return Err(TransformError::shape("string", other.shape())
                    .within(&at.child(key_field)))
            }
        };
        if out.contains_key(&key) {
            return Err(TransformError::DuplicateKey { path: at, key });
        }
        let value = entry(object, &at)?;
        out.insert(key, value);
    }
    Ok(Value::Map(out))
}

/// Merge same-shaped sibling maps into one, tagging each entry with its source
///
/// Every entry `key → v` from the source tagged `t` becomes
/// `key → { value_field: v, tag_field: t }`. Sources are visited in order;
/// within a source, key order is kept.
///
/// # Errors
/// Returns [`TransformError::KeyCollision`] if a key appears in two sources
pub fn merge_tagged(
    sources: Vec<TaggedSource>,
    value_field: &str,
    tag_field: &str,
) -> Result<Value, TransformError> {
    let mut merged: IndexMap<String, Value> = IndexMap::new();
    let mut origin: IndexMap<String, String> = IndexMap::new();
    let mut any = false;

    for source in sources {
        let entries = match source.value {
            Value::Map(entries) | Value::Object(entries) => entries,
            Value::Null => continue,
            other => {
                return Err(TransformError::shape("map", other.shape())
                    .within(&AttrPath::single(source.tag)))
            }
        };
        any = true;
        for (key, item) in entries {
            if let Some(first) = origin.get(&key) {
                return Err(TransformError::KeyCollision {
                    path: AttrPath::root(),
                    key,
                    first: first.clone(),
                    second: source.tag,
                });
            }
            origin.insert(key.clone(), source.tag.clone());
            let tagged = Value::object_from([
                (tag_field, Value::from(source.tag.as_str())),
                (value_field, item),
            ]);
            merged.insert(key, tagged);
        }
    }

    Ok(if any { Value::Map(merged) } else { Value::Null })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wrap_bare_values() {
        let map = Value::map_from([("MY_KV", Value::from("abc123"))]);
        let wrapped = wrap_values(map, "id").unwrap();
        assert_eq!(
            wrapped,
            Value::map_from([("MY_KV", Value::object_from([("id", Value::from("abc123"))]))])
        );
    }

    #[test]
    fn rekey_region_pools() {
        let list = Value::from_json(json!([
            {"region": "WNAM", "pool_ids": ["a", "b"]},
            {"region": "ENAM", "pool_ids": ["c"]}
        ]));
        let map = rekey_field(list, "region", "pool_ids").unwrap();
        assert_eq!(
            map.get("WNAM"),
            Some(&Value::list_from(["a".into(), "b".into()]))
        );
        assert_eq!(map.as_entries().unwrap().len(), 2);
    }

    #[test]
    fn rekey_objects_strips_key() {
        let list = Value::from_json(json!([{"name": "x", "weight": 1}]));
        let map = rekey_objects(list, "name").unwrap();
        assert_eq!(
            map.get("x"),
            Some(&Value::object_from([("weight", Value::from(1_i64))]))
        );
    }

    #[test]
    fn rekey_duplicate_key() {
        let list = Value::from_json(json!([
            {"region": "WNAM", "pool_ids": []},
            {"region": "WNAM", "pool_ids": []}
        ]));
        let err = rekey_field(list, "region", "pool_ids").unwrap_err();
        assert_eq!(
            err,
            TransformError::DuplicateKey {
                path: AttrPath::root().index(1),
                key: "WNAM".into()
            }
        );
    }

    #[test]
    fn rekey_missing_key() {
        let list = Value::from_json(json!([{"pool_ids": []}]));
        assert!(matches!(
            rekey_field(list, "region", "pool_ids"),
            Err(TransformError::MissingField { .. })
        ));
    }

    #[test]
    fn merge_with_tag() {
        let plain = Value::map_from([("GREETING", Value::from("hello"))]);
        let secret = Value::map_from([("TOKEN", Value::from("s3cr3t"))]);
        let merged = merge_tagged(
            vec![
                TaggedSource::new("plain_text", plain),
                TaggedSource::new("secret_text", secret),
            ],
            "text",
            "type",
        )
        .unwrap();

        assert_eq!(
            merged.get("TOKEN"),
            Some(&Value::object_from([
                ("type", Value::from("secret_text")),
                ("text", Value::from("s3cr3t")),
            ]))
        );
        assert_eq!(merged.as_entries().unwrap().len(), 2);
    }

    #[test]
    fn merge_collision_is_error() {
        let a = Value::map_from([("X", Value::from("1"))]);
        let b = Value::map_from([("X", Value::from("2"))]);
        let err = merge_tagged(
            vec![TaggedSource::new("plain_text", a), TaggedSource::new("secret_text", b)],
            "text",
            "type",
        )
        .unwrap_err();
        assert!(err.is_merge_conflict());
        assert_eq!(
            err.to_string(),
            "<root>: key 'X' present in both 'plain_text' and 'secret_text'"
        );
    }

    #[test]
    fn merge_all_null_is_null() {
        let merged = merge_tagged(vec![TaggedSource::new("plain_text", Value::Null)], "text", "type")
            .unwrap();
        assert!(merged.is_null());
    }
}
