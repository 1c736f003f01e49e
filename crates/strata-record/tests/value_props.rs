use pretty_assertions::assert_eq;
use proptest::prelude::*;
use strata_record::{
    decode_attributes, AttrType, Attributes, Block, DecodeMode, Fingerprint, Shape, Value,
};

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z]{0,6}".prop_map(Value::from),
    ]
}

fn tree() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::set_from),
            prop::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

#[test]
fn set_fingerprint_ignores_element_order() {
    let a = Value::set_from(vec!["WNAM".into(), "ENAM".into()]);
    let b = Value::set_from(vec!["ENAM".into(), "WNAM".into()]);
    assert_eq!(Fingerprint::of(&a), Fingerprint::of(&b));
}

#[test]
fn lenient_decode_reports_nested_drops_in_order() {
    let block = Block::new().optional(
        "rules",
        AttrType::list(AttrType::object(Block::new().required("name", AttrType::String))),
    );
    let mut attrs = Attributes::new();
    attrs.insert(
        "rules".into(),
        Value::list_from([
            Value::object_from([("name", Value::from("a")), ("legacy", Value::from(true))]),
            Value::object_from([("name", Value::from("b"))]),
        ]),
    );

    let decoded = decode_attributes(&attrs, &block, DecodeMode::Lenient).unwrap();
    let dropped: Vec<String> = decoded.dropped.iter().map(ToString::to_string).collect();
    assert_eq!(dropped, vec!["rules.0.legacy".to_string()]);
    assert_eq!(decoded.attributes["rules"].shape(), Shape::List);
}

proptest! {
    #[test]
    fn prop_set_from_never_holds_duplicates(items in prop::collection::vec(tree(), 0..8)) {
        let set = Value::set_from(items.clone());
        let elements = set.as_items().unwrap();
        let mut prints: Vec<_> = elements.iter().map(Fingerprint::of).collect();
        prints.sort();
        prints.dedup();
        prop_assert_eq!(prints.len(), elements.len());

        // Every input element is represented.
        for item in &items {
            prop_assert!(elements.iter().any(|e| Fingerprint::of(e) == Fingerprint::of(item)));
        }
    }

    #[test]
    fn prop_fingerprint_is_deterministic(value in tree()) {
        prop_assert_eq!(Fingerprint::of(&value), Fingerprint::of(&value.clone()));
    }

    #[test]
    fn prop_json_roundtrip_preserves_lists(value in tree()) {
        // Sets and lists both encode as arrays; the untyped read-back is a list.
        let json = value.to_json().unwrap();
        let back = Value::from_json(json.clone());
        prop_assert_eq!(back.to_json().unwrap(), json);
    }

    #[test]
    fn prop_dynamic_accepts_anything(value in tree()) {
        let block = Block::new().optional("any", AttrType::Dynamic);
        let mut attrs = Attributes::new();
        attrs.insert("any".into(), value.clone());
        let decoded = decode_attributes(&attrs, &block, DecodeMode::Strict).unwrap();
        prop_assert_eq!(&decoded.attributes["any"], &value);
    }
}
