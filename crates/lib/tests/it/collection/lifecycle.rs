//! Creation, destruction, typed adds, class and count, and item handles.

use proptree::{Collection, Config, Item, Kind, Kinds, TraverseFlags, Value};

use crate::helpers::{peer, socket, with_child};

// ===== CREATE / DESTROY =====

#[test]
fn test_create_and_destroy() {
    let c = Collection::new("event", 5).unwrap();
    assert_eq!(c.name(), "event");
    assert_eq!(c.class(), 5);
    assert_eq!(c.ref_count(), 1);

    let weak = c.downgrade();
    c.destroy();
    assert!(!weak.is_alive());
}

#[test]
fn test_destroy_non_last_holder_is_a_decrement() {
    let c = peer();
    let other = c.clone();
    assert_eq!(c.ref_count(), 2);

    c.destroy();
    assert_eq!(other.ref_count(), 1);
    assert_eq!(other.len(), 3);
}

#[test]
fn test_invalid_collection_names() {
    for name in ["", "bad name", "bad.name"] {
        let err = Collection::named(name).unwrap_err();
        assert!(err.is_invalid_argument(), "'{name}' should be rejected");
        assert_eq!(err.module(), "path");
    }
}

// ===== TYPED ADDS =====

#[test]
fn test_add_then_get_round_trip() {
    let c = Collection::named("values").unwrap();
    c.add_str(None, "s", "some data", 0).unwrap();
    c.add_binary(None, "b", &[1, 2, 3]).unwrap();
    c.add_int(None, "i", -5).unwrap();
    c.add_unsigned(None, "u", 5).unwrap();
    c.add_long(None, "l", -1i64 << 40).unwrap();
    c.add_ulong(None, "ul", u64::MAX).unwrap();
    c.add_double(None, "d", 2.5).unwrap();
    c.add_bool(None, "t", true).unwrap();

    let cases = [
        ("s", Kind::String, 10, Value::from("some data")),
        ("b", Kind::Binary, 3, Value::Binary(vec![1, 2, 3])),
        ("i", Kind::Int32, 4, Value::Int32(-5)),
        ("u", Kind::UInt32, 4, Value::UInt32(5)),
        ("l", Kind::Int64, 8, Value::Int64(-1i64 << 40)),
        ("ul", Kind::UInt64, 8, Value::UInt64(u64::MAX)),
        ("d", Kind::Double, 8, Value::Double(2.5)),
        ("t", Kind::Bool, 1, Value::Bool(true)),
    ];

    for (name, kind, len, value) in cases {
        let item = c
            .get_item(name, Kinds::ANY, TraverseFlags::DEFAULT)
            .unwrap()
            .unwrap_or_else(|| panic!("'{name}' should be found"));
        assert_eq!(item.kind().unwrap(), kind);
        assert_eq!(item.len().unwrap(), len);
        assert_eq!(item.value().unwrap(), value);
    }
}

#[test]
fn test_string_length_semantics() {
    let c = Collection::named("peer").unwrap();
    c.add_str(None, "IPv4", "10.10.10.10", 12).unwrap();
    c.add_str(None, "cut", "some other data", 2).unwrap();
    c.add_str(None, "empty", "", 0).unwrap();

    assert_eq!(c.get_value("IPv4").unwrap(), Some(Value::from("10.10.10.10")));
    assert_eq!(c.get_value("cut").unwrap(), Some(Value::from("s")));

    let empty = c
        .get_item("empty", Kinds::STRING, TraverseFlags::DEFAULT)
        .unwrap()
        .unwrap();
    assert_eq!(empty.len().unwrap(), 1);
}

#[test]
fn test_invalid_property_names() {
    let c = socket();
    for name in ["property 1", "", "a.b"] {
        let err = c.add_int(None, name, 1).unwrap_err();
        assert!(err.is_invalid_argument(), "'{name}' should be rejected");
    }
    assert_eq!(c.len(), 3);
}

#[test]
fn test_structural_values_rejected_by_add() {
    let c = socket();
    let err = c.add_property(None, "x", Value::End).unwrap_err();
    assert!(err.is_invalid_argument());

    let other = peer();
    let err = c
        .add_property(None, "x", Value::Reference(other.clone()))
        .unwrap_err();
    assert!(err.is_invalid_argument());
    assert_eq!(other.ref_count(), 1);
}

#[test]
fn test_payload_limit() {
    let config = Config {
        max_data: 8,
        ..Default::default()
    };
    let c = Collection::with_config("small", 0, config).unwrap();

    c.add_long(None, "fits", 1).unwrap();
    c.add_binary(None, "exact", &[0; 8]).unwrap();
    let err = c.add_str(None, "long", "abcdefgh", 0).unwrap_err();
    assert!(err.is_resource_exhausted());

    let big = Item::new("big", vec![0u8; 16]).unwrap();
    let err = c
        .insert(None, big, proptree::Disposition::End, proptree::DupPolicy::NoCheck)
        .unwrap_err();
    assert!(err.is_resource_exhausted());
    assert_eq!(c.len(), 2);
}

// ===== CLASS AND COUNT =====

#[test]
fn test_class_api() {
    let c = Collection::new("event", 3).unwrap();
    assert!(c.is_of_class(3));
    assert!(!c.is_of_class(4));

    c.set_class(4).unwrap();
    assert_eq!(c.class(), 4);
    assert!(c.is_of_class(4));
}

#[test]
fn test_count_treats_subcollections_as_one() {
    let c = Collection::named("event").unwrap();
    assert!(c.is_empty());
    assert_eq!(c.len(), 0);
    assert_eq!(c.count(), 1);

    c.add_int(None, "a", 1).unwrap();
    c.add_int(None, "b", 2).unwrap();
    let child = with_child("first", 1);
    child.add_int(None, "other", 2).unwrap();
    c.embed(None, None, child).unwrap();

    assert!(!c.is_empty());
    assert_eq!(c.len(), 3);
    assert_eq!(c.count(), 4);
}

// ===== UPDATE AND ITEM HANDLES =====

#[test]
fn test_update_keeps_position() {
    let c = socket();
    c.update_property("packets", "many", TraverseFlags::DEFAULT)
        .unwrap();

    let item = c
        .get_item("packets", Kinds::ANY, TraverseFlags::DEFAULT)
        .unwrap()
        .unwrap();
    assert_eq!(item.kind().unwrap(), Kind::String);
    assert_eq!(
        crate::helpers::walk(&c, TraverseFlags::DEFAULT),
        vec!["int32:id", "string:packets", "binary:stack"]
    );

    c.update_str("packets", "twenty", 3, TraverseFlags::DEFAULT)
        .unwrap();
    assert_eq!(c.get_value("packets").unwrap(), Some(Value::from("tw")));

    let err = c
        .update_property("missing", 1i32, TraverseFlags::DEFAULT)
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_item_handle_modify() {
    let c = socket();
    let item = c.add_int(None, "extra", 1).unwrap();

    item.rename("ident").unwrap();
    assert!(c
        .contains("ident", Kinds::INT32, TraverseFlags::DEFAULT)
        .unwrap());

    item.set_value("text").unwrap();
    assert_eq!(item.kind().unwrap(), Kind::String);

    item.modify(Some("label"), None).unwrap();
    assert_eq!(item.name().unwrap(), "label");
    assert_eq!(item.value().unwrap(), Value::from("text"));

    assert!(item.rename("bad name").unwrap_err().is_invalid_argument());
    assert!(item.set_value(Value::End).unwrap_err().is_invalid_argument());
}

#[test]
fn test_item_handle_outlives_item() {
    let c = socket();
    let item = c.add_int(None, "extra", 1).unwrap();

    c.delete_property("extra", Kinds::ANY, TraverseFlags::DEFAULT)
        .unwrap();
    assert!(item.value().unwrap_err().is_not_found());

    let other = c.add_int(None, "again", 2).unwrap();
    drop(c);
    assert!(other.value().unwrap_err().is_invalid_state());
}

#[test]
fn test_structural_items_cannot_be_modified() {
    let c = socket();
    c.embed(None, None, with_child("stats", 3)).unwrap();
    let p = peer();
    c.add_reference(None, None, &p).unwrap();

    let header = c
        .get_item("stats", Kinds::COLLECTION, TraverseFlags::DEFAULT)
        .unwrap()
        .unwrap();
    assert!(header.set_value(1i32).unwrap_err().is_invalid_state());
    assert!(header.rename("renamed").unwrap_err().is_invalid_state());

    let reference = c
        .get_item("peer", Kinds::REFERENCE, TraverseFlags::DEFAULT)
        .unwrap()
        .unwrap();
    assert!(reference.set_value(1i32).unwrap_err().is_invalid_state());
}
