//! Reference, embed and clone composition.

use proptree::{
    AddMode, Collection, Disposition, DupPolicy, Kind, Kinds, TraverseFlags, Value,
};

use crate::helpers::{host, peer, socket, walk, with_child};

// ===== REFERENCE =====

#[test]
fn test_reference_survives_destroying_original() {
    let peer = peer();
    let socket = socket();
    socket
        .add_collection(None, Some("peer"), AddMode::Reference(&peer))
        .unwrap();
    assert_eq!(peer.ref_count(), 2);

    peer.destroy();

    assert_eq!(
        walk(&socket, TraverseFlags::DEFAULT),
        vec![
            "int32:id",
            "int64:packets",
            "binary:stack",
            "reference:peer",
            "string:hostname",
            "string:IPv4",
            "string:IPv6",
        ]
    );

    let expected = [
        ("peer.hostname", "peerhost.mytest.com"),
        ("peer.IPv4", "10.10.10.10"),
        ("socket.peer.IPv6", "fe80::20c:29ff:fe49:1ae4"),
    ];
    for (path, text) in expected {
        let item = socket
            .get_item(path, Kinds::STRING, TraverseFlags::DEFAULT)
            .unwrap()
            .unwrap_or_else(|| panic!("'{path}' should be found"));
        assert_eq!(item.kind().unwrap(), Kind::String);
        assert_eq!(item.len().unwrap(), text.len() + 1);
        assert_eq!(item.value().unwrap(), Value::from(text));
    }
}

#[test]
fn test_reference_holder_released_with_parent() {
    let peer = peer();
    let socket = socket();
    socket.add_reference(None, None, &peer).unwrap();
    assert_eq!(peer.ref_count(), 2);

    socket.destroy();
    assert_eq!(peer.ref_count(), 1);
}

#[test]
fn test_reference_sees_later_changes() {
    let peer = peer();
    let socket = socket();
    socket.add_reference(None, None, &peer).unwrap();

    peer.add_int(None, "port", 8080).unwrap();
    assert_eq!(socket.get_value("peer.port").unwrap(), Some(Value::Int32(8080)));

    socket
        .update_property("peer.IPv4", "1.1.1.1", TraverseFlags::DEFAULT)
        .unwrap();
    assert_eq!(peer.get_value("IPv4").unwrap(), Some(Value::from("1.1.1.1")));
}

#[test]
fn test_structural_edits_through_reference_fail() {
    let host = host();
    let addr = with_child("addr", 7);
    host.embed(None, None, addr).unwrap();

    let socket = socket();
    socket.add_reference(None, None, &host).unwrap();

    let err = socket.add_int(Some("host"), "port", 1).unwrap_err();
    assert!(err.is_invalid_state());
    let err = socket.add_int(Some("host.addr"), "port", 1).unwrap_err();
    assert!(err.is_invalid_state());
    let err = socket
        .delete_property("host.hostname", Kinds::ANY, TraverseFlags::DEFAULT)
        .unwrap_err();
    assert!(err.is_invalid_state());
    let err = socket
        .extract(Some("host"), Disposition::Front, Kinds::ANY)
        .unwrap_err();
    assert!(err.is_invalid_state());

    // The owning handle can still edit
    host.add_int(Some("addr"), "port", 1).unwrap();
    assert_eq!(
        socket.get_value("host.addr.port").unwrap(),
        Some(Value::Int32(1))
    );
}

#[test]
fn test_reference_cycles_rejected() {
    let a = Collection::named("a").unwrap();
    let b = Collection::named("b").unwrap();
    a.add_reference(None, None, &b).unwrap();

    assert!(b.add_reference(None, None, &a).unwrap_err().is_invalid_argument());
    assert!(a.add_reference(None, None, &a).unwrap_err().is_invalid_argument());
    assert!(b.is_empty());

    // A detached reference item pointing at b cannot go into b either
    let item = a.extract(None, Disposition::End, Kinds::REFERENCE).unwrap();
    let err = b
        .insert(None, item, Disposition::End, DupPolicy::NoCheck)
        .unwrap_err();
    assert!(err.is_invalid_argument());
    assert_eq!(b.ref_count(), 1);
}

#[test]
fn test_failed_compose_leaves_parent_unchanged() {
    let peer = peer();
    let socket = socket();
    let before = walk(&socket, TraverseFlags::END);

    let err = socket
        .add_reference(Some("missing"), None, &peer)
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(peer.ref_count(), 1);

    let err = socket
        .add_clone(Some("missing"), None, &peer)
        .unwrap_err();
    assert!(err.is_not_found());

    let err = socket
        .embed(Some("missing"), None, with_child("x", 1))
        .unwrap_err();
    assert!(err.is_not_found());

    // The rejected child comes back whole
    let child = err.into_child().expect("embed error carries the child");
    assert_eq!(child.ref_count(), 1);
    assert_eq!(child.get_value("x.id").unwrap(), Some(Value::Int32(1)));

    let err = socket.embed(None, Some("bad name"), child).unwrap_err();
    assert!(err.is_invalid_argument());
    assert!(err.into_child().is_some());

    assert_eq!(walk(&socket, TraverseFlags::END), before);
}

#[test]
fn test_get_collection_reference() {
    let peer = peer();
    let socket = socket();
    socket.add_reference(None, None, &peer).unwrap();
    socket.embed(None, None, with_child("stats", 1)).unwrap();

    let handle = socket.get_collection_reference("peer").unwrap();
    assert!(handle.ptr_eq(&peer));
    assert_eq!(peer.ref_count(), 3);
    handle.destroy();
    assert_eq!(peer.ref_count(), 2);

    let item = socket
        .get_item("peer", Kinds::REFERENCE, TraverseFlags::DEFAULT)
        .unwrap()
        .unwrap();
    assert!(item.reference().unwrap().ptr_eq(&peer));
    assert_eq!(item.child_count().unwrap(), 3);

    let err = socket.get_collection_reference("stats").unwrap_err();
    assert!(err.is_invalid_state());
    let err = socket.get_collection_reference("missing").unwrap_err();
    assert!(err.is_not_found());
}

// ===== EMBED =====

#[test]
fn test_embed_consumes_handle() {
    let socket = socket();
    let peer = peer();
    let weak = peer.downgrade();

    socket
        .add_collection(None, None, AddMode::Embed(peer))
        .unwrap();
    assert!(!weak.is_alive());

    assert_eq!(socket.len(), 4);
    assert_eq!(
        walk(&socket, TraverseFlags::END)[3..],
        [
            "collection:peer",
            "string:hostname",
            "string:IPv4",
            "string:IPv6",
            "end:peer",
        ]
    );
    assert!(socket
        .contains("socket.peer.hostname", Kinds::STRING, TraverseFlags::DEFAULT)
        .unwrap());
}

#[test]
fn test_embed_shared_collection_rejected() {
    let socket = socket();
    let peer = peer();
    let other = peer.clone();

    let err = socket.embed(None, None, peer).unwrap_err();
    assert!(err.is_invalid_state());
    assert_eq!(socket.len(), 3);

    // The rejected handle comes back; once dropped the other one is sole owner
    let peer = err.into_child().unwrap();
    assert!(peer.ptr_eq(&other));
    assert_eq!(other.ref_count(), 2);
    peer.destroy();
    assert_eq!(other.ref_count(), 1);
    socket.embed(None, Some("remote"), other).unwrap();
    assert!(socket
        .contains("remote.IPv4", Kinds::STRING, TraverseFlags::DEFAULT)
        .unwrap());
}

#[test]
fn test_embed_referenced_collection_rejected() {
    let socket = socket();
    let holder = Collection::named("holder").unwrap();
    let peer = peer();
    holder.add_reference(None, None, &peer).unwrap();

    let err = socket.embed(None, None, peer).unwrap_err();
    assert!(err.is_invalid_state());
    assert!(holder
        .contains("peer.hostname", Kinds::STRING, TraverseFlags::DEFAULT)
        .unwrap());
}

#[test]
fn test_embed_rejects_reference_cycle() {
    let socket = socket();
    let host = host();
    host.add_reference(None, None, &socket).unwrap();
    let peer = peer();
    peer.add_reference(None, None, &host).unwrap();

    // peer -> host -> socket: embedding peer into socket would close the loop
    let err = socket.embed(None, None, peer).unwrap_err();
    assert!(err.is_invalid_argument());
    assert_eq!(socket.len(), 3);

    let peer = err.into_child().unwrap();
    assert!(peer.contains("peer.host.hostname", Kinds::ANY, TraverseFlags::DEFAULT).unwrap());

    // The walk still terminates
    assert_eq!(walk(&socket, TraverseFlags::DEFAULT).len(), 3);

    // Once the loop is broken the embed goes through
    peer.remove(None, Disposition::End, Kinds::REFERENCE).unwrap();
    socket.embed(None, None, peer).unwrap();
    assert!(socket
        .contains("socket.peer.hostname", Kinds::STRING, TraverseFlags::DEFAULT)
        .unwrap());
}

#[test]
fn test_embed_into_subcollection() {
    let event = Collection::named("event").unwrap();
    event.embed(None, None, socket()).unwrap();
    event.embed(Some("socket"), None, peer()).unwrap();

    assert!(event
        .contains("event.socket.peer.IPv6", Kinds::STRING, TraverseFlags::DEFAULT)
        .unwrap());
    assert_eq!(event.len(), 1);

    // Item counts of embedded levels; peer counts once inside socket
    let socket = event
        .get_item("socket", Kinds::COLLECTION, TraverseFlags::DEFAULT)
        .unwrap()
        .unwrap();
    assert_eq!(socket.child_count().unwrap(), 4);
    let peer = event
        .get_item("socket.peer", Kinds::COLLECTION, TraverseFlags::DEFAULT)
        .unwrap()
        .unwrap();
    assert_eq!(peer.child_count().unwrap(), 3);
    let id = event
        .get_item("socket.id", Kinds::ANY, TraverseFlags::DEFAULT)
        .unwrap()
        .unwrap();
    assert_eq!(id.child_count().unwrap(), 0);
}

// ===== CLONE =====

#[test]
fn test_clone_is_independent() {
    let peer = peer();
    let socket = socket();
    socket
        .add_collection(None, None, AddMode::Clone(&peer))
        .unwrap();
    assert_eq!(peer.ref_count(), 1);

    peer.add_str(None, "added", "later", 0).unwrap();
    assert!(!socket
        .contains("peer.added", Kinds::ANY, TraverseFlags::DEFAULT)
        .unwrap());

    socket.add_bool(Some("peer"), "flag", true).unwrap();
    assert!(!peer.contains("flag", Kinds::ANY, TraverseFlags::DEFAULT).unwrap());
    assert!(socket
        .contains("peer.flag", Kinds::BOOL, TraverseFlags::DEFAULT)
        .unwrap());
}

#[test]
fn test_clone_materializes_references() {
    let host = host();
    let peer = peer();
    host.add_reference(None, None, &peer).unwrap();

    let socket = socket();
    socket.add_clone(None, Some("local"), &host).unwrap();
    assert_eq!(peer.ref_count(), 2);

    let seen = walk(&socket, TraverseFlags::DEFAULT);
    assert!(seen.contains(&"collection:local".to_string()));
    assert!(seen.contains(&"collection:peer".to_string()));
    assert!(!seen.iter().any(|entry| entry.starts_with("reference:")));

    // Editing the copy does not reach the original peer
    socket.add_int(Some("local.peer"), "port", 1).unwrap();
    assert!(!peer.contains("port", Kinds::ANY, TraverseFlags::DEFAULT).unwrap());
}

#[test]
fn test_deep_copy() {
    let socket = socket();
    socket.set_class(9).unwrap();
    let peer = peer();
    socket.add_reference(None, None, &peer).unwrap();

    let copy = socket.deep_copy(Some("copy")).unwrap();
    assert_eq!(copy.name(), "copy");
    assert_eq!(copy.class(), 9);
    assert_eq!(copy.ref_count(), 1);
    assert_eq!(peer.ref_count(), 2);

    assert_eq!(
        walk(&copy, TraverseFlags::DEFAULT),
        vec![
            "int32:id",
            "int64:packets",
            "binary:stack",
            "collection:peer",
            "string:hostname",
            "string:IPv4",
            "string:IPv6",
        ]
    );
    assert!(copy
        .contains("copy.peer.hostname", Kinds::STRING, TraverseFlags::DEFAULT)
        .unwrap());

    peer.add_int(None, "late", 1).unwrap();
    assert!(!copy.contains("late", Kinds::ANY, TraverseFlags::DEFAULT).unwrap());

    let same_name = socket.deep_copy(None).unwrap();
    assert_eq!(same_name.name(), "socket");
    assert!(!same_name.ptr_eq(&socket));
}
