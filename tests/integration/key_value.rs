//! Key/value round trips and framing: the request/response envelope and
//! codec agree end to end over a real socket, not just in unit tests that
//! feed bytes straight to the parser.

use ignite_core::{ComplexObject, Value};

use crate::fake_node::FakeNode;

#[test]
fn put_then_get_round_trips_the_value() {
    let node = FakeNode::start();
    let client = crate::connect(&node);
    let cache = client.cache::<(), ()>("people");

    assert_eq!(cache.get(Value::Int(1)).unwrap(), None);

    cache.put(Value::Int(1), Value::String("Alice".into())).unwrap();
    assert_eq!(cache.get(Value::Int(1)).unwrap(), Some(Value::String("Alice".into())));
}

#[test]
fn overwriting_a_key_replaces_the_stored_value() {
    let node = FakeNode::start();
    let client = crate::connect(&node);
    let cache = client.cache::<(), ()>("people");

    cache.put(Value::Int(1), Value::String("Alice".into())).unwrap();
    cache.put(Value::Int(1), Value::String("Bob".into())).unwrap();
    assert_eq!(cache.get(Value::Int(1)).unwrap(), Some(Value::String("Bob".into())));
}

#[test]
fn distinct_caches_are_addressed_by_independent_cache_ids() {
    let node = FakeNode::start();
    let client = crate::connect(&node);

    client.cache::<(), ()>("people").put(Value::Int(1), Value::String("Alice".into())).unwrap();
    assert_eq!(client.cache::<(), ()>("orgs").get(Value::Int(1)).unwrap(), None);
}

#[test]
fn put_retries_once_after_server_reports_unknown_binary_type() {
    let node = FakeNode::start();
    let client = crate::connect(&node);
    let cache = client.cache::<(), ()>("people");

    node.script.lock().unwrap().reject_next_put_as_unknown_schema = true;

    let obj = ComplexObject::builder("Person").field("name", "Alice").build();
    let type_id = obj.type_id;
    cache.put(Value::Int(1), Value::Complex(obj)).expect("put should recover after registering the type");

    assert_eq!(node.script.lock().unwrap().binary_type_puts_seen, vec![type_id]);
}

#[test]
fn cluster_state_round_trips_through_get_and_change() {
    let node = FakeNode::start();
    let client = crate::connect(&node);

    assert_eq!(client.cluster_state().unwrap(), ignite_client::request::cluster::ClusterState::Active);
    client.set_cluster_state(ignite_client::request::cluster::ClusterState::Inactive).unwrap();
    assert_eq!(client.cluster_state().unwrap(), ignite_client::request::cluster::ClusterState::Inactive);
}
