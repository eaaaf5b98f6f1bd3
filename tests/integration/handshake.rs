//! Version negotiation against a fake node that only accepts an older
//! protocol version than the client proposes first.

use ignite_client::{Client, ClientConfig};
use ignite_core::protocol::KNOWN_VERSIONS;

use crate::fake_node::FakeNode;

#[test]
fn connects_on_the_first_proposed_version_when_the_node_accepts_it() {
    let node = FakeNode::start();
    let client = crate::connect(&node);
    assert!(client.cache::<(), ()>("any").get(ignite_core::Value::Int(1)).is_ok());
}

#[test]
fn falls_back_to_an_older_known_version_on_mismatch() {
    let node = FakeNode::start();
    let fallback = KNOWN_VERSIONS[1];
    node.script.lock().unwrap().handshake_version = Some((fallback.major, fallback.minor, fallback.patch));

    let config = ClientConfig::builder()
        .seed("127.0.0.1", node.port())
        .partition_aware(false)
        .build();
    let client = Client::connect(config).expect("handshake should retry with the node's reported version");

    assert!(client.cache::<(), ()>("any").get(ignite_core::Value::Int(1)).is_ok());
}

#[test]
fn refuses_all_seed_nodes_is_a_reconnect_error() {
    let node = FakeNode::start();
    node.script.lock().unwrap().refuse_connections = true;

    let config = ClientConfig::builder()
        .seed("127.0.0.1", node.port())
        .partition_aware(false)
        .build();
    let result = Client::connect(config);
    assert!(result.is_err());
}
