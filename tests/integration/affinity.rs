//! Partition-aware routing against two fake nodes: once the affinity
//! topology names one of them as the primary for every partition, every
//! key-addressed request goes straight there instead of round-robining.

use ignite_client::{Client, ClientConfig};
use ignite_core::Value;

use crate::fake_node::{op_code, FakeNode};

#[test]
fn key_addressed_requests_route_to_the_affinity_primary() {
    let primary = FakeNode::start();
    let other = FakeNode::start();
    {
        let mut script = primary.script.lock().unwrap();
        script.partition_owner = Some(primary.uuid);
        script.partition_count = 32;
    }

    let config = ClientConfig::builder()
        .seed("127.0.0.1", primary.port())
        .seed("127.0.0.1", other.port())
        .partition_aware(true)
        .build();
    let client = Client::connect(config).expect("connects to both seed nodes");

    let cache = client.cache::<(), ()>("people");
    // First request has no partition map yet, so it's a random pick; the
    // topology-changed flag on a cache op response is what would normally
    // trigger a refresh. Warm it explicitly, matching what a real pool does
    // right after connecting with partition awareness on.
    ignite_client::client::warm_affinity(&client, &[cache_id("people")]).unwrap();

    for i in 0..10 {
        cache.put(Value::Int(i), Value::Int(i)).unwrap();
    }

    let primary_hits = primary.script.lock().unwrap().requests_seen.iter().filter(|o| **o == op_code::CACHE_PUT).count();
    let other_hits = other.script.lock().unwrap().requests_seen.iter().filter(|o| **o == op_code::CACHE_PUT).count();

    assert_eq!(primary_hits, 10, "every put should have routed to the affinity primary");
    assert_eq!(other_hits, 0, "the non-owning node should see no key-addressed traffic");
}

fn cache_id(name: &str) -> i32 {
    ignite_core::entity_id::entity_id(name)
}
