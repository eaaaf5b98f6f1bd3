//! A single seed endpoint going away and coming back: unlike `failover.rs`
//! (which has a second live node to fail over to), this exercises the
//! connection's own background reconnect loop recovering the same address.

use ignite_core::Value;

use crate::fake_node::FakeNode;

#[test]
fn a_single_endpoint_recovers_after_the_server_comes_back() {
    let node = FakeNode::start();
    let port = node.port();
    let client = crate::connect(&node);
    let cache = client.cache::<(), ()>("people");

    cache.put(Value::Int(1), Value::String("Alice".into())).unwrap();

    drop(node);

    assert!(cache.get(Value::Int(1)).is_err(), "killing the peer should fail the next call");

    let _restarted = FakeNode::restart_on(port);

    let mut recovered = false;
    for _ in 0..50 {
        if cache.put(Value::Int(1), Value::String("Bob".into())).is_ok() {
            recovered = true;
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(20));
    }
    assert!(recovered, "put should eventually succeed once the endpoint is back and reconnect has run");
}
