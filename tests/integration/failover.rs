//! `Pool::dispatch_any` retries on a different alive node when the one it
//! picked drops the connection mid-request, instead of surfacing the
//! socket error to the caller.

use ignite_client::{Client, ClientConfig};

use crate::fake_node::FakeNode;

#[test]
fn a_dead_node_fails_over_to_a_live_one() {
    let dead = FakeNode::start();
    let alive = FakeNode::start();
    dead.script.lock().unwrap().drop_on_request = true;

    let config = ClientConfig::builder()
        .seed("127.0.0.1", dead.port())
        .seed("127.0.0.1", alive.port())
        .partition_aware(false)
        .build();
    let client = Client::connect(config).expect("both nodes accept the handshake");

    // `cluster_state` is dispatched round-robin via `dispatch_any`, with no
    // affinity pick to short-circuit onto the dead node every time.
    let mut saw_success = false;
    for _ in 0..6 {
        if client.cluster_state().is_ok() {
            saw_success = true;
            break;
        }
    }
    assert!(saw_success, "failover should eventually land on the live node");
}
