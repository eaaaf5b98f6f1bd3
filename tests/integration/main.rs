//! Black-box tests against an in-process fake Ignite node.
//!
//! A real GridGain cluster isn't available in this environment, so these
//! tests drive `ignite_client::Client` against `fake_node::FakeNode` — a
//! minimal TCP listener implementing just enough of the handshake and a
//! handful of op-codes to exercise the wire-protocol-only properties:
//! handshake fallback, framing, affinity routing, cursor paging, failover.
//! Scenarios that depend on real GridGain server semantics (TTL expiry,
//! actual SQL execution, cluster state persistence) are out of scope here
//! and covered by the unit tests colocated with the client code instead.

mod fake_node;

mod affinity;
mod cursor;
mod failover;
mod handshake;
mod key_value;
mod reconnect;

use ignite_client::{Client, ClientConfig};

use fake_node::FakeNode;

/// A client connected to a single fake node, partition-awareness off by
/// default so key-value tests aren't routed anywhere unexpected.
fn connect(node: &FakeNode) -> Client {
    let config = ClientConfig::builder()
        .seed("127.0.0.1", node.port())
        .partition_aware(false)
        .timeout(std::time::Duration::from_secs(2))
        .build();
    Client::connect(config).expect("client should connect to the fake node")
}
