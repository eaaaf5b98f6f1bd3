//! The node pool: the set of `Connection`s built from the configured seed
//! nodes, node selection (random vs affinity-primary), topology-change
//! detection, and failover dispatch.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use rand::Rng;

use ignite_core::{ProtocolContext, Value};

use crate::affinity::{self, PartitionMap};
use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::error::{IgniteError, Result};
use crate::request::{key_value::CacheHandle, partitions};

/// Small, compile-time-ish retry budget for failover: never more attempts
/// than there are alive nodes to try.
const MAX_FAILOVER_ATTEMPTS: usize = 3;

pub struct Pool {
    config: Arc<ClientConfig>,
    connections: Vec<Arc<Connection>>,
    partition_maps: DashMap<i32, PartitionMap>,
    next_pick: AtomicUsize,
}

impl Pool {
    /// Connects to every configured seed node. At least one must succeed;
    /// the rest are left `Failed`, and `alive()` kicks off a background
    /// reconnect for them the next time the pool is asked to pick a node.
    pub fn connect(config: ClientConfig) -> Result<Self> {
        let config = Arc::new(config);
        let mut connections = Vec::with_capacity(config.seed_nodes.len());
        let mut last_err = None;

        for (host, port) in &config.seed_nodes {
            let connection = Arc::new(Connection::new(host.clone(), *port, config.clone()));
            match connection.connect() {
                Ok(()) => connections.push(connection),
                Err(e) => {
                    tracing::warn!(host, port, error = %e, "seed node connect failed");
                    last_err = Some(e);
                    connections.push(connection);
                }
            }
        }

        if connections.iter().all(|c| !c.is_alive()) {
            return Err(last_err.unwrap_or(IgniteError::ReconnectError));
        }

        Ok(Self {
            config,
            connections,
            partition_maps: DashMap::new(),
            next_pick: AtomicUsize::new(0),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn protocol_context(&self) -> Option<ProtocolContext> {
        self.connections.iter().find_map(|c| c.protocol_context())
    }

    /// The currently-open connections. Any connection that isn't open gets
    /// a background reconnect attempt kicked off (idempotent — a no-op if
    /// one is already in flight) before being filtered out, so a node that
    /// failed recovers on its own instead of staying excluded forever.
    fn alive(&self) -> Vec<Arc<Connection>> {
        for connection in &self.connections {
            if !connection.is_alive() {
                connection.ensure_background_reconnect();
            }
        }
        self.connections.iter().filter(|c| c.is_alive()).cloned().collect()
    }

    /// Uniform random pick over alive nodes, for ops with no natural key
    /// (cache clear/size, scan, SQL).
    pub fn pick_any(&self) -> Result<Arc<Connection>> {
        self.pick_random()
    }

    /// Uniform random pick over alive nodes.
    fn pick_random(&self) -> Result<Arc<Connection>> {
        let alive = self.alive();
        if alive.is_empty() {
            return Err(IgniteError::ConnectionBroken("no alive nodes in the pool".into()));
        }
        let idx = rand::thread_rng().gen_range(0..alive.len());
        Ok(alive[idx].clone())
    }

    /// Round-robin seed used only to diversify which node failover tries
    /// first when affinity doesn't apply; not a correctness requirement.
    fn pick_round_robin(&self) -> Result<Arc<Connection>> {
        let alive = self.alive();
        if alive.is_empty() {
            return Err(IgniteError::ConnectionBroken("no alive nodes in the pool".into()));
        }
        let idx = self.next_pick.fetch_add(1, Ordering::Relaxed) % alive.len();
        Ok(alive[idx].clone())
    }

    pub fn partition_map(&self, cache_id: i32) -> Option<PartitionMap> {
        self.partition_maps.get(&cache_id).map(|e| e.clone())
    }

    /// Primary-node selection for a key-addressed op, falling back to
    /// random when partition awareness is off, unknown, or stale.
    pub fn pick_for_key(&self, cache: &CacheHandle, key: &Value) -> Result<Arc<Connection>> {
        if !self.config.partition_aware {
            return self.pick_random();
        }
        let Some(map) = self.partition_map(cache.cache_id) else {
            return self.pick_random();
        };
        let alive_uuids: Vec<_> = self.alive().iter().filter_map(|c| c.uuid()).collect();
        match affinity::route(key, &map, &alive_uuids)? {
            Some(primary) => {
                if let Some(conn) = self.connections.iter().find(|c| c.uuid() == Some(primary) && c.is_alive()) {
                    return Ok(conn.clone());
                }
                self.pick_random()
            }
            None => self.pick_random(),
        }
    }

    /// Refreshes the partition map for `cache_id` via `cache_get_node_partitions`.
    pub fn refresh_partitions(&self, cache_id: i32) -> Result<()> {
        self.refresh_partitions_many(&[cache_id])
    }

    /// Refreshes the partition maps for several caches in one round trip;
    /// used to warm the pool right after connecting.
    pub fn refresh_partitions_many(&self, cache_ids: &[i32]) -> Result<()> {
        let connection = self.pick_random()?;
        let maps = partitions::cache_get_node_partitions(&connection, cache_ids)?;
        for (id, map) in maps {
            self.partition_maps.insert(id, map);
        }
        Ok(())
    }

    /// Runs `op` against a node chosen by `select`, retrying on a
    /// different alive node (excluding the one that just failed) up to
    /// `min(3, alive_nodes.len())` times. Only connection-level failures
    /// are retried; domain errors (bad status, auth, protocol violation)
    /// propagate immediately.
    pub fn dispatch_with_failover<T>(
        &self,
        mut select: impl FnMut(&Self) -> Result<Arc<Connection>>,
        mut op: impl FnMut(&Connection) -> Result<T>,
    ) -> Result<T> {
        let attempts = MAX_FAILOVER_ATTEMPTS.min(self.alive().len().max(1));
        let mut last_err = None;

        for _ in 0..attempts {
            let connection = match select(self) {
                Ok(c) => c,
                Err(e) => {
                    last_err = Some(e);
                    continue;
                }
            };
            match op(&connection) {
                Ok(v) => return Ok(v),
                Err(e) if is_retryable(&e) => {
                    tracing::warn!(error = %e, "dispatch failed, failing over to another node");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or(IgniteError::ConnectionBroken("failover attempts exhausted".into())))
    }

    /// Convenience entry point for ops that don't care which node serves
    /// them (cluster admin, binary-type registry, cache-config lifecycle).
    pub fn dispatch_any<T>(&self, op: impl FnMut(&Connection) -> Result<T>) -> Result<T> {
        self.dispatch_with_failover(|pool| pool.pick_round_robin(), op)
    }
}

fn is_retryable(err: &IgniteError) -> bool {
    matches!(
        err,
        IgniteError::SocketError(_) | IgniteError::ConnectionBroken(_) | IgniteError::ReconnectError
    )
}
