//! Async node pool, mirroring `crate::pool`: the same seed-node set,
//! failover budget, and topology bookkeeping, suspended at connection I/O
//! instead of blocking on it.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use rand::Rng;

use ignite_core::{ProtocolContext, Value};

use crate::affinity::{self, PartitionMap};
use crate::config::ClientConfig;
use crate::error::{IgniteError, Result};
use crate::request::key_value::CacheHandle;

use super::connection::Connection;
use super::request::partitions;

const MAX_FAILOVER_ATTEMPTS: usize = 3;

pub struct Pool {
    config: Arc<ClientConfig>,
    connections: Vec<Arc<Connection>>,
    partition_maps: DashMap<i32, PartitionMap>,
    next_pick: AtomicUsize,
}

impl Pool {
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let config = Arc::new(config);
        let mut connections = Vec::with_capacity(config.seed_nodes.len());
        let mut last_err = None;

        for (host, port) in &config.seed_nodes {
            let connection = Arc::new(Connection::new(host.clone(), *port, config.clone()));
            match connection.connect().await {
                Ok(()) => connections.push(connection),
                Err(e) => {
                    tracing::warn!(host, port, error = %e, "seed node connect failed");
                    last_err = Some(e);
                    connections.push(connection);
                }
            }
        }

        let mut any_alive = false;
        for c in &connections {
            if c.is_alive().await {
                any_alive = true;
                break;
            }
        }
        if !any_alive {
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

    pub async fn protocol_context(&self) -> Option<ProtocolContext> {
        for c in &self.connections {
            if let Some(ctx) = c.protocol_context().await {
                return Some(ctx);
            }
        }
        None
    }

    /// The currently-open connections. Any connection that isn't open gets
    /// a background reconnect attempt kicked off (idempotent) before being
    /// filtered out, so a node that failed recovers on its own.
    async fn alive(&self) -> Vec<Arc<Connection>> {
        let mut out = Vec::with_capacity(self.connections.len());
        for c in &self.connections {
            if c.is_alive().await {
                out.push(c.clone());
            } else {
                c.ensure_background_reconnect().await;
            }
        }
        out
    }

    pub async fn pick_any(&self) -> Result<Arc<Connection>> {
        self.pick_random().await
    }

    async fn pick_random(&self) -> Result<Arc<Connection>> {
        let alive = self.alive().await;
        if alive.is_empty() {
            return Err(IgniteError::ConnectionBroken("no alive nodes in the pool".into()));
        }
        let idx = rand::thread_rng().gen_range(0..alive.len());
        Ok(alive[idx].clone())
    }

    async fn pick_round_robin(&self) -> Result<Arc<Connection>> {
        let alive = self.alive().await;
        if alive.is_empty() {
            return Err(IgniteError::ConnectionBroken("no alive nodes in the pool".into()));
        }
        let idx = self.next_pick.fetch_add(1, Ordering::Relaxed) % alive.len();
        Ok(alive[idx].clone())
    }

    pub fn partition_map(&self, cache_id: i32) -> Option<PartitionMap> {
        self.partition_maps.get(&cache_id).map(|e| e.clone())
    }

    pub async fn pick_for_key(&self, cache: &CacheHandle, key: &Value) -> Result<Arc<Connection>> {
        if !self.config.partition_aware {
            return self.pick_random().await;
        }
        let Some(map) = self.partition_map(cache.cache_id) else {
            return self.pick_random().await;
        };
        let alive = self.alive().await;
        let mut alive_uuids = Vec::with_capacity(alive.len());
        for c in &alive {
            if let Some(u) = c.uuid().await {
                alive_uuids.push(u);
            }
        }
        match affinity::route(key, &map, &alive_uuids)? {
            Some(primary) => {
                for c in &alive {
                    if c.uuid().await == Some(primary) {
                        return Ok(c.clone());
                    }
                }
                self.pick_random().await
            }
            None => self.pick_random().await,
        }
    }

    pub async fn refresh_partitions(&self, cache_id: i32) -> Result<()> {
        self.refresh_partitions_many(&[cache_id]).await
    }

    pub async fn refresh_partitions_many(&self, cache_ids: &[i32]) -> Result<()> {
        let connection = self.pick_random().await?;
        let maps = partitions::cache_get_node_partitions(&connection, cache_ids).await?;
        for (id, map) in maps {
            self.partition_maps.insert(id, map);
        }
        Ok(())
    }

    /// Same failover contract as the blocking pool: `select` picks a node,
    /// `op` runs against it, up to `min(3, alive_nodes.len())` attempts,
    /// retrying only on connection-level failures.
    pub async fn dispatch_with_failover<T, S, Sfut, F, Fut>(&self, mut select: S, mut op: F) -> Result<T>
    where
        S: FnMut(&Self) -> Sfut,
        Sfut: Future<Output = Result<Arc<Connection>>>,
        F: FnMut(Arc<Connection>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = MAX_FAILOVER_ATTEMPTS.min(self.alive().await.len().max(1));
        let mut last_err = None;

        for _ in 0..attempts {
            let connection = match select(self).await {
                Ok(c) => c,
                Err(e) => {
                    last_err = Some(e);
                    continue;
                }
            };
            match op(connection).await {
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

    pub async fn dispatch_any<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnMut(Arc<Connection>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.dispatch_with_failover(|pool| pool.pick_round_robin(), op).await
    }
}

fn is_retryable(err: &IgniteError) -> bool {
    matches!(
        err,
        IgniteError::SocketError(_) | IgniteError::ConnectionBroken(_) | IgniteError::ReconnectError
    )
}
