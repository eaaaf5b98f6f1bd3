//! Async facade, mirroring `crate::client`: `Client` (the async pool, owned)
//! and `Cache<K, V>` (a typed view over one cache).

use std::marker::PhantomData;

use ignite_core::{ComplexObject, Value};

use crate::binary::{BinaryTypeRegistry, FieldMeta, TypeMeta};
use crate::config::{ClientConfig, ExpiryPolicy};
use crate::error::{IgniteError, Result};
use crate::frame;
use crate::request::cache_config::ConfigProperty;
use crate::request::cluster::ClusterState;
use crate::request::key_value::CacheHandle;

use super::connection::Connection;
use super::cursor::{FieldsCursor, KvCursor};
use super::pool::Pool;
use super::request::scan::{self, ScanQuery};
use super::request::sql::{self, SqlFieldsQuery, SqlQuery};
use super::request::{binary_type, cache_config, cluster, key_value};

pub struct Client {
    pool: Pool,
    binary_types: BinaryTypeRegistry,
}

impl Client {
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            pool: Pool::connect(config).await?,
            binary_types: BinaryTypeRegistry::new(),
        })
    }

    pub fn cache<K, V>(&self, name: impl Into<String>) -> Cache<'_, K, V> {
        Cache {
            client: self,
            handle: CacheHandle::new(name),
            _marker: PhantomData,
        }
    }

    pub async fn create_cache(&self, name: &str) -> Result<()> {
        self.pool.dispatch_any(|c| async move { cache_config::create_with_name(&c, name).await }).await
    }

    pub async fn get_or_create_cache(&self, name: &str) -> Result<()> {
        self.pool.dispatch_any(|c| async move { cache_config::get_or_create_with_name(&c, name).await }).await
    }

    pub async fn cache_names(&self) -> Result<Vec<String>> {
        self.pool.dispatch_any(|c| async move { cache_config::get_names(&c).await }).await
    }

    pub async fn cluster_state(&self) -> Result<ClusterState> {
        self.pool.dispatch_any(|c| async move { cluster::get_state(&c).await }).await
    }

    pub async fn set_cluster_state(&self, state: ClusterState) -> Result<()> {
        self.pool.dispatch_any(|c| async move { cluster::change_state(&c, state).await }).await
    }

    pub async fn binary_type(&self, type_id: i32) -> Result<Option<TypeMeta>> {
        if let Some(cached) = self.binary_types.get(type_id) {
            return Ok(Some(cached));
        }
        self.pool
            .dispatch_any(|c| async move { binary_type::get_binary_type(&c, &self.binary_types, type_id).await })
            .await
    }

    pub async fn put_binary_type(&self, type_id: i32, meta: &TypeMeta) -> Result<()> {
        let meta = meta.clone();
        self.pool
            .dispatch_any(move |c| {
                let meta = meta.clone();
                async move { binary_type::put_binary_type(&c, &self.binary_types, type_id, &meta).await }
            })
            .await
    }

    /// Registers every locally-built complex object found in `values`
    /// (recursing into nested complex fields) with the server's
    /// binary-type registry, ahead of a post-`STATUS_UNKNOWN_BINARY_TYPE` retry.
    async fn register_complex_types(&self, values: &[&Value]) -> Result<()> {
        for value in values {
            self.register_complex_type(value).await?;
        }
        Ok(())
    }

    async fn register_complex_type(&self, value: &Value) -> Result<()> {
        if let Value::Complex(obj) = value {
            for (_, field_value) in &obj.fields {
                Box::pin(self.register_complex_type(field_value)).await?;
            }
            if obj.type_name.is_some() {
                self.put_binary_type(obj.type_id, &type_meta_for(obj)).await?;
            }
        }
        Ok(())
    }

    /// Best-effort: for every complex object in `value` whose `schema_id`
    /// isn't in the local registry yet, fetches and memoizes it.
    async fn warm_binary_schemas(&self, value: &Value) {
        if let Value::Complex(obj) = value {
            let schema_id = obj.schema_id();
            if !self.binary_types.has_schema(obj.type_id, schema_id) {
                let result = self
                    .pool
                    .dispatch_any(|c| async move { binary_type::get_binary_type_schema(&c, &self.binary_types, obj.type_id, schema_id).await })
                    .await;
                if let Err(e) = result {
                    tracing::warn!(type_id = obj.type_id, schema_id, error = %e, "binary schema warm-up failed");
                }
            }
            for (_, field_value) in &obj.fields {
                Box::pin(self.warm_binary_schemas(field_value)).await;
            }
        }
    }
}

/// Builds the metadata `put_binary_type` needs from a locally-built
/// `ComplexObject`: field names come from the builder's `field_names` map,
/// type codes from each field's tagged `Value`.
fn type_meta_for(obj: &ComplexObject) -> TypeMeta {
    let mut meta = TypeMeta::new(obj.type_name.clone().unwrap_or_default());
    for (field_id, value) in &obj.fields {
        let name = obj.field_names.get(field_id).cloned().unwrap_or_default();
        meta.fields.insert(
            *field_id,
            FieldMeta {
                field_id: *field_id,
                name,
                type_code: value.type_code(),
            },
        );
    }
    meta.merge_schema(obj.schema_id(), obj.field_ids());
    meta
}

pub struct Cache<'a, K, V> {
    client: &'a Client,
    handle: CacheHandle,
    _marker: PhantomData<(K, V)>,
}

impl<'a, K, V> Cache<'a, K, V> {
    pub fn with_expiry_policy(mut self, policy: ExpiryPolicy) -> Self {
        self.handle = self.handle.with_expiry_policy(policy);
        self
    }

    pub fn with_key_hint(mut self, hint: u8) -> Self {
        self.handle = self.handle.with_key_hint(hint);
        self
    }

    pub fn with_value_hint(mut self, hint: u8) -> Self {
        self.handle = self.handle.with_value_hint(hint);
        self
    }

    async fn dispatch<T, F, Fut>(&self, key: Option<&Value>, op: F) -> Result<T>
    where
        F: FnMut(std::sync::Arc<Connection>) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let handle = &self.handle;
        let key = key.cloned();
        self.client
            .pool
            .dispatch_with_failover(
                |pool| {
                    let key = key.clone();
                    async move {
                        match &key {
                            Some(k) => pool.pick_for_key(handle, k).await,
                            None => pool.pick_any().await,
                        }
                    }
                },
                op,
            )
            .await
    }

    async fn refresh_topology_if_changed(&self, changed: bool) {
        if changed {
            if let Err(e) = self.client.pool.refresh_partitions(self.handle.cache_id).await {
                tracing::warn!(cache = %self.handle.name, error = %e, "partition map refresh failed");
            }
        }
    }

    /// Runs `op` through the normal failover dispatch; if it comes back
    /// `STATUS_UNKNOWN_BINARY_TYPE`, registers every complex object in
    /// `values` with the server and retries `op` exactly once.
    async fn dispatch_with_binary_retry<T, F, Fut>(&self, key: Option<&Value>, values: &[&Value], op: F) -> Result<T>
    where
        F: FnMut(std::sync::Arc<Connection>) -> Fut + Clone,
        Fut: std::future::Future<Output = Result<T>>,
    {
        match self.dispatch(key, op.clone()).await {
            Err(IgniteError::CacheError { status, .. }) if status == frame::STATUS_UNKNOWN_BINARY_TYPE => {
                self.client.register_complex_types(values).await?;
                self.dispatch(key, op).await
            }
            other => other,
        }
    }

    pub async fn get(&self, key: Value) -> Result<Option<Value>> {
        let handle = self.handle.clone();
        let k = key.clone();
        let (value, changed) = self
            .dispatch(Some(&k), move |c| {
                let handle = handle.clone();
                let key = key.clone();
                async move { key_value::get(&c, &handle, key).await }
            })
            .await?;
        self.refresh_topology_if_changed(changed).await;
        if let Some(v) = &value {
            self.client.warm_binary_schemas(v).await;
        }
        Ok(value)
    }

    pub async fn put(&self, key: Value, value: Value) -> Result<()> {
        let handle = self.handle.clone();
        let k = key.clone();
        let v = value.clone();
        self.dispatch_with_binary_retry(Some(&k), &[&k, &v], move |c| {
            let handle = handle.clone();
            let key = key.clone();
            let value = value.clone();
            async move { key_value::put(&c, &handle, key, value).await }
        })
        .await?;
        Ok(())
    }

    pub async fn put_if_absent(&self, key: Value, value: Value) -> Result<bool> {
        let handle = self.handle.clone();
        let k = key.clone();
        let v = value.clone();
        self.dispatch_with_binary_retry(Some(&k), &[&k, &v], move |c| {
            let handle = handle.clone();
            let key = key.clone();
            let value = value.clone();
            async move { key_value::put_if_absent(&c, &handle, key, value).await }
        })
        .await
    }

    pub async fn get_all(&self, keys: Vec<Value>) -> Result<Vec<(Value, Value)>> {
        let handle = self.handle.clone();
        let entries = self
            .dispatch(None, move |c| {
                let handle = handle.clone();
                let keys = keys.clone();
                async move { key_value::get_all(&c, &handle, keys).await }
            })
            .await?;
        for (k, v) in &entries {
            self.client.warm_binary_schemas(k).await;
            self.client.warm_binary_schemas(v).await;
        }
        Ok(entries)
    }

    pub async fn put_all(&self, entries: Vec<(Value, Value)>) -> Result<()> {
        let handle = self.handle.clone();
        let flat: Vec<Value> = entries.iter().flat_map(|(k, v)| [k.clone(), v.clone()]).collect();
        let values: Vec<&Value> = flat.iter().collect();
        self.dispatch_with_binary_retry(None, &values, move |c| {
            let handle = handle.clone();
            let entries = entries.clone();
            async move { key_value::put_all(&c, &handle, entries).await }
        })
        .await
    }

    pub async fn remove(&self, key: Value) -> Result<bool> {
        let handle = self.handle.clone();
        let k = key.clone();
        self.dispatch(Some(&k), move |c| {
            let handle = handle.clone();
            let key = key.clone();
            async move { key_value::remove_key(&c, &handle, key).await }
        })
        .await
    }

    pub async fn contains_key(&self, key: Value) -> Result<bool> {
        let handle = self.handle.clone();
        let k = key.clone();
        self.dispatch(Some(&k), move |c| {
            let handle = handle.clone();
            let key = key.clone();
            async move { key_value::contains_key(&c, &handle, key).await }
        })
        .await
    }

    pub async fn clear(&self) -> Result<()> {
        let handle = self.handle.clone();
        self.dispatch(None, move |c| {
            let handle = handle.clone();
            async move { key_value::clear(&c, &handle).await }
        })
        .await
    }

    pub async fn size(&self, peek_modes: Vec<i32>) -> Result<i64> {
        let handle = self.handle.clone();
        self.dispatch(None, move |c| {
            let handle = handle.clone();
            let peek_modes = peek_modes.clone();
            async move { key_value::get_size(&c, &handle, &peek_modes).await }
        })
        .await
    }

    pub async fn destroy(self) -> Result<()> {
        let handle = self.handle.clone();
        self.client
            .pool
            .dispatch_any(move |c| {
                let handle = handle.clone();
                async move { cache_config::destroy(&c, &handle).await }
            })
            .await
    }

    pub async fn configuration(&self) -> Result<Vec<ConfigProperty>> {
        let handle = self.handle.clone();
        self.client
            .pool
            .dispatch_any(move |c| {
                let handle = handle.clone();
                async move { cache_config::get_configuration(&c, &handle).await }
            })
            .await
    }

    pub async fn scan(&self, query: &ScanQuery) -> Result<KvCursor> {
        let connection = self.client.pool.pick_any().await?;
        scan::scan(connection, &self.handle, query).await
    }

    pub async fn query_sql(&self, query: &SqlQuery) -> Result<KvCursor> {
        let connection = self.client.pool.pick_any().await?;
        sql::query_sql(connection, &self.handle, query).await
    }

    pub async fn query_sql_fields(&self, query: &SqlFieldsQuery) -> Result<FieldsCursor> {
        let connection = self.client.pool.pick_any().await?;
        sql::query_sql_fields(connection, &self.handle, query).await
    }

    pub async fn refresh_affinity(&self) -> Result<()> {
        self.client.pool.refresh_partitions(self.handle.cache_id).await
    }
}

/// Looks up the topology for a batch of caches in one round trip; call
/// right after connecting when partition awareness is on.
pub async fn warm_affinity(client: &Client, cache_ids: &[i32]) -> Result<()> {
    client.pool.refresh_partitions_many(cache_ids).await
}
