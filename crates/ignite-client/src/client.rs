//! The public facade: `Client` (the pool, owned) and `Cache<K, V>` (a typed
//! view over one cache), tying `pool`, `request`, `cursor`, and `binary`
//! together into the surface most callers actually use.

use std::marker::PhantomData;

use ignite_core::{ComplexObject, Value};

use crate::binary::BinaryTypeRegistry;
use crate::config::{ClientConfig, ExpiryPolicy};
use crate::connection::Connection;
use crate::cursor::{FieldsCursor, KvCursor};
use crate::error::{IgniteError, Result};
use crate::frame;
use crate::pool::Pool;
use crate::request::cache_config::{self, ConfigProperty};
use crate::request::cluster::{self, ClusterState};
use crate::request::key_value::CacheHandle;
use crate::request::scan::ScanQuery;
use crate::request::sql::{SqlFieldsQuery, SqlQuery};
use crate::request::{binary_type, key_value, sql};
use crate::binary::{FieldMeta, TypeMeta};

/// The thin client: an established pool of node connections plus the
/// shared binary-type registry every cache view reads and writes through.
pub struct Client {
    pool: Pool,
    binary_types: BinaryTypeRegistry,
}

impl Client {
    pub fn connect(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            pool: Pool::connect(config)?,
            binary_types: BinaryTypeRegistry::new(),
        })
    }

    /// A typed view over an existing or not-yet-created cache. Does not
    /// touch the wire; call `create` / `get_or_create` first if unsure the
    /// cache exists.
    pub fn cache<K, V>(&self, name: impl Into<String>) -> Cache<'_, K, V> {
        Cache {
            client: self,
            handle: CacheHandle::new(name),
            _marker: PhantomData,
        }
    }

    pub fn create_cache(&self, name: &str) -> Result<()> {
        self.pool.dispatch_any(|c| cache_config::create_with_name(c, name))
    }

    pub fn get_or_create_cache(&self, name: &str) -> Result<()> {
        self.pool.dispatch_any(|c| cache_config::get_or_create_with_name(c, name))
    }

    pub fn cache_names(&self) -> Result<Vec<String>> {
        self.pool.dispatch_any(cache_config::get_names)
    }

    pub fn cluster_state(&self) -> Result<ClusterState> {
        self.pool.dispatch_any(cluster::get_state)
    }

    pub fn set_cluster_state(&self, state: ClusterState) -> Result<()> {
        self.pool.dispatch_any(|c| cluster::change_state(c, state))
    }

    pub fn binary_type(&self, type_id: i32) -> Result<Option<TypeMeta>> {
        if let Some(cached) = self.binary_types.get(type_id) {
            return Ok(Some(cached));
        }
        self.pool
            .dispatch_any(|c| binary_type::get_binary_type(c, &self.binary_types, type_id))
    }

    pub fn put_binary_type(&self, type_id: i32, meta: &TypeMeta) -> Result<()> {
        self.pool
            .dispatch_any(|c| binary_type::put_binary_type(c, &self.binary_types, type_id, meta))
    }

    /// Registers every locally-built complex object found in `values`
    /// (recursing into nested complex fields) with the server's
    /// binary-type registry. Called after a write comes back with
    /// `STATUS_UNKNOWN_BINARY_TYPE`, just before the one retry.
    fn register_complex_types(&self, values: &[&Value]) -> Result<()> {
        for value in values {
            self.register_complex_type(value)?;
        }
        Ok(())
    }

    fn register_complex_type(&self, value: &Value) -> Result<()> {
        if let Value::Complex(obj) = value {
            for (_, field_value) in &obj.fields {
                self.register_complex_type(field_value)?;
            }
            if obj.type_name.is_some() {
                self.put_binary_type(obj.type_id, &type_meta_for(obj))?;
            }
        }
        Ok(())
    }

    /// Best-effort: for every complex object in `value` whose `schema_id`
    /// isn't in the local registry yet, fetches and memoizes it. Failures
    /// are logged, not propagated — a stale registry only costs an extra
    /// round trip later, it doesn't invalidate the read that just succeeded.
    fn warm_binary_schemas(&self, value: &Value) {
        if let Value::Complex(obj) = value {
            let schema_id = obj.schema_id();
            if !self.binary_types.has_schema(obj.type_id, schema_id) {
                let result = self
                    .pool
                    .dispatch_any(|c| binary_type::get_binary_type_schema(c, &self.binary_types, obj.type_id, schema_id));
                if let Err(e) = result {
                    tracing::warn!(type_id = obj.type_id, schema_id, error = %e, "binary schema warm-up failed");
                }
            }
            for (_, field_value) in &obj.fields {
                self.warm_binary_schemas(field_value);
            }
        }
    }
}

/// Builds the metadata `put_binary_type` needs from a locally-built
/// `ComplexObject`: field names come from the builder's `field_names` map
/// (never from the wire), type codes from each field's tagged `Value`.
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

/// A cache bound to one `Client`, addressed by name, with `K`/`V` only as a
/// documentation aid — values still flow through as the tagged `Value`
/// enum, so callers construct/match `Value` at the boundary.
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

    fn dispatch<T>(&self, key: Option<&Value>, op: impl FnMut(&Connection) -> Result<T>) -> Result<T> {
        let handle = &self.handle;
        let key = key.cloned();
        self.client.pool.dispatch_with_failover(
            |pool| match &key {
                Some(k) => pool.pick_for_key(handle, k),
                None => pool.pick_any(),
            },
            op,
        )
    }

    fn refresh_topology_if_changed(&self, changed: bool) {
        if changed {
            if let Err(e) = self.client.pool.refresh_partitions(self.handle.cache_id) {
                tracing::warn!(cache = %self.handle.name, error = %e, "partition map refresh failed");
            }
        }
    }

    /// Runs `op` through the normal failover dispatch; if it comes back
    /// `STATUS_UNKNOWN_BINARY_TYPE`, registers every complex object in
    /// `values` with the server and retries `op` exactly once.
    fn dispatch_with_binary_retry<T>(
        &self,
        key: Option<&Value>,
        values: &[&Value],
        op: impl FnMut(&Connection) -> Result<T> + Clone,
    ) -> Result<T> {
        match self.dispatch(key, op.clone()) {
            Err(IgniteError::CacheError { status, .. }) if status == frame::STATUS_UNKNOWN_BINARY_TYPE => {
                self.client.register_complex_types(values)?;
                self.dispatch(key, op)
            }
            other => other,
        }
    }

    pub fn get(&self, key: Value) -> Result<Option<Value>> {
        let handle = self.handle.clone();
        let k = key.clone();
        let (value, changed) = self.dispatch(Some(&k), move |c| key_value::get(c, &handle, key.clone()))?;
        self.refresh_topology_if_changed(changed);
        if let Some(v) = &value {
            self.client.warm_binary_schemas(v);
        }
        Ok(value)
    }

    pub fn put(&self, key: Value, value: Value) -> Result<()> {
        let handle = self.handle.clone();
        let k = key.clone();
        let v = value.clone();
        self.dispatch_with_binary_retry(Some(&k), &[&k, &v], move |c| {
            key_value::put(c, &handle, key.clone(), value.clone())
        })?;
        Ok(())
    }

    pub fn put_if_absent(&self, key: Value, value: Value) -> Result<bool> {
        let handle = self.handle.clone();
        let k = key.clone();
        let v = value.clone();
        self.dispatch_with_binary_retry(Some(&k), &[&k, &v], move |c| {
            key_value::put_if_absent(c, &handle, key.clone(), value.clone())
        })
    }

    pub fn get_all(&self, keys: Vec<Value>) -> Result<Vec<(Value, Value)>> {
        let handle = self.handle.clone();
        let entries = self.dispatch(None, move |c| key_value::get_all(c, &handle, keys.clone()))?;
        for (k, v) in &entries {
            self.client.warm_binary_schemas(k);
            self.client.warm_binary_schemas(v);
        }
        Ok(entries)
    }

    pub fn put_all(&self, entries: Vec<(Value, Value)>) -> Result<()> {
        let handle = self.handle.clone();
        let flat: Vec<Value> = entries.iter().flat_map(|(k, v)| [k.clone(), v.clone()]).collect();
        let values: Vec<&Value> = flat.iter().collect();
        self.dispatch_with_binary_retry(None, &values, move |c| key_value::put_all(c, &handle, entries.clone()))
    }

    pub fn remove(&self, key: Value) -> Result<bool> {
        let handle = self.handle.clone();
        let k = key.clone();
        self.dispatch(Some(&k), move |c| key_value::remove_key(c, &handle, key.clone()))
    }

    pub fn contains_key(&self, key: Value) -> Result<bool> {
        let handle = self.handle.clone();
        let k = key.clone();
        self.dispatch(Some(&k), move |c| key_value::contains_key(c, &handle, key.clone()))
    }

    pub fn clear(&self) -> Result<()> {
        let handle = self.handle.clone();
        self.dispatch(None, move |c| key_value::clear(c, &handle))
    }

    pub fn size(&self, peek_modes: &[i32]) -> Result<i64> {
        let handle = self.handle.clone();
        self.dispatch(None, move |c| key_value::get_size(c, &handle, peek_modes))
    }

    pub fn destroy(self) -> Result<()> {
        let handle = self.handle.clone();
        self.client.pool.dispatch_any(move |c| cache_config::destroy(c, &handle))
    }

    pub fn configuration(&self) -> Result<Vec<ConfigProperty>> {
        let handle = self.handle.clone();
        self.client.pool.dispatch_any(move |c| cache_config::get_configuration(c, &handle))
    }

    /// Scan queries and SQL cursors are bound to whichever connection
    /// served their opening request; failover does not migrate an
    /// in-flight cursor, matching the cursor-is-connection-scoped rule.
    pub fn scan(&self, query: &ScanQuery) -> Result<KvCursor> {
        let connection = self.client.pool.pick_any()?;
        crate::request::scan::scan(connection, &self.handle, query)
    }

    pub fn query_sql(&self, query: &SqlQuery) -> Result<KvCursor> {
        let connection = self.client.pool.pick_any()?;
        sql::query_sql(connection, &self.handle, query)
    }

    pub fn query_sql_fields(&self, query: &SqlFieldsQuery) -> Result<FieldsCursor> {
        let connection = self.client.pool.pick_any()?;
        sql::query_sql_fields(connection, &self.handle, query)
    }

    pub fn refresh_affinity(&self) -> Result<()> {
        self.client.pool.refresh_partitions(self.handle.cache_id)
    }
}

/// Looks up the topology for a batch of caches in one round trip; call
/// right after connecting when partition awareness is on.
pub fn warm_affinity(client: &Client, cache_ids: &[i32]) -> Result<()> {
    client.pool.refresh_partitions_many(cache_ids)
}
