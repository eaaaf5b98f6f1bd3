//! Cache CRUD: the key-value op group.
//!
//! Every request here shares the same prelude: `cache_id:i32 | flags:u8`,
//! where bit 0 of `flags` says an expiry-policy prelude of three `i64`
//! nanosecond TTLs follows immediately. Every successful response body
//! opens with the same `flags:i32` topology word (see `dispatch`).

use ignite_core::entity_id;
use ignite_core::{codec, Stream, Value};

use crate::config::{apply_type_hint, ExpiryPolicy};
use crate::connection::Connection;
use crate::dispatch::{self, flags_changed_topology, read_cache_flags, AsCacheError};
use crate::error::Result;
use crate::frame::{self, op_code};

const WITH_EXPIRY: u8 = 0x1;

/// A bound handle to one cache: its id plus the per-call coercion/expiry
/// knobs a caller may have attached.
#[derive(Debug, Clone)]
pub struct CacheHandle {
    pub cache_id: i32,
    pub name: String,
    pub key_hint: Option<u8>,
    pub value_hint: Option<u8>,
    pub expiry_policy: Option<ExpiryPolicy>,
}

impl CacheHandle {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            cache_id: entity_id::entity_id(&name),
            name,
            key_hint: None,
            value_hint: None,
            expiry_policy: None,
        }
    }

    pub fn with_key_hint(mut self, hint: u8) -> Self {
        self.key_hint = Some(hint);
        self
    }

    pub fn with_value_hint(mut self, hint: u8) -> Self {
        self.value_hint = Some(hint);
        self
    }

    pub fn with_expiry_policy(mut self, policy: ExpiryPolicy) -> Self {
        self.expiry_policy = Some(policy);
        self
    }

    fn coerce_key(&self, key: Value) -> Value {
        apply_type_hint(key, self.key_hint)
    }

    fn coerce_value(&self, value: Value) -> Value {
        apply_type_hint(value, self.value_hint)
    }
}

/// Writes `cache_id | flags | [expiry triple]` — shared by every op-group
/// that addresses a specific cache (key-value, SQL, scan).
pub(crate) fn write_prelude(stream: &mut Stream, cache: &CacheHandle) {
    stream.write_i32_le(cache.cache_id);
    let flags = if cache.expiry_policy.is_some() { WITH_EXPIRY } else { 0 };
    stream.write_u8(flags);
    if let Some(policy) = &cache.expiry_policy {
        stream.write_i64_le(policy.create);
        stream.write_i64_le(policy.update);
        stream.write_i64_le(policy.access);
    }
}

fn request(connection: &Connection, op: i16, cache: &CacheHandle) -> Stream {
    let mut body = frame::request_header(op, connection.next_query_id());
    write_prelude(&mut body, cache);
    body
}

/// Runs `request` and returns the response body positioned right after the
/// leading cache-op `flags:i32` word, plus whether it signalled a topology
/// change.
fn dispatch_cache_op(connection: &Connection, body: Stream) -> Result<(Stream, bool)> {
    let mut stream = dispatch::round_trip::<AsCacheError>(connection, frame::finish_request(body))?;
    let flags = read_cache_flags(&mut stream)?;
    Ok((stream, flags_changed_topology(flags)))
}

pub fn get(connection: &Connection, cache: &CacheHandle, key: Value) -> Result<(Option<Value>, bool)> {
    let mut body = request(connection, op_code::CACHE_GET, cache);
    codec::encode(&mut body, &cache.coerce_key(key))?;

    let (mut stream, changed) = dispatch_cache_op(connection, body)?;
    let value = codec::decode(&mut stream)?;
    Ok((non_null(value), changed))
}

pub fn put(connection: &Connection, cache: &CacheHandle, key: Value, value: Value) -> Result<bool> {
    let mut body = request(connection, op_code::CACHE_PUT, cache);
    codec::encode(&mut body, &cache.coerce_key(key))?;
    codec::encode(&mut body, &cache.coerce_value(value))?;

    let (_, changed) = dispatch_cache_op(connection, body)?;
    Ok(changed)
}

pub fn put_if_absent(connection: &Connection, cache: &CacheHandle, key: Value, value: Value) -> Result<bool> {
    let mut body = request(connection, op_code::CACHE_PUT_IF_ABSENT, cache);
    codec::encode(&mut body, &cache.coerce_key(key))?;
    codec::encode(&mut body, &cache.coerce_value(value))?;

    let (mut stream, _) = dispatch_cache_op(connection, body)?;
    Ok(stream.read_bool()?)
}

/// `Value` has no `Hash`/`Eq` impl (floats among its variants aren't
/// hashable), so a multi-get result is a plain vector of pairs rather than
/// a map; callers that need lookup can linear-scan or build their own
/// index keyed on whatever narrower type their keys actually are.
pub fn get_all(connection: &Connection, cache: &CacheHandle, keys: Vec<Value>) -> Result<Vec<(Value, Value)>> {
    let mut body = request(connection, op_code::CACHE_GET_ALL, cache);
    body.write_i32_le(keys.len() as i32);
    for key in &keys {
        codec::encode(&mut body, &cache.coerce_key(key.clone()))?;
    }

    let (mut stream, _) = dispatch_cache_op(connection, body)?;
    let count = stream.read_i32_le()?;
    let mut out = Vec::with_capacity(count.max(0) as usize);
    for _ in 0..count {
        let k = codec::decode(&mut stream)?;
        let v = codec::decode(&mut stream)?;
        out.push((k, v));
    }
    Ok(out)
}

pub fn put_all(connection: &Connection, cache: &CacheHandle, entries: Vec<(Value, Value)>) -> Result<()> {
    let mut body = request(connection, op_code::CACHE_PUT_ALL, cache);
    body.write_i32_le(entries.len() as i32);
    for (k, v) in entries {
        codec::encode(&mut body, &cache.coerce_key(k))?;
        codec::encode(&mut body, &cache.coerce_value(v))?;
    }

    dispatch_cache_op(connection, body)?;
    Ok(())
}

pub fn get_and_put(connection: &Connection, cache: &CacheHandle, key: Value, value: Value) -> Result<Option<Value>> {
    let mut body = request(connection, op_code::CACHE_GET_AND_PUT, cache);
    codec::encode(&mut body, &cache.coerce_key(key))?;
    codec::encode(&mut body, &cache.coerce_value(value))?;

    let (mut stream, _) = dispatch_cache_op(connection, body)?;
    Ok(non_null(codec::decode(&mut stream)?))
}

pub fn get_and_replace(connection: &Connection, cache: &CacheHandle, key: Value, value: Value) -> Result<Option<Value>> {
    let mut body = request(connection, op_code::CACHE_GET_AND_REPLACE, cache);
    codec::encode(&mut body, &cache.coerce_key(key))?;
    codec::encode(&mut body, &cache.coerce_value(value))?;

    let (mut stream, _) = dispatch_cache_op(connection, body)?;
    Ok(non_null(codec::decode(&mut stream)?))
}

pub fn get_and_remove(connection: &Connection, cache: &CacheHandle, key: Value) -> Result<Option<Value>> {
    let mut body = request(connection, op_code::CACHE_GET_AND_REMOVE, cache);
    codec::encode(&mut body, &cache.coerce_key(key))?;

    let (mut stream, _) = dispatch_cache_op(connection, body)?;
    Ok(non_null(codec::decode(&mut stream)?))
}

pub fn get_and_put_if_absent(connection: &Connection, cache: &CacheHandle, key: Value, value: Value) -> Result<Option<Value>> {
    let mut body = request(connection, op_code::CACHE_GET_AND_PUT_IF_ABSENT, cache);
    codec::encode(&mut body, &cache.coerce_key(key))?;
    codec::encode(&mut body, &cache.coerce_value(value))?;

    let (mut stream, _) = dispatch_cache_op(connection, body)?;
    Ok(non_null(codec::decode(&mut stream)?))
}

pub fn replace(connection: &Connection, cache: &CacheHandle, key: Value, value: Value) -> Result<bool> {
    let mut body = request(connection, op_code::CACHE_REPLACE, cache);
    codec::encode(&mut body, &cache.coerce_key(key))?;
    codec::encode(&mut body, &cache.coerce_value(value))?;

    let (mut stream, _) = dispatch_cache_op(connection, body)?;
    Ok(stream.read_bool()?)
}

pub fn replace_if_equals(connection: &Connection, cache: &CacheHandle, key: Value, old: Value, new: Value) -> Result<bool> {
    let mut body = request(connection, op_code::CACHE_REPLACE_IF_EQUALS, cache);
    codec::encode(&mut body, &cache.coerce_key(key))?;
    codec::encode(&mut body, &cache.coerce_value(old))?;
    codec::encode(&mut body, &cache.coerce_value(new))?;

    let (mut stream, _) = dispatch_cache_op(connection, body)?;
    Ok(stream.read_bool()?)
}

pub fn contains_key(connection: &Connection, cache: &CacheHandle, key: Value) -> Result<bool> {
    let mut body = request(connection, op_code::CACHE_CONTAINS_KEY, cache);
    codec::encode(&mut body, &cache.coerce_key(key))?;

    let (mut stream, _) = dispatch_cache_op(connection, body)?;
    Ok(stream.read_bool()?)
}

pub fn contains_keys(connection: &Connection, cache: &CacheHandle, keys: Vec<Value>) -> Result<bool> {
    let mut body = request(connection, op_code::CACHE_CONTAINS_KEYS, cache);
    body.write_i32_le(keys.len() as i32);
    for key in keys {
        codec::encode(&mut body, &cache.coerce_key(key))?;
    }

    let (mut stream, _) = dispatch_cache_op(connection, body)?;
    Ok(stream.read_bool()?)
}

pub fn clear(connection: &Connection, cache: &CacheHandle) -> Result<()> {
    let body = request(connection, op_code::CACHE_CLEAR, cache);
    dispatch_cache_op(connection, body)?;
    Ok(())
}

pub fn clear_key(connection: &Connection, cache: &CacheHandle, key: Value) -> Result<()> {
    let mut body = request(connection, op_code::CACHE_CLEAR_KEY, cache);
    codec::encode(&mut body, &cache.coerce_key(key))?;
    dispatch_cache_op(connection, body)?;
    Ok(())
}

pub fn clear_keys(connection: &Connection, cache: &CacheHandle, keys: Vec<Value>) -> Result<()> {
    let mut body = request(connection, op_code::CACHE_CLEAR_KEYS, cache);
    body.write_i32_le(keys.len() as i32);
    for key in keys {
        codec::encode(&mut body, &cache.coerce_key(key))?;
    }
    dispatch_cache_op(connection, body)?;
    Ok(())
}

pub fn remove_key(connection: &Connection, cache: &CacheHandle, key: Value) -> Result<bool> {
    let mut body = request(connection, op_code::CACHE_REMOVE_KEY, cache);
    codec::encode(&mut body, &cache.coerce_key(key))?;

    let (mut stream, _) = dispatch_cache_op(connection, body)?;
    Ok(stream.read_bool()?)
}

pub fn remove_if_equals(connection: &Connection, cache: &CacheHandle, key: Value, value: Value) -> Result<bool> {
    let mut body = request(connection, op_code::CACHE_REMOVE_IF_EQUALS, cache);
    codec::encode(&mut body, &cache.coerce_key(key))?;
    codec::encode(&mut body, &cache.coerce_value(value))?;

    let (mut stream, _) = dispatch_cache_op(connection, body)?;
    Ok(stream.read_bool()?)
}

pub fn remove_keys(connection: &Connection, cache: &CacheHandle, keys: Vec<Value>) -> Result<()> {
    let mut body = request(connection, op_code::CACHE_REMOVE_KEYS, cache);
    body.write_i32_le(keys.len() as i32);
    for key in keys {
        codec::encode(&mut body, &cache.coerce_key(key))?;
    }
    dispatch_cache_op(connection, body)?;
    Ok(())
}

pub fn remove_all(connection: &Connection, cache: &CacheHandle) -> Result<()> {
    let body = request(connection, op_code::CACHE_REMOVE_ALL, cache);
    dispatch_cache_op(connection, body)?;
    Ok(())
}

pub fn get_size(connection: &Connection, cache: &CacheHandle, peek_modes: &[i32]) -> Result<i64> {
    let mut body = request(connection, op_code::CACHE_GET_SIZE, cache);
    body.write_i32_le(peek_modes.len() as i32);
    for mode in peek_modes {
        body.write_i32_le(*mode);
    }

    let (mut stream, _) = dispatch_cache_op(connection, body)?;
    Ok(stream.read_i64_le()?)
}

fn non_null(v: Value) -> Option<Value> {
    if v.is_null() {
        None
    } else {
        Some(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prelude_omits_expiry_triple_when_unset() {
        let cache = CacheHandle::new("people");
        let mut s = Stream::new();
        write_prelude(&mut s, &cache);
        assert_eq!(s.into_vec().len(), 4 + 1);
    }

    #[test]
    fn prelude_includes_expiry_triple_when_set() {
        let cache = CacheHandle::new("people").with_expiry_policy(ExpiryPolicy::new(1, 2, 3));
        let mut s = Stream::new();
        write_prelude(&mut s, &cache);
        assert_eq!(s.into_vec().len(), 4 + 1 + 24);
    }

    #[test]
    fn cache_id_is_the_entity_id_of_the_name() {
        let cache = CacheHandle::new("people");
        assert_eq!(cache.cache_id, entity_id::entity_id("people"));
    }
}
