//! Async cache CRUD, mirroring `crate::request::key_value` op for op; see
//! there for the wire layout notes.

use ignite_core::{codec, Value};

use crate::error::Result;
use crate::frame::{self, op_code};
use crate::request::key_value::write_prelude;
use crate::request::CacheHandle;

use super::super::connection::Connection;
use super::super::dispatch::{self, flags_changed_topology, read_cache_flags, AsCacheError};

fn request(connection: &Connection, op: i16, cache: &CacheHandle) -> ignite_core::Stream {
    let mut body = frame::request_header(op, connection.next_query_id());
    write_prelude(&mut body, cache);
    body
}

async fn dispatch_cache_op(connection: &Connection, body: ignite_core::Stream) -> Result<(ignite_core::Stream, bool)> {
    let mut stream = dispatch::round_trip::<AsCacheError>(connection, frame::finish_request(body)).await?;
    let flags = read_cache_flags(&mut stream)?;
    Ok((stream, flags_changed_topology(flags)))
}

pub async fn get(connection: &Connection, cache: &CacheHandle, key: Value) -> Result<(Option<Value>, bool)> {
    let mut body = request(connection, op_code::CACHE_GET, cache);
    codec::encode(&mut body, &cache.coerce_key(key))?;

    let (mut stream, changed) = dispatch_cache_op(connection, body).await?;
    let value = codec::decode(&mut stream)?;
    Ok((non_null(value), changed))
}

pub async fn put(connection: &Connection, cache: &CacheHandle, key: Value, value: Value) -> Result<bool> {
    let mut body = request(connection, op_code::CACHE_PUT, cache);
    codec::encode(&mut body, &cache.coerce_key(key))?;
    codec::encode(&mut body, &cache.coerce_value(value))?;

    let (_, changed) = dispatch_cache_op(connection, body).await?;
    Ok(changed)
}

pub async fn put_if_absent(connection: &Connection, cache: &CacheHandle, key: Value, value: Value) -> Result<bool> {
    let mut body = request(connection, op_code::CACHE_PUT_IF_ABSENT, cache);
    codec::encode(&mut body, &cache.coerce_key(key))?;
    codec::encode(&mut body, &cache.coerce_value(value))?;

    let (mut stream, _) = dispatch_cache_op(connection, body).await?;
    Ok(stream.read_bool()?)
}

pub async fn get_all(connection: &Connection, cache: &CacheHandle, keys: Vec<Value>) -> Result<Vec<(Value, Value)>> {
    let mut body = request(connection, op_code::CACHE_GET_ALL, cache);
    body.write_i32_le(keys.len() as i32);
    for key in &keys {
        codec::encode(&mut body, &cache.coerce_key(key.clone()))?;
    }

    let (mut stream, _) = dispatch_cache_op(connection, body).await?;
    let count = stream.read_i32_le()?;
    let mut out = Vec::with_capacity(count.max(0) as usize);
    for _ in 0..count {
        let k = codec::decode(&mut stream)?;
        let v = codec::decode(&mut stream)?;
        out.push((k, v));
    }
    Ok(out)
}

pub async fn put_all(connection: &Connection, cache: &CacheHandle, entries: Vec<(Value, Value)>) -> Result<()> {
    let mut body = request(connection, op_code::CACHE_PUT_ALL, cache);
    body.write_i32_le(entries.len() as i32);
    for (k, v) in entries {
        codec::encode(&mut body, &cache.coerce_key(k))?;
        codec::encode(&mut body, &cache.coerce_value(v))?;
    }

    dispatch_cache_op(connection, body).await?;
    Ok(())
}

pub async fn remove_key(connection: &Connection, cache: &CacheHandle, key: Value) -> Result<bool> {
    let mut body = request(connection, op_code::CACHE_REMOVE_KEY, cache);
    codec::encode(&mut body, &cache.coerce_key(key))?;

    let (mut stream, _) = dispatch_cache_op(connection, body).await?;
    Ok(stream.read_bool()?)
}

pub async fn remove_keys(connection: &Connection, cache: &CacheHandle, keys: Vec<Value>) -> Result<()> {
    let mut body = request(connection, op_code::CACHE_REMOVE_KEYS, cache);
    body.write_i32_le(keys.len() as i32);
    for key in keys {
        codec::encode(&mut body, &cache.coerce_key(key))?;
    }
    dispatch_cache_op(connection, body).await?;
    Ok(())
}

pub async fn remove_all(connection: &Connection, cache: &CacheHandle) -> Result<()> {
    let body = request(connection, op_code::CACHE_REMOVE_ALL, cache);
    dispatch_cache_op(connection, body).await?;
    Ok(())
}

pub async fn contains_key(connection: &Connection, cache: &CacheHandle, key: Value) -> Result<bool> {
    let mut body = request(connection, op_code::CACHE_CONTAINS_KEY, cache);
    codec::encode(&mut body, &cache.coerce_key(key))?;

    let (mut stream, _) = dispatch_cache_op(connection, body).await?;
    Ok(stream.read_bool()?)
}

pub async fn clear(connection: &Connection, cache: &CacheHandle) -> Result<()> {
    let body = request(connection, op_code::CACHE_CLEAR, cache);
    dispatch_cache_op(connection, body).await?;
    Ok(())
}

pub async fn clear_key(connection: &Connection, cache: &CacheHandle, key: Value) -> Result<()> {
    let mut body = request(connection, op_code::CACHE_CLEAR_KEY, cache);
    codec::encode(&mut body, &cache.coerce_key(key))?;
    dispatch_cache_op(connection, body).await?;
    Ok(())
}

pub async fn get_size(connection: &Connection, cache: &CacheHandle, peek_modes: &[i32]) -> Result<i64> {
    let mut body = request(connection, op_code::CACHE_GET_SIZE, cache);
    body.write_i32_le(peek_modes.len() as i32);
    for mode in peek_modes {
        body.write_i32_le(*mode);
    }

    let (mut stream, _) = dispatch_cache_op(connection, body).await?;
    Ok(stream.read_i64_le()?)
}

fn non_null(v: Value) -> Option<Value> {
    if v.is_null() {
        None
    } else {
        Some(v)
    }
}
