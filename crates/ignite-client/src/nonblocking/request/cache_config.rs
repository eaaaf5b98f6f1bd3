//! Async cache lifecycle/configuration ops, mirroring `crate::request::cache_config`.

use ignite_core::{codec, Value};

use crate::error::Result;
use crate::frame::{self, op_code};
use crate::request::CacheHandle;

use super::super::connection::Connection;
use super::super::dispatch::{self, AsCacheError};

pub use crate::request::cache_config::ConfigProperty;

pub async fn create_with_name(connection: &Connection, name: &str) -> Result<()> {
    let mut body = frame::request_header(op_code::CACHE_CREATE_WITH_NAME, connection.next_query_id());
    codec::encode(&mut body, &Value::from(name))?;
    dispatch::round_trip::<AsCacheError>(connection, frame::finish_request(body)).await?;
    Ok(())
}

pub async fn get_or_create_with_name(connection: &Connection, name: &str) -> Result<()> {
    let mut body = frame::request_header(op_code::CACHE_GET_OR_CREATE_WITH_NAME, connection.next_query_id());
    codec::encode(&mut body, &Value::from(name))?;
    dispatch::round_trip::<AsCacheError>(connection, frame::finish_request(body)).await?;
    Ok(())
}

pub async fn destroy(connection: &Connection, cache: &CacheHandle) -> Result<()> {
    let mut body = frame::request_header(op_code::CACHE_DESTROY, connection.next_query_id());
    body.write_i32_le(cache.cache_id);
    dispatch::round_trip::<AsCacheError>(connection, frame::finish_request(body)).await?;
    Ok(())
}

pub async fn get_names(connection: &Connection) -> Result<Vec<String>> {
    let body = frame::request_header(op_code::CACHE_GET_NAMES, connection.next_query_id());
    let mut stream = dispatch::round_trip::<AsCacheError>(connection, frame::finish_request(body)).await?;

    let count = stream.read_i32_le()?;
    let mut names = Vec::with_capacity(count.max(0) as usize);
    for _ in 0..count {
        match codec::decode(&mut stream)? {
            Value::String(s) => names.push(s),
            other => names.push(format!("{other:?}")),
        }
    }
    Ok(names)
}

pub async fn get_configuration(connection: &Connection, cache: &CacheHandle) -> Result<Vec<ConfigProperty>> {
    let mut body = frame::request_header(op_code::CACHE_GET_CONFIGURATION, connection.next_query_id());
    body.write_i32_le(cache.cache_id);
    body.write_u8(0); // flags, reserved
    let mut stream = dispatch::round_trip::<AsCacheError>(connection, frame::finish_request(body)).await?;

    let count = stream.read_i32_le()?;
    let mut properties = Vec::with_capacity(count.max(0) as usize);
    for _ in 0..count {
        let code = stream.read_i16_le()?;
        let value = codec::decode(&mut stream)?;
        properties.push(ConfigProperty { code, value });
    }
    Ok(properties)
}
