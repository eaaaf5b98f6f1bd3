//! Binary-type registry ops: get / put / get-schema. Each call memoizes
//! its result into the shared `BinaryTypeRegistry` before returning, so
//! repeat reads of the same `type_id`/`schema_id` never hit the wire again.

use ignite_core::{codec, Value};

use crate::binary::{BinaryTypeRegistry, FieldMeta, TypeMeta};
use crate::connection::Connection;
use crate::dispatch::{self, AsBinaryTypeError};
use crate::error::Result;
use crate::frame::{self, op_code};

pub fn get_binary_type(connection: &Connection, registry: &BinaryTypeRegistry, type_id: i32) -> Result<Option<TypeMeta>> {
    let mut body = frame::request_header(op_code::BINARY_TYPE_GET, connection.next_query_id());
    body.write_i32_le(type_id);

    let mut stream = dispatch::round_trip::<AsBinaryTypeError>(connection, frame::finish_request(body))?;
    if !stream.read_bool()? {
        return Ok(None);
    }

    let type_name = read_string(&mut stream)?;
    let affinity_key_field_id = read_optional_string(&mut stream)?.map(|name| ignite_core::entity_id::entity_id(&name));

    let field_count = stream.read_i32_le()?;
    let mut fields = std::collections::HashMap::with_capacity(field_count.max(0) as usize);
    for _ in 0..field_count {
        let name = read_string(&mut stream)?;
        let field_id = stream.read_i32_le()?;
        let type_code = stream.read_u8()?;
        fields.insert(field_id, FieldMeta { field_id, name, type_code });
    }

    let schema_count = stream.read_i32_le()?;
    let mut schemas = std::collections::HashMap::with_capacity(schema_count.max(0) as usize);
    for _ in 0..schema_count {
        let schema_id = stream.read_i32_le()?;
        let field_id_count = stream.read_i32_le()?;
        let mut field_ids = Vec::with_capacity(field_id_count.max(0) as usize);
        for _ in 0..field_id_count {
            field_ids.push(stream.read_i32_le()?);
        }
        schemas.insert(schema_id, field_ids);
    }

    let meta = TypeMeta {
        type_name,
        affinity_key_field_id,
        fields,
        schemas,
    };
    registry.put(type_id, meta.clone());
    Ok(Some(meta))
}

pub fn put_binary_type(connection: &Connection, registry: &BinaryTypeRegistry, type_id: i32, meta: &TypeMeta) -> Result<()> {
    let mut body = frame::request_header(op_code::BINARY_TYPE_PUT, connection.next_query_id());
    body.write_i32_le(type_id);
    codec::encode(&mut body, &Value::from(meta.type_name.clone()))?;

    let affinity_name = meta
        .affinity_key_field_id
        .and_then(|id| meta.fields.get(&id))
        .map(|f| f.name.clone());
    codec::encode(&mut body, &affinity_name.map(Value::String).unwrap_or(Value::Null))?;

    body.write_i32_le(meta.fields.len() as i32);
    for field in meta.fields.values() {
        codec::encode(&mut body, &Value::from(field.name.clone()))?;
        body.write_i32_le(field.field_id);
        body.write_u8(field.type_code);
    }

    body.write_i32_le(meta.schemas.len() as i32);
    for (schema_id, field_ids) in &meta.schemas {
        body.write_i32_le(*schema_id);
        body.write_i32_le(field_ids.len() as i32);
        for id in field_ids {
            body.write_i32_le(*id);
        }
    }

    dispatch::round_trip::<AsBinaryTypeError>(connection, frame::finish_request(body))?;
    registry.put(type_id, meta.clone());
    Ok(())
}

pub fn get_binary_type_schema(connection: &Connection, registry: &BinaryTypeRegistry, type_id: i32, schema_id: i32) -> Result<Vec<i32>> {
    let mut body = frame::request_header(op_code::BINARY_TYPE_GET_SCHEMA, connection.next_query_id());
    body.write_i32_le(type_id);
    body.write_i32_le(schema_id);

    let mut stream = dispatch::round_trip::<AsBinaryTypeError>(connection, frame::finish_request(body))?;
    let count = stream.read_i32_le()?;
    let mut field_ids = Vec::with_capacity(count.max(0) as usize);
    for _ in 0..count {
        field_ids.push(stream.read_i32_le()?);
    }

    registry.memoize_schema(type_id, schema_id, field_ids.clone());
    Ok(field_ids)
}

fn read_string(stream: &mut ignite_core::Stream) -> Result<String> {
    match codec::decode(stream)? {
        Value::String(s) => Ok(s),
        Value::Null => Ok(String::new()),
        other => Ok(format!("{other:?}")),
    }
}

fn read_optional_string(stream: &mut ignite_core::Stream) -> Result<Option<String>> {
    match codec::decode(stream)? {
        Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_memoizes_into_the_registry() {
        let registry = BinaryTypeRegistry::new();
        let meta = TypeMeta::new("Point").with_schema(7, vec![1, 2]);
        registry.put(42, meta);
        assert!(registry.has_schema(42, 7));
    }
}
