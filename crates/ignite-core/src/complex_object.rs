//! The dynamically-schema'd "complex object" (a.k.a. binary object).
//!
//! Per the wire contract: a fixed header, concatenated field bodies (each
//! fully type-tagged, so a reader never needs a schema just to know a
//! field's shape), then a schema footer of `(field_id, field_offset)` pairs
//! in field declaration order. `type_id` and `schema_id` are never carried
//! as strings on the wire — only their 32-bit hashes are, so a
//! freshly-decoded object only knows `type_id`, not the type name, until
//! something resolves it against the binary-type registry.

use std::collections::HashMap;

use crate::entity_id;
use crate::error::CodecError;
use crate::value::Value;

pub const HEADER_VERSION: u8 = 1;

/// `version(1) + flags(2) + type_id(4) + hash(4) + length(4) + schema_id(4)
/// + schema_offset(4)`, counted from right after the leading type-code byte.
pub const HEADER_SIZE: usize = 1 + 2 + 4 + 4 + 4 + 4 + 4;

#[derive(Debug, Clone, PartialEq)]
pub struct ComplexObject {
    pub type_id: i32,
    /// Known locally when the object was constructed with `builder()`;
    /// `None` for an object that arrived over the wire and has not yet been
    /// resolved against the binary-type registry.
    pub type_name: Option<String>,
    pub flags: u16,
    /// `(field_id, value)` pairs in declaration/wire order.
    pub fields: Vec<(i32, Value)>,
    /// `field_id -> name`, known only for objects built locally via
    /// `builder()` (the wire never carries field names, so a decoded
    /// object's map is empty until the binary-type registry resolves one).
    pub field_names: HashMap<i32, String>,
}

impl ComplexObject {
    pub fn builder(type_name: impl Into<String>) -> ComplexObjectBuilder {
        ComplexObjectBuilder {
            type_name: type_name.into(),
            fields: Vec::new(),
            field_names: HashMap::new(),
        }
    }

    pub fn field_ids(&self) -> Vec<i32> {
        self.fields.iter().map(|(id, _)| *id).collect()
    }

    /// FNV-1 fold over the field-id list, in current field order.
    pub fn schema_id(&self) -> i32 {
        entity_id::schema_id(&self.field_ids())
    }

    /// Java-style hash over the concatenated, fully-tagged field bodies.
    pub fn hash(&self) -> Result<i32, CodecError> {
        let mut all = Vec::new();
        for (_, value) in &self.fields {
            all.extend(encode_into_vec(value)?);
        }
        Ok(entity_id::java_bytes_hash(&all))
    }

    pub fn field_by_id(&self, field_id: i32) -> Option<&Value> {
        self.fields.iter().find(|(id, _)| *id == field_id).map(|(_, v)| v)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&Value> {
        self.field_by_id(field_id(name))
    }
}

fn encode_into_vec(value: &Value) -> Result<Vec<u8>, CodecError> {
    let mut s = crate::stream::Stream::new();
    crate::codec::encode(&mut s, value)?;
    Ok(s.into_vec())
}

/// Field ids are the same case-insensitive hash used for `type_id`/`cache_id`.
pub fn field_id(name: &str) -> i32 {
    entity_id::entity_id(name)
}

pub struct ComplexObjectBuilder {
    type_name: String,
    fields: Vec<(i32, Value)>,
    field_names: HashMap<i32, String>,
}

impl ComplexObjectBuilder {
    pub fn field(mut self, name: &str, value: impl Into<Value>) -> Self {
        let id = field_id(name);
        self.fields.push((id, value.into()));
        self.field_names.insert(id, name.to_string());
        self
    }

    pub fn build(self) -> ComplexObject {
        ComplexObject {
            type_id: entity_id::entity_id(&self.type_name),
            type_name: Some(self.type_name),
            flags: 0,
            fields: self.fields,
            field_names: self.field_names,
        }
    }
}

/// Writes everything from `version` through the schema footer. The caller
/// (`codec::encode`) has already written the leading type-code byte.
pub fn write_body(stream: &mut crate::stream::Stream, obj: &ComplexObject) -> Result<(), CodecError> {
    let mut field_bytes = Vec::new();
    let mut offsets = Vec::with_capacity(obj.fields.len());
    for (_, value) in &obj.fields {
        offsets.push(HEADER_SIZE + field_bytes.len());
        field_bytes.extend(encode_into_vec(value)?);
    }

    let schema_offset = HEADER_SIZE + field_bytes.len();
    let footer_size = obj.fields.len() * 8;
    let length = schema_offset + footer_size;
    let hash = obj.hash()?;
    let schema_id = obj.schema_id();

    stream.write_u8(HEADER_VERSION);
    stream.write_u16_le(obj.flags);
    stream.write_i32_le(obj.type_id);
    stream.write_i32_le(hash);
    stream.write_i32_le(length as i32);
    stream.write_i32_le(schema_id);
    stream.write_i32_le(schema_offset as i32);
    stream.write_bytes(&field_bytes);

    for ((field_id, _), offset) in obj.fields.iter().zip(offsets.iter()) {
        stream.write_i32_le(*field_id);
        stream.write_i32_le(*offset as i32);
    }

    Ok(())
}

/// Reads everything from `version` through the schema footer. The caller
/// (`codec::decode`) has already consumed the leading type-code byte.
pub fn read_body(stream: &mut crate::stream::Stream) -> Result<ComplexObject, CodecError> {
    let object_start = stream.position();

    let version = stream.read_u8()?;
    if version != HEADER_VERSION {
        return Err(CodecError::InvalidSchema("unsupported complex-object header version"));
    }
    let flags = stream.read_u16_le()?;
    let type_id = stream.read_i32_le()?;
    let _hash = stream.read_i32_le()?;
    let length = stream.read_i32_le()?;
    let _schema_id = stream.read_i32_le()?;
    let schema_offset = stream.read_i32_le()?;

    if length < 0 || schema_offset < 0 {
        return Err(CodecError::NegativeLength(length.min(schema_offset)));
    }

    let mut values = Vec::new();
    while stream.position() - object_start < schema_offset as usize {
        values.push(crate::codec::decode(stream)?);
    }
    if stream.position() - object_start != schema_offset as usize {
        return Err(CodecError::InvalidSchema("field bodies did not align with schema_offset"));
    }

    let footer_end = object_start + length as usize;
    let mut field_ids = Vec::with_capacity(values.len());
    while stream.position() < footer_end {
        let id = stream.read_i32_le()?;
        let _offset = stream.read_i32_le()?;
        field_ids.push(id);
    }

    if field_ids.len() != values.len() {
        return Err(CodecError::InvalidSchema("schema footer field count does not match body"));
    }

    Ok(ComplexObject {
        type_id,
        type_name: None,
        flags,
        fields: field_ids.into_iter().zip(values).collect(),
        field_names: HashMap::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_id_is_a_pure_function_of_field_order() {
        let a = ComplexObject::builder("Foo").field("id", 1i32).field("name", "x").build();
        let b = ComplexObject::builder("Foo").field("name", "x").field("id", 1i32).build();
        assert_ne!(a.schema_id(), b.schema_id());
    }

    #[test]
    fn type_id_matches_entity_id_of_name() {
        let obj = ComplexObject::builder("MyType").field("id", 1i32).build();
        assert_eq!(obj.type_id, entity_id::entity_id("MyType"));
    }

    #[test]
    fn hash_matches_known_values_for_ascii_and_utf8_fields() {
        let internal_ascii = ComplexObject::builder("Internal")
            .field("id", 2i32)
            .field("str", "lorem ipsum")
            .build();
        let ascii = ComplexObject::builder("TestObject")
            .field("id", 1i32)
            .field("str", "test_string")
            .field("internal", Value::Complex(internal_ascii))
            .build();
        assert_eq!(ascii.hash().unwrap(), -1314567146);

        let internal_utf8 = ComplexObject::builder("Internal")
            .field("id", 2i32)
            .field("str", "ユニコード")
            .build();
        let utf8 = ComplexObject::builder("TestObject")
            .field("id", 1i32)
            .field("str", "юникод")
            .field("internal", Value::Complex(internal_utf8))
            .build();
        assert_eq!(utf8.hash().unwrap(), -1945378474);
    }

    #[test]
    fn round_trip_preserves_type_id_schema_id_and_fields() {
        let obj = ComplexObject::builder("Point")
            .field("x", 1i32)
            .field("y", 2i32)
            .build();

        let mut stream = crate::stream::Stream::new();
        crate::codec::encode(&mut stream, &Value::Complex(obj.clone())).unwrap();

        let mut reader = crate::stream::Stream::from_vec(stream.into_vec());
        let decoded = crate::codec::decode(&mut reader).unwrap();

        match decoded {
            Value::Complex(back) => {
                assert_eq!(back.type_id, obj.type_id);
                assert_eq!(back.schema_id(), obj.schema_id());
                assert_eq!(back.field_ids(), obj.field_ids());
                assert_eq!(back.field_by_name("x"), Some(&Value::Int(1)));
                assert_eq!(back.field_by_name("y"), Some(&Value::Int(2)));
            }
            other => panic!("expected Complex, got {other:?}"),
        }
    }
}
