//! Encodes and decodes fully tagged `Value`s onto a `Stream`.
//!
//! Every value is `type_code: u8` followed by a type-specific body; this
//! module owns that dispatch. Collections, object arrays and maps recurse
//! back into `encode`/`decode` for their elements, since those elements are
//! themselves fully tagged.

use uuid::Uuid;

use crate::complex_object::{self, ComplexObject};
use crate::error::{CodecError, Result};
use crate::stream::Stream;
use crate::value::{CollectionKind, Decimal, MapKind, Value};

pub fn encode(stream: &mut Stream, value: &Value) -> Result<()> {
    stream.write_u8(value.type_code());
    match value {
        Value::Null => {}
        Value::Byte(v) => stream.write_i8(*v),
        Value::Short(v) => stream.write_i16_le(*v),
        Value::Int(v) => stream.write_i32_le(*v),
        Value::Long(v) => stream.write_i64_le(*v),
        Value::Float(v) => stream.write_f32_le(*v),
        Value::Double(v) => stream.write_f64_le(*v),
        Value::Char(v) => stream.write_u16_le(*v),
        Value::Bool(v) => stream.write_bool(*v),
        Value::String(v) => write_string_body(stream, v),
        Value::Uuid(v) => stream.write_bytes(v.as_bytes()),
        Value::Date(millis) => stream.write_i64_le(*millis),
        Value::Time(millis) => stream.write_i64_le(*millis),
        Value::Timestamp(millis, nanos) => {
            stream.write_i64_le(*millis);
            stream.write_i32_le(*nanos);
        }
        Value::Decimal(d) => write_decimal_body(stream, d),
        Value::Enum { type_id, ordinal } => {
            stream.write_i32_le(*type_id);
            stream.write_i32_le(*ordinal);
        }

        Value::ByteArray(items) => {
            stream.write_i32_le(items.len() as i32);
            items.iter().for_each(|v| stream.write_i8(*v));
        }
        Value::ShortArray(items) => {
            stream.write_i32_le(items.len() as i32);
            items.iter().for_each(|v| stream.write_i16_le(*v));
        }
        Value::IntArray(items) => {
            stream.write_i32_le(items.len() as i32);
            items.iter().for_each(|v| stream.write_i32_le(*v));
        }
        Value::LongArray(items) => {
            stream.write_i32_le(items.len() as i32);
            items.iter().for_each(|v| stream.write_i64_le(*v));
        }
        Value::FloatArray(items) => {
            stream.write_i32_le(items.len() as i32);
            items.iter().for_each(|v| stream.write_f32_le(*v));
        }
        Value::DoubleArray(items) => {
            stream.write_i32_le(items.len() as i32);
            items.iter().for_each(|v| stream.write_f64_le(*v));
        }
        Value::CharArray(items) => {
            stream.write_i32_le(items.len() as i32);
            items.iter().for_each(|v| stream.write_u16_le(*v));
        }
        Value::BoolArray(items) => {
            stream.write_i32_le(items.len() as i32);
            items.iter().for_each(|v| stream.write_bool(*v));
        }
        Value::StringArray(items) => {
            stream.write_i32_le(items.len() as i32);
            items.iter().for_each(|v| write_string_body(stream, v));
        }
        Value::UuidArray(items) => {
            stream.write_i32_le(items.len() as i32);
            items.iter().for_each(|v| stream.write_bytes(v.as_bytes()));
        }
        Value::DateArray(items) => {
            stream.write_i32_le(items.len() as i32);
            items.iter().for_each(|v| stream.write_i64_le(*v));
        }
        Value::TimeArray(items) => {
            stream.write_i32_le(items.len() as i32);
            items.iter().for_each(|v| stream.write_i64_le(*v));
        }
        Value::TimestampArray(items) => {
            stream.write_i32_le(items.len() as i32);
            for (millis, nanos) in items {
                stream.write_i64_le(*millis);
                stream.write_i32_le(*nanos);
            }
        }
        Value::DecimalArray(items) => {
            stream.write_i32_le(items.len() as i32);
            for d in items {
                write_decimal_body(stream, d);
            }
        }
        Value::EnumArray { type_id, ordinals } => {
            stream.write_i32_le(*type_id);
            stream.write_i32_le(ordinals.len() as i32);
            ordinals.iter().for_each(|v| stream.write_i32_le(*v));
        }

        Value::ObjectArray { element_type_id, items } => {
            stream.write_i32_le(*element_type_id);
            stream.write_i32_le(items.len() as i32);
            for item in items {
                encode(stream, item)?;
            }
        }
        Value::Collection { kind, items } => {
            stream.write_u8(*kind as u8);
            stream.write_i32_le(items.len() as i32);
            for item in items {
                encode(stream, item)?;
            }
        }
        Value::Map { kind, entries } => {
            stream.write_u8(*kind as u8);
            stream.write_i32_le(entries.len() as i32);
            for (k, v) in entries {
                encode(stream, k)?;
                encode(stream, v)?;
            }
        }

        Value::Complex(obj) => complex_object::write_body(stream, obj)?,

        Value::WrappedBinary { bytes, offset } => {
            stream.write_i32_le(bytes.len() as i32);
            stream.write_bytes(bytes);
            stream.write_i32_le(*offset);
        }
    }
    Ok(())
}

pub fn decode(stream: &mut Stream) -> Result<Value> {
    use crate::value::type_code::*;

    let tag = stream.read_u8()?;
    Ok(match tag {
        NULL => Value::Null,
        BYTE => Value::Byte(stream.read_i8()?),
        SHORT => Value::Short(stream.read_i16_le()?),
        INT => Value::Int(stream.read_i32_le()?),
        LONG => Value::Long(stream.read_i64_le()?),
        FLOAT => Value::Float(stream.read_f32_le()?),
        DOUBLE => Value::Double(stream.read_f64_le()?),
        CHAR => Value::Char(stream.read_u16_le()?),
        BOOL => Value::Bool(stream.read_bool()?),
        STRING => Value::String(read_string_body(stream)?),
        UUID => Value::Uuid(read_uuid_body(stream)?),
        DATE => Value::Date(stream.read_i64_le()?),
        TIME => Value::Time(stream.read_i64_le()?),
        TIMESTAMP => Value::Timestamp(stream.read_i64_le()?, stream.read_i32_le()?),
        DECIMAL => Value::Decimal(read_decimal_body(stream)?),
        ENUM => Value::Enum {
            type_id: stream.read_i32_le()?,
            ordinal: stream.read_i32_le()?,
        },

        BYTE_ARRAY => {
            let n = read_len(stream)?;
            Value::ByteArray(try_collect(n, || stream.read_i8())?)
        }
        SHORT_ARRAY => {
            let n = read_len(stream)?;
            Value::ShortArray(try_collect(n, || stream.read_i16_le())?)
        }
        INT_ARRAY => {
            let n = read_len(stream)?;
            Value::IntArray(try_collect(n, || stream.read_i32_le())?)
        }
        LONG_ARRAY => {
            let n = read_len(stream)?;
            Value::LongArray(try_collect(n, || stream.read_i64_le())?)
        }
        FLOAT_ARRAY => {
            let n = read_len(stream)?;
            Value::FloatArray(try_collect(n, || stream.read_f32_le())?)
        }
        DOUBLE_ARRAY => {
            let n = read_len(stream)?;
            Value::DoubleArray(try_collect(n, || stream.read_f64_le())?)
        }
        CHAR_ARRAY => {
            let n = read_len(stream)?;
            Value::CharArray(try_collect(n, || stream.read_u16_le())?)
        }
        BOOL_ARRAY => {
            let n = read_len(stream)?;
            Value::BoolArray(try_collect(n, || stream.read_bool())?)
        }
        STRING_ARRAY => {
            let n = read_len(stream)?;
            let mut items = Vec::with_capacity(n);
            for _ in 0..n {
                items.push(read_string_body(stream)?);
            }
            Value::StringArray(items)
        }
        UUID_ARRAY => {
            let n = read_len(stream)?;
            let mut items = Vec::with_capacity(n);
            for _ in 0..n {
                items.push(read_uuid_body(stream)?);
            }
            Value::UuidArray(items)
        }
        DATE_ARRAY => {
            let n = read_len(stream)?;
            Value::DateArray(try_collect(n, || stream.read_i64_le())?)
        }
        TIME_ARRAY => {
            let n = read_len(stream)?;
            Value::TimeArray(try_collect(n, || stream.read_i64_le())?)
        }
        TIMESTAMP_ARRAY => {
            let n = read_len(stream)?;
            let mut items = Vec::with_capacity(n);
            for _ in 0..n {
                items.push((stream.read_i64_le()?, stream.read_i32_le()?));
            }
            Value::TimestampArray(items)
        }
        DECIMAL_ARRAY => {
            let n = read_len(stream)?;
            let mut items = Vec::with_capacity(n);
            for _ in 0..n {
                items.push(read_decimal_body(stream)?);
            }
            Value::DecimalArray(items)
        }
        ENUM_ARRAY => {
            let type_id = stream.read_i32_le()?;
            let n = read_len(stream)?;
            Value::EnumArray {
                type_id,
                ordinals: try_collect(n, || stream.read_i32_le())?,
            }
        }

        OBJECT_ARRAY => {
            let element_type_id = stream.read_i32_le()?;
            let n = read_len(stream)?;
            let mut items = Vec::with_capacity(n);
            for _ in 0..n {
                items.push(decode(stream)?);
            }
            Value::ObjectArray { element_type_id, items }
        }
        COLLECTION => {
            let kind = CollectionKind::try_from(stream.read_u8()?)?;
            let n = read_len(stream)?;
            let mut items = Vec::with_capacity(n);
            for _ in 0..n {
                items.push(decode(stream)?);
            }
            Value::Collection { kind, items }
        }
        MAP => {
            let kind = MapKind::try_from(stream.read_u8()?)?;
            let n = read_len(stream)?;
            let mut entries = Vec::with_capacity(n);
            for _ in 0..n {
                entries.push((decode(stream)?, decode(stream)?));
            }
            Value::Map { kind, entries }
        }

        COMPLEX_OBJECT => Value::Complex(complex_object::read_body(stream)?),

        WRAPPED_BINARY => {
            let n = read_len(stream)?;
            let bytes = stream.read_bytes(n)?;
            let offset = stream.read_i32_le()?;
            Value::WrappedBinary { bytes, offset }
        }

        other => return Err(CodecError::UnknownTypeCode(other)),
    })
}

pub fn encode_to_vec(value: &Value) -> Result<Vec<u8>> {
    let mut stream = Stream::new();
    encode(&mut stream, value)?;
    Ok(stream.into_vec())
}

pub fn decode_from_slice(bytes: Vec<u8>) -> Result<Value> {
    let mut stream = Stream::from_vec(bytes);
    decode(&mut stream)
}

fn read_len(stream: &mut Stream) -> Result<usize> {
    let n = stream.read_i32_le()?;
    if n < 0 {
        return Err(CodecError::NegativeLength(n));
    }
    Ok(n as usize)
}

fn try_collect<T>(n: usize, mut read_one: impl FnMut() -> Result<T>) -> Result<Vec<T>> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        out.push(read_one()?);
    }
    Ok(out)
}

fn write_string_body(stream: &mut Stream, s: &str) {
    let bytes = s.as_bytes();
    stream.write_i32_le(bytes.len() as i32);
    stream.write_bytes(bytes);
}

fn read_string_body(stream: &mut Stream) -> Result<String> {
    let n = read_len(stream)?;
    let bytes = stream.read_bytes(n)?;
    Ok(std::str::from_utf8(&bytes)?.to_owned())
}

/// UUID bytes go on the wire big-endian, unlike every other multi-byte
/// field; `Uuid::as_bytes`/`from_bytes` are already the big-endian form.
fn read_uuid_body(stream: &mut Stream) -> Result<Uuid> {
    let bytes = stream.read_bytes(16)?;
    let arr: [u8; 16] = bytes.try_into().expect("read_bytes(16) returns exactly 16 bytes");
    Ok(Uuid::from_bytes(arr))
}

fn write_decimal_body(stream: &mut Stream, d: &Decimal) {
    stream.write_i32_le(d.scale);
    stream.write_i32_le(d.magnitude.len() as i32);
    stream.write_bytes(&d.magnitude);
}

fn read_decimal_body(stream: &mut Stream) -> Result<Decimal> {
    let scale = stream.read_i32_le()?;
    let n = read_len(stream)?;
    let magnitude = stream.read_bytes(n)?;
    Ok(Decimal::new(scale, magnitude))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(v: Value) -> Value {
        let bytes = encode_to_vec(&v).unwrap();
        decode_from_slice(bytes).unwrap()
    }

    #[test]
    fn primitives_round_trip() {
        assert_eq!(round_trip(Value::Null), Value::Null);
        assert_eq!(round_trip(Value::Int(-7)), Value::Int(-7));
        assert_eq!(round_trip(Value::Long(i64::MAX)), Value::Long(i64::MAX));
        assert_eq!(round_trip(Value::Bool(true)), Value::Bool(true));
        assert_eq!(
            round_trip(Value::String("hello, ignite".into())),
            Value::String("hello, ignite".into())
        );
        assert_eq!(round_trip(Value::Uuid(Uuid::nil())), Value::Uuid(Uuid::nil()));
    }

    #[test]
    fn arrays_round_trip() {
        let v = Value::IntArray(vec![1, 2, 3, -4]);
        assert_eq!(round_trip(v.clone()), v);

        let v = Value::StringArray(vec!["a".into(), "bb".into()]);
        assert_eq!(round_trip(v.clone()), v);
    }

    #[test]
    fn nested_collection_and_map_round_trip() {
        let v = Value::Collection {
            kind: CollectionKind::ArrayList,
            items: vec![Value::Int(1), Value::String("x".into()), Value::Null],
        };
        assert_eq!(round_trip(v.clone()), v);

        let v = Value::Map {
            kind: MapKind::HashMap,
            entries: vec![(Value::String("k".into()), Value::Int(1))],
        };
        assert_eq!(round_trip(v.clone()), v);
    }

    #[test]
    fn decimal_preserves_sign_magnitude_bytes() {
        let v = Value::Decimal(Decimal::new(2, vec![0x80, 0x01]));
        assert_eq!(round_trip(v.clone()), v);
    }

    #[test]
    fn unknown_type_code_is_rejected() {
        let bytes = vec![0xEE];
        assert!(matches!(
            decode_from_slice(bytes),
            Err(CodecError::UnknownTypeCode(0xEE))
        ));
    }
}
