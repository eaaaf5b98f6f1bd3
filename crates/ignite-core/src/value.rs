//! The tagged value system: one `type_code: u8` per value, as described in
//! the wire contract. This module only defines the *shape*; encoding and
//! decoding live in `codec`.

use uuid::Uuid;

use crate::complex_object::ComplexObject;
use crate::error::CodecError;

/// Type-code constants for the closed set of wire types.
///
/// A handful of these (`STRING`, `OBJECT_ARRAY`, `COLLECTION`, `MAP`,
/// `DECIMAL`, `NULL`) are fixed by the wire contract; the rest are filled in
/// around them without colliding.
pub mod type_code {
    pub const BYTE: u8 = 1;
    pub const SHORT: u8 = 2;
    pub const INT: u8 = 3;
    pub const LONG: u8 = 4;
    pub const FLOAT: u8 = 5;
    pub const DOUBLE: u8 = 6;
    pub const CHAR: u8 = 7;
    pub const BOOL: u8 = 8;
    pub const STRING: u8 = 9;
    pub const UUID: u8 = 10;
    pub const DATE: u8 = 11;
    pub const BYTE_ARRAY: u8 = 12;
    pub const SHORT_ARRAY: u8 = 13;
    pub const INT_ARRAY: u8 = 14;
    pub const LONG_ARRAY: u8 = 15;
    pub const FLOAT_ARRAY: u8 = 16;
    pub const DOUBLE_ARRAY: u8 = 17;
    pub const CHAR_ARRAY: u8 = 18;
    pub const BOOL_ARRAY: u8 = 19;
    pub const STRING_ARRAY: u8 = 20;
    pub const UUID_ARRAY: u8 = 21;
    pub const DATE_ARRAY: u8 = 22;
    pub const OBJECT_ARRAY: u8 = 0x17;
    pub const COLLECTION: u8 = 0x18;
    pub const TIME: u8 = 25;
    pub const TIMESTAMP: u8 = 26;
    pub const TIME_ARRAY: u8 = 27;
    pub const TIMESTAMP_ARRAY: u8 = 28;
    pub const MAP: u8 = 0x1D;
    pub const DECIMAL: u8 = 0x1E;
    pub const DECIMAL_ARRAY: u8 = 31;
    pub const ENUM: u8 = 32;
    pub const ENUM_ARRAY: u8 = 33;
    pub const COMPLEX_OBJECT: u8 = 34;
    pub const WRAPPED_BINARY: u8 = 35;
    pub const NULL: u8 = 101;
}

/// `kind` byte for `Collection` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CollectionKind {
    UserCollection = 0,
    ArrayList = 1,
    LinkedList = 2,
    HashSet = 3,
    LinkedHashSet = 4,
    SingletonList = 5,
    UserSet = 6,
}

impl TryFrom<u8> for CollectionKind {
    type Error = CodecError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::UserCollection),
            1 => Ok(Self::ArrayList),
            2 => Ok(Self::LinkedList),
            3 => Ok(Self::HashSet),
            4 => Ok(Self::LinkedHashSet),
            5 => Ok(Self::SingletonList),
            6 => Ok(Self::UserSet),
            other => Err(CodecError::UnknownCollectionKind(other)),
        }
    }
}

/// `kind` byte for `Map` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MapKind {
    HashMap = 1,
    LinkedHashMap = 2,
}

impl TryFrom<u8> for MapKind {
    type Error = CodecError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(Self::HashMap),
            2 => Ok(Self::LinkedHashMap),
            other => Err(CodecError::UnknownMapKind(other)),
        }
    }
}

/// Sign-magnitude, big-endian-bytes decimal. `scale` and the raw magnitude
/// bytes are preserved exactly as received — this type never normalizes or
/// reinterprets them, so a round trip is always lossless.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decimal {
    pub scale: i32,
    /// Sign-magnitude, big-endian. The high bit of the first byte is the
    /// sign bit (1 = negative), matching Java `BigInteger.toByteArray()`
    /// two's-complement... except the wire contract here is explicitly
    /// sign-magnitude, so callers must not treat this as two's complement.
    pub magnitude: Vec<u8>,
}

impl Decimal {
    pub fn new(scale: i32, magnitude: Vec<u8>) -> Self {
        Self { scale, magnitude }
    }

    pub fn is_negative(&self) -> bool {
        self.magnitude.first().is_some_and(|b| b & 0x80 != 0)
    }
}

/// A fully tagged wire value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(u16),
    Bool(bool),
    String(String),
    Uuid(Uuid),
    /// Milliseconds since the Unix epoch.
    Date(i64),
    /// Milliseconds since midnight.
    Time(i64),
    /// Milliseconds since the Unix epoch, plus a nanosecond tail (0..=999_999).
    Timestamp(i64, i32),
    Decimal(Decimal),
    Enum { type_id: i32, ordinal: i32 },

    ByteArray(Vec<i8>),
    ShortArray(Vec<i16>),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
    FloatArray(Vec<f32>),
    DoubleArray(Vec<f64>),
    CharArray(Vec<u16>),
    BoolArray(Vec<bool>),
    StringArray(Vec<String>),
    UuidArray(Vec<Uuid>),
    DateArray(Vec<i64>),
    TimeArray(Vec<i64>),
    TimestampArray(Vec<(i64, i32)>),
    DecimalArray(Vec<Decimal>),
    EnumArray { type_id: i32, ordinals: Vec<i32> },

    ObjectArray {
        element_type_id: i32,
        items: Vec<Value>,
    },
    Collection {
        kind: CollectionKind,
        items: Vec<Value>,
    },
    Map {
        kind: MapKind,
        entries: Vec<(Value, Value)>,
    },

    Complex(ComplexObject),

    /// Opaque length-prefixed blob the caller has already serialized
    /// (e.g. a nested binary object read without a schema), plus the
    /// server-relative offset it was read from.
    WrappedBinary { bytes: Vec<u8>, offset: i32 },
}

impl Value {
    pub fn type_code(&self) -> u8 {
        use type_code::*;
        match self {
            Value::Null => NULL,
            Value::Byte(_) => BYTE,
            Value::Short(_) => SHORT,
            Value::Int(_) => INT,
            Value::Long(_) => LONG,
            Value::Float(_) => FLOAT,
            Value::Double(_) => DOUBLE,
            Value::Char(_) => CHAR,
            Value::Bool(_) => BOOL,
            Value::String(_) => STRING,
            Value::Uuid(_) => UUID,
            Value::Date(_) => DATE,
            Value::Time(_) => TIME,
            Value::Timestamp(_, _) => TIMESTAMP,
            Value::Decimal(_) => DECIMAL,
            Value::Enum { .. } => ENUM,
            Value::ByteArray(_) => BYTE_ARRAY,
            Value::ShortArray(_) => SHORT_ARRAY,
            Value::IntArray(_) => INT_ARRAY,
            Value::LongArray(_) => LONG_ARRAY,
            Value::FloatArray(_) => FLOAT_ARRAY,
            Value::DoubleArray(_) => DOUBLE_ARRAY,
            Value::CharArray(_) => CHAR_ARRAY,
            Value::BoolArray(_) => BOOL_ARRAY,
            Value::StringArray(_) => STRING_ARRAY,
            Value::UuidArray(_) => UUID_ARRAY,
            Value::DateArray(_) => DATE_ARRAY,
            Value::TimeArray(_) => TIME_ARRAY,
            Value::TimestampArray(_) => TIMESTAMP_ARRAY,
            Value::DecimalArray(_) => DECIMAL_ARRAY,
            Value::EnumArray { .. } => ENUM_ARRAY,
            Value::ObjectArray { .. } => OBJECT_ARRAY,
            Value::Collection { .. } => COLLECTION,
            Value::Map { .. } => MAP,
            Value::Complex(_) => COMPLEX_OBJECT,
            Value::WrappedBinary { .. } => WRAPPED_BINARY,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

macro_rules! from_impl {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for Value {
            fn from(v: $ty) -> Value {
                Value::$variant(v)
            }
        }
    };
}

from_impl!(i8, Byte);
from_impl!(i16, Short);
from_impl!(i32, Int);
from_impl!(i64, Long);
from_impl!(f32, Float);
from_impl!(f64, Double);
from_impl!(bool, Bool);
from_impl!(String, String);
from_impl!(Uuid, Uuid);

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::String(v.to_owned())
    }
}

impl From<Option<Value>> for Value {
    fn from(v: Option<Value>) -> Value {
        v.unwrap_or(Value::Null)
    }
}

impl TryFrom<Value> for i64 {
    type Error = CodecError;

    fn try_from(v: Value) -> Result<Self, Self::Error> {
        match v {
            Value::Byte(b) => Ok(b as i64),
            Value::Short(s) => Ok(s as i64),
            Value::Int(i) => Ok(i as i64),
            Value::Long(l) => Ok(l),
            _ => Err(CodecError::InvalidSchema("value is not an integer type")),
        }
    }
}

impl TryFrom<Value> for String {
    type Error = CodecError;

    fn try_from(v: Value) -> Result<Self, Self::Error> {
        match v {
            Value::String(s) => Ok(s),
            _ => Err(CodecError::InvalidSchema("value is not a string")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_codes_match_the_fixed_wire_values() {
        assert_eq!(Value::String(String::new()).type_code(), 0x09);
        assert_eq!(
            Value::ObjectArray {
                element_type_id: 0,
                items: vec![]
            }
            .type_code(),
            0x17
        );
        assert_eq!(
            Value::Collection {
                kind: CollectionKind::ArrayList,
                items: vec![]
            }
            .type_code(),
            0x18
        );
        assert_eq!(
            Value::Map {
                kind: MapKind::HashMap,
                entries: vec![]
            }
            .type_code(),
            0x1D
        );
        assert_eq!(
            Value::Decimal(Decimal::new(0, vec![])).type_code(),
            0x1E
        );
        assert_eq!(Value::Null.type_code(), 101);
    }

    #[test]
    fn from_conversions_round_trip_into_try_from() {
        let v: Value = 42i64.into();
        let back: i64 = v.try_into().unwrap();
        assert_eq!(back, 42);
    }
}
