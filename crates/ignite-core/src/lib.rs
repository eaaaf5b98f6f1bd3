//! Wire codec and typed value system for the GridGain/Ignite thin-client
//! protocol. No I/O lives here; `ignite-client` builds the connection,
//! pool, and cursor layers on top of this crate's pure data types.

pub mod codec;
pub mod complex_object;
pub mod entity_id;
pub mod error;
pub mod protocol;
pub mod stream;
pub mod value;

pub use complex_object::ComplexObject;
pub use error::{CodecError, Result};
pub use protocol::{Feature, FeatureSet, ProtocolContext, ProtocolVersion};
pub use stream::Stream;
pub use value::{CollectionKind, Decimal, MapKind, Value};
