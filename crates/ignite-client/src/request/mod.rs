//! One module per protocol op-group, each a thin typed wrapper that
//! encodes its request through `ignite_core::codec`, dispatches it over a
//! connection via `dispatch::round_trip`, and decodes the response.

pub mod binary_type;
pub mod cache_config;
pub mod cluster;
pub mod key_value;
pub mod partitions;
pub mod scan;
pub mod sql;

pub use key_value::CacheHandle;
