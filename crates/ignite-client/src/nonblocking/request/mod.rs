//! Async mirror of `crate::request`: the same op-groups, the same wire
//! layouts, suspended at the connection instead of blocking on it.
//! `CacheHandle`, `ScanQuery`, `SqlQuery`/`SqlFieldsQuery`, `ClusterState`
//! and `ConfigProperty` carry no connection state, so they are reused
//! as-is from the blocking `request` module rather than redefined here.

pub mod binary_type;
pub mod cache_config;
pub mod cluster;
pub mod key_value;
pub mod partitions;
pub mod scan;
pub mod sql;

pub use crate::request::CacheHandle;
