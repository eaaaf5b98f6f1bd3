//! Connection, pool, and cursor layers for the GridGain/Ignite thin-client
//! protocol: everything above the wire codec in `ignite-core`.

pub mod affinity;
pub mod binary;
pub mod client;
pub mod config;
pub mod connection;
pub mod cursor;
mod dispatch;
pub mod error;
mod frame;
mod handshake;
pub mod nonblocking;
mod reconnect;
pub mod pool;
pub mod request;
mod tls;

pub use client::{Cache, Client};
pub use config::{ClientConfig, ExpiryPolicy, TlsConfig};
pub use error::{IgniteError, Result};
pub use request::CacheHandle;
