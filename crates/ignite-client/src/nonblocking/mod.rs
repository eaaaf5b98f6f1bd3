//! Cooperative non-blocking execution mode (tokio + tokio-rustls), sharing
//! the blocking side's pure-data codec, handshake, reconnect, affinity, and
//! binary-type-registry logic. `pool`, `dispatch`, `request`, `cursor`, and
//! `client` are async counterparts of their blocking siblings — everything
//! transport-agnostic is reused from there rather than duplicated.

pub mod client;
pub mod connection;
mod cursor;
mod dispatch;
pub mod pool;
pub mod request;
mod tls;

pub use client::{Cache, Client};
pub use connection::Connection;
pub use cursor::{FieldsCursor, KvCursor};
pub use pool::Pool;
