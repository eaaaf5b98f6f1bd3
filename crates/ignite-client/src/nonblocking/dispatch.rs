//! Async counterpart of `crate::dispatch`: same framing and status-mapping
//! rules, suspended at the socket read/write instead of blocking on them.
//! `StatusError` and its impls are transport-agnostic, so they are reused
//! as-is from the blocking module.

use ignite_core::Stream;

pub use crate::dispatch::{AsBinaryTypeError, AsCacheError, AsClusterError, AsSqlError, StatusError};
use crate::error::Result;
use crate::frame;

use super::connection::Connection;

pub async fn round_trip<E: StatusError>(connection: &Connection, request: Vec<u8>) -> Result<Stream> {
    connection.send(&request).await?;
    let raw = connection.recv().await?;
    let (header, mut stream) = frame::parse_response_header(raw)?;
    if header.status != 0 {
        let message = frame::read_error_message(&mut stream)?;
        return Err(E::status_error(header.status, message));
    }
    Ok(stream)
}

pub use crate::dispatch::{flags_changed_topology, read_cache_flags};
