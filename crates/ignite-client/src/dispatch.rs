//! Shared request/response plumbing used by every op-group in `request/`
//! and by `cursor`: send a framed request, read one framed response, turn
//! a non-zero status into the right domain error.

use ignite_core::Stream;

use crate::connection::Connection;
use crate::error::{IgniteError, Result};
use crate::frame;

/// What a non-zero response status should be reported as; each op-group
/// maps its own failures (cache vs SQL vs binary-type vs cluster) to the
/// matching `IgniteError` variant.
pub trait StatusError {
    fn status_error(status: i32, message: String) -> IgniteError;
}

pub struct AsCacheError;
impl StatusError for AsCacheError {
    fn status_error(status: i32, message: String) -> IgniteError {
        IgniteError::CacheError { status, message }
    }
}

pub struct AsSqlError;
impl StatusError for AsSqlError {
    fn status_error(status: i32, message: String) -> IgniteError {
        IgniteError::SqlError { status, message }
    }
}

pub struct AsBinaryTypeError;
impl StatusError for AsBinaryTypeError {
    fn status_error(status: i32, message: String) -> IgniteError {
        IgniteError::BinaryTypeError { status, message }
    }
}

pub struct AsClusterError;
impl StatusError for AsClusterError {
    fn status_error(status: i32, message: String) -> IgniteError {
        IgniteError::ClusterError { status, message }
    }
}

/// Sends `request` over `connection`, reads the one response frame it
/// provokes, and returns the body stream positioned right after the
/// status check — or `E`'s mapped error if the status was non-zero.
pub fn round_trip<E: StatusError>(connection: &Connection, request: Vec<u8>) -> Result<Stream> {
    connection.send(&request)?;
    let raw = connection.recv()?;
    let (header, mut stream) = frame::parse_response_header(raw)?;
    if header.status != 0 {
        let message = frame::read_error_message(&mut stream)?;
        return Err(E::status_error(header.status, message));
    }
    Ok(stream)
}

/// Cache operations carry an extra `flags:i32` word at the front of a
/// successful body, ahead of the payload proper: bit 0 signals the
/// accessed cache's affinity topology changed since the pool last saw it.
pub fn read_cache_flags(stream: &mut Stream) -> Result<i32> {
    stream.read_i32_le().map_err(IgniteError::from)
}

pub fn flags_changed_topology(flags: i32) -> bool {
    flags & frame::FLAG_TOPOLOGY_CHANGED != 0
}
