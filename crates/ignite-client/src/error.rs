//! The error taxonomy surfaced to callers.
//!
//! One variant per failure mode, matching the propagation policy: socket
//! errors flip a connection to `failed` and may be retried by the
//! dispatcher; server-returned status becomes a domain error and is never
//! retried; capability gaps are rejected locally before touching the wire.

use ignite_core::{CodecError, ProtocolVersion};

#[derive(Debug, thiserror::Error)]
pub enum IgniteError {
    #[error("parameter error: {0}")]
    ParameterError(String),

    #[error("handshake failed: proposed {proposed}, server reported {server}")]
    HandshakeError {
        proposed: ProtocolVersion,
        server: ProtocolVersion,
    },

    #[error("authentication failed: {0}")]
    AuthenticationError(String),

    #[error("socket error: {0}")]
    SocketError(#[from] std::io::Error),

    #[error("connection broken: {0}")]
    ConnectionBroken(String),

    #[error("can not connect: all seed nodes exhausted")]
    ReconnectError,

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("operation requires a cluster feature not supported by the negotiated protocol: {0}")]
    NotSupportedByCluster(&'static str),

    #[error("cache error (status {status}): {message}")]
    CacheError { status: i32, message: String },

    #[error("SQL error (status {status}): {message}")]
    SqlError { status: i32, message: String },

    #[error("binary type error (status {status}): {message}")]
    BinaryTypeError { status: i32, message: String },

    #[error("cluster error (status {status}): {message}")]
    ClusterError { status: i32, message: String },

    #[error("cursor closed")]
    CursorClosed,

    #[error(transparent)]
    Codec(#[from] CodecError),
}

pub type Result<T> = std::result::Result<T, IgniteError>;
