//! Blocking connection: one TCP (or TLS) session to one node.
//!
//! A per-connection mutex protects `{socket, state, in_use}`; it is held
//! only for metadata transitions, never across a blocking read or write —
//! matching the non-blocking connection's suspension-point semantics.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use uuid::Uuid;

use ignite_core::ProtocolContext;

use crate::config::ClientConfig;
use crate::error::{IgniteError, Result};
use crate::{handshake, reconnect, tls};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Fresh,
    Handshaking,
    Open,
    Failed,
    Closed,
}

trait IoStream: Read + Write + Send {}
impl<T: Read + Write + Send> IoStream for T {}

struct Inner {
    socket: Option<Box<dyn IoStream>>,
    state: ConnectionState,
    in_use: bool,
    uuid: Option<Uuid>,
    protocol_context: Option<ProtocolContext>,
}

pub struct Connection {
    host: String,
    port: u16,
    config: Arc<ClientConfig>,
    inner: Mutex<Inner>,
    query_id: AtomicI64,
    reconnecting: AtomicBool,
}

impl Connection {
    pub fn new(host: impl Into<String>, port: u16, config: Arc<ClientConfig>) -> Self {
        Self {
            host: host.into(),
            port,
            config,
            inner: Mutex::new(Inner {
                socket: None,
                state: ConnectionState::Fresh,
                in_use: false,
                uuid: None,
                protocol_context: None,
            }),
            query_id: AtomicI64::new(1),
            reconnecting: AtomicBool::new(false),
        }
    }

    /// Monotonic per-connection request id; request/response correlation
    /// only has to hold within one connection's serialized send-then-receive.
    pub fn next_query_id(&self) -> i64 {
        self.query_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().expect("connection mutex poisoned").state
    }

    pub fn is_alive(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub fn uuid(&self) -> Option<Uuid> {
        self.inner.lock().expect("connection mutex poisoned").uuid
    }

    pub fn protocol_context(&self) -> Option<ProtocolContext> {
        self.inner.lock().expect("connection mutex poisoned").protocol_context.clone()
    }

    /// TCP connect with timeout, TLS-wrap if configured, then the
    /// handshake loop with version fallback. Any failure along the way
    /// leaves the connection `Failed`, not stuck `Handshaking`, so it's
    /// still a candidate for the next reconnect attempt.
    pub fn connect(&self) -> Result<()> {
        match self.try_connect() {
            Ok(()) => Ok(()),
            Err(err) => {
                self.inner.lock().expect("connection mutex poisoned").state = ConnectionState::Failed;
                Err(err)
            }
        }
    }

    fn try_connect(&self) -> Result<()> {
        {
            let mut guard = self.inner.lock().expect("connection mutex poisoned");
            guard.state = ConnectionState::Handshaking;
        }

        let addr = format!("{}:{}", self.host, self.port);
        let tcp = TcpStream::connect(&addr).map_err(IgniteError::SocketError)?;
        tcp.set_read_timeout(Some(self.config.timeout)).ok();
        tcp.set_write_timeout(Some(self.config.timeout)).ok();
        tcp.set_nodelay(true).ok();

        let mut socket: Box<dyn IoStream> = if self.config.tls.enabled {
            Box::new(tls::wrap(tcp, &self.host, &self.config.tls)?)
        } else {
            Box::new(tcp)
        };

        let mut proposed = ignite_core::protocol::KNOWN_VERSIONS[0];
        let (uuid, context) = loop {
            let request = handshake::build_request(proposed, &self.config);
            socket.write_all(&request).map_err(IgniteError::SocketError)?;

            let body = read_frame(&mut socket)?;
            match handshake::parse_response(body, proposed)? {
                handshake::Outcome::Success { features, node_uuid } => {
                    break (node_uuid, handshake::context_from_outcome(proposed, features));
                }
                handshake::Outcome::Retry(version) => proposed = version,
                handshake::Outcome::Fatal(err) => return Err(err),
            }
        };

        let mut guard = self.inner.lock().expect("connection mutex poisoned");
        guard.socket = Some(socket);
        guard.uuid = Some(uuid);
        guard.protocol_context = Some(context);
        guard.state = ConnectionState::Open;
        Ok(())
    }

    /// Write all bytes or fail; an I/O error marks the connection failed.
    pub fn send(&self, bytes: &[u8]) -> Result<()> {
        let mut guard = self.inner.lock().expect("connection mutex poisoned");
        let Some(socket) = guard.socket.as_mut() else {
            return Err(IgniteError::ConnectionBroken("not connected".into()));
        };
        match socket.write_all(bytes) {
            Ok(()) => Ok(()),
            Err(e) => {
                guard.state = ConnectionState::Failed;
                Err(IgniteError::SocketError(e))
            }
        }
    }

    /// Read exactly one length-prefixed frame body.
    pub fn recv(&self) -> Result<Vec<u8>> {
        let mut guard = self.inner.lock().expect("connection mutex poisoned");
        let Some(socket) = guard.socket.as_mut() else {
            return Err(IgniteError::ConnectionBroken("not connected".into()));
        };
        match read_frame(socket) {
            Ok(body) => Ok(body),
            Err(e) => {
                guard.state = ConnectionState::Failed;
                Err(e)
            }
        }
    }

    pub fn mark_in_use(&self, in_use: bool) {
        self.inner.lock().expect("connection mutex poisoned").in_use = in_use;
    }

    pub fn is_in_use(&self) -> bool {
        self.inner.lock().expect("connection mutex poisoned").in_use
    }

    /// Best-effort shutdown. Idempotent. If `release` is false the
    /// connection stays flagged in-use and is not returned to the pool.
    pub fn close(&self, release: bool) {
        let mut guard = self.inner.lock().expect("connection mutex poisoned");
        if let Some(socket) = guard.socket.take() {
            drop(socket);
        }
        guard.state = ConnectionState::Closed;
        if release {
            guard.in_use = false;
        }
    }

    /// Synchronous reconnect loop: sleeps the backoff sequence between
    /// attempts. When the sequence is exhausted the state reverts to
    /// `Fresh` (quiescent) and the next `connect()` starts over.
    pub fn reconnect(&self) -> Result<()> {
        let mut attempt = 0u32;
        loop {
            match self.connect() {
                Ok(()) => return Ok(()),
                Err(err) => {
                    match reconnect::backoff_for(attempt) {
                        Some(delay) => {
                            tracing::warn!(attempt, error = %err, "reconnect attempt failed, backing off");
                            std::thread::sleep(delay);
                            attempt += 1;
                        }
                        None => {
                            let mut guard = self.inner.lock().expect("connection mutex poisoned");
                            guard.state = ConnectionState::Fresh;
                            return Err(IgniteError::ReconnectError);
                        }
                    }
                }
            }
        }
    }

    /// Kicks off `reconnect()` on a background thread if this connection is
    /// `Failed` or quiescent (`Fresh` after a prior backoff sequence ran
    /// out), and no reconnect attempt is already in flight. The pool calls
    /// this from `alive()` so a dead connection recovers without the
    /// caller blocking on the backoff sequence.
    pub fn ensure_background_reconnect(self: &Arc<Self>) {
        if !matches!(self.state(), ConnectionState::Failed | ConnectionState::Fresh) {
            return;
        }
        if self.reconnecting.swap(true, Ordering::SeqCst) {
            return;
        }

        let connection = Arc::clone(self);
        std::thread::spawn(move || {
            if let Err(err) = connection.reconnect() {
                tracing::warn!(host = %connection.host, port = connection.port, error = %err, "background reconnect exhausted");
            }
            connection.reconnecting.store(false, Ordering::SeqCst);
        });
    }
}

fn read_frame(socket: &mut Box<dyn IoStream>) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    read_exact_or_broken(socket, &mut len_buf)?;
    let len = i32::from_le_bytes(len_buf);
    if len < 0 {
        return Err(IgniteError::ProtocolViolation(format!("negative frame length {len}")));
    }
    let mut body = vec![0u8; len as usize];
    read_exact_or_broken(socket, &mut body)?;
    Ok(body)
}

fn read_exact_or_broken(socket: &mut Box<dyn IoStream>, buf: &mut [u8]) -> Result<()> {
    socket.read_exact(buf).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => {
            IgniteError::ConnectionBroken("short read on a live socket".into())
        }
        _ => IgniteError::SocketError(e),
    })
}

/// Kept for symmetry with `reconnect::backoff_for` callers that only need
/// the constant, without reaching into the module directly.
pub fn default_timeout() -> Duration {
    Duration::from_secs_f64(2.0)
}
