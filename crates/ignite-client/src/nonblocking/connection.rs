//! Cooperative non-blocking connection: the same contract as
//! `connection::Connection`, but suspension points are the socket
//! read/write calls and the sleep between reconnect attempts, and the
//! per-connection lock is an async mutex rather than a blocking one.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use uuid::Uuid;

use ignite_core::ProtocolContext;

use crate::config::ClientConfig;
use crate::connection::ConnectionState;
use crate::error::{IgniteError, Result};
use crate::{handshake, reconnect};

use super::tls;

enum Socket {
    Plain(TcpStream),
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

impl Socket {
    async fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        match self {
            Socket::Plain(s) => s.write_all(buf).await,
            Socket::Tls(s) => s.write_all(buf).await,
        }
    }

    async fn read_exact(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        match self {
            Socket::Plain(s) => s.read_exact(buf).await.map(|_| ()),
            Socket::Tls(s) => s.read_exact(buf).await.map(|_| ()),
        }
    }
}

struct Inner {
    socket: Option<Socket>,
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

    pub fn next_query_id(&self) -> i64 {
        self.query_id.fetch_add(1, Ordering::Relaxed)
    }

    pub async fn state(&self) -> ConnectionState {
        self.inner.lock().await.state
    }

    pub async fn is_alive(&self) -> bool {
        self.state().await == ConnectionState::Open
    }

    pub async fn uuid(&self) -> Option<Uuid> {
        self.inner.lock().await.uuid
    }

    pub async fn protocol_context(&self) -> Option<ProtocolContext> {
        self.inner.lock().await.protocol_context.clone()
    }

    /// Any failure along the way leaves the connection `Failed`, not stuck
    /// `Handshaking`, so it's still a candidate for the next reconnect
    /// attempt.
    pub async fn connect(&self) -> Result<()> {
        match self.try_connect().await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.inner.lock().await.state = ConnectionState::Failed;
                Err(err)
            }
        }
    }

    async fn try_connect(&self) -> Result<()> {
        {
            let mut guard = self.inner.lock().await;
            guard.state = ConnectionState::Handshaking;
        }

        let addr = format!("{}:{}", self.host, self.port);
        let tcp = tokio::time::timeout(self.config.timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| IgniteError::ConnectionBroken("connect timed out".into()))?
            .map_err(IgniteError::SocketError)?;
        tcp.set_nodelay(true).ok();

        let mut socket = if self.config.tls.enabled {
            Socket::Tls(Box::new(tls::wrap(tcp, &self.host, &self.config.tls).await?))
        } else {
            Socket::Plain(tcp)
        };

        let mut proposed = ignite_core::protocol::KNOWN_VERSIONS[0];
        let (uuid, context) = loop {
            let request = handshake::build_request(proposed, &self.config);
            timed(self.config.timeout, socket.write_all(&request)).await?;

            let body = read_frame(&mut socket, self.config.timeout).await?;
            match handshake::parse_response(body, proposed)? {
                handshake::Outcome::Success { features, node_uuid } => {
                    break (node_uuid, handshake::context_from_outcome(proposed, features));
                }
                handshake::Outcome::Retry(version) => proposed = version,
                handshake::Outcome::Fatal(err) => return Err(err),
            }
        };

        let mut guard = self.inner.lock().await;
        guard.socket = Some(socket);
        guard.uuid = Some(uuid);
        guard.protocol_context = Some(context);
        guard.state = ConnectionState::Open;
        Ok(())
    }

    pub async fn send(&self, bytes: &[u8]) -> Result<()> {
        let mut guard = self.inner.lock().await;
        let Some(socket) = guard.socket.as_mut() else {
            return Err(IgniteError::ConnectionBroken("not connected".into()));
        };
        match timed(self.config.timeout, socket.write_all(bytes)).await {
            Ok(()) => Ok(()),
            Err(e) => {
                guard.state = ConnectionState::Failed;
                Err(e)
            }
        }
    }

    pub async fn recv(&self) -> Result<Vec<u8>> {
        let mut guard = self.inner.lock().await;
        let Some(socket) = guard.socket.as_mut() else {
            return Err(IgniteError::ConnectionBroken("not connected".into()));
        };
        match read_frame(socket, self.config.timeout).await {
            Ok(body) => Ok(body),
            Err(e) => {
                guard.state = ConnectionState::Failed;
                Err(e)
            }
        }
    }

    pub async fn mark_in_use(&self, in_use: bool) {
        self.inner.lock().await.in_use = in_use;
    }

    pub async fn is_in_use(&self) -> bool {
        self.inner.lock().await.in_use
    }

    pub async fn close(&self, release: bool) {
        let mut guard = self.inner.lock().await;
        guard.socket = None;
        guard.state = ConnectionState::Closed;
        if release {
            guard.in_use = false;
        }
    }

    pub async fn reconnect(&self) -> Result<()> {
        let mut attempt = 0u32;
        loop {
            match self.connect().await {
                Ok(()) => return Ok(()),
                Err(err) => match reconnect::backoff_for(attempt) {
                    Some(delay) => {
                        tracing::warn!(attempt, error = %err, "reconnect attempt failed, backing off");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        let mut guard = self.inner.lock().await;
                        guard.state = ConnectionState::Fresh;
                        return Err(IgniteError::ReconnectError);
                    }
                },
            }
        }
    }

    /// Kicks off `reconnect()` as a background task if this connection is
    /// `Failed` or quiescent (`Fresh` after a prior backoff sequence ran
    /// out), and no reconnect attempt is already in flight. The pool calls
    /// this from `alive()` so a dead connection recovers without the
    /// caller awaiting the backoff sequence.
    pub async fn ensure_background_reconnect(self: &Arc<Self>) {
        if !matches!(self.state().await, ConnectionState::Failed | ConnectionState::Fresh) {
            return;
        }
        if self.reconnecting.swap(true, Ordering::SeqCst) {
            return;
        }

        let connection = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = connection.reconnect().await {
                tracing::warn!(host = %connection.host, port = connection.port, error = %err, "background reconnect exhausted");
            }
            connection.reconnecting.store(false, Ordering::SeqCst);
        });
    }
}

async fn timed<T>(timeout: std::time::Duration, fut: impl std::future::Future<Output = std::io::Result<T>>) -> Result<T> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| IgniteError::ConnectionBroken("I/O timed out".into()))?
        .map_err(IgniteError::SocketError)
}

async fn read_frame(socket: &mut Socket, timeout: std::time::Duration) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    timed(timeout, socket.read_exact(&mut len_buf)).await.map_err(map_eof)?;
    let len = i32::from_le_bytes(len_buf);
    if len < 0 {
        return Err(IgniteError::ProtocolViolation(format!("negative frame length {len}")));
    }
    let mut body = vec![0u8; len as usize];
    timed(timeout, socket.read_exact(&mut body)).await.map_err(map_eof)?;
    Ok(body)
}

fn map_eof(err: IgniteError) -> IgniteError {
    match err {
        IgniteError::SocketError(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            IgniteError::ConnectionBroken("short read on a live socket".into())
        }
        other => other,
    }
}
