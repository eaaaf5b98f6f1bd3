//! TLS wrapping for the cooperative non-blocking connection, via
//! `tokio-rustls`. Shares certificate/key loading with the blocking side.

use std::sync::Arc;

use rustls::pki_types::ServerName;
use rustls::ClientConfig as RustlsClientConfig;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use crate::config::TlsConfig;
use crate::error::{IgniteError, Result};
use crate::tls::rustls_config;

pub async fn wrap(tcp: TcpStream, host: &str, config: &TlsConfig) -> Result<TlsStream<TcpStream>> {
    let rustls_config: RustlsClientConfig = rustls_config(config)?;
    let connector = TlsConnector::from(Arc::new(rustls_config));

    let server_name = ServerName::try_from(host.to_owned())
        .map_err(|_| IgniteError::ParameterError(format!("invalid TLS server name: {host}")))?;

    connector
        .connect(server_name, tcp)
        .await
        .map_err(IgniteError::SocketError)
}
