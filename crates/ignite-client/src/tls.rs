//! TLS wrapping for the blocking connection, via `rustls`.
//!
//! Root trust comes from the configured CA file if given, else the OS
//! native trust store. A client cert/key pair is used for mutual TLS when
//! both are configured.

use std::io::BufReader;
use std::net::TcpStream;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::{ClientConfig as RustlsClientConfig, ClientConnection, RootCertStore, StreamOwned};

use crate::config::TlsConfig;
use crate::error::{IgniteError, Result};

pub fn wrap(tcp: TcpStream, host: &str, config: &TlsConfig) -> Result<StreamOwned<ClientConnection, TcpStream>> {
    let rustls_cfg = rustls_config(config)?;

    let server_name = ServerName::try_from(host.to_owned())
        .map_err(|_| IgniteError::ParameterError(format!("invalid TLS server name: {host}")))?;

    let connection = ClientConnection::new(Arc::new(rustls_cfg), server_name)
        .map_err(|e| IgniteError::ParameterError(format!("failed to start TLS session: {e}")))?;

    Ok(StreamOwned::new(connection, tcp))
}

/// Builds the shared `rustls` client config from our TLS settings; used by
/// both the blocking connection (above) and the non-blocking one.
pub fn rustls_config(config: &TlsConfig) -> Result<RustlsClientConfig> {
    let root_store = build_root_store(config)?;

    let builder = RustlsClientConfig::builder().with_root_certificates(root_store);
    match (&config.cert_file, &config.key_file) {
        (Some(cert_path), Some(key_path)) => {
            let certs = load_certs(cert_path)?;
            let key = load_key(key_path)?;
            builder
                .with_client_auth_cert(certs, key)
                .map_err(|e| IgniteError::ParameterError(format!("invalid client certificate/key: {e}")))
        }
        _ => Ok(builder.with_no_client_auth()),
    }
}

fn build_root_store(config: &TlsConfig) -> Result<RootCertStore> {
    let mut store = RootCertStore::empty();
    match &config.ca_file {
        Some(path) => {
            for cert in load_certs(path)? {
                store
                    .add(cert)
                    .map_err(|e| IgniteError::ParameterError(format!("invalid CA certificate: {e}")))?;
            }
        }
        None => {
            for cert in rustls_native_certs::load_native_certs().map_err(IgniteError::SocketError)? {
                store
                    .add(cert)
                    .map_err(|e| IgniteError::ParameterError(format!("invalid native CA certificate: {e}")))?;
            }
        }
    }
    Ok(store)
}

fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>> {
    let file = std::fs::File::open(path).map_err(IgniteError::SocketError)?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(IgniteError::SocketError)
}

fn load_key(path: &str) -> Result<PrivateKeyDer<'static>> {
    let file = std::fs::File::open(path).map_err(IgniteError::SocketError)?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)
        .map_err(IgniteError::SocketError)?
        .ok_or_else(|| IgniteError::ParameterError(format!("no private key found in {path}")))
}
