//! Shared connection helper for CLI commands.

use anyhow::{Context, Result};

use ignite_client::{Client, ClientConfig};
use ignite_core::Value;

pub fn connect(addr: &str) -> Result<Client> {
    let (host, port) = addr
        .split_once(':')
        .context("--addr must be host:port")?;
    let port: u16 = port.parse().context("--addr port must be a number")?;

    let config = ClientConfig::builder().seed(host, port).build();
    Client::connect(config).with_context(|| format!("failed to connect to {addr} — is the node running?"))
}

/// Parses a CLI argument into a wire `Value`: integers become `Long`,
/// anything else is carried as a `String`.
pub fn parse_value(raw: &str) -> Value {
    match raw.parse::<i64>() {
        Ok(n) => Value::Long(n),
        Err(_) => Value::String(raw.to_owned()),
    }
}

pub fn print_value(value: &Value) {
    match value {
        Value::String(s) => println!("{s}"),
        Value::Null => println!("(null)"),
        other => println!("{other:?}"),
    }
}
