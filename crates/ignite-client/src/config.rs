//! Client configuration.
//!
//! Resolution order mirrors the rest of this stack: explicit builder calls →
//! `IGNITE_*` environment overrides → defaults. There is no config *file*
//! here (unlike a long-running daemon, this is an embedded client), but the
//! env-override convention is kept for parity with how the stack configures
//! everything else.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use ignite_core::Value;

/// `(create, update, access)` TTLs in nanoseconds. `-1` = unset (no change
/// to the cache's default policy for that operation kind), `-2` = eternal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryPolicy {
    pub create: i64,
    pub update: i64,
    pub access: i64,
}

impl ExpiryPolicy {
    pub const UNSET: i64 = -1;
    pub const ETERNAL: i64 = -2;

    pub fn new(create: i64, update: i64, access: i64) -> Self {
        Self { create, update, access }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub enabled: bool,
    pub ca_file: Option<String>,
    pub cert_file: Option<String>,
    pub key_file: Option<String>,
    pub key_password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub seed_nodes: Vec<(String, u16)>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
    pub tls: TlsConfig,
    pub partition_aware: bool,
    pub default_expiry_policy: Option<ExpiryPolicy>,
    /// `key_hint`/`value_hint` attached to operations that don't name one
    /// explicitly; forces the codec to prefer the narrower wire
    /// representation for the values it touches (see `Value::type_code`).
    pub default_value_hint: Option<u8>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            seed_nodes: vec![("127.0.0.1".to_owned(), DEFAULT_PORT)],
            username: None,
            password: None,
            timeout: Duration::from_secs_f64(2.0),
            tls: TlsConfig::default(),
            partition_aware: true,
            default_expiry_policy: None,
            default_value_hint: None,
        }
    }
}

pub const DEFAULT_PORT: u16 = 10800;

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder(Self::default())
    }

    /// Apply `IGNITE_*` environment overrides on top of an already-built config.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("IGNITE_TIMEOUT_SECS") {
            if let Ok(secs) = v.parse::<f64>() {
                self.timeout = Duration::from_secs_f64(secs);
            }
        }
        if let Ok(v) = std::env::var("IGNITE_USERNAME") {
            self.username = Some(v);
        }
        if let Ok(v) = std::env::var("IGNITE_PASSWORD") {
            self.password = Some(v);
        }
        if let Ok(v) = std::env::var("IGNITE_PARTITION_AWARE") {
            self.partition_aware = v == "true" || v == "1";
        }
        if let Ok(v) = std::env::var("IGNITE_USE_SSL") {
            self.tls.enabled = v == "true" || v == "1";
        }
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => Some((u, p)),
            _ => None,
        }
    }
}

pub struct ClientConfigBuilder(ClientConfig);

impl ClientConfigBuilder {
    pub fn seed(mut self, host: impl Into<String>, port: u16) -> Self {
        self.0.seed_nodes.push((host.into(), port));
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.0.username = Some(username.into());
        self.0.password = Some(password.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.0.timeout = timeout;
        self
    }

    pub fn use_ssl(mut self, tls: TlsConfig) -> Self {
        self.0.tls = tls;
        self
    }

    pub fn partition_aware(mut self, enabled: bool) -> Self {
        self.0.partition_aware = enabled;
        self
    }

    pub fn default_expiry_policy(mut self, policy: ExpiryPolicy) -> Self {
        self.0.default_expiry_policy = Some(policy);
        self
    }

    pub fn build(mut self) -> ClientConfig {
        if self.0.seed_nodes.len() > 1 {
            // the constructor default seed gets dropped once the caller adds their own
            self.0.seed_nodes.retain(|(h, p)| (h.as_str(), *p) != ("127.0.0.1", DEFAULT_PORT));
        }
        self.0.apply_env_overrides();
        self.0
    }
}

/// Forces the codec to encode a value as its narrower wire type (e.g. a
/// `42i32` as `Short` rather than the default-sized representation).
pub fn apply_type_hint(value: Value, hint: Option<u8>) -> Value {
    use ignite_core::value::type_code;

    let Some(hint) = hint else { return value };
    match (value, hint) {
        (Value::Long(v), code) if code == type_code::SHORT => Value::Short(v as i16),
        (Value::Long(v), code) if code == type_code::INT => Value::Int(v as i32),
        (Value::Int(v), code) if code == type_code::SHORT => Value::Short(v as i16),
        (Value::Int(v), code) if code == type_code::BYTE => Value::Byte(v as i8),
        (other, _) => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_one_local_seed() {
        let config = ClientConfig::default();
        assert_eq!(config.seed_nodes, vec![("127.0.0.1".to_owned(), DEFAULT_PORT)]);
        assert!(config.partition_aware);
    }

    #[test]
    fn builder_replaces_default_seed_once_a_real_one_is_added() {
        let config = ClientConfig::builder().seed("10.0.0.1", 10800).build();
        assert_eq!(config.seed_nodes, vec![("10.0.0.1".to_owned(), 10800)]);
    }

    #[test]
    fn type_hint_narrows_integer_width() {
        let v = apply_type_hint(Value::Long(42), Some(ignite_core::value::type_code::SHORT));
        assert_eq!(v, Value::Short(42));
    }
}
