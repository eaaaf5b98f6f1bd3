//! Pure-data handshake request/response handling.
//!
//! Kept free of any socket I/O so both the blocking and cooperative
//! non-blocking connections share exactly the same encode/decode logic —
//! only who calls `send`/`recv` differs.

use ignite_core::codec;
use ignite_core::value::{MapKind, Value};
use ignite_core::{FeatureSet, ProtocolContext, ProtocolVersion, Stream};
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::error::{IgniteError, Result};

/// Fixed client identifier required by the wire contract ("client_code").
const CLIENT_CODE: u8 = 2;
const OP_HANDSHAKE: u8 = 1;

pub fn build_request(proposed: ProtocolVersion, config: &ClientConfig) -> Vec<u8> {
    let mut stream = Stream::new();
    stream.write_u8(OP_HANDSHAKE);
    stream.write_i16_le(proposed.major);
    stream.write_i16_le(proposed.minor);
    stream.write_i16_le(proposed.patch);
    stream.write_u8(CLIENT_CODE);

    let supports_flags = proposed >= ProtocolVersion::new(1, 7, 0);
    if supports_flags {
        let features = FeatureSet::supported();
        stream.write_i32_le(features.as_bytes().len() as i32);
        stream.write_bytes(features.as_bytes());
    }

    if proposed >= ProtocolVersion::new(1, 7, 1) {
        let mut entries = Vec::new();
        if let Ok(zone) = std::env::var("TZ") {
            entries.push((Value::from("client.timezone"), Value::from(zone)));
        }
        let map = Value::Map {
            kind: MapKind::HashMap,
            entries,
        };
        codec::encode(&mut stream, &map).expect("map of strings always encodes");
    }

    if let Some((username, password)) = config.credentials() {
        codec::encode(&mut stream, &Value::from(username.to_owned())).expect("string encode is infallible");
        codec::encode(&mut stream, &Value::from(password.to_owned())).expect("string encode is infallible");
    }

    let body = stream.into_vec();
    let mut framed = Vec::with_capacity(4 + body.len());
    framed.extend_from_slice(&(body.len() as i32).to_le_bytes());
    framed.extend_from_slice(&body);
    framed
}

pub enum Outcome {
    Success {
        features: FeatureSet,
        node_uuid: Uuid,
    },
    /// Version mismatch; retry with the server-reported version if it is
    /// one we know.
    Retry(ProtocolVersion),
    Fatal(IgniteError),
}

/// Parses a handshake response frame body (the 4-byte length prefix has
/// already been stripped by the connection's framed read).
pub fn parse_response(body: Vec<u8>, proposed: ProtocolVersion) -> Result<Outcome> {
    let mut stream = Stream::from_vec(body);
    let op_code = stream.read_u8()?;

    if op_code == 0 {
        let server = ProtocolVersion::new(
            stream.read_i16_le()?,
            stream.read_i16_le()?,
            stream.read_i16_le()?,
        );
        let message = read_handshake_string(&mut stream)?;
        let _client_status = stream.read_i32_le()?;

        return Ok(if server == ProtocolVersion::new(0, 0, 0) {
            Outcome::Fatal(IgniteError::AuthenticationError(message))
        } else if server.is_known() {
            Outcome::Retry(server)
        } else {
            Outcome::Fatal(IgniteError::HandshakeError { proposed, server })
        });
    }

    let features = if proposed >= ProtocolVersion::new(1, 7, 0) {
        let len = stream.read_i32_le()?;
        FeatureSet::from_bytes(stream.read_bytes(len.max(0) as usize)?)
    } else {
        FeatureSet::empty()
    };

    let node_uuid = read_uuid(&mut stream)?;

    Ok(Outcome::Success { features, node_uuid })
}

fn read_handshake_string(stream: &mut Stream) -> Result<String> {
    match codec::decode(stream)? {
        Value::String(s) => Ok(s),
        Value::Null => Ok(String::new()),
        other => Ok(format!("{other:?}")),
    }
}

fn read_uuid(stream: &mut Stream) -> Result<Uuid> {
    let bytes = stream.read_bytes(16)?;
    let arr: [u8; 16] = bytes.try_into().expect("read_bytes(16) returns 16 bytes");
    Ok(Uuid::from_bytes(arr))
}

pub fn context_from_outcome(version: ProtocolVersion, features: FeatureSet) -> ProtocolContext {
    ProtocolContext::new(version, features)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_includes_features_only_from_1_7_0() {
        let config = ClientConfig::default();
        let old = build_request(ProtocolVersion::new(1, 6, 0), &config);
        let new = build_request(ProtocolVersion::new(1, 7, 0), &config);
        assert!(new.len() > old.len());
    }

    #[test]
    fn request_appends_credentials_only_when_both_present() {
        let config = ClientConfig::default();
        let without = build_request(ProtocolVersion::new(1, 2, 0), &config);

        let with_creds = ClientConfig::builder().credentials("u", "p").build();
        let with = build_request(ProtocolVersion::new(1, 2, 0), &with_creds);
        assert!(with.len() > without.len());
    }

    #[test]
    fn fatal_response_with_all_zero_version_is_authentication_error() {
        let mut stream = Stream::new();
        stream.write_u8(0);
        stream.write_i16_le(0);
        stream.write_i16_le(0);
        stream.write_i16_le(0);
        codec::encode(&mut stream, &Value::from("bad credentials".to_owned())).unwrap();
        stream.write_i32_le(1);

        let outcome = parse_response(stream.into_vec(), ProtocolVersion::new(1, 8, 0)).unwrap();
        assert!(matches!(outcome, Outcome::Fatal(IgniteError::AuthenticationError(_))));
    }

    #[test]
    fn retryable_response_reports_known_server_version() {
        let mut stream = Stream::new();
        stream.write_u8(0);
        stream.write_i16_le(1);
        stream.write_i16_le(6);
        stream.write_i16_le(0);
        codec::encode(&mut stream, &Value::from("version mismatch".to_owned())).unwrap();
        stream.write_i32_le(1);

        let outcome = parse_response(stream.into_vec(), ProtocolVersion::new(1, 8, 0)).unwrap();
        match outcome {
            Outcome::Retry(v) => assert_eq!(v, ProtocolVersion::new(1, 6, 0)),
            _ => panic!("expected retry"),
        }
    }

    #[test]
    fn success_response_round_trips_features_and_uuid() {
        let uuid = Uuid::new_v4();
        let mut stream = Stream::new();
        stream.write_u8(1);
        let features = FeatureSet::supported();
        stream.write_i32_le(features.as_bytes().len() as i32);
        stream.write_bytes(features.as_bytes());
        stream.write_bytes(uuid.as_bytes());

        let outcome = parse_response(stream.into_vec(), ProtocolVersion::new(1, 8, 0)).unwrap();
        match outcome {
            Outcome::Success { features: f, node_uuid } => {
                assert_eq!(f, features);
                assert_eq!(node_uuid, uuid);
            }
            _ => panic!("expected success"),
        }
    }
}
