//! Request/response frame shapes and op-code table.
//!
//! `length:i32 | op_code:i16 | query_id:i64 | body` for requests,
//! `length:i32 | query_id:i64 | status:i32 | body-or-error` for responses.
//! `length` excludes itself. This module only builds and parses the
//! envelope; `Connection` owns actually writing/reading the bytes.

use ignite_core::Stream;

use crate::error::{IgniteError, Result};

pub mod op_code {
    pub const RESOURCE_CLOSE: i16 = 0;

    pub const CACHE_GET: i16 = 1000;
    pub const CACHE_PUT: i16 = 1001;
    pub const CACHE_PUT_IF_ABSENT: i16 = 1002;
    pub const CACHE_GET_ALL: i16 = 1003;
    pub const CACHE_PUT_ALL: i16 = 1004;
    pub const CACHE_GET_AND_PUT: i16 = 1005;
    pub const CACHE_GET_AND_REPLACE: i16 = 1006;
    pub const CACHE_GET_AND_REMOVE: i16 = 1007;
    pub const CACHE_GET_AND_PUT_IF_ABSENT: i16 = 1008;
    pub const CACHE_REPLACE: i16 = 1009;
    pub const CACHE_REPLACE_IF_EQUALS: i16 = 1010;
    pub const CACHE_CONTAINS_KEY: i16 = 1011;
    pub const CACHE_CONTAINS_KEYS: i16 = 1012;
    pub const CACHE_CLEAR: i16 = 1013;
    pub const CACHE_CLEAR_KEY: i16 = 1014;
    pub const CACHE_CLEAR_KEYS: i16 = 1015;
    pub const CACHE_REMOVE_KEY: i16 = 1016;
    pub const CACHE_REMOVE_IF_EQUALS: i16 = 1017;
    pub const CACHE_REMOVE_KEYS: i16 = 1018;
    pub const CACHE_REMOVE_ALL: i16 = 1019;
    pub const CACHE_GET_SIZE: i16 = 1020;

    pub const CACHE_GET_NAMES: i16 = 1050;
    pub const CACHE_CREATE_WITH_NAME: i16 = 1051;
    pub const CACHE_GET_OR_CREATE_WITH_NAME: i16 = 1052;
    pub const CACHE_CREATE_WITH_CONFIGURATION: i16 = 1053;
    pub const CACHE_GET_OR_CREATE_WITH_CONFIGURATION: i16 = 1054;
    pub const CACHE_GET_CONFIGURATION: i16 = 1055;
    pub const CACHE_DESTROY: i16 = 1056;

    pub const CACHE_GET_NODE_PARTITIONS: i16 = 1101;

    pub const QUERY_SCAN: i16 = 2000;
    pub const QUERY_SCAN_CURSOR_GET_PAGE: i16 = 2001;
    pub const QUERY_SQL: i16 = 2002;
    pub const QUERY_SQL_CURSOR_GET_PAGE: i16 = 2003;
    pub const QUERY_SQL_FIELDS: i16 = 2004;
    pub const QUERY_SQL_FIELDS_CURSOR_GET_PAGE: i16 = 2005;

    pub const BINARY_TYPE_GET: i16 = 3002;
    pub const BINARY_TYPE_PUT: i16 = 3003;
    pub const BINARY_TYPE_GET_SCHEMA: i16 = 3004;

    pub const CLUSTER_GET_STATE: i16 = 5000;
    pub const CLUSTER_CHANGE_STATE: i16 = 5001;
}

/// The reserved bit in a response header signalling the cache's affinity
/// topology changed; the pool schedules a partition refresh when it sees this.
pub const FLAG_TOPOLOGY_CHANGED: i32 = 0x1;

/// Cache-op response status meaning the server doesn't recognize the
/// complex object's schema yet. The caller registers it with
/// `put_binary_type` and retries the write once; a second occurrence is a
/// real error, not a registration race.
pub const STATUS_UNKNOWN_BINARY_TYPE: i32 = 2;

/// Builds the body-less envelope: `op_code | query_id`, ready for the
/// caller to append the request body before framing with a length prefix.
pub fn request_header(op_code: i16, query_id: i64) -> Stream {
    let mut stream = Stream::new();
    stream.write_i16_le(op_code);
    stream.write_i64_le(query_id);
    stream
}

/// Prepends the 4-byte length prefix to a fully-built request body
/// (`op_code | query_id | body`) and returns the bytes ready to write to
/// the socket.
pub fn finish_request(body: Stream) -> Vec<u8> {
    let body = body.into_vec();
    let mut framed = Vec::with_capacity(4 + body.len());
    framed.extend_from_slice(&(body.len() as i32).to_le_bytes());
    framed.extend_from_slice(&body);
    framed
}

pub struct ResponseHeader {
    pub query_id: i64,
    pub status: i32,
}

/// Parses `query_id | status` off the front of a received frame body
/// (the 4-byte length prefix itself has already been consumed by the
/// connection's framed read). Returns the header plus the remaining body
/// stream positioned right after it.
pub fn parse_response_header(frame_body: Vec<u8>) -> Result<(ResponseHeader, Stream)> {
    let mut stream = Stream::from_vec(frame_body);
    let query_id = stream.read_i64_le()?;
    let status = stream.read_i32_le()?;
    Ok((ResponseHeader { query_id, status }, stream))
}

/// Reads the server's UTF-8 error message body of a non-zero-status response.
pub fn read_error_message(stream: &mut Stream) -> Result<String> {
    ignite_core::codec::decode(stream)
        .map_err(IgniteError::from)
        .and_then(|v| match v {
            ignite_core::Value::String(s) => Ok(s),
            ignite_core::Value::Null => Ok(String::new()),
            other => Ok(format!("{other:?}")),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_request_prefixes_length_excluding_itself() {
        let mut body = request_header(op_code::CACHE_GET, 7);
        body.write_bytes(b"abc");
        let framed = finish_request(body);

        let len = i32::from_le_bytes(framed[0..4].try_into().unwrap());
        assert_eq!(len as usize, framed.len() - 4);
    }

    #[test]
    fn response_header_round_trips() {
        let mut s = Stream::new();
        s.write_i64_le(42);
        s.write_i32_le(0);
        s.write_bytes(b"rest");

        let (header, mut rest) = parse_response_header(s.into_vec()).unwrap();
        assert_eq!(header.query_id, 42);
        assert_eq!(header.status, 0);
        assert_eq!(rest.read_bytes(4).unwrap(), b"rest");
    }
}
