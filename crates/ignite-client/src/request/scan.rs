//! Scan queries: an unfiltered (or partition-restricted) walk of a cache,
//! opening a `KvCursor` over every `(key, value)` pair.

use std::sync::Arc;

use crate::connection::Connection;
use crate::cursor::{decode_kv_page, KvCursor};
use crate::dispatch::{self, AsCacheError};
use crate::error::Result;
use crate::frame::{self, op_code};

use super::key_value::write_prelude;
use super::CacheHandle;

#[derive(Debug, Clone, Default)]
pub struct ScanQuery {
    /// `None` scans every partition.
    pub partition: Option<i32>,
    pub local: bool,
    pub page_size: i32,
}

impl ScanQuery {
    pub fn new() -> Self {
        Self {
            partition: None,
            local: false,
            page_size: 1024,
        }
    }
}

pub fn scan(connection: Arc<Connection>, cache: &CacheHandle, query: &ScanQuery) -> Result<KvCursor> {
    let mut body = frame::request_header(op_code::QUERY_SCAN, connection.next_query_id());
    write_prelude(&mut body, cache);
    body.write_i32_le(query.partition.unwrap_or(-1));
    body.write_bool(query.local);
    body.write_i32_le(query.page_size);

    let mut stream = dispatch::round_trip::<AsCacheError>(connection.as_ref(), frame::finish_request(body))?;
    let cursor_id = stream.read_i64_le()?;
    let (more, first_page) = decode_kv_page(&mut stream)?;
    Ok(KvCursor::new(cursor_id, connection, op_code::QUERY_SCAN_CURSOR_GET_PAGE, first_page, more))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scan_covers_every_partition() {
        let q = ScanQuery::new();
        assert_eq!(q.partition, None);
    }
}
