//! Async scan queries, mirroring `crate::request::scan`.

use std::sync::Arc;

use crate::error::Result;
use crate::frame::{self, op_code};
use crate::request::key_value::write_prelude;
use crate::request::CacheHandle;

use super::super::connection::Connection;
use super::super::cursor::KvCursor;
use super::super::dispatch::{self, AsCacheError};

pub use crate::request::scan::ScanQuery;

pub async fn scan(connection: Arc<Connection>, cache: &CacheHandle, query: &ScanQuery) -> Result<KvCursor> {
    let mut body = frame::request_header(op_code::QUERY_SCAN, connection.next_query_id());
    write_prelude(&mut body, cache);
    body.write_i32_le(query.partition.unwrap_or(-1));
    body.write_bool(query.local);
    body.write_i32_le(query.page_size);

    let mut stream = dispatch::round_trip::<AsCacheError>(connection.as_ref(), frame::finish_request(body)).await?;
    let cursor_id = stream.read_i64_le()?;
    let (more, first_page) = super::super::cursor::decode_kv_page(&mut stream)?;
    Ok(KvCursor::new(cursor_id, connection, op_code::QUERY_SCAN_CURSOR_GET_PAGE, first_page, more))
}
