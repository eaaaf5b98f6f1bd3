//! Cursor types returned by scan and SQL operations.
//!
//! A cursor is tied to the connection that opened it (per the protocol's
//! ordering guarantees, program order is only promised within one
//! connection); if that connection fails over, the cursor is dead and
//! every further call returns `CursorClosed`. The wire-decoding of a page
//! is plain functions so the non-blocking pool can reuse them without a
//! second copy of this state machine.

use std::collections::VecDeque;
use std::sync::Arc;

use ignite_core::{codec, Stream, Value};

use crate::connection::Connection;
use crate::dispatch::{self, AsCacheError};
use crate::error::{IgniteError, Result};
use crate::frame::{self, op_code};

/// Decodes a key/value page body (Scan and SQL cursors): `more:bool`,
/// `row_count:i32`, then that many `(key, value)` pairs.
pub fn decode_kv_page(stream: &mut Stream) -> Result<(bool, Vec<(Value, Value)>)> {
    let more = stream.read_bool().map_err(IgniteError::from)?;
    let row_count = stream.read_i32_le().map_err(IgniteError::from)?;
    let mut rows = Vec::with_capacity(row_count.max(0) as usize);
    for _ in 0..row_count {
        let key = codec::decode(stream)?;
        let value = codec::decode(stream)?;
        rows.push((key, value));
    }
    Ok((more, rows))
}

/// Decodes an SQL-Fields page body: `more:bool`, `row_count:i32`, then
/// `row_count * field_count` tagged values, `field_count` per row.
pub fn decode_fields_page(stream: &mut Stream, field_count: usize) -> Result<(bool, Vec<Vec<Value>>)> {
    let more = stream.read_bool().map_err(IgniteError::from)?;
    let row_count = stream.read_i32_le().map_err(IgniteError::from)?;
    let mut rows = Vec::with_capacity(row_count.max(0) as usize);
    for _ in 0..row_count {
        let mut fields = Vec::with_capacity(field_count);
        for _ in 0..field_count {
            fields.push(codec::decode(stream)?);
        }
        rows.push(fields);
    }
    Ok((more, rows))
}

fn get_page_request(connection: &Connection, op: i16, cursor_id: i64) -> Vec<u8> {
    let mut body = frame::request_header(op, connection.next_query_id());
    body.write_i64_le(cursor_id);
    frame::finish_request(body)
}

fn resource_close_request(connection: &Connection, resource_id: i64) -> Vec<u8> {
    let mut body = frame::request_header(op_code::RESOURCE_CLOSE, connection.next_query_id());
    body.write_i64_le(resource_id);
    frame::finish_request(body)
}

fn round_trip(connection: &Connection, request: Vec<u8>) -> Result<Stream> {
    dispatch::round_trip::<AsCacheError>(connection, request)
}

/// Scan / SQL cursor: an iterator over `(key, value)` pairs.
pub struct KvCursor {
    cursor_id: i64,
    connection: Arc<Connection>,
    page_op: i16,
    buffered: VecDeque<(Value, Value)>,
    more: bool,
    /// The server has already released the cursor (`more` went false);
    /// `close()` becomes a no-op, but natural exhaustion is not an error —
    /// only an explicit `close()` makes further `next()` calls fail.
    server_released: bool,
    user_closed: bool,
}

impl KvCursor {
    pub fn new(cursor_id: i64, connection: Arc<Connection>, page_op: i16, first_page: Vec<(Value, Value)>, more: bool) -> Self {
        Self {
            cursor_id,
            connection,
            page_op,
            buffered: first_page.into(),
            more,
            server_released: !more,
            user_closed: false,
        }
    }

    pub fn next(&mut self) -> Result<Option<(Value, Value)>> {
        if self.user_closed {
            return Err(IgniteError::CursorClosed);
        }
        if self.buffered.is_empty() && self.more {
            self.fetch_page()?;
        }
        Ok(self.buffered.pop_front())
    }

    fn fetch_page(&mut self) -> Result<()> {
        let request = get_page_request(&self.connection, self.page_op, self.cursor_id);
        let mut stream = round_trip(&self.connection, request)?;
        let (more, rows) = decode_kv_page(&mut stream)?;
        self.buffered.extend(rows);
        self.more = more;
        if !more {
            self.server_released = true;
        }
        Ok(())
    }

    /// No-op if the server already released the cursor (`more` was false
    /// on the last page seen); otherwise issues `resource_close`. Either
    /// way, further `next()` calls raise `CursorClosed`.
    pub fn close(&mut self) -> Result<()> {
        if !self.server_released {
            let request = resource_close_request(&self.connection, self.cursor_id);
            round_trip(&self.connection, request)?;
            self.server_released = true;
        }
        self.user_closed = true;
        self.more = false;
        Ok(())
    }
}

/// SQL-Fields cursor: an iterator over rows of tagged values, with an
/// optional synthetic field-names row consumed up front.
pub struct FieldsCursor {
    cursor_id: i64,
    connection: Arc<Connection>,
    field_names: Option<Vec<String>>,
    field_count: usize,
    buffered: VecDeque<Vec<Value>>,
    more: bool,
    server_released: bool,
    user_closed: bool,
}

impl FieldsCursor {
    pub fn new(
        cursor_id: i64,
        connection: Arc<Connection>,
        field_count: usize,
        field_names: Option<Vec<String>>,
        first_page: Vec<Vec<Value>>,
        more: bool,
    ) -> Self {
        Self {
            cursor_id,
            connection,
            field_names,
            field_count,
            buffered: first_page.into(),
            more,
            server_released: !more,
            user_closed: false,
        }
    }

    pub fn field_names(&self) -> Option<&[String]> {
        self.field_names.as_deref()
    }

    pub fn next(&mut self) -> Result<Option<Vec<Value>>> {
        if self.user_closed {
            return Err(IgniteError::CursorClosed);
        }
        if self.buffered.is_empty() && self.more {
            self.fetch_page()?;
        }
        Ok(self.buffered.pop_front())
    }

    fn fetch_page(&mut self) -> Result<()> {
        let request = get_page_request(&self.connection, op_code::QUERY_SQL_FIELDS_CURSOR_GET_PAGE, self.cursor_id);
        let mut stream = round_trip(&self.connection, request)?;
        let (more, rows) = decode_fields_page(&mut stream, self.field_count)?;
        self.buffered.extend(rows);
        self.more = more;
        if !more {
            self.server_released = true;
        }
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        if !self.server_released {
            let request = resource_close_request(&self.connection, self.cursor_id);
            round_trip(&self.connection, request)?;
            self.server_released = true;
        }
        self.user_closed = true;
        self.more = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_kv_page_reads_the_declared_row_count() {
        let mut s = Stream::new();
        s.write_bool(false);
        s.write_i32_le(2);
        codec::encode(&mut s, &Value::Int(1)).unwrap();
        codec::encode(&mut s, &Value::String("a".into())).unwrap();
        codec::encode(&mut s, &Value::Int(2)).unwrap();
        codec::encode(&mut s, &Value::String("b".into())).unwrap();

        let mut reader = Stream::from_vec(s.into_vec());
        let (more, rows) = decode_kv_page(&mut reader).unwrap();
        assert!(!more);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], (Value::Int(1), Value::String("a".into())));
    }

    #[test]
    fn decode_fields_page_groups_by_field_count() {
        let mut s = Stream::new();
        s.write_bool(true);
        s.write_i32_le(1);
        codec::encode(&mut s, &Value::Int(1)).unwrap();
        codec::encode(&mut s, &Value::Int(2)).unwrap();
        codec::encode(&mut s, &Value::Int(3)).unwrap();

        let mut reader = Stream::from_vec(s.into_vec());
        let (more, rows) = decode_fields_page(&mut reader, 3).unwrap();
        assert!(more);
        assert_eq!(rows, vec![vec![Value::Int(1), Value::Int(2), Value::Int(3)]]);
    }

    #[test]
    fn a_cursor_with_no_more_pages_is_server_released_up_front() {
        let rows = vec![(Value::Int(1), Value::Int(2))];
        let cursor = KvCursor::new(7, dummy_connection(), op_code::QUERY_SCAN_CURSOR_GET_PAGE, rows, false);
        assert!(cursor.server_released);
        assert!(!cursor.user_closed);
    }

    #[test]
    fn natural_exhaustion_yields_none_not_an_error() {
        let rows = vec![(Value::Int(1), Value::Int(2))];
        let mut cursor = KvCursor::new(7, dummy_connection(), op_code::QUERY_SCAN_CURSOR_GET_PAGE, rows, false);
        assert_eq!(cursor.next().unwrap(), Some((Value::Int(1), Value::Int(2))));
        assert_eq!(cursor.next().unwrap(), None);
        assert_eq!(cursor.next().unwrap(), None);
    }

    #[test]
    fn explicit_close_then_next_raises_cursor_closed() {
        let rows = vec![(Value::Int(1), Value::Int(2))];
        let mut cursor = KvCursor::new(7, dummy_connection(), op_code::QUERY_SCAN_CURSOR_GET_PAGE, rows, false);
        cursor.close().unwrap();
        assert!(matches!(cursor.next(), Err(IgniteError::CursorClosed)));
    }

    fn dummy_connection() -> Arc<Connection> {
        Arc::new(Connection::new("127.0.0.1", 10800, Arc::new(crate::config::ClientConfig::default())))
    }
}
