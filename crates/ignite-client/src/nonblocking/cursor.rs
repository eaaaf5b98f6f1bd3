//! Async scan/SQL cursors, mirroring `crate::cursor`. The page-body codec
//! (`decode_kv_page` / `decode_fields_page`) is pure and reused as-is from
//! the blocking module; only the paging/close round trips are async.

use std::collections::VecDeque;
use std::sync::Arc;

use ignite_core::{Stream, Value};

pub use crate::cursor::{decode_fields_page, decode_kv_page};
use crate::error::{IgniteError, Result};
use crate::frame::{self, op_code};

use super::connection::Connection;
use super::dispatch::{self, AsCacheError};

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

async fn round_trip(connection: &Connection, request: Vec<u8>) -> Result<Stream> {
    dispatch::round_trip::<AsCacheError>(connection, request).await
}

/// Scan / SQL cursor: an async iterator over `(key, value)` pairs.
pub struct KvCursor {
    cursor_id: i64,
    connection: Arc<Connection>,
    page_op: i16,
    buffered: VecDeque<(Value, Value)>,
    more: bool,
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

    pub async fn next(&mut self) -> Result<Option<(Value, Value)>> {
        if self.user_closed {
            return Err(IgniteError::CursorClosed);
        }
        if self.buffered.is_empty() && self.more {
            self.fetch_page().await?;
        }
        Ok(self.buffered.pop_front())
    }

    async fn fetch_page(&mut self) -> Result<()> {
        let request = get_page_request(&self.connection, self.page_op, self.cursor_id);
        let mut stream = round_trip(&self.connection, request).await?;
        let (more, rows) = decode_kv_page(&mut stream)?;
        self.buffered.extend(rows);
        self.more = more;
        if !more {
            self.server_released = true;
        }
        Ok(())
    }

    pub async fn close(&mut self) -> Result<()> {
        if !self.server_released {
            let request = resource_close_request(&self.connection, self.cursor_id);
            round_trip(&self.connection, request).await?;
            self.server_released = true;
        }
        self.user_closed = true;
        self.more = false;
        Ok(())
    }
}

/// SQL-Fields cursor: an async iterator over rows of tagged values.
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

    pub async fn next(&mut self) -> Result<Option<Vec<Value>>> {
        if self.user_closed {
            return Err(IgniteError::CursorClosed);
        }
        if self.buffered.is_empty() && self.more {
            self.fetch_page().await?;
        }
        Ok(self.buffered.pop_front())
    }

    async fn fetch_page(&mut self) -> Result<()> {
        let request = get_page_request(&self.connection, op_code::QUERY_SQL_FIELDS_CURSOR_GET_PAGE, self.cursor_id);
        let mut stream = round_trip(&self.connection, request).await?;
        let (more, rows) = decode_fields_page(&mut stream, self.field_count)?;
        self.buffered.extend(rows);
        self.more = more;
        if !more {
            self.server_released = true;
        }
        Ok(())
    }

    pub async fn close(&mut self) -> Result<()> {
        if !self.server_released {
            let request = resource_close_request(&self.connection, self.cursor_id);
            round_trip(&self.connection, request).await?;
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
    fn a_cursor_with_no_more_pages_is_server_released_up_front() {
        let rows = vec![(Value::Int(1), Value::Int(2))];
        let cursor = KvCursor::new(7, dummy_connection(), op_code::QUERY_SCAN_CURSOR_GET_PAGE, rows, false);
        assert!(cursor.server_released);
        assert!(!cursor.user_closed);
    }

    #[tokio::test]
    async fn natural_exhaustion_yields_none_not_an_error() {
        let rows = vec![(Value::Int(1), Value::Int(2))];
        let mut cursor = KvCursor::new(7, dummy_connection(), op_code::QUERY_SCAN_CURSOR_GET_PAGE, rows, false);
        assert_eq!(cursor.next().await.unwrap(), Some((Value::Int(1), Value::Int(2))));
        assert_eq!(cursor.next().await.unwrap(), None);
        assert_eq!(cursor.next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn explicit_close_then_next_raises_cursor_closed() {
        let rows = vec![(Value::Int(1), Value::Int(2))];
        let mut cursor = KvCursor::new(7, dummy_connection(), op_code::QUERY_SCAN_CURSOR_GET_PAGE, rows, false);
        cursor.close().await.unwrap();
        assert!(matches!(cursor.next().await, Err(IgniteError::CursorClosed)));
    }

    fn dummy_connection() -> Arc<Connection> {
        Arc::new(Connection::new("127.0.0.1", 10800, Arc::new(crate::config::ClientConfig::default())))
    }
}
