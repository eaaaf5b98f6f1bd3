//! SQL (table-qualified) and SQL-Fields (free-form) queries, each opening
//! a server-side cursor whose first page rides back on the same response.

use std::sync::Arc;

use ignite_core::{codec, Value};

use crate::connection::Connection;
use crate::cursor::{decode_fields_page, decode_kv_page, FieldsCursor, KvCursor};
use crate::dispatch::{self, AsSqlError};
use crate::error::Result;
use crate::frame::{self, op_code};

use super::key_value::write_prelude;
use super::CacheHandle;

#[derive(Debug, Clone)]
pub struct SqlQuery {
    pub table: String,
    pub sql: String,
    pub args: Vec<Value>,
    pub page_size: i32,
    pub distributed_joins: bool,
    pub local: bool,
    pub replicated_only: bool,
    pub timeout_ms: i64,
}

impl SqlQuery {
    pub fn new(table: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            sql: sql.into(),
            args: Vec::new(),
            page_size: 1024,
            distributed_joins: false,
            local: false,
            replicated_only: false,
            timeout_ms: 0,
        }
    }
}

pub fn query_sql(connection: Arc<Connection>, cache: &CacheHandle, query: &SqlQuery) -> Result<KvCursor> {
    let mut body = frame::request_header(op_code::QUERY_SQL, connection.next_query_id());
    write_prelude(&mut body, cache);
    codec::encode(&mut body, &Value::from(query.table.clone()))?;
    codec::encode(&mut body, &Value::from(query.sql.clone()))?;
    body.write_i32_le(query.args.len() as i32);
    for arg in &query.args {
        codec::encode(&mut body, arg)?;
    }
    body.write_bool(query.distributed_joins);
    body.write_bool(query.local);
    body.write_bool(query.replicated_only);
    body.write_i32_le(query.page_size);
    body.write_i64_le(query.timeout_ms);

    let mut stream = dispatch::round_trip::<AsSqlError>(connection.as_ref(), frame::finish_request(body))?;
    let cursor_id = stream.read_i64_le()?;
    let (more, first_page) = decode_kv_page(&mut stream)?;
    Ok(KvCursor::new(cursor_id, connection, op_code::QUERY_SQL_CURSOR_GET_PAGE, first_page, more))
}

#[derive(Debug, Clone)]
pub struct SqlFieldsQuery {
    pub schema: Option<String>,
    pub sql: String,
    pub args: Vec<Value>,
    pub page_size: i32,
    pub max_rows: i32,
    pub distributed_joins: bool,
    pub local: bool,
    pub replicated_only: bool,
    pub collocated: bool,
    pub lazy: bool,
    pub timeout_ms: i64,
    pub include_field_names: bool,
}

impl SqlFieldsQuery {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            schema: None,
            sql: sql.into(),
            args: Vec::new(),
            page_size: 1024,
            max_rows: 0,
            distributed_joins: false,
            local: false,
            replicated_only: false,
            collocated: false,
            lazy: false,
            timeout_ms: 0,
            include_field_names: false,
        }
    }
}

pub fn query_sql_fields(connection: Arc<Connection>, cache: &CacheHandle, query: &SqlFieldsQuery) -> Result<FieldsCursor> {
    let mut body = frame::request_header(op_code::QUERY_SQL_FIELDS, connection.next_query_id());
    write_prelude(&mut body, cache);
    codec::encode(&mut body, &query.schema.clone().map(Value::String).unwrap_or(Value::Null))?;
    body.write_i32_le(query.page_size);
    body.write_i32_le(query.max_rows);
    codec::encode(&mut body, &Value::from(query.sql.clone()))?;
    body.write_i32_le(query.args.len() as i32);
    for arg in &query.args {
        codec::encode(&mut body, arg)?;
    }
    body.write_u8(0); // statement type: ANY
    body.write_bool(query.distributed_joins);
    body.write_bool(query.local);
    body.write_bool(query.replicated_only);
    body.write_bool(query.collocated);
    body.write_bool(query.lazy);
    body.write_i64_le(query.timeout_ms);
    body.write_bool(query.include_field_names);

    let mut stream = dispatch::round_trip::<AsSqlError>(connection.as_ref(), frame::finish_request(body))?;
    let cursor_id = stream.read_i64_le()?;
    let field_count = stream.read_i32_le()?.max(0) as usize;

    let field_names = if query.include_field_names {
        let mut names = Vec::with_capacity(field_count);
        for _ in 0..field_count {
            match codec::decode(&mut stream)? {
                Value::String(s) => names.push(s),
                other => names.push(format!("{other:?}")),
            }
        }
        Some(names)
    } else {
        None
    };

    let (more, first_page) = decode_fields_page(&mut stream, field_count)?;
    Ok(FieldsCursor::new(cursor_id, connection, field_count, field_names, first_page, more))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sql_query_defaults_to_a_reasonable_page_size() {
        let q = SqlQuery::new("Person", "select * from Person");
        assert_eq!(q.page_size, 1024);
        assert!(q.args.is_empty());
    }

    #[test]
    fn sql_fields_query_defaults_do_not_request_field_names() {
        let q = SqlFieldsQuery::new("select 1");
        assert!(!q.include_field_names);
    }
}
