//! Async SQL and SQL-Fields queries, mirroring `crate::request::sql`.

use std::sync::Arc;

use ignite_core::{codec, Value};

use crate::error::Result;
use crate::frame::{self, op_code};
use crate::request::key_value::write_prelude;
use crate::request::CacheHandle;

use super::super::connection::Connection;
use super::super::cursor::{decode_fields_page, decode_kv_page, FieldsCursor, KvCursor};
use super::super::dispatch::{self, AsSqlError};

pub use crate::request::sql::{SqlFieldsQuery, SqlQuery};

pub async fn query_sql(connection: Arc<Connection>, cache: &CacheHandle, query: &SqlQuery) -> Result<KvCursor> {
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

    let mut stream = dispatch::round_trip::<AsSqlError>(connection.as_ref(), frame::finish_request(body)).await?;
    let cursor_id = stream.read_i64_le()?;
    let (more, first_page) = decode_kv_page(&mut stream)?;
    Ok(KvCursor::new(cursor_id, connection, op_code::QUERY_SQL_CURSOR_GET_PAGE, first_page, more))
}

pub async fn query_sql_fields(connection: Arc<Connection>, cache: &CacheHandle, query: &SqlFieldsQuery) -> Result<FieldsCursor> {
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

    let mut stream = dispatch::round_trip::<AsSqlError>(connection.as_ref(), frame::finish_request(body)).await?;
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
