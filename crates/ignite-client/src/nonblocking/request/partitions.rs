//! Async `cache_get_node_partitions`, mirroring `crate::request::partitions`.

use std::collections::HashMap;

use uuid::Uuid;

use crate::affinity::{PartitionMap, PartitionMapVersion};
use crate::error::Result;
use crate::frame::{self, op_code};

use super::super::connection::Connection;
use super::super::dispatch::{self, AsCacheError};

pub async fn cache_get_node_partitions(connection: &Connection, cache_ids: &[i32]) -> Result<HashMap<i32, PartitionMap>> {
    let mut body = frame::request_header(op_code::CACHE_GET_NODE_PARTITIONS, connection.next_query_id());
    body.write_i32_le(cache_ids.len() as i32);
    for id in cache_ids {
        body.write_i32_le(*id);
    }

    let mut stream = dispatch::round_trip::<AsCacheError>(connection, frame::finish_request(body)).await?;

    let major = stream.read_i64_le()?;
    let minor = stream.read_i32_le()?;
    let version = PartitionMapVersion { major, minor };

    let group_count = stream.read_i32_le()?;
    let mut result = HashMap::new();

    for _ in 0..group_count {
        let partition_count = stream.read_i32_le()?.max(0) as usize;
        let mut partitions = vec![Uuid::nil(); partition_count];

        let node_count = stream.read_i32_le()?;
        for _ in 0..node_count {
            let node_uuid = read_uuid(&mut stream)?;
            let owned_count = stream.read_i32_le()?;
            for _ in 0..owned_count {
                let partition_id = stream.read_i32_le()?;
                if let Some(slot) = partitions.get_mut(partition_id as usize) {
                    *slot = node_uuid;
                }
            }
        }

        let cache_count = stream.read_i32_le()?;
        for _ in 0..cache_count {
            let cache_id = stream.read_i32_le()?;
            let field_count = stream.read_i32_le()?;
            let mut affinity_key_fields = HashMap::with_capacity(field_count.max(0) as usize);
            for _ in 0..field_count {
                let type_id = stream.read_i32_le()?;
                let field_id = stream.read_i32_le()?;
                affinity_key_fields.insert(type_id, field_id);
            }
            result.insert(
                cache_id,
                PartitionMap {
                    cache_id,
                    version,
                    partitions: partitions.clone(),
                    affinity_key_fields,
                },
            );
        }
    }

    Ok(result)
}

fn read_uuid(stream: &mut ignite_core::Stream) -> Result<Uuid> {
    let bytes = stream.read_bytes(16)?;
    let arr: [u8; 16] = bytes.try_into().expect("read_bytes(16) returns 16 bytes");
    Ok(Uuid::from_bytes(arr))
}
