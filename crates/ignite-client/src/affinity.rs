//! Client-side replica of the server's partition map and rendezvous-hash
//! routing function, so key-addressed requests can go straight to the
//! primary node without a server-side proxy hop.

use std::collections::HashMap;

use uuid::Uuid;

use ignite_core::entity_id;
use ignite_core::Value;

use crate::error::{IgniteError, Result};

/// `(major, minor)` — bumped whenever the server's affinity topology for a
/// cache changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionMapVersion {
    pub major: i64,
    pub minor: i32,
}

#[derive(Debug, Clone)]
pub struct PartitionMap {
    pub cache_id: i32,
    pub version: PartitionMapVersion,
    /// Index = partition id, value = primary node uuid.
    pub partitions: Vec<Uuid>,
    /// Per complex-object `type_id`, which field carries the affinity key.
    pub affinity_key_fields: HashMap<i32, i32>,
}

impl PartitionMap {
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// `None` if the index is out of range for this map, or the primary
    /// it names is not among the currently connected nodes.
    pub fn primary_node(&self, partition: i32, alive: &[Uuid]) -> Option<Uuid> {
        let uuid = *self.partitions.get(partition as usize)?;
        alive.contains(&uuid).then_some(uuid)
    }

    /// A map is only trustworthy if every node it names is still connected.
    pub fn is_valid(&self, alive: &[Uuid]) -> bool {
        self.partitions.iter().all(|uuid| alive.contains(uuid))
    }
}

/// `(h ^ (h >>> 16)) & 0x7fffffff) mod partition_count` — rendezvous
/// affinity's standard mixing, reproduced byte-for-byte with the server.
pub fn partition_for_hash(h: i32, partition_count: usize) -> i32 {
    let h = h as u32;
    let mixed = h ^ (h >> 16);
    let masked = mixed & 0x7fff_ffff;
    (masked % partition_count as u32) as i32
}

/// `hashcode(key)` per the type-specific rules in the wire contract:
/// integers as their two's-complement value, strings as the Java
/// string-hash over UTF-16 code units, complex objects as the serialized
/// field-body hash from §3.
pub fn hashcode(key: &Value) -> Result<i32> {
    Ok(match key {
        Value::Byte(v) => *v as i32,
        Value::Short(v) => *v as i32,
        Value::Int(v) => *v,
        Value::Long(v) => ((*v) ^ (*v >> 32)) as i32,
        Value::Bool(v) => *v as i32,
        Value::String(s) => entity_id::string_hash(s),
        Value::Complex(obj) => obj.hash()?,
        other => return Err(IgniteError::ParameterError(format!("no affinity hashcode rule for {other:?}"))),
    })
}

/// Resolves the routing key for `key` against `cache_id`'s affinity key
/// field mapping: if `key` is a complex object with a configured affinity
/// key field, the value of that single field routes instead of the whole
/// object.
pub fn affinity_key<'a>(key: &'a Value, map: &PartitionMap) -> &'a Value {
    if let Value::Complex(obj) = key {
        if let Some(&field_id) = map.affinity_key_fields.get(&obj.type_id) {
            if let Some(field) = obj.field_by_id(field_id) {
                return field;
            }
        }
    }
    key
}

/// Full routing computation: affinity-key resolution, hashcode, rendezvous
/// mix, primary lookup. `None` means "fall back to random-node" per §4.5 —
/// an absent/invalid map or an unreachable primary.
pub fn route(key: &Value, map: &PartitionMap, alive: &[Uuid]) -> Result<Option<Uuid>> {
    if !map.is_valid(alive) {
        return Ok(None);
    }
    let routing_key = affinity_key(key, map);
    let h = hashcode(routing_key)?;
    let partition = partition_for_hash(h, map.partition_count());
    Ok(map.primary_node(partition, alive))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(partitions: Vec<Uuid>) -> PartitionMap {
        PartitionMap {
            cache_id: entity_id::entity_id("test_cache_1"),
            version: PartitionMapVersion { major: 1, minor: 0 },
            partitions,
            affinity_key_fields: HashMap::new(),
        }
    }

    #[test]
    fn partition_is_always_in_range() {
        for h in [0, 1, -1, i32::MIN, i32::MAX, 42, -42] {
            let p = partition_for_hash(h, 7);
            assert!(p >= 0 && (p as usize) < 7);
        }
    }

    #[test]
    fn integer_hashcode_is_the_twos_complement_value() {
        assert_eq!(hashcode(&Value::Int(5)).unwrap(), 5);
        assert_eq!(hashcode(&Value::Int(-5)).unwrap(), -5);
    }

    #[test]
    fn invalid_map_falls_back_to_random_node() {
        let stale_node = Uuid::new_v4();
        let m = map(vec![stale_node]);
        let alive = vec![Uuid::new_v4()]; // does not include stale_node
        assert_eq!(route(&Value::Int(1), &m, &alive).unwrap(), None);
    }

    #[test]
    fn valid_map_routes_to_the_named_primary() {
        let node = Uuid::new_v4();
        let m = map(vec![node; 4]);
        let alive = vec![node];
        assert_eq!(route(&Value::Int(1), &m, &alive).unwrap(), Some(node));
    }
}
