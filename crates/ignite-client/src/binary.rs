//! Client-side cache of the server's binary-type registry.
//!
//! The server owns the canonical metadata; the client only memoizes what it
//! has already seen, keyed by `type_id`, so repeat reads/writes of a schema
//! it already knows about never need a round trip.

use std::collections::HashMap;

use dashmap::DashMap;

/// One field slot in a complex-object type: its wire id, its declared
/// name, and the type-code hint the server advertises for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMeta {
    pub field_id: i32,
    pub name: String,
    pub type_code: u8,
}

#[derive(Debug, Clone, Default)]
pub struct TypeMeta {
    pub type_name: String,
    pub affinity_key_field_id: Option<i32>,
    pub fields: HashMap<i32, FieldMeta>,
    /// `schema_id -> [field_id]`, the union of every schema this type has
    /// been observed under.
    pub schemas: HashMap<i32, Vec<i32>>,
}

impl TypeMeta {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Default::default()
        }
    }

    pub fn with_schema(mut self, schema_id: i32, field_ids: Vec<i32>) -> Self {
        self.schemas.insert(schema_id, field_ids);
        self
    }

    pub fn merge_schema(&mut self, schema_id: i32, field_ids: Vec<i32>) {
        self.schemas.entry(schema_id).or_insert(field_ids);
    }

    pub fn schema(&self, schema_id: i32) -> Option<&[i32]> {
        self.schemas.get(&schema_id).map(Vec::as_slice)
    }
}

/// Keyed by `type_id` (the case-insensitive hash of the type name, not the
/// name itself — the wire never carries the name after the first `put`).
#[derive(Debug, Default)]
pub struct BinaryTypeRegistry {
    types: DashMap<i32, TypeMeta>,
}

impl BinaryTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, type_id: i32) -> Option<TypeMeta> {
        self.types.get(&type_id).map(|entry| entry.clone())
    }

    pub fn get_schema(&self, type_id: i32, schema_id: i32) -> Option<Vec<i32>> {
        self.types.get(&type_id).and_then(|entry| entry.schema(schema_id).map(|s| s.to_vec()))
    }

    pub fn has_schema(&self, type_id: i32, schema_id: i32) -> bool {
        self.get_schema(type_id, schema_id).is_some()
    }

    /// Called after a successful `put_binary_type`: remembers the full
    /// metadata, unioning field and schema information with whatever was
    /// already known for this `type_id`.
    pub fn put(&self, type_id: i32, meta: TypeMeta) {
        self.types
            .entry(type_id)
            .and_modify(|existing| {
                existing.fields.extend(meta.fields.clone());
                existing.schemas.extend(meta.schemas.clone());
                if existing.affinity_key_field_id.is_none() {
                    existing.affinity_key_field_id = meta.affinity_key_field_id;
                }
            })
            .or_insert(meta);
    }

    /// Called after a successful `get_binary_type_schema(type_id, schema_id)`:
    /// memoizes just the one schema, creating a name-less placeholder entry
    /// if this `type_id` has never been `put` locally.
    pub fn memoize_schema(&self, type_id: i32, schema_id: i32, field_ids: Vec<i32>) {
        self.types
            .entry(type_id)
            .and_modify(|existing| existing.merge_schema(schema_id, field_ids.clone()))
            .or_insert_with(|| TypeMeta::default().with_schema(schema_id, field_ids));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_has_no_schema() {
        let registry = BinaryTypeRegistry::new();
        assert!(!registry.has_schema(1, 2));
    }

    #[test]
    fn put_then_get_schema_round_trips() {
        let registry = BinaryTypeRegistry::new();
        let meta = TypeMeta::new("Foo").with_schema(42, vec![1, 2, 3]);
        registry.put(7, meta);

        assert_eq!(registry.get_schema(7, 42), Some(vec![1, 2, 3]));
        assert_eq!(registry.get(7).unwrap().type_name, "Foo");
    }

    #[test]
    fn memoize_schema_creates_a_placeholder_without_a_prior_put() {
        let registry = BinaryTypeRegistry::new();
        registry.memoize_schema(9, 11, vec![4, 5]);
        assert!(registry.has_schema(9, 11));
        assert_eq!(registry.get(9).unwrap().type_name, "");
    }

    #[test]
    fn put_unions_schemas_rather_than_overwriting() {
        let registry = BinaryTypeRegistry::new();
        registry.put(3, TypeMeta::new("Bar").with_schema(1, vec![10]));
        registry.put(3, TypeMeta::new("Bar").with_schema(2, vec![20]));

        assert_eq!(registry.get_schema(3, 1), Some(vec![10]));
        assert_eq!(registry.get_schema(3, 2), Some(vec![20]));
    }
}
