//! BTreeMap-based index content
//!
//! Entries map a composite key (one `IndexKey` per schema property) to the
//! ids of the entities carrying those values. Entity ids are kept sorted
//! ascending so samples and lookups are deterministic.

use std::collections::BTreeMap;

use serde_json::Value;

/// One property value as an index key.
///
/// Ordering is deterministic: Bool < Int < Float < String.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexKey {
    Bool(bool),
    Int(i64),
    /// f64 bits rearranged for total ordering
    Float(u64),
    String(String),
}

impl IndexKey {
    pub fn from_float(v: f64) -> Self {
        let bits = v.to_bits();
        let ordered = if (bits >> 63) == 1 {
            !bits
        } else {
            bits ^ (1 << 63)
        };
        IndexKey::Float(ordered)
    }

    /// Key for a JSON value. Null, arrays and objects are not indexable.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(IndexKey::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(IndexKey::Int)
                .or_else(|| n.as_f64().map(IndexKey::from_float)),
            Value::String(s) => Some(IndexKey::String(s.clone())),
            _ => None,
        }
    }
}

/// Key of one index entry, in schema property order
pub type CompositeKey = Vec<IndexKey>;

/// Composite key for `values`, `None` if any value is not indexable
pub fn composite_key(values: &[Value]) -> Option<CompositeKey> {
    values.iter().map(IndexKey::from_json).collect()
}

#[derive(Debug, Default, Clone)]
pub struct IndexTree {
    tree: BTreeMap<CompositeKey, Vec<u64>>,
}

impl IndexTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `entity_id` under `key`, keeping ids sorted
    pub fn insert(&mut self, key: CompositeKey, entity_id: u64) {
        let ids = self.tree.entry(key).or_default();
        if let Err(pos) = ids.binary_search(&entity_id) {
            ids.insert(pos, entity_id);
        }
    }

    /// Remove `entity_id` from `key`; drops the key once empty
    pub fn remove(&mut self, key: &CompositeKey, entity_id: u64) {
        if let Some(ids) = self.tree.get_mut(key) {
            if let Ok(pos) = ids.binary_search(&entity_id) {
                ids.remove(pos);
            }
            if ids.is_empty() {
                self.tree.remove(key);
            }
        }
    }

    pub fn lookup_eq(&self, key: &CompositeKey) -> Vec<u64> {
        self.tree.get(key).cloned().unwrap_or_default()
    }

    /// Keys held by more than one entity, in key order
    pub fn duplicates(&self) -> impl Iterator<Item = (&CompositeKey, &[u64])> {
        self.tree
            .iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(key, ids)| (key, ids.as_slice()))
    }

    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Number of distinct keys
    pub fn key_count(&self) -> usize {
        self.tree.len()
    }

    /// Number of entries
    pub fn entry_count(&self) -> usize {
        self.tree.values().map(Vec::len).sum()
    }
}
