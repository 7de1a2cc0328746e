//! Entity and index-entry updates
//!
//! The store scan produces one `EntityUpdates` per visited entity: the
//! entity's tokens and its current property values. Each population derives
//! from it the `IndexEntryUpdate` relevant to its own schema, if any.
//! Transactional writers produce `IndexEntryUpdate`s directly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::descriptor::SchemaDescriptor;

/// What an index entry update does to the index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMode {
    Added,
    Changed,
    Removed,
}

/// An immutable change of one entity's indexed values for one schema
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntryUpdate {
    entity_id: u64,
    schema: SchemaDescriptor,
    mode: UpdateMode,
    before: Option<Vec<Value>>,
    values: Vec<Value>,
}

impl IndexEntryUpdate {
    /// Entity started matching the schema with `values`
    pub fn add(entity_id: u64, schema: SchemaDescriptor, values: Vec<Value>) -> Self {
        Self {
            entity_id,
            schema,
            mode: UpdateMode::Added,
            before: None,
            values,
        }
    }

    /// Entity's indexed values changed from `before` to `after`
    pub fn change(
        entity_id: u64,
        schema: SchemaDescriptor,
        before: Vec<Value>,
        after: Vec<Value>,
    ) -> Self {
        Self {
            entity_id,
            schema,
            mode: UpdateMode::Changed,
            before: Some(before),
            values: after,
        }
    }

    /// Entity stopped matching the schema; `values` are the removed ones
    pub fn remove(entity_id: u64, schema: SchemaDescriptor, values: Vec<Value>) -> Self {
        Self {
            entity_id,
            schema,
            mode: UpdateMode::Removed,
            before: None,
            values,
        }
    }

    pub fn entity_id(&self) -> u64 {
        self.entity_id
    }

    pub fn schema(&self) -> &SchemaDescriptor {
        &self.schema
    }

    pub fn mode(&self) -> UpdateMode {
        self.mode
    }

    /// Values after the update (removed values for `Removed`)
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Values before a `Changed` update
    pub fn before(&self) -> Option<&[Value]> {
        self.before.as_deref()
    }

    /// An update only ever touches the index with the exact same schema
    pub fn is_applicable_to(&self, schema: &SchemaDescriptor) -> bool {
        &self.schema == schema
    }
}

/// Current property state of one entity, as seen by the store scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityUpdates {
    pub entity_id: u64,
    /// Labels (or relationship type) carried by the entity
    pub entity_token_ids: Vec<u32>,
    /// Property key id to value
    #[serde(default)]
    pub properties: BTreeMap<u32, Value>,
}

impl EntityUpdates {
    pub fn new(entity_id: u64, entity_token_ids: &[u32]) -> Self {
        Self {
            entity_id,
            entity_token_ids: entity_token_ids.to_vec(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, property_key_id: u32, value: impl Into<Value>) -> Self {
        self.properties.insert(property_key_id, value.into());
        self
    }

    /// Derive the index update for `schema`.
    ///
    /// Returns `None` when the entity lacks the schema's token or any of
    /// its properties. Null values count as absent.
    pub fn for_schema(&self, schema: &SchemaDescriptor) -> Option<IndexEntryUpdate> {
        if !schema.covers_tokens(&self.entity_token_ids) {
            return None;
        }

        let mut values = Vec::with_capacity(schema.property_key_ids.len());
        for key in &schema.property_key_ids {
            match self.properties.get(key) {
                Some(Value::Null) | None => return None,
                Some(value) => values.push(value.clone()),
            }
        }

        Some(IndexEntryUpdate::add(self.entity_id, schema.clone(), values))
    }
}
