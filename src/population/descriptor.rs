//! Index and schema descriptors
//!
//! A descriptor identifies the index being populated. Token ids (labels,
//! relationship types, property keys) are opaque integers here; resolving
//! them to names happens elsewhere.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique index identifier
pub type IndexId = u64;

/// The kind of entity an index covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    #[default]
    Node,
    Relationship,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Node => "node",
            EntityType::Relationship => "relationship",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The schema an index targets: one entity token and an ordered list of
/// property keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    /// Label or relationship type id
    pub entity_token_id: u32,
    /// Property key ids, in index key order
    pub property_key_ids: Vec<u32>,
}

impl SchemaDescriptor {
    /// Schema over one entity token and the given properties
    pub fn new(entity_token_id: u32, property_key_ids: &[u32]) -> Self {
        Self {
            entity_token_id,
            property_key_ids: property_key_ids.to_vec(),
        }
    }

    /// Single-property schema
    pub fn for_token(entity_token_id: u32, property_key_id: u32) -> Self {
        Self::new(entity_token_id, &[property_key_id])
    }

    /// Whether an entity carrying `token_ids` falls under this schema
    pub fn covers_tokens(&self, token_ids: &[u32]) -> bool {
        token_ids.contains(&self.entity_token_id)
    }
}

impl fmt::Display for SchemaDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(:{} {{", self.entity_token_id)?;
        for (i, key) in self.property_key_ids.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", key)?;
        }
        f.write_str("})")
    }
}

/// Descriptor of the index under construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub id: IndexId,
    pub name: String,
    pub schema: SchemaDescriptor,
    /// Unique indexes get their constraint verified before flipping
    #[serde(default)]
    pub unique: bool,
}

impl IndexDescriptor {
    pub fn new(id: IndexId, name: impl Into<String>, schema: SchemaDescriptor) -> Self {
        Self {
            id,
            name: name.into(),
            schema,
            unique: false,
        }
    }

    /// Mark the index as backing a uniqueness constraint
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

impl fmt::Display for IndexDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Index( id={}, name='{}', schema={}", self.id, self.name, self.schema)?;
        if self.unique {
            f.write_str(", unique")?;
        }
        f.write_str(" )")
    }
}

/// Restriction applied to a full store scan: the union of every active
/// population's schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanFilter {
    pub entity_token_ids: BTreeSet<u32>,
    pub property_key_ids: BTreeSet<u32>,
}

impl ScanFilter {
    /// Build the union filter over the given schemas
    pub fn union<'a>(schemas: impl IntoIterator<Item = &'a SchemaDescriptor>) -> Self {
        let mut filter = Self::default();
        for schema in schemas {
            filter.entity_token_ids.insert(schema.entity_token_id);
            filter
                .property_key_ids
                .extend(schema.property_key_ids.iter().copied());
        }
        filter
    }

    /// An entity is visited when it carries one of the tokens
    pub fn matches_tokens(&self, token_ids: &[u32]) -> bool {
        token_ids.iter().any(|t| self.entity_token_ids.contains(t))
    }

    pub fn includes_property(&self, property_key_id: u32) -> bool {
        self.property_key_ids.contains(&property_key_id)
    }

    pub fn is_empty(&self) -> bool {
        self.entity_token_ids.is_empty()
    }
}
