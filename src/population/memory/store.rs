//! In-memory entity store view
//!
//! Holds entities of one type ordered by id. A scan snapshots the matching
//! entities when it starts, then visits them one at a time so `stop` from
//! another thread takes effect between two entities.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde_json::Value;

use crate::population::builder::PropertyAccessor;
use crate::population::descriptor::{EntityType, ScanFilter};
use crate::population::errors::{PopulationError, PopulationResult};
use crate::population::scan::{EntityVisitor, IndexStoreView, PopulationProgress, StoreScan};
use crate::population::update::EntityUpdates;

type Entities = Arc<RwLock<BTreeMap<u64, EntityUpdates>>>;

#[derive(Debug, Clone)]
pub struct InMemoryStoreView {
    entity_type: EntityType,
    entities: Entities,
}

impl InMemoryStoreView {
    /// Store of nodes
    pub fn new(entities: Vec<EntityUpdates>) -> Self {
        Self::with_entity_type(EntityType::Node, entities)
    }

    pub fn with_entity_type(entity_type: EntityType, entities: Vec<EntityUpdates>) -> Self {
        let entities = entities.into_iter().map(|e| (e.entity_id, e)).collect();
        Self {
            entity_type,
            entities: Arc::new(RwLock::new(entities)),
        }
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    /// Insert or replace an entity, as a concurrent transaction would
    pub fn upsert(&self, entity: EntityUpdates) -> PopulationResult<()> {
        self.entities
            .write()
            .map_err(|_| PopulationError::LockPoisoned("in-memory store"))?
            .insert(entity.entity_id, entity);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entities.read().map(|entities| entities.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IndexStoreView for InMemoryStoreView {
    fn visit_entities(
        &self,
        entity_type: EntityType,
        filter: ScanFilter,
        visitor: Box<dyn EntityVisitor>,
        _property_accessor: Option<Arc<dyn PropertyAccessor>>,
        // entities are visited in id order on the calling thread either way
        _parallel: bool,
    ) -> Arc<dyn StoreScan> {
        Arc::new(InMemoryStoreScan {
            entities: Arc::clone(&self.entities),
            covers_type: entity_type == self.entity_type,
            filter,
            visitor: Mutex::new(visitor),
            stopped: AtomicBool::new(false),
            completed: AtomicU64::new(0),
            total: AtomicU64::new(0),
        })
    }

    fn new_property_accessor(&self) -> Arc<dyn PropertyAccessor> {
        Arc::new(InMemoryPropertyAccessor {
            entities: Arc::clone(&self.entities),
        })
    }
}

pub struct InMemoryStoreScan {
    entities: Entities,
    covers_type: bool,
    filter: ScanFilter,
    visitor: Mutex<Box<dyn EntityVisitor>>,
    stopped: AtomicBool,
    completed: AtomicU64,
    total: AtomicU64,
}

impl InMemoryStoreScan {
    /// Matching entities, with properties outside the filter stripped
    fn matching(&self) -> PopulationResult<Vec<EntityUpdates>> {
        if !self.covers_type {
            return Ok(Vec::new());
        }
        let entities = self
            .entities
            .read()
            .map_err(|_| PopulationError::LockPoisoned("in-memory store"))?;

        Ok(entities
            .values()
            .filter(|e| self.filter.matches_tokens(&e.entity_token_ids))
            .map(|e| {
                let mut entity = e.clone();
                entity.properties.retain(|key, _| self.filter.includes_property(*key));
                entity
            })
            .collect())
    }
}

impl StoreScan for InMemoryStoreScan {
    fn run(&self) -> PopulationResult<()> {
        let mut visitor = self
            .visitor
            .lock()
            .map_err(|_| PopulationError::LockPoisoned("store scan visitor"))?;

        let matching = self.matching()?;
        self.total.store(matching.len() as u64, Ordering::Relaxed);
        self.completed.store(0, Ordering::Relaxed);

        for entity in &matching {
            if self.stopped.load(Ordering::Acquire) {
                break;
            }
            let stop = visitor.visit(entity);
            self.completed.fetch_add(1, Ordering::Relaxed);
            if stop {
                break;
            }
        }
        visitor.scan_completed();
        Ok(())
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    fn progress(&self) -> PopulationProgress {
        PopulationProgress::new(
            self.completed.load(Ordering::Relaxed),
            self.total.load(Ordering::Relaxed),
        )
    }
}

/// Reads property values from the live store content
#[derive(Debug)]
pub struct InMemoryPropertyAccessor {
    entities: Entities,
}

impl PropertyAccessor for InMemoryPropertyAccessor {
    fn property_value(&self, entity_id: u64, property_key_id: u32) -> PopulationResult<Option<Value>> {
        let entities = self
            .entities
            .read()
            .map_err(|_| PopulationError::LockPoisoned("in-memory store"))?;
        Ok(entities
            .get(&entity_id)
            .and_then(|e| e.properties.get(&property_key_id))
            .filter(|value| !value.is_null())
            .cloned())
    }
}
