//! Registry of active populations
//!
//! Membership defines "still active". Iteration always works on a snapshot
//! taken under the read lock; no population method is ever called while the
//! registry lock is held, so population locks and the registry lock never
//! nest.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::descriptor::IndexId;
use super::record::IndexPopulation;

#[derive(Debug, Default)]
pub struct PopulationRegistry {
    populations: RwLock<BTreeMap<IndexId, Arc<IndexPopulation>>>,
}

impl PopulationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave the map half-updated,
    // so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<IndexId, Arc<IndexPopulation>>> {
        self.populations.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<IndexId, Arc<IndexPopulation>>> {
        self.populations.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a population. Returns a displaced population with the same id.
    pub(crate) fn insert(&self, population: Arc<IndexPopulation>) -> Option<Arc<IndexPopulation>> {
        self.write().insert(population.index_id(), population)
    }

    /// Remove exactly this population; a different population registered
    /// under the same id stays.
    pub(crate) fn remove(&self, population: &IndexPopulation) -> bool {
        let mut populations = self.write();
        match populations.get(&population.index_id()) {
            Some(current) if std::ptr::eq(Arc::as_ptr(current), population) => {
                populations.remove(&population.index_id());
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, population: &IndexPopulation) -> bool {
        self.read()
            .get(&population.index_id())
            .is_some_and(|current| std::ptr::eq(Arc::as_ptr(current), population))
    }

    pub fn get(&self, index_id: IndexId) -> Option<Arc<IndexPopulation>> {
        self.read().get(&index_id).cloned()
    }

    /// Active populations in index id order
    pub fn snapshot(&self) -> Vec<Arc<IndexPopulation>> {
        self.read().values().cloned().collect()
    }

    pub fn index_ids(&self) -> Vec<IndexId> {
        self.read().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
