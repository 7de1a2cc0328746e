//! In-memory index builder
//!
//! Builds index content into an `IndexTree`. Clones share the same content,
//! so a caller can keep a handle while the population owns the builder.
//! Uniqueness is checked lazily: conflicting entries are accepted during
//! population and rejected by `verify_deferred_constraints`.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use serde_json::Value;

use super::tree::{composite_key, CompositeKey, IndexTree};
use crate::population::builder::{IndexBuilder, IndexUpdater, PropertyAccessor};
use crate::population::descriptor::IndexDescriptor;
use crate::population::errors::{PopulationError, PopulationResult};
use crate::population::sample::IndexSample;
use crate::population::update::{IndexEntryUpdate, UpdateMode};

/// Lifecycle position of an in-memory builder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "successful")]
pub enum BuilderStatus {
    New,
    Created,
    Closed(bool),
    Dropped,
}

#[derive(Debug)]
struct BuilderState {
    descriptor: IndexDescriptor,
    tree: IndexTree,
    status: BuilderStatus,
    failure: Option<String>,
    updates: u64,
}

impl BuilderState {
    fn ensure_open(&self) -> PopulationResult<()> {
        match self.status {
            BuilderStatus::Created => Ok(()),
            other => Err(PopulationError::builder_failed(format!(
                "{} is not open for updates ({:?})",
                self.descriptor.name, other
            ))),
        }
    }

    fn apply(&mut self, update: &IndexEntryUpdate) -> PopulationResult<()> {
        self.ensure_open()?;
        if !update.is_applicable_to(&self.descriptor.schema) {
            return Err(PopulationError::update_failed(
                update.entity_id(),
                format!("update for {} sent to {}", update.schema(), self.descriptor.name),
            ));
        }

        let key = entry_key(update.entity_id(), update.values())?;
        match update.mode() {
            UpdateMode::Added => self.tree.insert(key, update.entity_id()),
            UpdateMode::Changed => {
                if let Some(before) = update.before() {
                    let old = entry_key(update.entity_id(), before)?;
                    self.tree.remove(&old, update.entity_id());
                }
                self.tree.insert(key, update.entity_id());
            }
            UpdateMode::Removed => self.tree.remove(&key, update.entity_id()),
        }
        self.updates += 1;
        Ok(())
    }
}

fn entry_key(entity_id: u64, values: &[Value]) -> PopulationResult<CompositeKey> {
    composite_key(values).ok_or_else(|| PopulationError::update_failed(entity_id, "value is not indexable"))
}

/// Builder writing into an in-memory `IndexTree`
#[derive(Debug, Clone)]
pub struct InMemoryIndexBuilder {
    state: Arc<Mutex<BuilderState>>,
}

impl InMemoryIndexBuilder {
    pub fn new(descriptor: IndexDescriptor) -> Self {
        Self {
            state: Arc::new(Mutex::new(BuilderState {
                descriptor,
                tree: IndexTree::new(),
                status: BuilderStatus::New,
                failure: None,
                updates: 0,
            })),
        }
    }

    fn lock(&self) -> PopulationResult<MutexGuard<'_, BuilderState>> {
        self.state
            .lock()
            .map_err(|_| PopulationError::LockPoisoned("in-memory index builder"))
    }

    pub fn status(&self) -> Option<BuilderStatus> {
        self.lock().ok().map(|state| state.status)
    }

    /// `Some(successful)` once closed
    pub fn closed_with(&self) -> Option<bool> {
        match self.status() {
            Some(BuilderStatus::Closed(successful)) => Some(successful),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<String> {
        self.lock().ok().and_then(|state| state.failure.clone())
    }

    pub fn entry_count(&self) -> usize {
        self.lock().map(|state| state.tree.entry_count()).unwrap_or(0)
    }

    /// Entities indexed under exactly `values`
    pub fn lookup(&self, values: &[Value]) -> Vec<u64> {
        let Some(key) = composite_key(values) else {
            return Vec::new();
        };
        self.lock().map(|state| state.tree.lookup_eq(&key)).unwrap_or_default()
    }

    /// Updates applied so far
    pub fn updates(&self) -> u64 {
        self.lock().map(|state| state.updates).unwrap_or(0)
    }
}

impl IndexBuilder for InMemoryIndexBuilder {
    fn create(&mut self) -> PopulationResult<()> {
        let mut state = self.lock()?;
        if state.status != BuilderStatus::New {
            return Err(PopulationError::builder_failed(format!(
                "{} was already created",
                state.descriptor.name
            )));
        }
        state.tree.clear();
        state.status = BuilderStatus::Created;
        Ok(())
    }

    fn new_updater(&mut self, _accessor: Arc<dyn PropertyAccessor>) -> PopulationResult<Box<dyn IndexUpdater>> {
        self.lock()?.ensure_open()?;
        Ok(Box::new(InMemoryUpdater {
            state: Arc::clone(&self.state),
            closed: false,
        }))
    }

    fn verify_deferred_constraints(&mut self, accessor: &dyn PropertyAccessor) -> PopulationResult<()> {
        let state = self.lock()?;
        if !state.descriptor.unique {
            return Ok(());
        }

        let properties = &state.descriptor.schema.property_key_ids;
        for (key, ids) in state.tree.duplicates() {
            // entries may be stale; only entities still holding the value conflict
            let mut holders = Vec::new();
            for &entity_id in ids {
                let mut current = Vec::with_capacity(properties.len());
                for &property in properties {
                    current.push(accessor.property_value(entity_id, property)?.unwrap_or(Value::Null));
                }
                if composite_key(&current).as_ref() == Some(key) {
                    holders.push(entity_id);
                }
            }
            if holders.len() > 1 {
                return Err(PopulationError::constraint_violation(format!(
                    "entities {:?} share a value in unique index {}",
                    holders, state.descriptor.name
                )));
            }
        }
        Ok(())
    }

    fn sample(&mut self) -> PopulationResult<IndexSample> {
        let state = self.lock()?;
        let size = state.tree.entry_count() as u64;
        Ok(IndexSample::new(size, state.tree.key_count() as u64, size))
    }

    fn mark_as_failed(&mut self, failure: &str) {
        if let Ok(mut state) = self.lock() {
            state.failure = Some(failure.to_string());
        }
    }

    fn close(&mut self, successful: bool) -> PopulationResult<()> {
        let mut state = self.lock()?;
        if !successful {
            state.tree.clear();
        }
        state.status = BuilderStatus::Closed(successful);
        Ok(())
    }

    fn drop_index(&mut self) -> PopulationResult<()> {
        let mut state = self.lock()?;
        state.tree.clear();
        state.status = BuilderStatus::Dropped;
        Ok(())
    }
}

/// Updater over a shared builder state
struct InMemoryUpdater {
    state: Arc<Mutex<BuilderState>>,
    closed: bool,
}

impl IndexUpdater for InMemoryUpdater {
    fn process(&mut self, update: &IndexEntryUpdate) -> PopulationResult<()> {
        if self.closed {
            return Err(PopulationError::update_failed(update.entity_id(), "updater is closed"));
        }
        self.state
            .lock()
            .map_err(|_| PopulationError::LockPoisoned("in-memory index builder"))?
            .apply(update)
    }

    fn close(&mut self) -> PopulationResult<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::population::descriptor::SchemaDescriptor;
    use serde_json::json;

    struct FixedAccessor(Vec<(u64, Value)>);

    impl PropertyAccessor for FixedAccessor {
        fn property_value(&self, entity_id: u64, _property_key_id: u32) -> PopulationResult<Option<Value>> {
            Ok(self
                .0
                .iter()
                .find(|(id, _)| *id == entity_id)
                .map(|(_, value)| value.clone()))
        }
    }

    fn schema() -> SchemaDescriptor {
        SchemaDescriptor::for_token(1, 10)
    }

    fn created(descriptor: IndexDescriptor) -> InMemoryIndexBuilder {
        let mut builder = InMemoryIndexBuilder::new(descriptor);
        builder.create().unwrap();
        builder
    }

    #[test]
    fn test_updates_and_sample() {
        let mut builder = created(IndexDescriptor::new(1, "idx", schema()));
        let mut updater = builder.new_updater(Arc::new(FixedAccessor(Vec::new()))).unwrap();

        updater.process(&IndexEntryUpdate::add(1, schema(), vec![json!("foo")])).unwrap();
        updater.process(&IndexEntryUpdate::add(2, schema(), vec![json!("foo")])).unwrap();
        updater.process(&IndexEntryUpdate::add(3, schema(), vec![json!("bar")])).unwrap();
        updater
            .process(&IndexEntryUpdate::change(3, schema(), vec![json!("bar")], vec![json!("baz")]))
            .unwrap();
        updater.close().unwrap();

        assert_eq!(builder.lookup(&[json!("foo")]), vec![1, 2]);
        assert!(builder.lookup(&[json!("bar")]).is_empty());
        assert_eq!(builder.sample().unwrap(), IndexSample::new(3, 2, 3));
        assert_eq!(builder.updates(), 4);
    }

    #[test]
    fn test_closed_updater_rejects_updates() {
        let mut builder = created(IndexDescriptor::new(1, "idx", schema()));
        let mut updater = builder.new_updater(Arc::new(FixedAccessor(Vec::new()))).unwrap();
        updater.close().unwrap();

        let result = updater.process(&IndexEntryUpdate::add(1, schema(), vec![json!(1)]));
        assert!(matches!(result, Err(PopulationError::UpdateFailed { entity_id: 1, .. })));
    }

    #[test]
    fn test_unindexable_value_fails_update() {
        let mut builder = created(IndexDescriptor::new(1, "idx", schema()));
        let mut updater = builder.new_updater(Arc::new(FixedAccessor(Vec::new()))).unwrap();

        let result = updater.process(&IndexEntryUpdate::add(7, schema(), vec![json!({"a": 1})]));
        assert!(result.unwrap_err().to_string().contains("not indexable"));
    }

    #[test]
    fn test_updater_requires_create() {
        let mut builder = InMemoryIndexBuilder::new(IndexDescriptor::new(1, "idx", schema()));
        assert!(builder.new_updater(Arc::new(FixedAccessor(Vec::new()))).is_err());
    }

    #[test]
    fn test_deferred_uniqueness_uses_current_values() {
        let mut builder = created(IndexDescriptor::new(1, "idx", schema()).unique());
        let mut updater = builder.new_updater(Arc::new(FixedAccessor(Vec::new()))).unwrap();
        updater.process(&IndexEntryUpdate::add(1, schema(), vec![json!("x")])).unwrap();
        updater.process(&IndexEntryUpdate::add(2, schema(), vec![json!("x")])).unwrap();

        // entity 2 has moved on since it was indexed
        let moved = FixedAccessor(vec![(1, json!("x")), (2, json!("y"))]);
        assert!(builder.verify_deferred_constraints(&moved).is_ok());

        let still = FixedAccessor(vec![(1, json!("x")), (2, json!("x"))]);
        let err = builder.verify_deferred_constraints(&still).unwrap_err();
        assert!(matches!(err, PopulationError::ConstraintViolation(_)));
    }

    #[test]
    fn test_unsuccessful_close_discards_content() {
        let mut builder = created(IndexDescriptor::new(1, "idx", schema()));
        let mut updater = builder.new_updater(Arc::new(FixedAccessor(Vec::new()))).unwrap();
        updater.process(&IndexEntryUpdate::add(1, schema(), vec![json!(1)])).unwrap();

        builder.mark_as_failed("boom");
        builder.close(false).unwrap();

        assert_eq!(builder.entry_count(), 0);
        assert_eq!(builder.closed_with(), Some(false));
        assert_eq!(builder.failure().as_deref(), Some("boom"));
    }
}
