//! Index builder contracts
//!
//! The builder is the component that turns entries into index content. The
//! population only drives it through this trait; the storage format behind
//! it is not our concern.
//!
//! # Lifecycle
//!
//! `create` → any number of updaters → (`verify_deferred_constraints`) →
//! `sample` → exactly one of `close(successful)` or `drop_index`.

use std::sync::Arc;

use serde_json::Value;

use super::errors::PopulationResult;
use super::sample::IndexSample;
use super::update::IndexEntryUpdate;

/// Reads current property values straight from the store
pub trait PropertyAccessor: Send + Sync {
    /// Value of `property_key_id` on `entity_id`, `None` if absent
    fn property_value(&self, entity_id: u64, property_key_id: u32) -> PopulationResult<Option<Value>>;
}

/// Applies updates to the index being built.
///
/// Updaters are not safe for concurrent use; one caller at a time.
pub trait IndexUpdater: Send {
    /// Fails on conflicts and I/O errors
    fn process(&mut self, update: &IndexEntryUpdate) -> PopulationResult<()>;

    fn close(&mut self) -> PopulationResult<()>;
}

/// Builds the content of one index
pub trait IndexBuilder: Send {
    /// Prepare empty index content
    fn create(&mut self) -> PopulationResult<()>;

    /// Updater writing into this builder's content
    fn new_updater(&mut self, accessor: Arc<dyn PropertyAccessor>) -> PopulationResult<Box<dyn IndexUpdater>>;

    /// Fails with a constraint violation on conflicting entries
    fn verify_deferred_constraints(&mut self, accessor: &dyn PropertyAccessor) -> PopulationResult<()>;

    fn sample(&mut self) -> PopulationResult<IndexSample>;

    /// Attach a failure description to the index
    fn mark_as_failed(&mut self, failure: &str);

    /// Release resources, keeping content only if `successful`
    fn close(&mut self, successful: bool) -> PopulationResult<()>;

    /// Discard built content; no `close` follows
    fn drop_index(&mut self) -> PopulationResult<()>;
}
