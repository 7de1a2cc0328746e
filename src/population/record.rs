//! The population record: one index under construction
//!
//! # Terminal release
//!
//! Every population ends in exactly one terminal action on its builder:
//! close after a flip, close after a failure, close after a stop, or drop.
//! The `removed` flag is the single gate. Each entry point takes the
//! population's builder lock and then compare-and-sets `removed`; only the
//! winner touches the builder, everybody else degrades to a no-op.
//!
//! The lock is scoped to this population, never to the registry, so
//! populations never wait on each other.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use super::builder::{IndexBuilder, IndexUpdater, PropertyAccessor};
use super::descriptor::{IndexDescriptor, IndexId};
use super::errors::{PopulationError, PopulationResult};
use super::flip::{self, FlipOutcome};
use super::proxy::{FailedProxyFactory, IndexFlipper};
use super::registry::PopulationRegistry;
use super::sample::{IndexSample, IndexStatisticsStore, SchemaStateCache};
use super::scan::IndexStoreView;
use super::update::IndexEntryUpdate;
use crate::observability::{log_event_with_fields, Event, PopulationMetrics};

/// Collaborators shared by a coordinator and all of its populations
#[derive(Clone)]
pub(crate) struct PopulationServices {
    pub(crate) store_view: Arc<dyn IndexStoreView>,
    pub(crate) statistics: Arc<dyn IndexStatisticsStore>,
    pub(crate) schema_state: Arc<dyn SchemaStateCache>,
    pub(crate) metrics: Arc<PopulationMetrics>,
    pub(crate) queue_threshold: usize,
}

pub struct IndexPopulation {
    descriptor: IndexDescriptor,
    description: String,
    flipper: Arc<dyn IndexFlipper>,
    failed_proxy_factory: Arc<dyn FailedProxyFactory>,
    builder: Mutex<Box<dyn IndexBuilder>>,
    queued: Mutex<Vec<IndexEntryUpdate>>,
    removed: AtomicBool,
    registry: Weak<PopulationRegistry>,
    services: PopulationServices,
}

impl IndexPopulation {
    pub(crate) fn new(
        builder: Box<dyn IndexBuilder>,
        descriptor: IndexDescriptor,
        flipper: Arc<dyn IndexFlipper>,
        failed_proxy_factory: Arc<dyn FailedProxyFactory>,
        description: String,
        registry: Weak<PopulationRegistry>,
        services: PopulationServices,
    ) -> Self {
        Self {
            descriptor,
            description,
            flipper,
            failed_proxy_factory,
            builder: Mutex::new(builder),
            queued: Mutex::new(Vec::new()),
            removed: AtomicBool::new(false),
            registry,
            services,
        }
    }

    pub fn descriptor(&self) -> &IndexDescriptor {
        &self.descriptor
    }

    pub fn index_id(&self) -> IndexId {
        self.descriptor.id
    }

    /// Human-readable description used in logs and failure messages
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn flipper(&self) -> &Arc<dyn IndexFlipper> {
        &self.flipper
    }

    pub fn failed_proxy_factory(&self) -> &Arc<dyn FailedProxyFactory> {
        &self.failed_proxy_factory
    }

    /// True once the population left the active registry for good
    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }

    /// Concurrent updates waiting to be applied
    pub fn queued_updates(&self) -> usize {
        self.lock_queue().len()
    }

    /// Fail the population: mark the builder failed with the error's
    /// message, then close it unsuccessfully. Returns `false` when the
    /// population was already removed.
    pub fn mark_failed_and_close(&self, failure: &PopulationError) -> bool {
        let builder = self.lock_builder();
        if !self.claim() {
            return false;
        }
        self.release_failed(builder, failure, Event::PopulationCancelled);
        true
    }

    /// Stop an unfinished build without failing it. Records the zero
    /// sample for the index, then closes the builder unsuccessfully.
    pub fn stop(&self) -> bool {
        let mut builder = self.lock_builder();
        if !self.claim() {
            return false;
        }

        self.services
            .statistics
            .replace_stats(self.index_id(), IndexSample::zero());
        let closed = builder.close(false);
        drop(builder);

        self.discard_queue();
        self.detach();
        self.services.metrics.increment_stopped();
        match closed {
            Ok(()) => self.log(Event::PopulationStopped, &[]),
            Err(e) => self.log(Event::PopulationStopped, &[("close_error", e.to_string().as_str())]),
        }
        true
    }

    /// Discard the index content instead of closing it
    pub fn drop_index(&self) -> bool {
        let mut builder = self.lock_builder();
        if !self.claim() {
            return false;
        }

        let dropped = builder.drop_index();
        drop(builder);

        self.discard_queue();
        self.detach();
        self.services.metrics.increment_dropped();
        match dropped {
            Ok(()) => self.log(Event::PopulationDropped, &[]),
            Err(e) => self.log(Event::PopulationDropped, &[("drop_error", e.to_string().as_str())]),
        }
        true
    }

    /// Run the flip protocol for this population if it is still active
    pub fn flip(&self, verify_constraints_first: bool) -> PopulationResult<FlipOutcome> {
        flip::flip_population(self, verify_constraints_first)
    }

    pub(crate) fn create(&self) -> PopulationResult<bool> {
        let mut builder = self.lock_builder();
        if self.is_removed() {
            return Ok(false);
        }
        builder.create()?;
        Ok(true)
    }

    pub(crate) fn new_updater(
        &self,
        accessor: Arc<dyn PropertyAccessor>,
    ) -> PopulationResult<Option<Box<dyn IndexUpdater>>> {
        let mut builder = self.lock_builder();
        if self.is_removed() {
            return Ok(None);
        }
        builder.new_updater(accessor).map(Some)
    }

    /// Apply one update through `updater`. Returns `false` if the
    /// population was removed in the meantime.
    pub(crate) fn process(
        &self,
        updater: &mut dyn IndexUpdater,
        update: &IndexEntryUpdate,
    ) -> PopulationResult<bool> {
        let _builder = self.lock_builder();
        if self.is_removed() {
            return Ok(false);
        }
        updater.process(update)?;
        Ok(true)
    }

    pub(crate) fn close_updater(&self, updater: &mut dyn IndexUpdater) -> PopulationResult<()> {
        let _builder = self.lock_builder();
        if self.is_removed() {
            return Ok(());
        }
        updater.close()
    }

    /// Close a failed updater, then fail the population
    pub(crate) fn fail_updater(&self, updater: &mut dyn IndexUpdater, failure: &PopulationError) -> bool {
        let builder = self.lock_builder();
        if !self.claim() {
            return false;
        }
        // the failure being reported matters more than a close error
        let _ = updater.close();
        self.release_failed(builder, failure, Event::PopulationUpdateFailed);
        true
    }

    /// Queue a concurrent update; applies the queue once it reaches the
    /// configured threshold.
    pub(crate) fn queue_update(&self, update: IndexEntryUpdate) -> PopulationResult<()> {
        if self.is_removed() {
            return Ok(());
        }
        let queued = {
            let mut queue = self.lock_queue();
            queue.push(update);
            queue.len()
        };
        if queued >= self.services.queue_threshold {
            self.apply_queued_updates()?;
        }
        Ok(())
    }

    pub(crate) fn apply_queued_updates(&self) -> PopulationResult<()> {
        let mut builder = self.lock_builder();
        if self.is_removed() {
            return Ok(());
        }
        self.drain_queue_into(builder.as_mut()).map(|_| ())
    }

    /// Apply every queued update to `builder` through a fresh updater.
    /// Caller holds the builder lock.
    pub(crate) fn drain_queue_into(&self, builder: &mut dyn IndexBuilder) -> PopulationResult<usize> {
        let updates = std::mem::take(&mut *self.lock_queue());
        if updates.is_empty() {
            return Ok(0);
        }

        let mut updater = builder.new_updater(self.services.store_view.new_property_accessor())?;
        for update in &updates {
            if let Err(e) = updater.process(update) {
                let _ = updater.close();
                return Err(e);
            }
        }
        updater.close()?;
        Ok(updates.len())
    }

    pub(crate) fn lock_builder(&self) -> MutexGuard<'_, Box<dyn IndexBuilder>> {
        // terminal release must still happen after a panicking builder call
        self.builder.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_queue(&self) -> MutexGuard<'_, Vec<IndexEntryUpdate>> {
        self.queued.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Win the right to perform the terminal action. Caller holds the
    /// builder lock.
    pub(crate) fn claim(&self) -> bool {
        self.removed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Leave the active registry
    pub(crate) fn detach(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self);
        }
    }

    pub(crate) fn services(&self) -> &PopulationServices {
        &self.services
    }

    pub(crate) fn discard_queue(&self) {
        self.lock_queue().clear();
    }

    /// Mark the claimed builder failed and close it unsuccessfully, then
    /// leave the registry. `event` names what failed it.
    pub(crate) fn release_failed(
        &self,
        mut builder: MutexGuard<'_, Box<dyn IndexBuilder>>,
        failure: &PopulationError,
        event: Event,
    ) {
        let message = failure.message();
        builder.mark_as_failed(&message);
        let closed = builder.close(false);
        drop(builder);

        self.discard_queue();
        self.detach();
        match event {
            Event::PopulationFlipFailed => self.services.metrics.increment_flipped_failed(),
            _ => self.services.metrics.increment_cancelled(),
        }
        match closed {
            Ok(()) => self.log(event, &[("failure", message.as_str())]),
            Err(e) => self.log(event, &[("failure", message.as_str()), ("close_error", e.to_string().as_str())]),
        }
    }

    pub(crate) fn log(&self, event: Event, extra: &[(&str, &str)]) {
        let id = self.index_id().to_string();
        let mut fields = vec![("index_id", id.as_str()), ("index", self.description.as_str())];
        fields.extend_from_slice(extra);
        log_event_with_fields(event, &fields);
    }
}

impl fmt::Debug for IndexPopulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexPopulation")
            .field("index_id", &self.descriptor.id)
            .field("description", &self.description)
            .field("removed", &self.is_removed())
            .finish()
    }
}
