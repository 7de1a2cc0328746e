//! Population coordinator
//!
//! Owns the registry of active populations and drives a batch of index
//! builds through one shared store scan:
//!
//! ```text
//! add_populator* → create → index_all_entities → scan.run
//!               → apply_queued_updates → flip_after_store_scan
//! ```
//!
//! `stop`, `cancel` and their single-population forms may be called at any
//! point from any thread. A failure in one population never reaches its
//! siblings or the caller: it is recorded on that population's builder and
//! the population leaves the registry.

use std::sync::Arc;

use super::builder::{IndexBuilder, IndexUpdater, PropertyAccessor};
use super::config::PopulationConfig;
use super::descriptor::{IndexDescriptor, IndexId, ScanFilter};
use super::errors::{PopulationError, PopulationResult};
use super::flip::FlipOutcome;
use super::multiplexer::MultiplexingUpdater;
use super::proxy::{FailedProxyFactory, IndexFlipper};
use super::record::{IndexPopulation, PopulationServices};
use super::registry::PopulationRegistry;
use super::sample::{IndexStatisticsStore, SchemaStateCache};
use super::scan::{IndexStoreView, StoreScan};
use super::update::IndexEntryUpdate;
use crate::observability::{log_event_with_fields, Event, PopulationMetrics};

pub struct PopulationCoordinator {
    config: PopulationConfig,
    registry: Arc<PopulationRegistry>,
    services: PopulationServices,
}

impl PopulationCoordinator {
    /// Create a coordinator. Fails if `config` does not validate.
    pub fn new(
        config: PopulationConfig,
        store_view: Arc<dyn IndexStoreView>,
        statistics: Arc<dyn IndexStatisticsStore>,
        schema_state: Arc<dyn SchemaStateCache>,
    ) -> PopulationResult<Self> {
        config.validate()?;
        let services = PopulationServices {
            store_view,
            statistics,
            schema_state,
            metrics: Arc::new(PopulationMetrics::new()),
            queue_threshold: config.queue_threshold,
        };
        Ok(Self {
            config,
            registry: Arc::new(PopulationRegistry::new()),
            services,
        })
    }

    pub fn config(&self) -> &PopulationConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<PopulationMetrics> {
        &self.services.metrics
    }

    /// Register a population for `descriptor`.
    ///
    /// Index ids must be unique among active populations. Registering a
    /// duplicate replaces the earlier registration, which is then no longer
    /// driven by this coordinator.
    pub fn add_populator(
        &self,
        builder: Box<dyn IndexBuilder>,
        descriptor: IndexDescriptor,
        flipper: Arc<dyn IndexFlipper>,
        failed_proxy_factory: Arc<dyn FailedProxyFactory>,
        description: impl Into<String>,
    ) -> Arc<IndexPopulation> {
        let population = Arc::new(IndexPopulation::new(
            builder,
            descriptor,
            flipper,
            failed_proxy_factory,
            description.into(),
            Arc::downgrade(&self.registry),
            self.services.clone(),
        ));

        let displaced = self.registry.insert(Arc::clone(&population));
        debug_assert!(displaced.is_none(), "duplicate index id {}", population.index_id());

        self.services.metrics.increment_added();
        population.log(Event::PopulationAdded, &[("schema", population.descriptor().schema.to_string().as_str())]);
        population
    }

    /// Create every active population's builder. A builder that fails to
    /// create is failed and removed; the others are unaffected.
    pub fn create(&self) {
        for population in self.registry.snapshot() {
            match population.create() {
                Ok(true) => self.services.metrics.increment_created(),
                Ok(false) => {}
                Err(e) => {
                    self.services.metrics.increment_create_failures();
                    population.log(Event::PopulationCreateFailed, &[("failure", e.message().as_str())]);
                    population.mark_failed_and_close(&e);
                }
            }
        }
    }

    /// Prepare the store scan feeding every active population.
    ///
    /// The scan visits entities of the configured type that carry a token of
    /// any active schema. Nothing happens until `run` is called on the
    /// returned handle.
    pub fn index_all_entities(&self) -> Arc<dyn StoreScan> {
        let populations = self.registry.snapshot();
        let filter = ScanFilter::union(populations.iter().map(|p| &p.descriptor().schema));

        let accessor = self.services.store_view.new_property_accessor();
        let visitor = MultiplexingUpdater::new(populations, accessor, Arc::clone(&self.services.metrics));

        log_event_with_fields(
            Event::PopulationScanBegin,
            &[
                ("entity_type", self.config.entity_type.as_str()),
                ("populations", visitor.active_count().to_string().as_str()),
            ],
        );

        self.services.store_view.visit_entities(
            self.config.entity_type,
            filter,
            Box::new(visitor),
            None,
            self.config.parallel_scan,
        )
    }

    /// Updater forwarding concurrent updates straight to every active
    /// population whose schema they apply to
    pub fn new_populating_updater(&self, accessor: Arc<dyn PropertyAccessor>) -> Box<dyn IndexUpdater> {
        Box::new(MultiplexingUpdater::new(
            self.registry.snapshot(),
            accessor,
            Arc::clone(&self.services.metrics),
        ))
    }

    /// Queue an update made by a concurrent transaction for every active
    /// population whose schema it applies to
    pub fn queue_concurrent_update(&self, update: &IndexEntryUpdate) {
        for population in self.registry.snapshot() {
            if !update.is_applicable_to(&population.descriptor().schema) {
                continue;
            }
            if let Err(e) = population.queue_update(update.clone()) {
                self.fail_queued(&population, &e);
            }
        }
    }

    /// Apply all queued concurrent updates now
    pub fn apply_queued_updates(&self) {
        for population in self.registry.snapshot() {
            if let Err(e) = population.apply_queued_updates() {
                self.fail_queued(&population, &e);
            }
        }
    }

    fn fail_queued(&self, population: &IndexPopulation, failure: &PopulationError) {
        self.services.metrics.increment_update_failures();
        population.mark_failed_and_close(failure);
    }

    /// Flip every population still active. Returns the ids brought online.
    pub fn flip_after_store_scan(&self, verify_constraints_first: bool) -> Vec<IndexId> {
        let mut online = Vec::new();
        for population in self.registry.snapshot() {
            match population.flip(verify_constraints_first) {
                Ok(FlipOutcome::Online) => online.push(population.index_id()),
                Ok(FlipOutcome::Skipped) => {}
                // recorded on the population by the flip itself
                Err(_) => {}
            }
        }
        online
    }

    /// Stop every active population, recording a zero sample for each
    pub fn stop(&self) {
        for population in self.registry.snapshot() {
            population.stop();
        }
    }

    /// Stop one population. No-op if it is no longer active.
    pub fn stop_population(&self, population: &IndexPopulation) {
        population.stop();
    }

    /// Remove one population and discard its content
    pub fn stop_and_drop(&self, population: &IndexPopulation) {
        population.drop_index();
    }

    /// Fail every active population with `failure`
    pub fn cancel(&self, failure: &PopulationError) {
        for population in self.registry.snapshot() {
            population.mark_failed_and_close(failure);
        }
    }

    /// Fail one population. No-op if it is not in the active registry.
    pub fn cancel_population(&self, population: &IndexPopulation, failure: &PopulationError) {
        if self.registry.contains(population) {
            population.mark_failed_and_close(failure);
        }
    }

    pub fn has_populators(&self) -> bool {
        !self.registry.is_empty()
    }

    /// Active population registered under `index_id`
    pub fn population(&self, index_id: IndexId) -> Option<Arc<IndexPopulation>> {
        self.registry.get(index_id)
    }

    pub fn active_index_ids(&self) -> Vec<IndexId> {
        self.registry.index_ids()
    }
}

impl std::fmt::Debug for PopulationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PopulationCoordinator")
            .field("config", &self.config)
            .field("active", &self.registry.index_ids())
            .finish()
    }
}
