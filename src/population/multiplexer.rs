//! Update multiplexer
//!
//! Fans one stream of updates out to the updaters of many populations.
//! Dispatch is sequential: each population's updater sees updates in the
//! order they arrive and is never called from two threads at once.
//!
//! A failing updater takes down only its own population. The updater is
//! closed, the population is failed and released, and its slot is dropped
//! so no later update reaches it. Errors never escape the multiplexer.

use std::sync::Arc;

use super::builder::{IndexUpdater, PropertyAccessor};
use super::errors::PopulationResult;
use super::record::IndexPopulation;
use super::scan::EntityVisitor;
use super::update::{EntityUpdates, IndexEntryUpdate};
use crate::observability::PopulationMetrics;

struct PopulationUpdater {
    population: Arc<IndexPopulation>,
    updater: Box<dyn IndexUpdater>,
}

pub struct MultiplexingUpdater {
    slots: Vec<PopulationUpdater>,
    metrics: Arc<PopulationMetrics>,
}

impl MultiplexingUpdater {
    /// Open one updater per population. A population whose builder cannot
    /// hand out an updater is failed on the spot and left out.
    pub(crate) fn new(
        populations: Vec<Arc<IndexPopulation>>,
        accessor: Arc<dyn PropertyAccessor>,
        metrics: Arc<PopulationMetrics>,
    ) -> Self {
        let mut slots = Vec::with_capacity(populations.len());
        for population in populations {
            match population.new_updater(Arc::clone(&accessor)) {
                Ok(Some(updater)) => slots.push(PopulationUpdater { population, updater }),
                Ok(None) => {}
                Err(e) => {
                    metrics.increment_update_failures();
                    population.mark_failed_and_close(&e);
                }
            }
        }
        Self { slots, metrics }
    }

    /// Populations still receiving updates
    pub fn active_count(&self) -> usize {
        self.slots.len()
    }

    pub fn has_active(&self) -> bool {
        !self.slots.is_empty()
    }

    /// Forget populations removed by someone else since the last update
    fn prune_removed(&mut self) {
        self.slots.retain(|slot| !slot.population.is_removed());
    }

    /// Forward `update` to the population in slot `index`. Returns `false`
    /// when the slot must be dropped.
    fn forward(&mut self, index: usize, update: &IndexEntryUpdate) -> bool {
        let slot = &mut self.slots[index];
        match slot.population.process(slot.updater.as_mut(), update) {
            Ok(true) => {
                self.metrics.increment_updates_dispatched();
                true
            }
            Ok(false) => false,
            Err(e) => {
                self.metrics.increment_update_failures();
                slot.population.fail_updater(slot.updater.as_mut(), &e);
                false
            }
        }
    }

    /// Send `update` to every slot `select` picks, dropping the slots that
    /// failed or were removed
    fn dispatch<F>(&mut self, mut select: F)
    where
        F: FnMut(&IndexPopulation) -> Option<IndexEntryUpdate>,
    {
        self.prune_removed();

        let mut index = 0;
        while index < self.slots.len() {
            let Some(update) = select(&self.slots[index].population) else {
                self.metrics.increment_updates_skipped();
                index += 1;
                continue;
            };
            if self.forward(index, &update) {
                index += 1;
            } else {
                self.slots.remove(index);
            }
        }
    }

    fn close_all(&mut self) {
        for mut slot in self.slots.drain(..) {
            if let Err(e) = slot.population.close_updater(slot.updater.as_mut()) {
                self.metrics.increment_update_failures();
                slot.population.mark_failed_and_close(&e);
            }
        }
    }
}

impl EntityVisitor for MultiplexingUpdater {
    fn visit(&mut self, entity: &EntityUpdates) -> bool {
        self.dispatch(|population| entity.for_schema(&population.descriptor().schema));
        // nothing left to feed
        !self.has_active()
    }

    fn scan_completed(&mut self) {
        self.close_all();
    }
}

impl IndexUpdater for MultiplexingUpdater {
    fn process(&mut self, update: &IndexEntryUpdate) -> PopulationResult<()> {
        self.dispatch(|population| {
            update
                .is_applicable_to(&population.descriptor().schema)
                .then(|| update.clone())
        });
        Ok(())
    }

    fn close(&mut self) -> PopulationResult<()> {
        self.close_all();
        Ok(())
    }
}

impl Drop for MultiplexingUpdater {
    fn drop(&mut self) {
        if !self.slots.is_empty() {
            self.close_all();
        }
    }
}

impl std::fmt::Debug for MultiplexingUpdater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<_> = self.slots.iter().map(|slot| slot.population.index_id()).collect();
        f.debug_struct("MultiplexingUpdater").field("populations", &ids).finish()
    }
}

