//! Store scan contracts
//!
//! A store scan walks every entity of one type that matches a `ScanFilter`
//! and hands each one to a visitor, synchronously, in visitation order.

use std::sync::Arc;

use serde::Serialize;

use super::builder::PropertyAccessor;
use super::descriptor::{EntityType, ScanFilter};
use super::errors::PopulationResult;
use super::update::EntityUpdates;

/// Receives every entity visited by a store scan
pub trait EntityVisitor: Send {
    /// Visit one entity. Returns `true` to stop the scan early.
    fn visit(&mut self, entity: &EntityUpdates) -> bool;

    /// Called once after the last visited entity, also when stopped early
    fn scan_completed(&mut self) {}
}

/// Progress of a running scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PopulationProgress {
    pub completed: u64,
    pub total: u64,
}

impl PopulationProgress {
    pub fn new(completed: u64, total: u64) -> Self {
        Self { completed, total }
    }

    /// Completed fraction in [0, 1]; an empty scan counts as done
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.completed as f64 / self.total as f64).min(1.0)
    }
}

/// Handle to a (re)runnable store scan.
///
/// `run` blocks until every entity was visited or `stop` was called from
/// another thread.
pub trait StoreScan: Send + Sync {
    fn run(&self) -> PopulationResult<()>;

    fn stop(&self);

    fn progress(&self) -> PopulationProgress;
}

/// Entry point into the entity store for index population
pub trait IndexStoreView: Send + Sync {
    /// Prepare a scan over `entity_type` entities matching `filter`
    fn visit_entities(
        &self,
        entity_type: EntityType,
        filter: ScanFilter,
        visitor: Box<dyn EntityVisitor>,
        property_accessor: Option<Arc<dyn PropertyAccessor>>,
        parallel: bool,
    ) -> Arc<dyn StoreScan>;

    fn new_property_accessor(&self) -> Arc<dyn PropertyAccessor>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_fraction() {
        assert_eq!(PopulationProgress::new(0, 0).fraction(), 1.0);
        assert_eq!(PopulationProgress::new(5, 10).fraction(), 0.5);
        assert_eq!(PopulationProgress::new(12, 10).fraction(), 1.0);
    }
}
