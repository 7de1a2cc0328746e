//! Multi-index population
//!
//! Builds several indexes from one pass over the entity store. Each index
//! under construction is a population: a builder, the serving proxy that
//! flips when the build finishes, and a failed-proxy factory for when it
//! does not.
//!
//! # Guarantees
//!
//! - A population's builder is released exactly once, by `close` or by
//!   `drop_index`, whatever mix of scan failure, stop, cancel and flip
//!   races to finish it
//! - A population that left the registry receives no further updates and
//!   is never sampled or flipped
//! - A failure in one population never affects its siblings
//! - Statistics are written once per finished population: the real sample
//!   on a successful flip, the zero sample on stop
//!
//! # Usage
//!
//! ```ignore
//! let coordinator = PopulationCoordinator::new(config, store, stats, schema_state)?;
//! coordinator.add_populator(builder, descriptor, flipper, failed_factory, "name");
//! coordinator.create();
//! coordinator.index_all_entities().run()?;
//! coordinator.flip_after_store_scan(false);
//! ```

mod builder;
mod config;
mod coordinator;
mod descriptor;
mod errors;
mod flip;
mod job;
pub mod memory;
mod multiplexer;
mod proxy;
mod record;
mod registry;
mod sample;
mod scan;
mod update;

pub use builder::{IndexBuilder, IndexUpdater, PropertyAccessor};
pub use config::PopulationConfig;
pub use coordinator::PopulationCoordinator;
pub use descriptor::{EntityType, IndexDescriptor, IndexId, ScanFilter, SchemaDescriptor};
pub use errors::{PopulationError, PopulationErrorCode, PopulationResult, Severity};
pub use flip::FlipOutcome;
pub use job::{JobReport, PopulationJob};
pub use multiplexer::MultiplexingUpdater;
pub use proxy::{
    FailedIndexProxy, FailedIndexProxyFactory, FailedProxyFactory, FlippableProxy, IndexFlipper, IndexProxy,
    IndexProxyFactory, InternalIndexState, OnlineIndexProxy, OnlineProxyFactory, PopulatingIndexProxy,
};
pub use record::IndexPopulation;
pub use registry::PopulationRegistry;
pub use sample::{IndexSample, IndexStatisticsStore, InMemoryIndexStatistics, SchemaStateCache, SchemaStateCounter};
pub use scan::{EntityVisitor, IndexStoreView, PopulationProgress, StoreScan};
pub use update::{EntityUpdates, IndexEntryUpdate, UpdateMode};
