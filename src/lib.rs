//! aerodb-population - Concurrent multi-index population
//!
//! Builds several indexes from a single scan of the entity store, flips each
//! one online (or to failed) independently, and releases every index builder
//! exactly once under concurrent stop and cancel.

pub mod cli;
pub mod observability;
pub mod population;
