//! Flip protocol
//!
//! The work that brings one population online is handed to the population's
//! flipper as a unit. The flipper runs it under its own exclusive lock and
//! interprets the outcome:
//!
//! ```text
//! claim → apply queued updates → (verify deferred constraints) → sample
//!   ok:  replace stats → clear schema state → close(true) → ONLINE
//!   err: mark_as_failed → close(false)                   → FAILED
//! ```
//!
//! The claim happens inside the unit of work, under the builder lock, so a
//! concurrent stop or cancel either wins before the sample (and the flip
//! becomes a no-op) or waits until the flip has released the builder.

use serde::Serialize;

use super::builder::IndexBuilder;
use super::errors::{PopulationError, PopulationResult};
use super::record::IndexPopulation;
use super::sample::IndexSample;
use crate::observability::Event;

/// What a flip did to its population
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlipOutcome {
    /// Sampled, closed successfully and brought online
    Online,
    /// Population had already been removed; nothing was touched
    Skipped,
}

pub(crate) fn flip_population(
    population: &IndexPopulation,
    verify_constraints_first: bool,
) -> PopulationResult<FlipOutcome> {
    if population.is_removed() {
        return Ok(FlipOutcome::Skipped);
    }

    let mut outcome = FlipOutcome::Skipped;
    let result = population.flipper().flip(
        &mut || {
            let flipped = complete_population(population, verify_constraints_first)?;
            if flipped {
                outcome = FlipOutcome::Online;
            }
            Ok(flipped)
        },
        population.failed_proxy_factory().as_ref(),
    );
    population.detach();

    match result {
        Ok(()) => Ok(outcome),
        Err(e) => {
            // No-op when the unit of work already released the builder
            fail_unflipped(population, &e);
            Err(e)
        }
    }
}

/// The unit of work run inside the flipper. `Ok(false)` when another
/// terminal action got to the population first.
fn complete_population(population: &IndexPopulation, verify_constraints_first: bool) -> PopulationResult<bool> {
    let mut builder = population.lock_builder();
    if !population.claim() {
        return Ok(false);
    }

    let sample = match build_sample(population, builder.as_mut(), verify_constraints_first) {
        Ok(sample) => sample,
        Err(e) => {
            population.release_failed(builder, &e, Event::PopulationFlipFailed);
            return Err(e);
        }
    };

    let services = population.services();
    services.statistics.replace_stats(population.index_id(), sample);
    services.schema_state.clear();

    if let Err(e) = builder.close(true) {
        // close was already called once; only the failure is recorded
        let message = e.message();
        builder.mark_as_failed(&message);
        drop(builder);
        population.discard_queue();
        services.metrics.increment_flipped_failed();
        population.log(Event::PopulationFlipFailed, &[("failure", message.as_str())]);
        return Err(e);
    }
    drop(builder);

    services.metrics.increment_flipped_online();
    population.log(
        Event::PopulationFlipped,
        &[
            ("index_size", sample.index_size.to_string().as_str()),
            ("unique_values", sample.unique_values.to_string().as_str()),
            ("sample_size", sample.sample_size.to_string().as_str()),
        ],
    );
    Ok(true)
}

fn build_sample(
    population: &IndexPopulation,
    builder: &mut dyn IndexBuilder,
    verify_constraints_first: bool,
) -> PopulationResult<IndexSample> {
    population.drain_queue_into(builder)?;

    if verify_constraints_first {
        let accessor = population.services().store_view.new_property_accessor();
        builder.verify_deferred_constraints(accessor.as_ref())?;
    }

    builder.sample()
}

/// Release a population whose flip failed before the unit of work ran
fn fail_unflipped(population: &IndexPopulation, failure: &PopulationError) -> bool {
    let builder = population.lock_builder();
    if !population.claim() {
        return false;
    }
    population.release_failed(builder, failure, Event::PopulationFlipFailed);
    true
}
