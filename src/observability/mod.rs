//! Observability for index population
//!
//! This module provides:
//! - Structured logging (JSON lines)
//! - Lock-free population counters
//! - Typed lifecycle events
//!
//! # Principles
//!
//! 1. Observability is read-only: it never changes population outcomes
//! 2. No background threads
//! 3. Deterministic output
//!
//! # Usage
//!
//! ```ignore
//! use aerodb_population::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::PopulationFlipped, &[("index_id", "7")]);
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{LogTarget, Logger, Severity};
pub use metrics::{MetricsSnapshot, PopulationMetrics};
pub use scope::ObservationScope;

/// Log a lifecycle event at its own severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event() {
        log_event(Event::PopulationScanBegin);
        log_event(Event::PopulationScanComplete);
    }

    #[test]
    fn test_log_event_with_fields() {
        log_event_with_fields(Event::PopulationCancelled, &[("index_id", "1"), ("failure", "x")]);
    }
}
