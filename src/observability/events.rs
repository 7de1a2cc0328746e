//! Observable index population events
//!
//! Events are explicit and typed; the logger only ever sees their string
//! form.

use std::fmt;

use super::logger::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Registry
    /// Population registered with a coordinator
    PopulationAdded,

    // Build
    /// Builder `create` failed
    PopulationCreateFailed,
    /// Store scan launched
    PopulationScanBegin,
    /// Store scan finished (or was stopped)
    PopulationScanComplete,
    /// An updater failed during the scan or while applying queued updates
    PopulationUpdateFailed,

    // Terminal transitions
    /// Index flipped online
    PopulationFlipped,
    /// Index flipped to failed
    PopulationFlipFailed,
    /// Population stopped without finishing
    PopulationStopped,
    /// Population content dropped
    PopulationDropped,
    /// Population failed and closed
    PopulationCancelled,

    // Job
    PopulationJobBegin,
    PopulationJobComplete,
    PopulationJobFailed,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::PopulationAdded => "POPULATION_ADDED",
            Event::PopulationCreateFailed => "POPULATION_CREATE_FAILED",
            Event::PopulationScanBegin => "POPULATION_SCAN_BEGIN",
            Event::PopulationScanComplete => "POPULATION_SCAN_COMPLETE",
            Event::PopulationUpdateFailed => "POPULATION_UPDATE_FAILED",
            Event::PopulationFlipped => "POPULATION_FLIPPED",
            Event::PopulationFlipFailed => "POPULATION_FLIP_FAILED",
            Event::PopulationStopped => "POPULATION_STOPPED",
            Event::PopulationDropped => "POPULATION_DROPPED",
            Event::PopulationCancelled => "POPULATION_CANCELLED",
            Event::PopulationJobBegin => "POPULATION_JOB_BEGIN",
            Event::PopulationJobComplete => "POPULATION_JOB_COMPLETE",
            Event::PopulationJobFailed => "POPULATION_JOB_FAILED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::PopulationCreateFailed
            | Event::PopulationUpdateFailed
            | Event::PopulationFlipFailed
            | Event::PopulationCancelled => Severity::Warn,
            Event::PopulationJobFailed => Severity::Error,
            _ => Severity::Info,
        }
    }

    /// True for events recording a failed index
    pub fn is_failure(&self) -> bool {
        self.severity() >= Severity::Warn
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_are_upper_snake_case() {
        let events = [
            Event::PopulationAdded,
            Event::PopulationCreateFailed,
            Event::PopulationScanBegin,
            Event::PopulationScanComplete,
            Event::PopulationUpdateFailed,
            Event::PopulationFlipped,
            Event::PopulationFlipFailed,
            Event::PopulationStopped,
            Event::PopulationDropped,
            Event::PopulationCancelled,
            Event::PopulationJobBegin,
            Event::PopulationJobComplete,
            Event::PopulationJobFailed,
        ];

        for event in events {
            let s = event.as_str();
            assert!(s.starts_with("POPULATION_"));
            assert!(s.chars().all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_failure_events() {
        assert!(Event::PopulationFlipFailed.is_failure());
        assert!(Event::PopulationCancelled.is_failure());
        assert!(!Event::PopulationStopped.is_failure());
        assert!(!Event::PopulationFlipped.is_failure());
        assert_eq!(Event::PopulationJobFailed.severity(), Severity::Error);
    }
}
