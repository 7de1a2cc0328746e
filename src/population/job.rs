//! Population job
//!
//! Drives one coordinator from creation to flip on a single task:
//!
//! 1. create every builder
//! 2. run the shared store scan
//! 3. apply updates queued by concurrent transactions
//! 4. flip every population still active
//!
//! A failed scan cancels every remaining population with the scan's error.
//! `stop` may be called from any other thread at any point; it stops the
//! running scan and then every population that has not finished.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::coordinator::PopulationCoordinator;
use super::descriptor::IndexId;
use super::errors::PopulationError;
use super::scan::{PopulationProgress, StoreScan};
use crate::observability::{log_event_with_fields, Event, MetricsSnapshot, ObservationScope};

/// Outcome of one job run
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Indexes brought online, in id order
    pub online: Vec<IndexId>,
    pub stopped: bool,
    pub scan_failure: Option<String>,
    pub progress: PopulationProgress,
    pub metrics: MetricsSnapshot,
}

pub struct PopulationJob {
    id: Uuid,
    coordinator: Arc<PopulationCoordinator>,
    verify_constraints_first: bool,
    scan: Mutex<Option<Arc<dyn StoreScan>>>,
    stopped: AtomicBool,
}

impl PopulationJob {
    /// Job verifying deferred constraints before flipping when the
    /// coordinator's config asks for it
    pub fn new(coordinator: Arc<PopulationCoordinator>) -> Self {
        let verify = coordinator.config().verify_constraints_before_flip;
        Self::with_verification(coordinator, verify)
    }

    pub fn with_verification(coordinator: Arc<PopulationCoordinator>, verify_constraints_first: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            coordinator,
            verify_constraints_first,
            scan: Mutex::new(None),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn coordinator(&self) -> &Arc<PopulationCoordinator> {
        &self.coordinator
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Progress of the store scan; nothing until the scan was launched
    pub fn progress(&self) -> PopulationProgress {
        self.current_scan()
            .map(|scan| scan.progress())
            .unwrap_or_default()
    }

    fn current_scan(&self) -> Option<Arc<dyn StoreScan>> {
        self.scan.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Stop the job. Populations that already flipped are left alone.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        if let Some(scan) = self.current_scan() {
            scan.stop();
        }
        self.coordinator.stop();
    }

    /// Run the job to completion on the calling thread
    pub fn run(&self) -> JobReport {
        let started_at = Utc::now();
        let job_id = self.id.to_string();
        log_event_with_fields(
            Event::PopulationJobBegin,
            &[
                ("job_id", job_id.as_str()),
                ("populations", self.coordinator.active_index_ids().len().to_string().as_str()),
            ],
        );

        let mut online = Vec::new();
        let mut scan_failure = None;

        if !self.is_stopped() {
            self.coordinator.create();
        }
        if !self.is_stopped() && self.coordinator.has_populators() {
            if let Err(e) = self.scan_store(&job_id) {
                scan_failure = Some(e.message());
            }
        }
        if !self.is_stopped() && scan_failure.is_none() {
            self.coordinator.apply_queued_updates();
            online = self.coordinator.flip_after_store_scan(self.verify_constraints_first);
        }

        let report = JobReport {
            job_id: self.id,
            started_at,
            finished_at: Utc::now(),
            online,
            stopped: self.is_stopped(),
            scan_failure,
            progress: self.progress(),
            metrics: self.coordinator.metrics().snapshot(),
        };

        let online_count = report.online.len().to_string();
        match &report.scan_failure {
            None => log_event_with_fields(
                Event::PopulationJobComplete,
                &[
                    ("job_id", job_id.as_str()),
                    ("online", online_count.as_str()),
                    ("stopped", if report.stopped { "true" } else { "false" }),
                ],
            ),
            Some(failure) => log_event_with_fields(
                Event::PopulationJobFailed,
                &[("job_id", job_id.as_str()), ("failure", failure.as_str())],
            ),
        }
        report
    }

    /// Launch and run the store scan, cancelling every population if it fails
    fn scan_store(&self, job_id: &str) -> Result<(), PopulationError> {
        let scan = self.coordinator.index_all_entities();
        *self.scan.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&scan));
        // stop() may have run before the scan was published
        if self.is_stopped() {
            scan.stop();
        }

        let scope = ObservationScope::with_fields("POPULATION_STORE_SCAN", vec![("job_id", job_id.to_string())]);
        let result = scan.run();
        let progress = scan.progress();
        let completed = progress.completed.to_string();
        let total = progress.total.to_string();

        match result {
            Ok(()) => {
                scope.complete_with_fields(&[("completed", completed.as_str()), ("total", total.as_str())]);
                log_event_with_fields(
                    Event::PopulationScanComplete,
                    &[("job_id", job_id), ("completed", completed.as_str()), ("total", total.as_str())],
                );
                Ok(())
            }
            Err(e) => {
                scope.fail(&e.message());
                let failure = match e {
                    PopulationError::ScanFailed(_) => e,
                    other => PopulationError::scan_failed(other.message()),
                };
                self.coordinator.cancel(&failure);
                Err(failure)
            }
        }
    }

    /// Run the job on the tokio blocking pool. Must be called from within a
    /// tokio runtime.
    pub fn schedule(self: Arc<Self>) -> JoinHandle<JobReport> {
        tokio::task::spawn_blocking(move || self.run())
    }
}

impl std::fmt::Debug for PopulationJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PopulationJob")
            .field("id", &self.id)
            .field("verify_constraints_first", &self.verify_constraints_first)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
