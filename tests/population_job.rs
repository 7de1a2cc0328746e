//! Population Job Tests
//!
//! End-to-end runs of the job over in-memory and scripted stores:
//! - Successful runs bring every index online
//! - Scan failures cancel every population with the scan's error
//! - Stop from another thread interrupts a running scan

mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use aerodb_population::population::memory::{InMemoryIndexBuilder, InMemoryStoreView};
use aerodb_population::population::{
    FailedIndexProxyFactory, FlippableProxy, IndexDescriptor, IndexFlipper, InternalIndexState, PopulationConfig,
    PopulationJob, SchemaDescriptor,
};
use support::{node, BlockingStoreView, FailingStoreView, Harness, RecordingBuilder};

#[test]
fn test_job_builds_real_indexes() {
    let harness = Harness::new(vec![node(1, "foo"), node(2, "foo"), node(3, "bar")]);
    let descriptor = IndexDescriptor::new(5, "by_name", SchemaDescriptor::for_token(1, 10));
    let builder = InMemoryIndexBuilder::new(descriptor.clone());
    let proxy = Arc::new(FlippableProxy::with_online_target(descriptor.clone()));
    harness.coordinator.add_populator(
        Box::new(builder.clone()),
        descriptor.clone(),
        proxy.clone(),
        Arc::new(FailedIndexProxyFactory::new(descriptor)),
        "by_name",
    );

    let report = PopulationJob::new(Arc::clone(&harness.coordinator)).run();

    assert_eq!(report.online, vec![5]);
    assert_eq!(proxy.state(), InternalIndexState::Online);
    assert_eq!(builder.entry_count(), 3);
    let sample = harness.statistics.get(5).unwrap();
    assert_eq!(sample.index_size, 3);
    assert_eq!(sample.unique_values, 2);
    assert_eq!(harness.schema_state.clears(), 1);
}

#[test]
fn test_scan_failure_cancels_every_population() {
    let harness = Harness::with_store(Arc::new(FailingStoreView), PopulationConfig::default());
    let first = harness.add(1, RecordingBuilder::new());
    let second = harness.add(2, RecordingBuilder::new());

    let report = PopulationJob::new(Arc::clone(&harness.coordinator)).run();

    let failure = report.scan_failure.unwrap();
    assert!(failure.contains("store file truncated"));
    assert!(report.online.is_empty());
    for r in [&first, &second] {
        assert!(r.builder.failure().unwrap().contains("store file truncated"));
        assert_eq!(r.builder.closes(), vec![false]);
        assert!(!r.builder.was_sampled());
        assert_eq!(r.flipper.flips(), 0);
    }
    assert_eq!(report.metrics.cancelled, 2);
    assert!(!harness.coordinator.has_populators());
}

#[test]
fn test_stop_interrupts_running_scan() {
    let store = Arc::new(BlockingStoreView::default());
    let started = Arc::clone(&store.started);
    let harness = Harness::with_store(store, PopulationConfig::default());
    let r = harness.add(1, RecordingBuilder::new());

    let job = Arc::new(PopulationJob::new(Arc::clone(&harness.coordinator)));
    let running = {
        let job = Arc::clone(&job);
        thread::spawn(move || job.run())
    };
    while !started.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(1));
    }
    job.stop();
    let report = running.join().unwrap();

    assert!(report.stopped);
    assert!(report.online.is_empty());
    assert!(report.scan_failure.is_none());
    // the entity visited before the stop still reached the builder
    assert_eq!(r.builder.processed().len(), 1);
    assert_eq!(r.builder.closes(), vec![false]);
    assert!(!r.builder.was_sampled());
    assert!(harness.statistics.get(1).unwrap().is_zero());
    assert_eq!(report.metrics.stopped, 1);
}

#[test]
fn test_job_with_failing_create_flips_the_rest() {
    let store = Arc::new(InMemoryStoreView::new(vec![node(1, "foo")]));
    let harness = Harness::with_store(store, PopulationConfig::default());
    let failing = harness.add(
        1,
        RecordingBuilder::new().failing_create(aerodb_population::population::PopulationError::builder_failed(
            "disk full",
        )),
    );
    let healthy = harness.add(2, RecordingBuilder::new());

    let report = PopulationJob::new(Arc::clone(&harness.coordinator)).run();

    assert_eq!(report.online, vec![2]);
    assert_eq!(report.metrics.create_failures, 1);
    assert!(failing.builder.processed().is_empty());
    assert_eq!(healthy.builder.processed().len(), 1);
}

#[test]
fn test_job_verifies_when_configured() {
    let config = PopulationConfig {
        verify_constraints_before_flip: true,
        ..PopulationConfig::default()
    };
    let harness = Harness::with_store(Arc::new(InMemoryStoreView::new(Vec::new())), config);
    let r = harness.add(1, RecordingBuilder::new());

    PopulationJob::new(Arc::clone(&harness.coordinator)).run();

    assert!(r.builder.calls().contains(&support::BuilderCall::Verify));
}

#[tokio::test]
async fn test_scheduled_job_reports_scan_failure() {
    let harness = Harness::with_store(Arc::new(FailingStoreView), PopulationConfig::default());
    let r = harness.add(1, RecordingBuilder::new());

    let job = Arc::new(PopulationJob::new(Arc::clone(&harness.coordinator)));
    let report = job.schedule().await.unwrap();

    assert!(report.scan_failure.is_some());
    assert_eq!(r.builder.closes(), vec![false]);
}
