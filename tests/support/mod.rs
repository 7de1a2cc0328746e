//! Recording fakes shared by the population integration tests
//!
//! Every fake records the calls it receives so tests can assert on exact
//! call sequences, and can be told to fail at a given step.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use aerodb_population::population::memory::InMemoryStoreView;
use aerodb_population::population::{
    EntityType, EntityUpdates, EntityVisitor, FailedIndexProxy, FailedProxyFactory, FlippableProxy, IndexBuilder,
    IndexDescriptor, IndexEntryUpdate, IndexFlipper, IndexPopulation, IndexProxy, IndexSample, IndexStoreView,
    IndexUpdater, InMemoryIndexStatistics, InternalIndexState, PopulationConfig, PopulationCoordinator,
    PopulationError, PopulationProgress, PopulationResult, PropertyAccessor, ScanFilter, SchemaDescriptor,
    SchemaStateCounter, StoreScan,
};

// =============================================================================
// Builder
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum BuilderCall {
    Create,
    NewUpdater,
    Process(IndexEntryUpdate),
    UpdaterClosed,
    Verify,
    Sample,
    MarkAsFailed(String),
    Close(bool),
    Drop,
}

#[derive(Debug, Default)]
struct Failures {
    create: Option<PopulationError>,
    new_updater: Option<PopulationError>,
    process: Option<PopulationError>,
    verify: Option<PopulationError>,
    sample: Option<PopulationError>,
}

#[derive(Debug, Default)]
struct Recording {
    calls: Vec<BuilderCall>,
    failures: Failures,
    sample: IndexSample,
    sample_delay: Option<Duration>,
}

/// Builder that records every call; clones share the recording
#[derive(Debug, Clone, Default)]
pub struct RecordingBuilder {
    recording: Arc<Mutex<Recording>>,
}

impl RecordingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<BuilderCall> {
        self.recording.lock().unwrap().calls.clone()
    }

    fn record(&self, call: BuilderCall) {
        self.recording.lock().unwrap().calls.push(call);
    }

    pub fn with_sample(self, sample: IndexSample) -> Self {
        self.recording.lock().unwrap().sample = sample;
        self
    }

    pub fn failing_create(self, error: PopulationError) -> Self {
        self.recording.lock().unwrap().failures.create = Some(error);
        self
    }

    pub fn failing_new_updater(self, error: PopulationError) -> Self {
        self.recording.lock().unwrap().failures.new_updater = Some(error);
        self
    }

    pub fn failing_process(self, error: PopulationError) -> Self {
        self.recording.lock().unwrap().failures.process = Some(error);
        self
    }

    pub fn failing_verify(self, error: PopulationError) -> Self {
        self.recording.lock().unwrap().failures.verify = Some(error);
        self
    }

    pub fn failing_sample(self, error: PopulationError) -> Self {
        self.recording.lock().unwrap().failures.sample = Some(error);
        self
    }

    /// Make `sample` take a while, widening race windows
    pub fn slow_sample(self, delay: Duration) -> Self {
        self.recording.lock().unwrap().sample_delay = Some(delay);
        self
    }

    pub fn processed(&self) -> Vec<IndexEntryUpdate> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BuilderCall::Process(update) => Some(update),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&BuilderCall) -> bool) -> usize {
        self.calls().iter().filter(|call| predicate(call)).count()
    }

    /// Number of terminal calls: `close` or `drop`
    pub fn terminal_calls(&self) -> usize {
        self.count(|call| matches!(call, BuilderCall::Close(_) | BuilderCall::Drop))
    }

    pub fn closes(&self) -> Vec<bool> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BuilderCall::Close(successful) => Some(successful),
                _ => None,
            })
            .collect()
    }

    pub fn failure(&self) -> Option<String> {
        self.calls().into_iter().find_map(|call| match call {
            BuilderCall::MarkAsFailed(message) => Some(message),
            _ => None,
        })
    }

    pub fn was_sampled(&self) -> bool {
        self.count(|call| matches!(call, BuilderCall::Sample)) > 0
    }
}

impl IndexBuilder for RecordingBuilder {
    fn create(&mut self) -> PopulationResult<()> {
        self.record(BuilderCall::Create);
        match self.recording.lock().unwrap().failures.create.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn new_updater(&mut self, _accessor: Arc<dyn PropertyAccessor>) -> PopulationResult<Box<dyn IndexUpdater>> {
        self.record(BuilderCall::NewUpdater);
        if let Some(error) = self.recording.lock().unwrap().failures.new_updater.clone() {
            return Err(error);
        }
        Ok(Box::new(RecordingUpdater {
            builder: self.clone(),
        }))
    }

    fn verify_deferred_constraints(&mut self, _accessor: &dyn PropertyAccessor) -> PopulationResult<()> {
        self.record(BuilderCall::Verify);
        match self.recording.lock().unwrap().failures.verify.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn sample(&mut self) -> PopulationResult<IndexSample> {
        self.record(BuilderCall::Sample);
        let delay = self.recording.lock().unwrap().sample_delay;
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
        let recording = self.recording.lock().unwrap();
        match recording.failures.sample.clone() {
            Some(error) => Err(error),
            None => Ok(recording.sample),
        }
    }

    fn mark_as_failed(&mut self, failure: &str) {
        self.record(BuilderCall::MarkAsFailed(failure.to_string()));
    }

    fn close(&mut self, successful: bool) -> PopulationResult<()> {
        self.record(BuilderCall::Close(successful));
        Ok(())
    }

    fn drop_index(&mut self) -> PopulationResult<()> {
        self.record(BuilderCall::Drop);
        Ok(())
    }
}

struct RecordingUpdater {
    builder: RecordingBuilder,
}

impl IndexUpdater for RecordingUpdater {
    fn process(&mut self, update: &IndexEntryUpdate) -> PopulationResult<()> {
        self.builder.record(BuilderCall::Process(update.clone()));
        match self.builder.recording.lock().unwrap().failures.process.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn close(&mut self) -> PopulationResult<()> {
        self.builder.record(BuilderCall::UpdaterClosed);
        Ok(())
    }
}

// =============================================================================
// Flipper and failed proxy factory
// =============================================================================

/// `FlippableProxy` that counts `flip` invocations
#[derive(Debug)]
pub struct CountingFlipper {
    inner: FlippableProxy,
    flips: AtomicUsize,
}

impl CountingFlipper {
    pub fn new(descriptor: IndexDescriptor) -> Self {
        Self {
            inner: FlippableProxy::with_online_target(descriptor),
            flips: AtomicUsize::new(0),
        }
    }

    /// Proxy without a flip target
    pub fn without_target(descriptor: IndexDescriptor) -> Self {
        Self {
            inner: FlippableProxy::new(descriptor),
            flips: AtomicUsize::new(0),
        }
    }

    pub fn flips(&self) -> usize {
        self.flips.load(Ordering::SeqCst)
    }

    pub fn failure(&self) -> Option<String> {
        self.inner.failure()
    }
}

impl IndexFlipper for CountingFlipper {
    fn state(&self) -> InternalIndexState {
        self.inner.state()
    }

    fn flip(
        &self,
        action: &mut dyn FnMut() -> PopulationResult<bool>,
        failed: &dyn FailedProxyFactory,
    ) -> PopulationResult<()> {
        self.flips.fetch_add(1, Ordering::SeqCst);
        self.inner.flip(action, failed)
    }
}

/// Records every error it is asked to build a failed proxy for
#[derive(Debug)]
pub struct RecordingFailedFactory {
    descriptor: IndexDescriptor,
    errors: Mutex<Vec<PopulationError>>,
}

impl RecordingFailedFactory {
    pub fn new(descriptor: IndexDescriptor) -> Self {
        Self {
            descriptor,
            errors: Mutex::new(Vec::new()),
        }
    }

    pub fn errors(&self) -> Vec<PopulationError> {
        self.errors.lock().unwrap().clone()
    }
}

impl FailedProxyFactory for RecordingFailedFactory {
    fn create(&self, failure: &PopulationError) -> Arc<dyn IndexProxy> {
        self.errors.lock().unwrap().push(failure.clone());
        Arc::new(FailedIndexProxy::new(self.descriptor.clone(), failure.to_string()))
    }
}

// =============================================================================
// Store views
// =============================================================================

/// Store whose scans fail after visiting nothing
#[derive(Debug, Default)]
pub struct FailingStoreView;

struct FailingScan {
    visitor: Mutex<Box<dyn EntityVisitor>>,
}

impl StoreScan for FailingScan {
    fn run(&self) -> PopulationResult<()> {
        self.visitor.lock().unwrap().scan_completed();
        Err(PopulationError::scan_failed("store file truncated"))
    }

    fn stop(&self) {}

    fn progress(&self) -> PopulationProgress {
        PopulationProgress::default()
    }
}

impl IndexStoreView for FailingStoreView {
    fn visit_entities(
        &self,
        _entity_type: EntityType,
        _filter: ScanFilter,
        visitor: Box<dyn EntityVisitor>,
        _property_accessor: Option<Arc<dyn PropertyAccessor>>,
        _parallel: bool,
    ) -> Arc<dyn StoreScan> {
        Arc::new(FailingScan {
            visitor: Mutex::new(visitor),
        })
    }

    fn new_property_accessor(&self) -> Arc<dyn PropertyAccessor> {
        InMemoryStoreView::new(Vec::new()).new_property_accessor()
    }
}

/// Store whose scan visits one entity, then blocks until stopped
#[derive(Debug, Default)]
pub struct BlockingStoreView {
    pub started: Arc<AtomicBool>,
}

struct BlockingScan {
    visitor: Mutex<Box<dyn EntityVisitor>>,
    started: Arc<AtomicBool>,
    stopped: AtomicBool,
}

impl StoreScan for BlockingScan {
    fn run(&self) -> PopulationResult<()> {
        let mut visitor = self.visitor.lock().unwrap();
        visitor.visit(&EntityUpdates::new(1, &[1]).with_property(10, "first"));
        self.started.store(true, Ordering::SeqCst);
        while !self.stopped.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(1));
        }
        visitor.scan_completed();
        Ok(())
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn progress(&self) -> PopulationProgress {
        PopulationProgress::new(1, 2)
    }
}

impl IndexStoreView for BlockingStoreView {
    fn visit_entities(
        &self,
        _entity_type: EntityType,
        _filter: ScanFilter,
        visitor: Box<dyn EntityVisitor>,
        _property_accessor: Option<Arc<dyn PropertyAccessor>>,
        _parallel: bool,
    ) -> Arc<dyn StoreScan> {
        Arc::new(BlockingScan {
            visitor: Mutex::new(visitor),
            started: Arc::clone(&self.started),
            stopped: AtomicBool::new(false),
        })
    }

    fn new_property_accessor(&self) -> Arc<dyn PropertyAccessor> {
        InMemoryStoreView::new(Vec::new()).new_property_accessor()
    }
}

// =============================================================================
// Harness
// =============================================================================

/// One registered population and the fakes behind it
pub struct Registered {
    pub population: Arc<IndexPopulation>,
    pub builder: RecordingBuilder,
    pub flipper: Arc<CountingFlipper>,
    pub failed_factory: Arc<RecordingFailedFactory>,
}

pub struct Harness {
    pub coordinator: Arc<PopulationCoordinator>,
    pub statistics: Arc<InMemoryIndexStatistics>,
    pub schema_state: Arc<SchemaStateCounter>,
}

impl Harness {
    pub fn new(entities: Vec<EntityUpdates>) -> Self {
        Self::with_store(Arc::new(InMemoryStoreView::new(entities)), PopulationConfig::default())
    }

    pub fn with_store(store: Arc<dyn IndexStoreView>, config: PopulationConfig) -> Self {
        let statistics = Arc::new(InMemoryIndexStatistics::new());
        let schema_state = Arc::new(SchemaStateCounter::new());
        let coordinator = PopulationCoordinator::new(config, store, statistics.clone(), schema_state.clone())
            .expect("valid config");
        Self {
            coordinator: Arc::new(coordinator),
            statistics,
            schema_state,
        }
    }

    /// Register index `id` over `(:1 {10})` with `builder`
    pub fn add(&self, id: u64, builder: RecordingBuilder) -> Registered {
        self.add_with_schema(id, SchemaDescriptor::for_token(1, 10), builder)
    }

    pub fn add_with_schema(&self, id: u64, schema: SchemaDescriptor, builder: RecordingBuilder) -> Registered {
        let descriptor = IndexDescriptor::new(id, format!("index_{}", id), schema);
        let flipper = Arc::new(CountingFlipper::new(descriptor.clone()));
        self.add_with_flipper(descriptor, builder, flipper)
    }

    pub fn add_with_flipper(
        &self,
        descriptor: IndexDescriptor,
        builder: RecordingBuilder,
        flipper: Arc<CountingFlipper>,
    ) -> Registered {
        let failed_factory = Arc::new(RecordingFailedFactory::new(descriptor.clone()));
        let population = self.coordinator.add_populator(
            Box::new(builder.clone()),
            descriptor.clone(),
            flipper.clone(),
            failed_factory.clone(),
            descriptor.name.clone(),
        );
        Registered {
            population,
            builder,
            flipper,
            failed_factory,
        }
    }
}

pub fn node(id: u64, value: &str) -> EntityUpdates {
    EntityUpdates::new(id, &[1]).with_property(10, value)
}
