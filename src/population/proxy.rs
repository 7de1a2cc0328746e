//! Serving proxies and the flip primitive
//!
//! Live queries observe an index through a proxy. While an index is being
//! populated its proxy is "populating"; the flip swaps it to "online" or to
//! a failed proxy.
//!
//! # Atomicity
//!
//! `FlippableProxy` holds its delegate behind a read-write lock. The unit
//! of work handed to `flip` runs while the write lock is held, so no reader
//! observes a half-flipped index.

use std::fmt;
use std::sync::{Arc, RwLock};

use serde::Serialize;

use super::descriptor::IndexDescriptor;
use super::errors::{PopulationError, PopulationResult};

/// Externally visible state of an index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InternalIndexState {
    Populating,
    Online,
    Failed,
}

impl InternalIndexState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Populating => "POPULATING",
            Self::Online => "ONLINE",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for InternalIndexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An object serving queries against one index
pub trait IndexProxy: Send + Sync + fmt::Debug {
    fn descriptor(&self) -> &IndexDescriptor;

    fn state(&self) -> InternalIndexState;

    /// Failure description, for failed proxies
    fn failure(&self) -> Option<&str> {
        None
    }
}

/// Creates the proxy an index flips to when it comes online
pub trait IndexProxyFactory: Send + Sync {
    fn create(&self) -> Arc<dyn IndexProxy>;
}

/// Creates the proxy an index flips to when population failed
pub trait FailedProxyFactory: Send + Sync {
    fn create(&self, failure: &PopulationError) -> Arc<dyn IndexProxy>;
}

/// The serving-proxy contract the flip protocol relies on
pub trait IndexFlipper: Send + Sync {
    fn state(&self) -> InternalIndexState;

    /// Run `action` atomically with respect to readers.
    ///
    /// - `Ok(true)`: transition to online
    /// - `Ok(false)`: leave the current state untouched
    /// - `Err(e)`: transition to `failed.create(&e)` and return a flip failure
    fn flip(
        &self,
        action: &mut dyn FnMut() -> PopulationResult<bool>,
        failed: &dyn FailedProxyFactory,
    ) -> PopulationResult<()>;
}

#[derive(Debug)]
pub struct PopulatingIndexProxy {
    descriptor: IndexDescriptor,
}

impl PopulatingIndexProxy {
    pub fn new(descriptor: IndexDescriptor) -> Self {
        Self { descriptor }
    }
}

impl IndexProxy for PopulatingIndexProxy {
    fn descriptor(&self) -> &IndexDescriptor {
        &self.descriptor
    }

    fn state(&self) -> InternalIndexState {
        InternalIndexState::Populating
    }
}

#[derive(Debug)]
pub struct OnlineIndexProxy {
    descriptor: IndexDescriptor,
}

impl OnlineIndexProxy {
    pub fn new(descriptor: IndexDescriptor) -> Self {
        Self { descriptor }
    }
}

impl IndexProxy for OnlineIndexProxy {
    fn descriptor(&self) -> &IndexDescriptor {
        &self.descriptor
    }

    fn state(&self) -> InternalIndexState {
        InternalIndexState::Online
    }
}

#[derive(Debug)]
pub struct FailedIndexProxy {
    descriptor: IndexDescriptor,
    failure: String,
}

impl FailedIndexProxy {
    pub fn new(descriptor: IndexDescriptor, failure: impl Into<String>) -> Self {
        Self {
            descriptor,
            failure: failure.into(),
        }
    }
}

impl IndexProxy for FailedIndexProxy {
    fn descriptor(&self) -> &IndexDescriptor {
        &self.descriptor
    }

    fn state(&self) -> InternalIndexState {
        InternalIndexState::Failed
    }

    fn failure(&self) -> Option<&str> {
        Some(&self.failure)
    }
}

/// Flip target producing `OnlineIndexProxy`
#[derive(Debug, Clone)]
pub struct OnlineProxyFactory {
    descriptor: IndexDescriptor,
}

impl OnlineProxyFactory {
    pub fn new(descriptor: IndexDescriptor) -> Self {
        Self { descriptor }
    }
}

impl IndexProxyFactory for OnlineProxyFactory {
    fn create(&self) -> Arc<dyn IndexProxy> {
        Arc::new(OnlineIndexProxy::new(self.descriptor.clone()))
    }
}

/// Produces `FailedIndexProxy` carrying the root cause of the failure
#[derive(Debug, Clone)]
pub struct FailedIndexProxyFactory {
    descriptor: IndexDescriptor,
}

impl FailedIndexProxyFactory {
    pub fn new(descriptor: IndexDescriptor) -> Self {
        Self { descriptor }
    }
}

impl FailedProxyFactory for FailedIndexProxyFactory {
    fn create(&self, failure: &PopulationError) -> Arc<dyn IndexProxy> {
        Arc::new(FailedIndexProxy::new(
            self.descriptor.clone(),
            failure.root_cause().to_string(),
        ))
    }
}

struct FlipState {
    delegate: Arc<dyn IndexProxy>,
    target: Option<Arc<dyn IndexProxyFactory>>,
}

/// Serving proxy whose delegate is swapped by `flip`
pub struct FlippableProxy {
    descriptor: IndexDescriptor,
    inner: RwLock<FlipState>,
}

impl FlippableProxy {
    /// New proxy in the populating state, without a flip target
    pub fn new(descriptor: IndexDescriptor) -> Self {
        let delegate: Arc<dyn IndexProxy> = Arc::new(PopulatingIndexProxy::new(descriptor.clone()));
        Self {
            descriptor,
            inner: RwLock::new(FlipState {
                delegate,
                target: None,
            }),
        }
    }

    /// New proxy that flips to `OnlineIndexProxy`
    pub fn with_online_target(descriptor: IndexDescriptor) -> Self {
        let proxy = Self::new(descriptor.clone());
        proxy.set_flip_target(Arc::new(OnlineProxyFactory::new(descriptor)));
        proxy
    }

    pub fn set_flip_target(&self, target: Arc<dyn IndexProxyFactory>) {
        if let Ok(mut state) = self.inner.write() {
            state.target = Some(target);
        }
    }

    pub fn descriptor(&self) -> &IndexDescriptor {
        &self.descriptor
    }

    /// Current delegate
    pub fn delegate(&self) -> Option<Arc<dyn IndexProxy>> {
        self.inner.read().ok().map(|state| Arc::clone(&state.delegate))
    }

    /// Failure of the current delegate, if it is a failed proxy
    pub fn failure(&self) -> Option<String> {
        self.delegate()
            .and_then(|delegate| delegate.failure().map(str::to_string))
    }
}

impl fmt::Debug for FlippableProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlippableProxy")
            .field("index", &self.descriptor.id)
            .field("state", &self.state())
            .finish()
    }
}

impl IndexFlipper for FlippableProxy {
    fn state(&self) -> InternalIndexState {
        match self.inner.read() {
            Ok(state) => state.delegate.state(),
            Err(_) => InternalIndexState::Failed,
        }
    }

    fn flip(
        &self,
        action: &mut dyn FnMut() -> PopulationResult<bool>,
        failed: &dyn FailedProxyFactory,
    ) -> PopulationResult<()> {
        let mut state = self
            .inner
            .write()
            .map_err(|_| PopulationError::LockPoisoned("flippable proxy"))?;

        let Some(target) = state.target.clone() else {
            let error = PopulationError::FlipTargetMissing(self.descriptor.name.clone());
            state.delegate = failed.create(&error);
            return Err(error);
        };

        match action() {
            Ok(true) => {
                state.delegate = target.create();
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(e) => {
                state.delegate = failed.create(&e);
                Err(PopulationError::flip_failed(e))
            }
        }
    }
}
