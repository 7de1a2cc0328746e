//! In-memory collaborators
//!
//! A store view, index builder and index content that live entirely in
//! memory. The CLI drives populations through them, and they are small
//! enough to reason about in tests.

mod builder;
mod store;
mod tree;

pub use builder::{BuilderStatus, InMemoryIndexBuilder};
pub use store::{InMemoryPropertyAccessor, InMemoryStoreScan, InMemoryStoreView};
pub use tree::{composite_key, CompositeKey, IndexKey, IndexTree};
