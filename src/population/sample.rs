//! Index statistics sample and the statistics / schema-state collaborators

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use super::descriptor::IndexId;

/// Summary statistics computed from a completed index build.
///
/// A population that is stopped without finishing records the zero sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndexSample {
    /// Number of entries in the index
    pub index_size: u64,
    /// Number of distinct keys among the sampled entries
    pub unique_values: u64,
    /// Number of entries that were sampled
    pub sample_size: u64,
    /// Updates applied since the sample was taken
    pub updates: u64,
}

impl IndexSample {
    pub fn new(index_size: u64, unique_values: u64, sample_size: u64) -> Self {
        Self {
            index_size,
            unique_values,
            sample_size,
            updates: 0,
        }
    }

    pub fn with_updates(mut self, updates: u64) -> Self {
        self.updates = updates;
        self
    }

    /// The sample stored for a stopped, unfinished population
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::zero()
    }
}

/// Persistent index statistics, keyed by index id
pub trait IndexStatisticsStore: Send + Sync {
    /// Replace whatever statistics are stored for `index_id`
    fn replace_stats(&self, index_id: IndexId, sample: IndexSample);
}

/// Cache of schema-derived state that must be invalidated whenever an index
/// comes online
pub trait SchemaStateCache: Send + Sync {
    fn clear(&self);
}

/// Statistics kept in memory
#[derive(Debug, Default)]
pub struct InMemoryIndexStatistics {
    samples: RwLock<BTreeMap<IndexId, IndexSample>>,
    writes: AtomicU64,
}

impl InMemoryIndexStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored sample for one index
    pub fn get(&self, index_id: IndexId) -> Option<IndexSample> {
        self.samples
            .read()
            .ok()
            .and_then(|samples| samples.get(&index_id).copied())
    }

    /// All stored samples, ordered by index id
    pub fn all(&self) -> Vec<(IndexId, IndexSample)> {
        self.samples
            .read()
            .map(|samples| samples.iter().map(|(id, s)| (*id, *s)).collect())
            .unwrap_or_default()
    }

    /// Number of `replace_stats` calls received
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

impl IndexStatisticsStore for InMemoryIndexStatistics {
    fn replace_stats(&self, index_id: IndexId, sample: IndexSample) {
        if let Ok(mut samples) = self.samples.write() {
            samples.insert(index_id, sample);
        }
        self.writes.fetch_add(1, Ordering::Relaxed);
    }
}

/// Schema state cache that only counts invalidations.
///
/// Stands in for the real cache wherever nothing is cached yet.
#[derive(Debug, Default)]
pub struct SchemaStateCounter {
    clears: AtomicU64,
}

impl SchemaStateCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clears(&self) -> u64 {
        self.clears.load(Ordering::Relaxed)
    }
}

impl SchemaStateCache for SchemaStateCounter {
    fn clear(&self) {
        self.clears.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_sample() {
        assert!(IndexSample::zero().is_zero());
        assert!(!IndexSample::new(1, 1, 1).is_zero());
    }

    #[test]
    fn test_statistics_replace() {
        let stats = InMemoryIndexStatistics::new();
        stats.replace_stats(1, IndexSample::new(10, 5, 10));
        stats.replace_stats(1, IndexSample::new(100, 110, 120).with_updates(130));

        assert_eq!(stats.get(1), Some(IndexSample::new(100, 110, 120).with_updates(130)));
        assert_eq!(stats.get(2), None);
        assert_eq!(stats.writes(), 2);
        assert_eq!(stats.all().len(), 1);
    }

    #[test]
    fn test_schema_state_counter() {
        let cache = SchemaStateCounter::new();
        cache.clear();
        cache.clear();
        assert_eq!(cache.clears(), 2);
    }
}
