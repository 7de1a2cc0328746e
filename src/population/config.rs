//! Population configuration
//!
//! Loaded from the `population` section of the configuration file or built
//! programmatically. Immutable once a coordinator is constructed.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::descriptor::EntityType;
use super::errors::{PopulationError, PopulationResult};

fn default_queue_threshold() -> usize {
    20
}

/// Configuration for one batch of index populations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Entity type scanned by `index_all_entities`
    #[serde(default)]
    pub entity_type: EntityType,

    /// Passed through to the store scan
    #[serde(default)]
    pub parallel_scan: bool,

    /// Queued concurrent updates are applied once a population has this many
    #[serde(default = "default_queue_threshold")]
    pub queue_threshold: usize,

    /// Whether a population job verifies deferred constraints before flipping
    #[serde(default)]
    pub verify_constraints_before_flip: bool,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            entity_type: EntityType::Node,
            parallel_scan: false,
            queue_threshold: default_queue_threshold(),
            verify_constraints_before_flip: false,
        }
    }
}

impl PopulationConfig {
    /// Config scanning entities of `entity_type`, defaults otherwise
    pub fn for_entity_type(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            ..Self::default()
        }
    }

    /// Load and validate configuration from a JSON file
    pub fn load(path: &Path) -> PopulationResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PopulationError::invalid_config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Parse and validate configuration from JSON text
    pub fn from_json(content: &str) -> PopulationResult<Self> {
        let config: PopulationConfig = serde_json::from_str(content)
            .map_err(|e| PopulationError::invalid_config(format!("invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PopulationResult<()> {
        if self.queue_threshold == 0 {
            return Err(PopulationError::invalid_config("queue_threshold must be > 0"));
        }
        Ok(())
    }
}
