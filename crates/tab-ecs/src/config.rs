//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::EcsResult;

/// Sizing and safety limits for a [`World`](crate::World).
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```ignore
/// let config = EngineConfig::from_json(r#"{ "initial_entity_capacity": 4096 }"#)?;
/// let world = World::with_config(config);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Entity slots reserved up front.
    pub initial_entity_capacity: usize,
    /// Row slots reserved up front by every board.
    pub initial_row_capacity: usize,
    /// Maximum hops when resolving a shared component to its owner.
    pub max_indirection_depth: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_entity_capacity: 1024,
            initial_row_capacity: 64,
            max_indirection_depth: 8,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON, filling missing fields with defaults.
    pub fn from_json(json: &str) -> EcsResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
