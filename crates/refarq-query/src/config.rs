//! Engine configuration

use serde::{Deserialize, Serialize};

/// Default operator nesting limit. Evaluation recurses once per level;
/// this many levels fit a 2 MiB thread stack in debug builds.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Evaluation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Allow `service` operators to call out to a service executor
    pub allow_service: bool,

    /// Maximum operator nesting depth
    pub max_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            allow_service: true,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl EngineConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: disable service calls
    pub fn disable_services(mut self) -> Self {
        self.allow_service = false;
        self
    }

    /// Builder: set maximum depth
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.allow_service);
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::new().disable_services().max_depth(8);
        assert!(!config.allow_service);
        assert_eq!(config.max_depth, 8);
    }

    #[test]
    fn test_partial_json() {
        let config: EngineConfig = serde_json::from_str(r#"{"max_depth": 16}"#).unwrap();
        assert_eq!(config, EngineConfig::new().max_depth(16));
    }
}
