//! Configuration for the IQ engine.
//!
//! Settings are plain serde structs. Loading them from a file or the
//! environment is left to the embedding application; [`VkgConfig::from_json`]
//! covers the common case of a JSON document.

use common_error::VkgResult;
use serde::{Deserialize, Serialize};

/// Global engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VkgConfig {
    /// Intermediate query settings.
    pub iq: IqSettings,
    /// Optimization driver settings.
    pub optimization: OptimizationConfig,
}

impl VkgConfig {
    /// Parse a configuration from a JSON document. Missing fields take their default value.
    pub fn from_json(json: &str) -> VkgResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the configuration as pretty-printed JSON.
    pub fn to_json(&self) -> VkgResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Settings consulted when building intermediate query trees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IqSettings {
    /// When enabled, every node constructor checks its invariants and
    /// fails fast on violation.
    pub test_mode: bool,
}

impl IqSettings {
    /// Settings with validation at construction time.
    pub fn testing() -> Self {
        Self { test_mode: true }
    }

    /// Enable or disable validation at construction time.
    pub fn with_test_mode(mut self, enable: bool) -> Self {
        self.test_mode = enable;
        self
    }
}

/// Settings for the rule-based optimization driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationConfig {
    /// Maximum number of fixpoint iterations.
    pub max_iterations: usize,
    /// Record a before/after trace for every rule application.
    pub enable_trace: bool,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            enable_trace: false,
        }
    }
}

impl OptimizationConfig {
    /// Set the maximum number of fixpoint iterations.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Enable or disable tracing.
    pub fn with_trace(mut self, enable: bool) -> Self {
        self.enable_trace = enable;
        self
    }
}
