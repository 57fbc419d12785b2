//! Configuration for selkit-core
//!
//! Defaults for expression evaluation and content-type conversion, loadable
//! from TOML or JSON.

use crate::error::{SelectionError, SelectionResult};
use selkit_expr::EvalOptions;
use serde::{Deserialize, Serialize};

/// Library-wide configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelkitConfig {
    /// Expression evaluation settings
    pub eval: EvalConfig,
    /// Conversion settings
    pub convert: ConvertConfig,
}

/// Expression evaluation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Masks shorter than this are evaluated on the calling thread
    pub parallel_min_len: usize,
    /// Elements per parallel task
    pub chunk_len: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        let options = EvalOptions::default();
        Self {
            parallel_min_len: options.parallel_min_len,
            chunk_len: options.chunk_len,
        }
    }
}

impl From<&EvalConfig> for EvalOptions {
    fn from(config: &EvalConfig) -> Self {
        Self {
            parallel_min_len: config.parallel_min_len,
            chunk_len: config.chunk_len,
        }
    }
}

/// Conversion configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Return an empty node when a dataset array is missing
    pub allow_missing_array: bool,
    /// Do not log degraded conversions
    pub quiet: bool,
    /// Default tolerance for location selections
    pub location_epsilon: f64,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            allow_missing_array: false,
            quiet: false,
            location_epsilon: 1e-6,
        }
    }
}

impl SelkitConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Serialize configuration to TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Validate configuration values
    pub fn validate(&self) -> SelectionResult<()> {
        if self.eval.chunk_len == 0 {
            return Err(SelectionError::InvalidConfig(
                "eval.chunk_len must be positive".to_string(),
            ));
        }

        let epsilon = self.convert.location_epsilon;
        if !epsilon.is_finite() || epsilon < 0.0 {
            return Err(SelectionError::InvalidConfig(format!(
                "convert.location_epsilon must be finite and non-negative, got {}",
                epsilon
            )));
        }

        Ok(())
    }

    /// Evaluation options seeded from this configuration
    pub fn eval_options(&self) -> EvalOptions {
        EvalOptions::from(&self.eval)
    }
}
