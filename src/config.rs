//! Engine configuration.
//!
//! Scalar settings for the admission engine, loadable from a TOML file.
//! The same scalars are what the persistent settings store carries; this
//! struct is the in-process shape handed to [`Limiter::new`](crate::Limiter::new).

use crate::analysis::DedupPolicy;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// The config file is not valid TOML for these settings.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Admission engine settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AdmissionConfig {
    /// Whether admission control is enforced at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Decision-log capacity (how many decisions are retained).
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Unique-IP level considered normal traffic.
    #[serde(default = "default_expected_ip_count")]
    pub expected_ip_count: usize,
    /// Unique-IP level above which blocking is warranted.
    #[serde(default = "default_excessive_ip_count")]
    pub excessive_ip_count: usize,
    /// How many top ranges to surface in aggregation views.
    #[serde(default = "default_block_top")]
    pub block_top: usize,
    /// Re-evaluation cadence, in the scheduler's own syntax. The engine
    /// carries this for its callers; it does not schedule anything itself.
    #[serde(default)]
    pub periodicity: String,
    /// How unique-IP extraction treats the first sorted log entry.
    #[serde(default)]
    pub dedup_policy: DedupPolicy,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_entries: default_max_entries(),
            expected_ip_count: default_expected_ip_count(),
            excessive_ip_count: default_excessive_ip_count(),
            block_top: default_block_top(),
            periodicity: String::new(),
            dedup_policy: DedupPolicy::default(),
        }
    }
}

impl AdmissionConfig {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AdmissionConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

fn default_enabled() -> bool {
    false
}

fn default_max_entries() -> usize {
    100
}

fn default_expected_ip_count() -> usize {
    100
}

fn default_excessive_ip_count() -> usize {
    1000
}

fn default_block_top() -> usize {
    10
}
