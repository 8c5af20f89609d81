//! Orchestrator configuration
//!
//! Loaded from a TOML file; every field has a compiled-in default so the
//! orchestrator runs with an empty or missing config.

use crate::error::{Result, RetrainerError};
use crate::types::{DataCollectionPolicy, DeploymentPolicy, ModelType, ValidationPolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Global orchestrator knobs (spec'd defaults in each `default_*` fn)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Ceiling on simultaneously active (non-terminal) jobs
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    /// Policy applied when a trigger does not override it
    #[serde(default)]
    pub default_data_collection: DataCollectionPolicy,
    #[serde(default)]
    pub default_validation: ValidationPolicy,
    #[serde(default)]
    pub default_deployment: DeploymentPolicy,
    /// Let `check_performance_and_trigger` start jobs
    #[serde(default = "default_true")]
    pub auto_performance_retraining: bool,
    /// Fractional accuracy drop vs. the rolling baseline that triggers
    #[serde(default = "default_performance_drop_threshold")]
    pub performance_drop_threshold: f64,
    /// Minimum spacing between guarded triggers for one model type
    #[serde(default = "default_min_retraining_interval_ms")]
    pub min_retraining_interval_ms: i64,
    /// Global on/off switch; `trigger_retraining` rejects when off
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Cache `get_statistics` results
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,
}

fn default_max_concurrent_jobs() -> usize {
    2
}

fn default_true() -> bool {
    true
}

fn default_performance_drop_threshold() -> f64 {
    0.05
}

fn default_min_retraining_interval_ms() -> i64 {
    60 * 60 * 1000
}

fn default_cache_ttl_ms() -> u64 {
    60_000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            default_data_collection: DataCollectionPolicy::default(),
            default_validation: ValidationPolicy::default(),
            default_deployment: DeploymentPolicy::default(),
            auto_performance_retraining: true,
            performance_drop_threshold: default_performance_drop_threshold(),
            min_retraining_interval_ms: default_min_retraining_interval_ms(),
            enabled: true,
            cache_enabled: true,
            cache_ttl_ms: default_cache_ttl_ms(),
        }
    }
}

impl SchedulerConfig {
    /// Merge a partial update into this config, field by field
    pub fn apply_update(&mut self, update: SchedulerConfigUpdate) {
        if let Some(v) = update.max_concurrent_jobs {
            self.max_concurrent_jobs = v;
        }
        if let Some(v) = update.default_data_collection {
            self.default_data_collection = v;
        }
        if let Some(v) = update.default_validation {
            self.default_validation = v;
        }
        if let Some(v) = update.default_deployment {
            self.default_deployment = v;
        }
        if let Some(v) = update.auto_performance_retraining {
            self.auto_performance_retraining = v;
        }
        if let Some(v) = update.performance_drop_threshold {
            self.performance_drop_threshold = v;
        }
        if let Some(v) = update.min_retraining_interval_ms {
            self.min_retraining_interval_ms = v;
        }
        if let Some(v) = update.enabled {
            self.enabled = v;
        }
        if let Some(v) = update.cache_enabled {
            self.cache_enabled = v;
        }
        if let Some(v) = update.cache_ttl_ms {
            self.cache_ttl_ms = v;
        }
    }
}

/// Partial config update; `None` fields keep their current value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchedulerConfigUpdate {
    pub max_concurrent_jobs: Option<usize>,
    pub default_data_collection: Option<DataCollectionPolicy>,
    pub default_validation: Option<ValidationPolicy>,
    pub default_deployment: Option<DeploymentPolicy>,
    pub auto_performance_retraining: Option<bool>,
    pub performance_drop_threshold: Option<f64>,
    pub min_retraining_interval_ms: Option<i64>,
    pub enabled: Option<bool>,
    pub cache_enabled: Option<bool>,
    pub cache_ttl_ms: Option<u64>,
}

/// A schedule to create at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapSchedule {
    pub model_type: ModelType,
    /// "interval" or "cron"
    pub kind: String,
    #[serde(default)]
    pub interval_minutes: Option<u64>,
    #[serde(default)]
    pub cron: Option<String>,
}

/// Top-level config file contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub schedules: Vec<BootstrapSchedule>,
}

impl Config {
    /// Load from a TOML file; a missing file yields defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| RetrainerError::Config(format!("{}: {}", path.display(), e)))?;
        toml::from_str(&raw)
            .map_err(|e| RetrainerError::Config(format!("{}: {}", path.display(), e)))
    }
}
