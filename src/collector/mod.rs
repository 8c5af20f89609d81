//! Training data collection
//!
//! The orchestrator consumes collection through the [`DataCollector`]
//! trait; database/stream/cache adapters live outside this crate. When no
//! collector is registered the [`SyntheticCollector`] keeps the pipeline
//! exercisable with generated feature vectors.

use crate::error::Result;
use crate::types::{DataCollectionPolicy, DataSource, ModelType, Sample};
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use std::collections::HashMap;

/// Pluggable source of training samples
#[async_trait]
pub trait DataCollector: Send + Sync {
    /// Collect samples for one model type under the given policy
    async fn collect(&self, model_type: ModelType, policy: &DataCollectionPolicy)
        -> Result<Vec<Sample>>;

    /// Collector name for logging
    fn name(&self) -> &str;
}

/// Fraction of generated samples flagged anomalous
const SYNTHETIC_ANOMALY_RATE: f64 = 0.10;

/// Baseline sample count when the policy bounds allow it
const SYNTHETIC_TARGET: usize = 500;

/// Fallback generator used when no real collector is registered
pub struct SyntheticCollector {
    feature_dim: usize,
}

impl SyntheticCollector {
    pub fn new() -> Self {
        Self { feature_dim: 16 }
    }

    fn sample_count(policy: &DataCollectionPolicy) -> usize {
        SYNTHETIC_TARGET
            .max(policy.min_samples)
            .min(policy.max_samples)
    }
}

impl Default for SyntheticCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataCollector for SyntheticCollector {
    async fn collect(
        &self,
        model_type: ModelType,
        policy: &DataCollectionPolicy,
    ) -> Result<Vec<Sample>> {
        let count = Self::sample_count(policy);
        let mut rng = rand::rng();
        let now = Utc::now();

        let samples: Vec<Sample> = (0..count)
            .map(|i| {
                // The filter is honored at generation time so the returned
                // count always matches the policy bounds.
                let anomalous = !policy.filter.exclude_anomalies
                    && rng.random::<f64>() < SYNTHETIC_ANOMALY_RATE;
                Sample {
                    id: format!("synthetic-{}-{}", model_type, i),
                    model_type,
                    features: (0..self.feature_dim).map(|_| rng.random::<f64>()).collect(),
                    label: Some(if rng.random::<f64>() < 0.5 { 1.0 } else { 0.0 }),
                    collected_at: now,
                    source: DataSource::Synthetic,
                    anomalous,
                    metadata: HashMap::new(),
                }
            })
            .collect();

        tracing::debug!(
            "Synthetic collector produced {} samples for {}",
            samples.len(),
            model_type
        );
        Ok(samples)
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}
