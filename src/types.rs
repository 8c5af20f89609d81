//! Shared types: model identities, training samples and pipeline policies

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Predictive models maintained by the monitoring system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Short-horizon price movement prediction
    PriceMovement,
    /// Market sentiment scoring
    Sentiment,
    /// Trading volume forecasting
    VolumeForecast,
    /// Unusual-activity detection
    AnomalyDetection,
    /// Wallet behaviour classification
    WalletActivity,
}

impl ModelType {
    /// All model types, in a stable order (used by the performance poll)
    pub fn all() -> &'static [ModelType] {
        &[
            ModelType::PriceMovement,
            ModelType::Sentiment,
            ModelType::VolumeForecast,
            ModelType::AnomalyDetection,
            ModelType::WalletActivity,
        ]
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModelType::PriceMovement => "price_movement",
            ModelType::Sentiment => "sentiment",
            ModelType::VolumeForecast => "volume_forecast",
            ModelType::AnomalyDetection => "anomaly_detection",
            ModelType::WalletActivity => "wallet_activity",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "price_movement" => Ok(ModelType::PriceMovement),
            "sentiment" => Ok(ModelType::Sentiment),
            "volume_forecast" => Ok(ModelType::VolumeForecast),
            "anomaly_detection" => Ok(ModelType::AnomalyDetection),
            "wallet_activity" => Ok(ModelType::WalletActivity),
            other => Err(format!("unknown model type: {}", other)),
        }
    }
}

/// Why a retraining job was started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerReason {
    /// Fired by a timer-driven schedule
    Scheduled,
    /// Production accuracy dropped below the rolling baseline
    PerformanceDrop,
    /// Enough new data accumulated
    DataVolume,
    /// Operator-initiated
    Manual,
}

impl fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TriggerReason::Scheduled => "scheduled",
            TriggerReason::PerformanceDrop => "performance_drop",
            TriggerReason::DataVolume => "data_volume",
            TriggerReason::Manual => "manual",
        };
        write!(f, "{}", s)
    }
}

/// Job priority; performance-drop triggers run high
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPriority {
    Low,
    Normal,
    High,
}

/// One labeled or unlabeled training sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    pub id: String,
    pub model_type: ModelType,
    pub features: Vec<f64>,
    /// Observed outcome; absent for unlabeled data
    pub label: Option<f64>,
    pub collected_at: DateTime<Utc>,
    pub source: DataSource,
    /// Flagged by upstream anomaly detection
    pub anomalous: bool,
    pub metadata: HashMap<String, String>,
}

/// Where training samples come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Database,
    Stream,
    Cache,
    Synthetic,
}

/// Metrics reported by a training run; any field may be absent for
/// unlabeled data
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub loss: Option<f64>,
    pub accuracy: Option<f64>,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1_score: Option<f64>,
    pub auc_roc: Option<f64>,
    pub training_duration_ms: Option<i64>,
    pub sample_count: usize,
}

/// Optional filters applied during sample collection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SampleFilter {
    /// Drop samples whose upstream confidence is below this floor
    pub min_confidence: Option<f64>,
    /// Keep only samples from these market categories
    pub categories: Option<Vec<String>>,
    /// Drop samples flagged as anomalous
    #[serde(default)]
    pub exclude_anomalies: bool,
}

/// How training data is gathered for a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataCollectionPolicy {
    pub sources: Vec<DataSource>,
    /// Look-back window for sample collection
    pub window_hours: u32,
    pub min_samples: usize,
    pub max_samples: usize,
    /// Only use samples with a known outcome
    pub labeled_only: bool,
    #[serde(default)]
    pub filter: SampleFilter,
}

impl Default for DataCollectionPolicy {
    fn default() -> Self {
        Self {
            sources: vec![DataSource::Database, DataSource::Cache],
            window_hours: 24 * 7,
            min_samples: 100,
            max_samples: 10_000,
            labeled_only: false,
            filter: SampleFilter::default(),
        }
    }
}

/// Quality gates a new model must clear before deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationPolicy {
    /// Hard floor on the new model's accuracy
    pub min_accuracy: f64,
    /// Required improvement over the deployed model
    pub min_improvement: f64,
    /// Most negative improvement tolerated (a negative bound)
    pub max_degradation: f64,
    /// Fraction of collected samples held out for validation
    pub holdout_fraction: f64,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            min_accuracy: 0.6,
            min_improvement: 0.0,
            max_degradation: -0.05,
            holdout_fraction: 0.2,
        }
    }
}

/// How a validated model is rolled out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStrategy {
    /// Swap the model in one step
    Immediate,
    /// Ramp traffic over to the new model
    Gradual,
    /// Serve a small traffic slice first
    Canary,
    /// Keep the old model hot for instant revert
    BlueGreen,
}

impl fmt::Display for DeploymentStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeploymentStrategy::Immediate => "immediate",
            DeploymentStrategy::Gradual => "gradual",
            DeploymentStrategy::Canary => "canary",
            DeploymentStrategy::BlueGreen => "blue_green",
        };
        write!(f, "{}", s)
    }
}

/// Deployment behaviour for a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentPolicy {
    pub strategy: DeploymentStrategy,
    /// Revert to the previous model when the post-deploy check fails
    pub auto_rollback: bool,
    /// Run the post-deploy health check
    pub health_check: bool,
    /// Simulated health-check failure rate when no real deployer exists
    pub health_failure_rate: f64,
}

impl Default for DeploymentPolicy {
    fn default() -> Self {
        Self {
            strategy: DeploymentStrategy::Gradual,
            auto_rollback: true,
            health_check: true,
            health_failure_rate: 0.02,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_type_round_trip() {
        for mt in ModelType::all() {
            let parsed: ModelType = mt.to_string().parse().unwrap();
            assert_eq!(parsed, *mt);
        }
    }

    #[test]
    fn test_model_type_unknown() {
        assert!("nonsense".parse::<ModelType>().is_err());
    }

    #[test]
    fn test_priority_ordering() {
        assert!(JobPriority::High > JobPriority::Normal);
        assert!(JobPriority::Normal > JobPriority::Low);
    }

    #[test]
    fn test_collection_policy_defaults() {
        let policy = DataCollectionPolicy::default();
        assert_eq!(policy.min_samples, 100);
        assert_eq!(policy.max_samples, 10_000);
        assert!(!policy.labeled_only);
        assert!(!policy.filter.exclude_anomalies);
    }

    #[test]
    fn test_validation_policy_defaults() {
        let policy = ValidationPolicy::default();
        assert_eq!(policy.min_accuracy, 0.6);
        assert_eq!(policy.min_improvement, 0.0);
        assert_eq!(policy.max_degradation, -0.05);
    }
}
