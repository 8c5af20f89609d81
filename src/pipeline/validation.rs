//! Validation gate
//!
//! Compares the freshly trained model against the one currently in
//! production. The production accuracy comes from a registered
//! [`PerformanceSource`] when available, otherwise a simulated baseline.
//! Exactly one failure reason is attached per failed validation: the first
//! rule that trips, checked in priority order.

use crate::types::{ModelType, TrainingMetrics, ValidationPolicy};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;

/// Pluggable source of "current accuracy of the deployed model"
#[async_trait]
pub trait PerformanceSource: Send + Sync {
    /// Current production accuracy, when the metrics store knows it
    async fn accuracy_of(&self, model_type: ModelType) -> Option<f64>;
}

/// Classification metrics carried alongside the decision
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationMetrics {
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1_score: Option<f64>,
    pub auc_roc: Option<f64>,
}

/// Immutable outcome of one validation, produced once per job
#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutcome {
    pub strategy: String,
    pub passed: bool,
    pub old_accuracy: f64,
    pub new_accuracy: f64,
    pub improvement: f64,
    pub improvement_percent: f64,
    pub sample_count: usize,
    pub metrics: ValidationMetrics,
    pub validated_at: DateTime<Utc>,
    pub failure_reason: Option<String>,
}

/// Runs the accuracy/improvement/degradation gates
pub struct ValidationStage {
    performance: Option<Arc<dyn PerformanceSource>>,
}

impl ValidationStage {
    pub fn new(performance: Option<Arc<dyn PerformanceSource>>) -> Self {
        Self { performance }
    }

    pub async fn run(
        &self,
        model_type: ModelType,
        policy: &ValidationPolicy,
        training: &TrainingMetrics,
    ) -> ValidationOutcome {
        let old_accuracy = match &self.performance {
            Some(source) => source
                .accuracy_of(model_type)
                .await
                .unwrap_or_else(simulated_baseline),
            None => simulated_baseline(),
        };
        let new_accuracy = training
            .accuracy
            .unwrap_or_else(|| rand::rng().random_range(0.65..0.90));

        let improvement = new_accuracy - old_accuracy;
        let improvement_percent = if old_accuracy == 0.0 {
            0.0
        } else {
            improvement / old_accuracy * 100.0
        };

        // First failing rule wins; order matters.
        let failure_reason = if new_accuracy < policy.min_accuracy {
            Some(format!(
                "new model accuracy {:.4} is below the minimum {:.4}",
                new_accuracy, policy.min_accuracy
            ))
        } else if improvement < policy.min_improvement {
            Some(format!(
                "improvement {:.4} is below the required minimum {:.4}",
                improvement, policy.min_improvement
            ))
        } else if improvement < policy.max_degradation {
            Some(format!(
                "degradation {:.4} exceeds the allowed bound {:.4}",
                improvement, policy.max_degradation
            ))
        } else {
            None
        };

        let passed = failure_reason.is_none();
        if passed {
            tracing::info!(
                "Validation passed for {}: {:.4} -> {:.4} ({:+.2}%)",
                model_type,
                old_accuracy,
                new_accuracy,
                improvement_percent
            );
        } else {
            tracing::warn!(
                "Validation failed for {}: {}",
                model_type,
                failure_reason.as_deref().unwrap_or("")
            );
        }

        ValidationOutcome {
            strategy: format!("holdout_{:.0}pct", policy.holdout_fraction * 100.0),
            passed,
            old_accuracy,
            new_accuracy,
            improvement,
            improvement_percent,
            sample_count: training.sample_count,
            metrics: ValidationMetrics {
                precision: training.precision,
                recall: training.recall,
                f1_score: training.f1_score,
                auc_roc: training.auc_roc,
            },
            validated_at: Utc::now(),
            failure_reason,
        }
    }
}

/// Baseline used when no performance source knows the deployed model
fn simulated_baseline() -> f64 {
    rand::rng().random_range(0.70..0.80)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticSource(f64);

    #[async_trait]
    impl PerformanceSource for StaticSource {
        async fn accuracy_of(&self, _model_type: ModelType) -> Option<f64> {
            Some(self.0)
        }
    }

    fn metrics(accuracy: f64) -> TrainingMetrics {
        TrainingMetrics {
            accuracy: Some(accuracy),
            precision: Some(0.8),
            recall: Some(0.8),
            f1_score: Some(0.8),
            sample_count: 500,
            ..Default::default()
        }
    }

    fn policy() -> ValidationPolicy {
        ValidationPolicy {
            min_accuracy: 0.7,
            min_improvement: 0.0,
            max_degradation: -0.05,
            holdout_fraction: 0.2,
        }
    }

    #[tokio::test]
    async fn test_improvement_passes() {
        let stage = ValidationStage::new(Some(Arc::new(StaticSource(0.78))));
        let outcome = stage
            .run(ModelType::PriceMovement, &policy(), &metrics(0.82))
            .await;

        assert!(outcome.passed);
        assert!(outcome.failure_reason.is_none());
        assert!((outcome.improvement - 0.04).abs() < 1e-9);
        assert!((outcome.improvement_percent - 0.04 / 0.78 * 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_below_min_accuracy_fails_first() {
        // 0.65 < min_accuracy even though it also fails the improvement
        // rule; the accuracy reason must win.
        let stage = ValidationStage::new(Some(Arc::new(StaticSource(0.78))));
        let outcome = stage
            .run(ModelType::PriceMovement, &policy(), &metrics(0.65))
            .await;

        assert!(!outcome.passed);
        let reason = outcome.failure_reason.unwrap();
        assert!(reason.contains("0.7000"), "reason should cite the threshold: {}", reason);
        assert!(reason.contains("minimum"));
    }

    #[tokio::test]
    async fn test_insufficient_improvement_fails() {
        let mut p = policy();
        p.min_improvement = 0.02;
        let stage = ValidationStage::new(Some(Arc::new(StaticSource(0.80))));
        let outcome = stage.run(ModelType::Sentiment, &p, &metrics(0.81)).await;

        assert!(!outcome.passed);
        assert!(outcome.failure_reason.unwrap().contains("improvement"));
    }

    #[tokio::test]
    async fn test_degradation_bound() {
        // min_improvement relaxed so the degradation rule is reachable
        let mut p = policy();
        p.min_improvement = -1.0;
        let stage = ValidationStage::new(Some(Arc::new(StaticSource(0.85))));
        let outcome = stage.run(ModelType::Sentiment, &p, &metrics(0.75)).await;

        assert!(!outcome.passed);
        assert!(outcome.failure_reason.unwrap().contains("degradation"));
    }

    #[tokio::test]
    async fn test_zero_old_accuracy_improvement_percent() {
        let stage = ValidationStage::new(Some(Arc::new(StaticSource(0.0))));
        let outcome = stage
            .run(ModelType::WalletActivity, &policy(), &metrics(0.8))
            .await;
        assert_eq!(outcome.improvement_percent, 0.0);
    }

    #[tokio::test]
    async fn test_simulated_baseline_without_source() {
        let stage = ValidationStage::new(None);
        let outcome = stage
            .run(ModelType::VolumeForecast, &policy(), &metrics(0.95))
            .await;
        assert!(outcome.old_accuracy >= 0.70 && outcome.old_accuracy < 0.80);
        assert!(outcome.passed);
    }
}
