//! Training stage
//!
//! Delegates to a registered [`ModelTrainer`] when one exists; otherwise
//! produces simulated metrics so the pipeline always yields a well-formed
//! result. The trained model id is always distinct from the previous one.

use crate::error::Result;
use crate::types::{ModelType, Sample, TrainingMetrics};
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Result of one training run
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub model_id: String,
    pub metrics: TrainingMetrics,
}

/// Pluggable training backend
#[async_trait]
pub trait ModelTrainer: Send + Sync {
    async fn train(&self, model_type: ModelType, samples: &[Sample]) -> Result<TrainedModel>;

    /// Trainer name for logging
    fn name(&self) -> &str;
}

/// Runs training through the registered backend or the simulator
pub struct TrainingStage {
    trainer: Option<Arc<dyn ModelTrainer>>,
}

impl TrainingStage {
    pub fn new(trainer: Option<Arc<dyn ModelTrainer>>) -> Self {
        Self { trainer }
    }

    pub async fn run(&self, model_type: ModelType, samples: &[Sample]) -> Result<TrainedModel> {
        let started = Instant::now();
        let mut trained = match &self.trainer {
            Some(trainer) => {
                tracing::debug!(
                    "Training {} with backend '{}' on {} samples",
                    model_type,
                    trainer.name(),
                    samples.len()
                );
                trainer.train(model_type, samples).await?
            }
            None => self.simulate(model_type, samples),
        };

        if trained.metrics.training_duration_ms.is_none() {
            trained.metrics.training_duration_ms = Some(started.elapsed().as_millis() as i64);
        }
        trained.metrics.sample_count = samples.len();

        tracing::info!(
            "Trained {} -> {} (accuracy: {:?})",
            model_type,
            trained.model_id,
            trained.metrics.accuracy
        );
        Ok(trained)
    }

    /// Simulated metrics drawn from plausible ranges; labeled fields only
    /// when the dataset carries labels
    fn simulate(&self, model_type: ModelType, samples: &[Sample]) -> TrainedModel {
        let mut rng = rand::rng();
        let labeled = samples.iter().any(|s| s.label.is_some());

        let metrics = if labeled {
            let precision = rng.random_range(0.65..0.92);
            let recall = rng.random_range(0.65..0.92);
            let f1 = 2.0 * precision * recall / (precision + recall);
            TrainingMetrics {
                loss: Some(rng.random_range(0.2..0.6)),
                accuracy: Some(rng.random_range(0.68..0.90)),
                precision: Some(precision),
                recall: Some(recall),
                f1_score: Some(f1),
                auc_roc: Some(rng.random_range(0.70..0.95)),
                training_duration_ms: None,
                sample_count: samples.len(),
            }
        } else {
            TrainingMetrics {
                loss: Some(rng.random_range(0.3..0.8)),
                sample_count: samples.len(),
                ..Default::default()
            }
        };

        TrainedModel {
            model_id: format!("{}-{}", model_type, Uuid::new_v4()),
            metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{DataCollector, SyntheticCollector};
    use crate::error::RetrainerError;
    use crate::types::DataCollectionPolicy;

    struct FixedTrainer;

    #[async_trait]
    impl ModelTrainer for FixedTrainer {
        async fn train(&self, model_type: ModelType, _samples: &[Sample]) -> Result<TrainedModel> {
            Ok(TrainedModel {
                model_id: format!("{}-fixed", model_type),
                metrics: TrainingMetrics {
                    accuracy: Some(0.85),
                    ..Default::default()
                },
            })
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct FailingTrainer;

    #[async_trait]
    impl ModelTrainer for FailingTrainer {
        async fn train(&self, _model_type: ModelType, _samples: &[Sample]) -> Result<TrainedModel> {
            Err(RetrainerError::Training("gpu on fire".into()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    async fn samples() -> Vec<Sample> {
        SyntheticCollector::new()
            .collect(ModelType::PriceMovement, &DataCollectionPolicy::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_simulated_training_yields_well_formed_metrics() {
        let stage = TrainingStage::new(None);
        let trained = stage.run(ModelType::PriceMovement, &samples().await).await.unwrap();

        let m = &trained.metrics;
        let acc = m.accuracy.unwrap();
        assert!((0.0..=1.0).contains(&acc));
        assert!(m.f1_score.is_some());
        assert!(m.training_duration_ms.is_some());
        assert_eq!(m.sample_count, 500);

        // f1 is the harmonic mean of precision and recall
        let (p, r, f1) = (m.precision.unwrap(), m.recall.unwrap(), m.f1_score.unwrap());
        assert!((f1 - 2.0 * p * r / (p + r)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_model_ids_are_distinct_across_runs() {
        let stage = TrainingStage::new(None);
        let data = samples().await;
        let a = stage.run(ModelType::Sentiment, &data).await.unwrap();
        let b = stage.run(ModelType::Sentiment, &data).await.unwrap();
        assert_ne!(a.model_id, b.model_id);
    }

    #[tokio::test]
    async fn test_pluggable_trainer_is_used() {
        let stage = TrainingStage::new(Some(Arc::new(FixedTrainer)));
        let trained = stage.run(ModelType::VolumeForecast, &samples().await).await.unwrap();
        assert_eq!(trained.model_id, "volume_forecast-fixed");
        assert_eq!(trained.metrics.accuracy, Some(0.85));
    }

    #[tokio::test]
    async fn test_trainer_error_propagates() {
        let stage = TrainingStage::new(Some(Arc::new(FailingTrainer)));
        let err = stage.run(ModelType::Sentiment, &samples().await).await.unwrap_err();
        assert!(matches!(err, RetrainerError::Training(_)));
    }

    #[tokio::test]
    async fn test_unlabeled_samples_omit_classification_metrics() {
        let stage = TrainingStage::new(None);
        let mut data = samples().await;
        for s in &mut data {
            s.label = None;
        }
        let trained = stage.run(ModelType::AnomalyDetection, &data).await.unwrap();
        assert!(trained.metrics.accuracy.is_none());
        assert!(trained.metrics.precision.is_none());
        assert!(trained.metrics.loss.is_some());
    }
}
